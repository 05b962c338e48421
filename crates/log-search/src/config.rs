//! 로그 검색 설정
//!
//! [`SearchConfig`]는 core의 [`SearchSection`](foresight_core::config::SearchSection)을
//! 기반으로 검색 코어 전용 런타임 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use foresight_core::config::ForesightConfig;
//! use foresight_log_search::config::SearchConfig;
//!
//! let core_config = ForesightConfig::default();
//! let config = SearchConfig::from_core(&core_config.search)
//!     .with_session_ttl(std::time::Duration::from_secs(30));
//! ```

use std::time::Duration;

use foresight_core::config::{MIN_READER_CAPACITY, SearchSection};
use serde::{Deserialize, Serialize};

use crate::error::LogSearchError;

/// 로그 검색 런타임 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// 유휴 세션 회수 시간
    pub session_ttl: Duration,
    /// 파일 리더 버퍼 크기 (바이트)
    pub reader_capacity: usize,
    /// 논리 라인/슬로우 쿼리 블록 최대 크기 (바이트)
    pub max_line_size: usize,
    /// 슬로우 쿼리 이터레이터를 선택하는 파일 이름
    pub slow_query_file: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::from_core(&SearchSection::default())
    }
}

impl SearchConfig {
    /// core의 `SearchSection`에서 검색 설정을 생성합니다.
    pub fn from_core(core: &SearchSection) -> Self {
        Self {
            session_ttl: Duration::from_secs(core.session_ttl_secs),
            reader_capacity: core.reader_capacity,
            max_line_size: core.max_line_size,
            slow_query_file: core.slow_query_file.clone(),
        }
    }

    /// 세션 TTL을 설정합니다.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// 리더 버퍼 크기를 설정합니다.
    pub fn with_reader_capacity(mut self, capacity: usize) -> Self {
        self.reader_capacity = capacity;
        self
    }

    /// 최대 라인 크기를 설정합니다.
    pub fn with_max_line_size(mut self, size: usize) -> Self {
        self.max_line_size = size;
        self
    }

    /// 슬로우 쿼리 파일 이름을 설정합니다.
    pub fn with_slow_query_file(mut self, name: impl Into<String>) -> Self {
        self.slow_query_file = name.into();
        self
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogSearchError> {
        if self.session_ttl.is_zero() {
            return Err(LogSearchError::Config {
                field: "session_ttl".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.reader_capacity < MIN_READER_CAPACITY {
            return Err(LogSearchError::Config {
                field: "reader_capacity".to_owned(),
                reason: format!("must be at least {MIN_READER_CAPACITY}"),
            });
        }

        if self.max_line_size == 0 {
            return Err(LogSearchError::Config {
                field: "max_line_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.slow_query_file.is_empty() {
            return Err(LogSearchError::Config {
                field: "slow_query_file".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        Ok(())
    }
}
