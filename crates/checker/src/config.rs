//! 설정 점검 엔진 설정
//!
//! [`CheckConfig`]는 core의 [`CheckSection`]을 기반으로 점검 엔진 전용
//! 런타임 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use foresight_core::config::ForesightConfig;
//! use foresight_checker::config::CheckConfig;
//!
//! let core_config = ForesightConfig::default();
//! let config = CheckConfig::from_core(&core_config.check)
//!     .with_categories(vec![CheckCategory::Config, CheckCategory::Performance]);
//! ```

use std::path::PathBuf;

use foresight_core::config::CheckSection;
use foresight_core::types::CheckCategory;
use serde::{Deserialize, Serialize};

use crate::error::CheckerError;

/// 슬로우 쿼리 집계 기간 상한 (일)
const MAX_SLOW_LOG_DAYS: u32 = 365;

/// 슬로우 쿼리 병렬 처리 상한
const MAX_SLOW_LOG_CONCURRENCY: usize = 64;

/// 설정 점검 런타임 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// 규칙 파일 경로 (`None`이면 내장 규칙)
    pub rule_file: Option<PathBuf>,
    /// 활성 카테고리
    pub categories: Vec<CheckCategory>,
    /// 슬로우 쿼리 집계 기간 (일)
    pub slow_log_days: u32,
    /// 슬로우 쿼리 블록 배치 병렬 처리 수
    pub slow_log_concurrency: usize,
    /// 리포트 출력 디렉토리
    pub report_dir: PathBuf,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self::from_core(&CheckSection::default())
    }
}

impl CheckConfig {
    /// core의 `CheckSection`에서 점검 설정을 생성합니다.
    pub fn from_core(core: &CheckSection) -> Self {
        Self {
            rule_file: if core.rule_file.is_empty() {
                None
            } else {
                Some(PathBuf::from(&core.rule_file))
            },
            categories: core.parsed_categories(),
            slow_log_days: core.slow_log_days,
            slow_log_concurrency: core.slow_log_concurrency,
            report_dir: PathBuf::from(&core.report_dir),
        }
    }

    /// 규칙 파일을 설정합니다.
    pub fn with_rule_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.rule_file = Some(path.into());
        self
    }

    /// 활성 카테고리를 설정합니다.
    pub fn with_categories(mut self, categories: Vec<CheckCategory>) -> Self {
        self.categories = categories;
        self
    }

    /// 슬로우 쿼리 집계 기간을 설정합니다.
    pub fn with_slow_log_days(mut self, days: u32) -> Self {
        self.slow_log_days = days;
        self
    }

    /// 슬로우 쿼리 병렬 처리 수를 설정합니다.
    pub fn with_slow_log_concurrency(mut self, concurrency: usize) -> Self {
        self.slow_log_concurrency = concurrency;
        self
    }

    /// 리포트 출력 디렉토리를 설정합니다.
    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = dir.into();
        self
    }

    /// 카테고리가 활성화되어 있는지 여부
    pub fn is_enabled(&self, category: CheckCategory) -> bool {
        self.categories.contains(&category)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), CheckerError> {
        if self.categories.is_empty() {
            return Err(CheckerError::Config {
                field: "categories".to_owned(),
                reason: "at least one category must be enabled".to_owned(),
            });
        }

        if self.slow_log_days == 0 || self.slow_log_days > MAX_SLOW_LOG_DAYS {
            return Err(CheckerError::Config {
                field: "slow_log_days".to_owned(),
                reason: format!("must be between 1 and {MAX_SLOW_LOG_DAYS}"),
            });
        }

        if self.slow_log_concurrency == 0 || self.slow_log_concurrency > MAX_SLOW_LOG_CONCURRENCY {
            return Err(CheckerError::Config {
                field: "slow_log_concurrency".to_owned(),
                reason: format!("must be between 1 and {MAX_SLOW_LOG_CONCURRENCY}"),
            });
        }

        Ok(())
    }
}
