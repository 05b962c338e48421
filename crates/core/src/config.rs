//! 설정 관리 -- foresight.toml 파싱 및 런타임 설정
//!
//! [`ForesightConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`FORESIGHT_SEARCH_SESSION_TTL_SECS=120` 형식)
//! 3. 설정 파일 (`foresight.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), foresight_core::error::ForesightError> {
//! use foresight_core::config::ForesightConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = ForesightConfig::load("foresight.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = ForesightConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ForesightError};
use crate::types::CheckCategory;

/// 버퍼 리더 최소 용량 (64 KiB)
pub const MIN_READER_CAPACITY: usize = 64 * 1024;

/// Foresight 통합 설정
///
/// `foresight.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForesightConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 로그 검색 설정
    #[serde(default)]
    pub search: SearchSection,
    /// 설정 점검 설정
    #[serde(default)]
    pub check: CheckSection,
}

impl ForesightConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ForesightError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ForesightError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ForesightError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ForesightError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ForesightError> {
        toml::from_str(toml_str).map_err(|e| {
            ForesightError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `FORESIGHT_{SECTION}_{FIELD}`
    /// 예: `FORESIGHT_CHECK_CATEGORIES=config,performance`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "FORESIGHT_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "FORESIGHT_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "FORESIGHT_GENERAL_DATA_DIR");

        // Search
        override_u64(
            &mut self.search.session_ttl_secs,
            "FORESIGHT_SEARCH_SESSION_TTL_SECS",
        );
        override_usize(
            &mut self.search.reader_capacity,
            "FORESIGHT_SEARCH_READER_CAPACITY",
        );
        override_usize(
            &mut self.search.max_line_size,
            "FORESIGHT_SEARCH_MAX_LINE_SIZE",
        );
        override_string(
            &mut self.search.slow_query_file,
            "FORESIGHT_SEARCH_SLOW_QUERY_FILE",
        );

        // Check
        override_string(&mut self.check.rule_file, "FORESIGHT_CHECK_RULE_FILE");
        override_csv(&mut self.check.categories, "FORESIGHT_CHECK_CATEGORIES");
        override_u32(
            &mut self.check.slow_log_days,
            "FORESIGHT_CHECK_SLOW_LOG_DAYS",
        );
        override_usize(
            &mut self.check.slow_log_concurrency,
            "FORESIGHT_CHECK_SLOW_LOG_CONCURRENCY",
        );
        override_string(&mut self.check.report_dir, "FORESIGHT_CHECK_REPORT_DIR");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ForesightError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.search.session_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.session_ttl_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.search.reader_capacity < MIN_READER_CAPACITY {
            return Err(ConfigError::InvalidValue {
                field: "search.reader_capacity".to_owned(),
                reason: format!("must be at least {MIN_READER_CAPACITY}"),
            }
            .into());
        }

        if self.search.max_line_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.max_line_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.search.slow_query_file.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "search.slow_query_file".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        // categories 검증
        for category in &self.check.categories {
            if CheckCategory::from_name(category).is_none() {
                return Err(ConfigError::InvalidValue {
                    field: "check.categories".to_owned(),
                    reason: format!(
                        "unknown category '{category}', must be one of: config, performance, default_config"
                    ),
                }
                .into());
            }
        }

        if self.check.slow_log_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "check.slow_log_concurrency".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 진단 데이터 디렉토리
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            data_dir: "/var/lib/foresight".to_owned(),
        }
    }
}

/// 로그 검색 섹션
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    /// 세션 유휴 만료 시간 (초)
    pub session_ttl_secs: u64,
    /// 파일 리더 버퍼 크기 (바이트, 최소 64 KiB)
    pub reader_capacity: usize,
    /// 재조립된 논리 라인의 최대 크기 (바이트)
    pub max_line_size: usize,
    /// 슬로우 쿼리 로그 파일 이름
    pub slow_query_file: String,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            session_ttl_secs: 60,
            reader_capacity: MIN_READER_CAPACITY,
            max_line_size: 1024 * 1024, // 1 MiB
            slow_query_file: "tidb_slow_query.log".to_owned(),
        }
    }
}

/// 설정 점검 섹션
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckSection {
    /// 규칙 파일 경로 (비어 있으면 내장 규칙 사용)
    pub rule_file: String,
    /// 활성화할 점검 카테고리 (config, performance, default_config)
    pub categories: Vec<String>,
    /// 평균 처리 시간 집계 기간 (일)
    pub slow_log_days: u32,
    /// 슬로우 쿼리 블록 병렬 처리 수
    pub slow_log_concurrency: usize,
    /// 리포트 출력 디렉토리
    pub report_dir: String,
}

impl Default for CheckSection {
    fn default() -> Self {
        Self {
            rule_file: String::new(),
            categories: vec!["config".to_owned()],
            slow_log_days: 7,
            slow_log_concurrency: 5,
            report_dir: ".".to_owned(),
        }
    }
}

impl CheckSection {
    /// 파싱된 카테고리 목록을 반환합니다. 알 수 없는 이름은 건너뜁니다.
    pub fn parsed_categories(&self) -> Vec<CheckCategory> {
        self.categories
            .iter()
            .filter_map(|c| CheckCategory::from_name(c))
            .collect()
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = ForesightConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.search.session_ttl_secs, 60);
        assert_eq!(config.search.reader_capacity, 65536);
        assert_eq!(config.search.slow_query_file, "tidb_slow_query.log");
        assert_eq!(config.check.categories, vec!["config"]);
        assert!(config.check.rule_file.is_empty());
    }

    #[test]
    fn default_config_passes_validation() {
        ForesightConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = ForesightConfig::parse("").unwrap();
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.check.slow_log_days, 7);
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[search]
session_ttl_secs = 120

[check]
categories = ["config", "performance"]
"#;
        let config = ForesightConfig::parse(toml).unwrap();
        assert_eq!(config.search.session_ttl_secs, 120);
        // reader_capacity는 기본값 유지
        assert_eq!(config.search.reader_capacity, MIN_READER_CAPACITY);
        assert_eq!(
            config.check.parsed_categories(),
            vec![CheckCategory::Config, CheckCategory::Performance]
        );
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = ForesightConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            ForesightError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = ForesightConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_zero_ttl() {
        let mut config = ForesightConfig::default();
        config.search.session_ttl_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("session_ttl_secs"));
    }

    #[test]
    fn validate_rejects_small_reader_capacity() {
        let mut config = ForesightConfig::default();
        config.search.reader_capacity = 4096;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("reader_capacity"));
    }

    #[test]
    fn validate_rejects_unknown_category() {
        let mut config = ForesightConfig::default();
        config.check.categories = vec!["security".to_owned()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("security"));
    }

    #[test]
    #[serial_test::serial]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: serial 테스트로 환경변수 조작이 다른 테스트와 겹치지 않습니다.
        unsafe { std::env::set_var("TEST_FORESIGHT_STR", "overridden") };
        override_string(&mut val, "TEST_FORESIGHT_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_FORESIGHT_STR") };
    }

    #[test]
    #[serial_test::serial]
    fn env_override_u64_invalid_keeps_original() {
        let mut val = 60u64;
        // SAFETY: serial 테스트로 환경변수 조작이 다른 테스트와 겹치지 않습니다.
        unsafe { std::env::set_var("TEST_FORESIGHT_U64_BAD", "sixty") };
        override_u64(&mut val, "TEST_FORESIGHT_U64_BAD");
        assert_eq!(val, 60); // 원래 값 유지
        unsafe { std::env::remove_var("TEST_FORESIGHT_U64_BAD") };
    }

    #[test]
    #[serial_test::serial]
    fn env_override_csv_drops_empty_entries() {
        let mut val = vec!["config".to_owned()];
        // SAFETY: serial 테스트로 환경변수 조작이 다른 테스트와 겹치지 않습니다.
        unsafe { std::env::set_var("TEST_FORESIGHT_CSV", "config, performance,") };
        override_csv(&mut val, "TEST_FORESIGHT_CSV");
        assert_eq!(val, vec!["config", "performance"]);
        unsafe { std::env::remove_var("TEST_FORESIGHT_CSV") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = 7u32;
        override_u32(&mut val, "TEST_FORESIGHT_NONEXISTENT_12345");
        assert_eq!(val, 7);
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = ForesightConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = ForesightConfig::parse(&toml_str).unwrap();
        assert_eq!(config.search.max_line_size, parsed.search.max_line_size);
        assert_eq!(config.check.report_dir, parsed.check.report_dir);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = ForesightConfig::from_file("/nonexistent/path/foresight.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ForesightError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
