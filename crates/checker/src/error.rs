//! 설정 점검 엔진 에러 타입
//!
//! [`CheckerError`]는 규칙 로딩, 소스 데이터 로딩, 표현식 컴파일/실행,
//! 리포트 렌더링 중 발생하는 에러를 표현합니다.
//! `From<CheckerError> for ForesightError` 변환이 구현되어 있습니다.

use foresight_core::error::{CheckError, ConfigError, ForesightError};

/// 설정 점검 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum CheckerError {
    /// 규칙 코퍼스 로딩 실패
    #[error("rule load error: {source_name}: {reason}")]
    RuleLoad {
        /// 규칙 출처 (파일 경로 또는 `<bundled>`)
        source_name: String,
        /// 실패 사유
        reason: String,
    },

    /// 규칙 유효성 검증 실패
    #[error("rule validation error: rule '{rule}': {reason}")]
    RuleValidation {
        /// 규칙 이름
        rule: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 버전 제약 파싱 실패
    #[error("invalid version constraint '{constraint}': {reason}")]
    Version {
        /// 제약 문자열 또는 대상 버전
        constraint: String,
        /// 실패 사유
        reason: String,
    },

    /// 소스 데이터 로딩 실패
    #[error("source data error: {path}: {reason}")]
    SourceData {
        /// 데이터 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 이름 구조에 대응하는 데이터가 없음
    #[error("no such name-struct: {0}")]
    NameStruct(String),

    /// 규칙 표현식 컴파일 실패
    #[error("compile error at line {line}: {reason}")]
    Compile {
        /// 소스 라인 (1부터)
        line: usize,
        /// 실패 사유
        reason: String,
    },

    /// 규칙 표현식 실행 실패
    #[error("runtime error in rule '{rule}': {reason}")]
    Runtime {
        /// 규칙 이름
        rule: String,
        /// 실패 사유
        reason: String,
    },

    /// 결과 집계 실패
    #[error("aggregate error: rule '{rule}': {reason}")]
    Aggregate {
        /// 규칙 이름
        rule: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 백그라운드 작업 실패
    #[error("task error: {0}")]
    Task(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CheckerError> for ForesightError {
    fn from(err: CheckerError) -> Self {
        match err {
            CheckerError::Config { field, reason } => {
                ForesightError::Config(ConfigError::InvalidValue { field, reason })
            }
            CheckerError::RuleLoad { .. }
            | CheckerError::RuleValidation { .. }
            | CheckerError::Version { .. } => {
                ForesightError::Check(CheckError::RuleLoad(err.to_string()))
            }
            CheckerError::SourceData { .. } | CheckerError::NameStruct(_) => {
                ForesightError::Check(CheckError::SourceData(err.to_string()))
            }
            other => ForesightError::Check(CheckError::Evaluation(other.to_string())),
        }
    }
}
