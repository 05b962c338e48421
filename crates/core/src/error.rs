//! 에러 타입 -- 도메인별 에러 정의

/// Foresight 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ForesightError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 로그 검색 에러
    #[error("search error: {0}")]
    Search(#[from] SearchError),

    /// 점검 엔진 에러
    #[error("check error: {0}")]
    Check(#[from] CheckError),

    /// 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 로그 검색 에러
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// 디렉토리 해석 실패
    #[error("resolve failed: {0}")]
    Resolve(String),

    /// 로그 파일 읽기 실패
    #[error("read failed: {0}")]
    Read(String),

    /// 세션이 이미 닫힘
    #[error("session closed: {0}")]
    Closed(String),
}

/// 점검 엔진 에러
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// 규칙 로딩 실패
    #[error("rule load failed: {0}")]
    RuleLoad(String),

    /// 소스 데이터 로딩 실패
    #[error("source data failed: {0}")]
    SourceData(String),

    /// 규칙 실행 실패
    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

/// 파싱 에러
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 지원하지 않는 형식
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// 파싱 실패
    #[error("parse failed at offset {offset}: {reason}")]
    Failed { offset: usize, reason: String },

    /// 입력 데이터 초과
    #[error("input too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_top_level() {
        let err: ForesightError = ConfigError::InvalidValue {
            field: "search.session_ttl_secs".to_owned(),
            reason: "must be greater than 0".to_owned(),
        }
        .into();
        assert!(matches!(err, ForesightError::Config(_)));
        assert!(err.to_string().contains("session_ttl_secs"));
    }

    #[test]
    fn search_error_display() {
        let err = SearchError::Closed("log file closed".to_owned());
        assert_eq!(err.to_string(), "session closed: log file closed");
    }

    #[test]
    fn parse_error_too_large_display() {
        let err = ParseError::TooLarge {
            size: 2048,
            max: 1024,
        };
        let msg = err.to_string();
        assert!(msg.contains("2048"));
        assert!(msg.contains("1024"));
    }
}
