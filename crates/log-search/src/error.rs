//! 로그 검색 에러 타입
//!
//! [`LogSearchError`]는 로그 검색 코어 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogSearchError> for ForesightError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use foresight_core::error::{ConfigError, ForesightError, SearchError};

/// 로그 검색 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogSearchError {
    /// 디렉토리 스캔 실패
    #[error("resolve error: {path}: {reason}")]
    Resolve {
        /// 스캔 대상 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// `<component>-<port>` 형식이 아닌 폴더 이름
    #[error("unexpected folder name: {folder}")]
    FolderName {
        /// 폴더 이름
        folder: String,
    },

    /// 로그 파일 열기 실패
    #[error("open error: {path}: {source}")]
    Open {
        /// 파일 경로
        path: String,
        /// 원인
        #[source]
        source: std::io::Error,
    },

    /// 헤더 파싱 실패
    #[error("header parse error: {format}: {reason}")]
    Header {
        /// 헤더 형식 이름
        format: String,
        /// 실패 사유
        reason: String,
    },

    /// 슬로우 쿼리 `# Time:` 파싱 실패
    #[error("slow query time parse error: {0}")]
    SlowQueryTime(String),

    /// 닫힌 세션/이터레이터 접근
    #[error("{0}")]
    Closed(String),

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

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<LogSearchError> for ForesightError {
    fn from(err: LogSearchError) -> Self {
        match err {
            LogSearchError::Config { field, reason } => {
                ForesightError::Config(ConfigError::InvalidValue { field, reason })
            }
            LogSearchError::Resolve { .. } | LogSearchError::FolderName { .. } => {
                ForesightError::Search(SearchError::Resolve(err.to_string()))
            }
            LogSearchError::Closed(msg) => ForesightError::Search(SearchError::Closed(msg)),
            other => ForesightError::Search(SearchError::Read(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_name_error_display() {
        let err = LogSearchError::FolderName {
            folder: "tidb4000".to_owned(),
        };
        assert_eq!(err.to_string(), "unexpected folder name: tidb4000");
    }

    #[test]
    fn closed_converts_to_search_closed() {
        let err: ForesightError = LogSearchError::Closed("log file closed".to_owned()).into();
        assert!(matches!(
            err,
            ForesightError::Search(SearchError::Closed(_))
        ));
    }

    #[test]
    fn resolve_converts_to_search_resolve() {
        let err: ForesightError = LogSearchError::Resolve {
            path: "/data".to_owned(),
            reason: "not a directory".to_owned(),
        }
        .into();
        assert!(matches!(
            err,
            ForesightError::Search(SearchError::Resolve(_))
        ));
        assert!(err.to_string().contains("/data"));
    }

    #[test]
    fn io_converts_to_search_read() {
        let err: ForesightError =
            LogSearchError::Io(std::io::Error::other("disk gone")).into();
        assert!(matches!(err, ForesightError::Search(SearchError::Read(_))));
    }
}
