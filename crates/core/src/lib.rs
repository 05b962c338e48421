//! Foresight 공통 크레이트
//!
//! 로그 검색 코어와 설정 점검 엔진이 공유하는 에러 타입, TOML 설정,
//! 도메인 타입, 메트릭 이름을 제공합니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{CheckError, ConfigError, ForesightError, ParseError, SearchError};

// 설정
pub use config::{CheckSection, ForesightConfig, GeneralConfig, SearchSection};

// 도메인 타입
pub use types::{CheckCategory, Component, LogLevel};
