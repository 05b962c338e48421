//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 로그 검색과 설정 점검이 공유하는 클러스터 컴포넌트, 로그 레벨,
//! 점검 카테고리를 정의합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 클러스터 컴포넌트
///
/// 디렉토리 이름(`<component>-<port>`)과 토폴로지 문서에서 사용되는
/// 소문자 이름으로 직렬화됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    /// SQL 레이어
    Tidb,
    /// 분산 KV 스토리지
    Tikv,
    /// 배치 드라이버 (Placement Driver)
    Pd,
    /// 컬럼 스토리지
    Tiflash,
}

impl Component {
    /// 디렉토리/토폴로지 이름에서 컴포넌트를 파싱합니다.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "tidb" => Some(Self::Tidb),
            "tikv" => Some(Self::Tikv),
            "pd" => Some(Self::Pd),
            "tiflash" => Some(Self::Tiflash),
            _ => None,
        }
    }

    /// 소문자 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tidb => "tidb",
            Self::Tikv => "tikv",
            Self::Pd => "pd",
            Self::Tiflash => "tiflash",
        }
    }

    /// 로그 검색 대상 컴포넌트인지 여부
    pub fn is_searchable(&self) -> bool {
        matches!(self, Self::Tidb | Self::Tikv | Self::Pd)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 로그 레벨
///
/// 컴포넌트마다 표기가 달라 별칭을 함께 인식합니다
/// (`ERRO`, `WARNING`, `CRITICAL`, `TRACE`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// 디버그
    Debug,
    /// 정보 (기본값)
    #[default]
    Info,
    /// 경고
    Warn,
    /// 에러
    Error,
    /// 치명적
    Fatal,
}

impl LogLevel {
    /// 문자열에서 로그 레벨을 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다. 알 수 없는 레벨은 `None`입니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "FATAL" | "CRITICAL" => Some(Self::Fatal),
            "ERROR" | "ERRO" => Some(Self::Error),
            "WARN" | "WARNING" => Some(Self::Warn),
            "INFO" => Some(Self::Info),
            "DEBUG" | "TRACE" => Some(Self::Debug),
            _ => None,
        }
    }

    /// 대문자 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 점검 카테고리
///
/// 한 번의 점검 실행에 참여할 규칙 종류를 선택합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    /// 실시간 설정 점검
    Config,
    /// SQL 성능 점검
    Performance,
    /// 기본값 대비 설정 점검
    DefaultConfig,
}

impl CheckCategory {
    /// 모든 카테고리
    pub const ALL: [CheckCategory; 3] = [Self::Config, Self::Performance, Self::DefaultConfig];

    /// 규칙의 `check_type` 문자열에서 카테고리를 파싱합니다.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "config" => Some(Self::Config),
            "performance" => Some(Self::Performance),
            "default_config" => Some(Self::DefaultConfig),
            _ => None,
        }
    }

    /// `check_type` 문자열을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Performance => "performance",
            Self::DefaultConfig => "default_config",
        }
    }
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_round_trips_through_name() {
        for c in [
            Component::Tidb,
            Component::Tikv,
            Component::Pd,
            Component::Tiflash,
        ] {
            assert_eq!(Component::from_name(c.as_str()), Some(c));
        }
        assert_eq!(Component::from_name("pump"), None);
    }

    #[test]
    fn tiflash_is_not_searchable() {
        assert!(Component::Tidb.is_searchable());
        assert!(!Component::Tiflash.is_searchable());
    }

    #[test]
    fn log_level_aliases() {
        assert_eq!(LogLevel::from_str_loose("erro"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_str_loose("Warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str_loose("CRITICAL"), Some(LogLevel::Fatal));
        assert_eq!(LogLevel::from_str_loose("trace"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str_loose("info"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_str_loose("verbose"), None);
    }

    #[test]
    fn log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Error < LogLevel::Fatal);
    }

    #[test]
    fn check_category_names() {
        assert_eq!(
            CheckCategory::from_name("default_config"),
            Some(CheckCategory::DefaultConfig)
        );
        assert_eq!(CheckCategory::Performance.to_string(), "performance");
        assert_eq!(CheckCategory::from_name("perf"), None);
    }
}
