//! 로그 헤더 형식 -- 라인 앞부분에서 `(타임스탬프, 레벨)`을 추출
//!
//! [`FormatRouter`]는 등록된 헤더 형식을 순서대로 시도하여 첫 번째로
//! 성공한 형식을 선택합니다. 파일 이터레이터는 선택된 형식의 인덱스를
//! 캐시하고, 이후 라인에서 실패하면 다시 감지합니다.
//!
//! # 지원 형식 (감지 순서)
//! 1. PD 구형 ([`PdLegacyFormat`]): `2019/07/19 15:15:35.846 server.go:12: [info] ...`
//! 2. 구형 공백 구분 ([`FormerFormat`]): `2019/07/19 15:15:35.846 INFO ...`
//! 3. 통합 대괄호 ([`UnifiedFormat`]): `[2019/07/19 15:15:35.846 +08:00] [INFO] ...`
//! 4. 통합 JSON ([`UnifiedJsonFormat`]): `{"time":"...","level":"INFO",...}`

pub mod former;
pub mod json;
pub mod pd;
pub mod unified;

pub use former::FormerFormat;
pub use json::UnifiedJsonFormat;
pub use pd::PdLegacyFormat;
pub use unified::UnifiedFormat;

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use foresight_core::types::LogLevel;

use crate::error::LogSearchError;

/// 통합 형식 타임스탬프 레이아웃 (`2006/01/02 15:04:05.000 -07:00`)
pub const UNIFIED_TIME_LAYOUT: &str = "%Y/%m/%d %H:%M:%S%.f %:z";

/// 구형 타임스탬프 레이아웃 (`2006/01/02 15:04:05.000`)
pub const FORMER_TIME_LAYOUT: &str = "%Y/%m/%d %H:%M:%S%.f";

/// TiFlash 타임스탬프 레이아웃 (`2006.01.02 15:04:05.000000`)
pub const TIFLASH_TIME_LAYOUT: &str = "%Y.%m.%d %H:%M:%S%.f";

/// 슬로우 쿼리 구형 타임스탬프 레이아웃 (`2006-01-02-15:04:05.999999999 -0700`)
pub const SLOW_QUERY_LEGACY_LAYOUT: &str = "%Y-%m-%d-%H:%M:%S%.f %z";

/// 구형 형식의 암묵적 타임존 오프셋 (Asia/Chongqing, +08:00)
pub const FORMER_OFFSET_SECS: i32 = 8 * 3600;

/// 헤더 파싱 결과
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedHeader {
    /// 타임스탬프
    pub time: DateTime<FixedOffset>,
    /// 로그 레벨
    pub level: LogLevel,
    /// 구조화 필드 (JSON 형식만)
    pub entries: Option<BTreeMap<String, serde_json::Value>>,
}

/// 헤더 형식 trait
///
/// 구현체는 상태가 없어야 하며, 여러 이터레이터가 공유합니다.
pub trait HeaderFormat: Send + Sync {
    /// 형식 이름 (메트릭 레이블, 로그에 사용)
    fn name(&self) -> &'static str;

    /// 라인 헤더를 파싱합니다.
    fn parse(&self, line: &[u8]) -> Result<ParsedHeader, LogSearchError>;
}

/// 형식 라우터 -- 헤더 형식을 자동 감지합니다.
pub struct FormatRouter {
    /// 등록된 형식 목록 (순서대로 시도)
    formats: Vec<Box<dyn HeaderFormat>>,
}

impl FormatRouter {
    /// 빈 라우터를 생성합니다.
    pub fn new() -> Self {
        Self {
            formats: Vec::new(),
        }
    }

    /// 기본 형식 세트로 라우터를 생성합니다.
    ///
    /// 순서: PD 구형, 구형 공백 구분, 통합 대괄호, 통합 JSON
    pub fn with_defaults() -> Result<Self, LogSearchError> {
        Ok(Self::new()
            .register(Box::new(PdLegacyFormat::new()?))
            .register(Box::new(FormerFormat::new()?))
            .register(Box::new(UnifiedFormat::new()?))
            .register(Box::new(UnifiedJsonFormat::new())))
    }

    /// 형식을 등록합니다. 등록 순서대로 시도됩니다.
    pub fn register(mut self, format: Box<dyn HeaderFormat>) -> Self {
        self.formats.push(format);
        self
    }

    /// 라인에 맞는 첫 번째 형식을 찾아 인덱스와 파싱 결과를 반환합니다.
    pub fn detect(&self, line: &[u8]) -> Option<(usize, ParsedHeader)> {
        self.formats
            .iter()
            .enumerate()
            .find_map(|(idx, format)| format.parse(line).ok().map(|header| (idx, header)))
    }

    /// 인덱스로 지정한 형식으로 파싱합니다.
    pub fn parse_with(&self, idx: usize, line: &[u8]) -> Result<ParsedHeader, LogSearchError> {
        match self.formats.get(idx) {
            Some(format) => format.parse(line),
            None => Err(LogSearchError::Header {
                format: format!("#{idx}"),
                reason: "no such format".to_owned(),
            }),
        }
    }

    /// 인덱스의 형식 이름을 반환합니다.
    pub fn format_name(&self, idx: usize) -> Option<&'static str> {
        self.formats.get(idx).map(|f| f.name())
    }

    /// 등록된 형식 이름 목록을 반환합니다.
    pub fn registered_formats(&self) -> Vec<&'static str> {
        self.formats.iter().map(|f| f.name()).collect()
    }
}

impl Default for FormatRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// 구형 형식의 기본 오프셋 (+08:00)
pub fn former_offset() -> Result<FixedOffset, LogSearchError> {
    FixedOffset::east_opt(FORMER_OFFSET_SECS).ok_or_else(|| LogSearchError::Header {
        format: "former".to_owned(),
        reason: format!("invalid offset {FORMER_OFFSET_SECS}s"),
    })
}

/// 통합 형식 타임스탬프를 파싱합니다.
pub fn parse_unified_time(s: &str) -> Result<DateTime<FixedOffset>, LogSearchError> {
    DateTime::parse_from_str(s.trim(), UNIFIED_TIME_LAYOUT).map_err(|e| LogSearchError::Header {
        format: "unified".to_owned(),
        reason: format!("invalid timestamp '{s}': {e}"),
    })
}

/// 구형/TiFlash 타임스탬프를 주어진 오프셋으로 파싱합니다.
pub fn parse_former_time(
    s: &str,
    offset: FixedOffset,
) -> Result<DateTime<FixedOffset>, LogSearchError> {
    let layout = if s.as_bytes().get(4) == Some(&b'.') {
        TIFLASH_TIME_LAYOUT
    } else {
        FORMER_TIME_LAYOUT
    };
    let naive =
        NaiveDateTime::parse_from_str(s.trim(), layout).map_err(|e| LogSearchError::Header {
            format: "former".to_owned(),
            reason: format!("invalid timestamp '{s}': {e}"),
        })?;
    naive
        .and_local_timezone(offset)
        .single()
        .ok_or_else(|| LogSearchError::Header {
            format: "former".to_owned(),
            reason: format!("ambiguous timestamp '{s}'"),
        })
}

/// 슬로우 쿼리 `# Time:` 값을 파싱합니다.
///
/// RFC3339(나노초 포함)를 먼저 시도하고, 실패하면 구형 레이아웃을 시도합니다.
pub fn parse_slow_query_time(s: &str) -> Result<DateTime<FixedOffset>, LogSearchError> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, SLOW_QUERY_LEGACY_LAYOUT))
        .map_err(|e| LogSearchError::SlowQueryTime(format!("'{s}': {e}")))
}

/// 레벨 문자열을 파싱합니다. 알 수 없는 레벨은 에러입니다.
pub(crate) fn parse_level(format: &str, raw: &[u8]) -> Result<LogLevel, LogSearchError> {
    let s = std::str::from_utf8(raw).map_err(|e| LogSearchError::Header {
        format: format.to_owned(),
        reason: format!("level is not utf-8: {e}"),
    })?;
    LogLevel::from_str_loose(s).ok_or_else(|| LogSearchError::Header {
        format: format.to_owned(),
        reason: format!("unknown level '{s}'"),
    })
}

/// 캡처 그룹을 UTF-8 문자열로 변환합니다.
pub(crate) fn capture_str<'a>(format: &str, raw: &'a [u8]) -> Result<&'a str, LogSearchError> {
    std::str::from_utf8(raw).map_err(|e| LogSearchError::Header {
        format: format.to_owned(),
        reason: format!("timestamp is not utf-8: {e}"),
    })
}
