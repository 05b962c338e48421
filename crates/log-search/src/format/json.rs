//! 통합 JSON 헤더 형식
//!
//! `{"level":"INFO","time":"2022/01/14 08:09:55.307 +01:00","caller":"printer.go:34",...}`
//!
//! `time`/`level` 이외의 키는 [`ParsedHeader::entries`]로 전달됩니다.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{HeaderFormat, ParsedHeader, parse_level, parse_unified_time};
use crate::error::LogSearchError;

const NAME: &str = "unified_json";

/// 통합 JSON 형식
#[derive(Debug, Default)]
pub struct UnifiedJsonFormat;

impl UnifiedJsonFormat {
    /// 새 형식을 생성합니다.
    pub fn new() -> Self {
        Self
    }

    fn fail(reason: impl Into<String>) -> LogSearchError {
        LogSearchError::Header {
            format: NAME.to_owned(),
            reason: reason.into(),
        }
    }
}

impl HeaderFormat for UnifiedJsonFormat {
    fn name(&self) -> &'static str {
        NAME
    }

    fn parse(&self, line: &[u8]) -> Result<ParsedHeader, LogSearchError> {
        // JSON 디코딩 전에 값싼 선행 검사
        if line.first() != Some(&b'{') {
            return Err(Self::fail("not a json object"));
        }
        let mut map: BTreeMap<String, Value> =
            serde_json::from_slice(line).map_err(|e| Self::fail(e.to_string()))?;

        let time = match map.remove("time") {
            Some(Value::String(s)) => parse_unified_time(&s)?,
            _ => return Err(Self::fail("missing string field 'time'")),
        };
        let level = match map.remove("level") {
            Some(Value::String(s)) => parse_level(NAME, s.as_bytes())?,
            _ => return Err(Self::fail("missing string field 'level'")),
        };

        Ok(ParsedHeader {
            time,
            level,
            entries: Some(map),
        })
    }
}
