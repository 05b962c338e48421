//! 통합 대괄호 헤더 형식
//!
//! `[2019/07/19 15:15:35.846 +08:00] [INFO] [printer.go:34] ...`
//! TiDB 2.1.8 이후와 최근 PD/TiKV가 사용합니다.

use regex::bytes::Regex;

use super::{HeaderFormat, ParsedHeader, capture_str, parse_level, parse_unified_time};
use crate::error::LogSearchError;

const NAME: &str = "unified";

/// 통합 대괄호 형식
pub struct UnifiedFormat {
    re: Regex,
}

impl UnifiedFormat {
    /// 새 형식을 생성합니다.
    pub fn new() -> Result<Self, LogSearchError> {
        Ok(Self {
            re: Regex::new(r"^\[([^\[\]]*)\]\s\[([^\[\]]*)\]")?,
        })
    }
}

impl HeaderFormat for UnifiedFormat {
    fn name(&self) -> &'static str {
        NAME
    }

    fn parse(&self, line: &[u8]) -> Result<ParsedHeader, LogSearchError> {
        let caps = self.re.captures(line).ok_or_else(|| LogSearchError::Header {
            format: NAME.to_owned(),
            reason: "header does not match".to_owned(),
        })?;
        let time = parse_unified_time(capture_str(NAME, &caps[1])?)?;
        let level = parse_level(NAME, &caps[2])?;
        Ok(ParsedHeader {
            time,
            level,
            entries: None,
        })
    }
}
