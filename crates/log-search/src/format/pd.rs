//! PD 구형 헤더 형식
//!
//! `2019/07/19 15:15:35.846 server.go:123: [info] ...`

use chrono::FixedOffset;
use regex::bytes::Regex;

use super::{
    HeaderFormat, ParsedHeader, capture_str, former_offset, parse_former_time, parse_level,
};
use crate::error::LogSearchError;

const NAME: &str = "pd_legacy";

/// PD 구형 형식
pub struct PdLegacyFormat {
    re: Regex,
    offset: FixedOffset,
}

impl PdLegacyFormat {
    /// 새 형식을 생성합니다.
    pub fn new() -> Result<Self, LogSearchError> {
        Ok(Self {
            re: Regex::new(
                r"^([0-9]{4}/[0-9]{2}/[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2}\.[0-9]{3})\s[^\s]*\s\[([^\[\]]*)\]",
            )?,
            offset: former_offset()?,
        })
    }
}

impl HeaderFormat for PdLegacyFormat {
    fn name(&self) -> &'static str {
        NAME
    }

    fn parse(&self, line: &[u8]) -> Result<ParsedHeader, LogSearchError> {
        let caps = self.re.captures(line).ok_or_else(|| LogSearchError::Header {
            format: NAME.to_owned(),
            reason: "header does not match".to_owned(),
        })?;
        let time = parse_former_time(capture_str(NAME, &caps[1])?, self.offset)?;
        let level = parse_level(NAME, &caps[2])?;
        Ok(ParsedHeader {
            time,
            level,
            entries: None,
        })
    }
}
