//! 구형 공백 구분 헤더 형식
//!
//! `2019/07/19 15:15:35.846 INFO mod.rs:51: ...` 형식이며 타임존이 없습니다.
//! TiFlash 레이아웃(`2019.07.19 15:15:35.846123`)도 함께 인식합니다.

use chrono::FixedOffset;
use regex::bytes::Regex;

use super::{
    HeaderFormat, ParsedHeader, capture_str, former_offset, parse_former_time, parse_level,
};
use crate::error::LogSearchError;

const NAME: &str = "former";

/// 구형 공백 구분 형식
pub struct FormerFormat {
    re: Regex,
    offset: FixedOffset,
}

impl FormerFormat {
    /// 기본 오프셋(+08:00)으로 새 형식을 생성합니다.
    pub fn new() -> Result<Self, LogSearchError> {
        Self::with_offset(former_offset()?)
    }

    /// 타임존 없는 타임스탬프에 적용할 오프셋을 지정합니다.
    pub fn with_offset(offset: FixedOffset) -> Result<Self, LogSearchError> {
        Ok(Self {
            re: Regex::new(
                r"^([0-9]{4}[/.][0-9]{2}[/.][0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2}\.[0-9]{3,9})\s([^\s]*)",
            )?,
            offset,
        })
    }
}

impl HeaderFormat for FormerFormat {
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
