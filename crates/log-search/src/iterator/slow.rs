//! 슬로우 쿼리 로그 이터레이터
//!
//! 슬로우 쿼리 레코드는 `#`로 시작하는 주석 라인 여러 개와 그 뒤의
//! SQL 라인 하나로 이루어진 블록입니다.
//!
//! ```text
//! # Time: 2019-07-19T15:15:35.846+08:00
//! # Query_time: 1.23
//! SELECT 1;
//! ```
//!
//! 블록의 시각은 `# Time:` 라인에서 가져오며, `content`에는 블록 전체가
//! `\n`으로 이어져 들어가고 `line`에는 마지막 SQL 라인이 들어갑니다.

use std::fs::File;
use std::io::BufReader;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use foresight_core::metrics as m;
use tracing::{debug, warn};

use super::{ItemOrigin, LogIterator, RangePosition, TimeRange, read_logical_line};
use crate::error::LogSearchError;
use crate::format::parse_slow_query_time;
use crate::item::LogItem;

/// `# Time:` 라인 접두어
pub const TIME_PREFIX: &[u8] = b"# Time:";

/// 슬로우 쿼리 블록 이터레이터
pub struct SlowQueryIterator<R = BufReader<File>> {
    origin: ItemOrigin,
    reader: Option<R>,
    range: TimeRange,
    max_content_size: usize,
    buf: Vec<u8>,
}

/// 블록 누적 상태
enum Block {
    /// 아직 `# Time:`을 보지 못함
    Untimed(LogItem),
    /// 범위 안의 시각을 가진 블록
    Timed(LogItem),
    /// `begin` 이전 블록 -- SQL 라인까지 버림
    Discarding,
}

impl<R: std::io::BufRead + Send> SlowQueryIterator<R> {
    /// 새 이터레이터를 생성합니다.
    pub fn new(origin: ItemOrigin, reader: R, range: TimeRange, max_content_size: usize) -> Self {
        Self {
            origin,
            reader: Some(reader),
            range,
            max_content_size,
            buf: Vec::new(),
        }
    }

    fn empty_item(&self) -> LogItem {
        LogItem {
            file: self.origin.file.clone(),
            time: None,
            level: None,
            host: self.origin.host.clone(),
            port: self.origin.port,
            component: self.origin.component,
            line: Bytes::new(),
            item_type: self.origin.item_type,
            entries: None,
            content: None,
        }
    }
}

/// `# Time:` 라인에서 시각을 추출합니다. Time 라인이 아니면 `Ok(None)`입니다.
pub fn parse_time_line(line: &[u8]) -> Result<Option<DateTime<FixedOffset>>, LogSearchError> {
    let Some(rest) = line.strip_prefix(TIME_PREFIX) else {
        return Ok(None);
    };
    let value = std::str::from_utf8(rest)
        .map_err(|e| LogSearchError::SlowQueryTime(format!("time is not utf-8: {e}")))?;
    parse_slow_query_time(value).map(Some)
}

impl<R: std::io::BufRead + Send> LogIterator for SlowQueryIterator<R> {
    fn next(&mut self) -> Result<Option<LogItem>, LogSearchError> {
        let mut block = Block::Untimed(self.empty_item());
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Err(LogSearchError::Closed("log file closed".to_owned()));
            };
            if !read_logical_line(reader, &mut self.buf, self.max_content_size)? {
                return Ok(None);
            }
            metrics::counter!(m::SEARCH_LINES_SCANNED_TOTAL).increment(1);

            if self.buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            if self.buf.starts_with(b"#") {
                if let Some(t) = parse_time_line(&self.buf)? {
                    match self.range.position(&t) {
                        RangePosition::Before => {
                            block = Block::Discarding;
                            continue;
                        }
                        RangePosition::After => return Ok(None),
                        RangePosition::Within => {
                            // 새 Time 라인은 새 블록을 시작합니다
                            let mut item = self.empty_item();
                            item.time = Some(t);
                            block = Block::Timed(item);
                        }
                    }
                }
                match &mut block {
                    Block::Untimed(item) | Block::Timed(item) => {
                        if !item.append_content(&self.buf, self.max_content_size) {
                            warn!(file = %self.origin.file, "slow query block truncated");
                        }
                    }
                    Block::Discarding => {}
                }
                continue;
            }

            // SQL 라인 -- 블록 종료
            match std::mem::replace(&mut block, Block::Untimed(self.empty_item())) {
                Block::Timed(mut item) => {
                    item.append_content(&self.buf, self.max_content_size);
                    item.line = Bytes::copy_from_slice(&self.buf);
                    metrics::counter!(
                        m::SEARCH_ITEMS_EMITTED_TOTAL,
                        m::LABEL_COMPONENT => self.origin.component.as_str()
                    )
                    .increment(1);
                    return Ok(Some(item));
                }
                Block::Untimed(_) => {
                    metrics::counter!(m::SEARCH_LINES_SKIPPED_TOTAL).increment(1);
                    debug!(file = %self.origin.file, "dropping slow query block without time");
                }
                Block::Discarding => {}
            }
        }
    }

    fn close(&mut self) {
        self.reader = None;
    }
}
