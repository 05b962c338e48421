//! 일반 로그 파일 이터레이터

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use bytes::Bytes;
use foresight_core::metrics as m;
use tracing::{debug, warn};

use super::{ItemOrigin, LogIterator, RangePosition, TimeRange, read_logical_line};
use crate::error::LogSearchError;
use crate::format::{FormatRouter, ParsedHeader};
use crate::item::LogItem;

/// 일반 로그 파일 이터레이터
///
/// 첫 번째로 파싱 가능한 라인에서 헤더 형식을 감지하여 캐시합니다.
/// 캐시된 형식이 이후 라인에서 실패하면 캐시를 비우고 한 번 다시 감지하며,
/// 그래도 실패하면 라인을 건너뜁니다.
pub struct FileIterator<R = BufReader<File>> {
    origin: ItemOrigin,
    reader: Option<R>,
    router: Arc<FormatRouter>,
    cached: Option<usize>,
    range: TimeRange,
    max_line_size: usize,
    buf: Vec<u8>,
}

impl<R: std::io::BufRead + Send> FileIterator<R> {
    /// 새 이터레이터를 생성합니다.
    pub fn new(
        origin: ItemOrigin,
        reader: R,
        router: Arc<FormatRouter>,
        range: TimeRange,
        max_line_size: usize,
    ) -> Self {
        Self {
            origin,
            reader: Some(reader),
            router,
            cached: None,
            range,
            max_line_size,
            buf: Vec::new(),
        }
    }

    /// 현재 캐시된 헤더 형식 이름
    pub fn detected_format(&self) -> Option<&'static str> {
        self.cached.and_then(|idx| self.router.format_name(idx))
    }

    fn parse_header(&mut self) -> Option<ParsedHeader> {
        if let Some(idx) = self.cached {
            match self.router.parse_with(idx, &self.buf) {
                Ok(header) => return Some(header),
                Err(e) => {
                    debug!(file = %self.origin.file, error = %e, "cached format failed, re-detecting");
                    self.cached = None;
                }
            }
        }
        let (idx, header) = self.router.detect(&self.buf)?;
        if let Some(format) = self.router.format_name(idx) {
            metrics::counter!(m::SEARCH_FORMAT_DETECTED_TOTAL, m::LABEL_FORMAT => format).increment(1);
        }
        self.cached = Some(idx);
        Some(header)
    }
}

impl<R: std::io::BufRead + Send> LogIterator for FileIterator<R> {
    fn next(&mut self) -> Result<Option<LogItem>, LogSearchError> {
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Err(LogSearchError::Closed("log file closed".to_owned()));
            };
            if !read_logical_line(reader, &mut self.buf, self.max_line_size)? {
                return Ok(None);
            }
            metrics::counter!(m::SEARCH_LINES_SCANNED_TOTAL).increment(1);

            if self.buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let Some(header) = self.parse_header() else {
                metrics::counter!(m::SEARCH_LINES_SKIPPED_TOTAL).increment(1);
                warn!(
                    file = %self.origin.file,
                    line = %String::from_utf8_lossy(&self.buf),
                    "skip parse illegal log line"
                );
                continue;
            };

            match self.range.position(&header.time) {
                RangePosition::Before => continue,
                RangePosition::After => return Ok(None),
                RangePosition::Within => {}
            }

            metrics::counter!(
                m::SEARCH_ITEMS_EMITTED_TOTAL,
                m::LABEL_COMPONENT => self.origin.component.as_str()
            )
            .increment(1);
            return Ok(Some(LogItem {
                file: self.origin.file.clone(),
                time: Some(header.time),
                level: Some(header.level),
                host: self.origin.host.clone(),
                port: self.origin.port,
                component: self.origin.component,
                line: Bytes::copy_from_slice(&self.buf),
                item_type: self.origin.item_type,
                entries: header.entries,
                content: None,
            }));
        }
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemType;
    use chrono::{DateTime, FixedOffset, TimeZone};
    use foresight_core::types::{Component, LogLevel};

    fn origin() -> ItemOrigin {
        ItemOrigin {
            file: "tidb.log".to_owned(),
            host: "10.0.0.1".to_owned(),
            port: 4000,
            component: Component::Tidb,
            item_type: ItemType::Tidb,
        }
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2019, 7, 19, h, m, s)
            .unwrap()
    }

    fn iter(data: &'static str, range: TimeRange) -> FileIterator<&'static [u8]> {
        FileIterator::new(
            origin(),
            data.as_bytes(),
            Arc::new(FormatRouter::with_defaults().unwrap()),
            range,
            1024 * 1024,
        )
    }

    fn drain(mut it: impl LogIterator) -> Vec<LogItem> {
        let mut out = Vec::new();
        while let Some(item) = it.next().unwrap() {
            out.push(item);
        }
        out
    }

    const THREE_LINES: &str = "\
[2019/07/19 15:15:35.846 +08:00] [INFO] [printer.go:1] first
[2019/07/19 15:16:35.814 +08:00] [WARN] [printer.go:2] second
[2019/07/19 15:17:00.000 +08:00] [ERROR] [printer.go:3] third
";

    #[test]
    fn emits_only_lines_within_range_and_stops_at_end() {
        let items = drain(iter(
            THREE_LINES,
            TimeRange::new(at(15, 15, 0), at(15, 16, 30)),
        ));
        assert_eq!(items.len(), 1);
        assert!(items[0].line.ends_with(b"first"));
        assert_eq!(items[0].level, Some(LogLevel::Info));
        assert_eq!(items[0].host, "10.0.0.1");
        assert_eq!(items[0].port, 4000);
    }

    #[test]
    fn skips_lines_before_begin() {
        let items = drain(iter(
            THREE_LINES,
            TimeRange::new(at(15, 16, 0), at(15, 18, 0)),
        ));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].level, Some(LogLevel::Warn));
    }

    #[test]
    fn zero_length_range_emits_nothing() {
        let items = drain(iter(
            THREE_LINES,
            TimeRange::new(at(15, 15, 35), at(15, 15, 35)),
        ));
        assert!(items.is_empty());
    }

    #[test]
    fn skips_empty_and_illegal_lines() {
        let data = "\n\
goroutine 1 [running]:\n\
[2019/07/19 15:15:35.846 +08:00] [INFO] ok\n\
   \n";
        let items = drain(iter(data, TimeRange::unbounded()));
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn redetects_when_format_changes() {
        let data = "\
2019/07/19 15:15:35.846 INFO mod.rs:1: former\n\
[2019/07/19 15:15:36.000 +08:00] [INFO] unified\n";
        let mut it = iter(data, TimeRange::unbounded());
        let first = it.next().unwrap().unwrap();
        assert_eq!(it.detected_format(), Some("former"));
        let second = it.next().unwrap().unwrap();
        assert_eq!(it.detected_format(), Some("unified"));
        assert!(first.time < second.time);
        assert!(it.next().unwrap().is_none());
    }

    #[test]
    fn json_lines_carry_entries() {
        let data = r#"{"level":"INFO","time":"2019/07/19 15:15:35.846 +08:00","message":"hi"}
"#;
        let items = drain(iter(data, TimeRange::unbounded()));
        assert_eq!(items[0].entries.as_ref().unwrap()["message"], "hi");
    }

    #[test]
    fn next_after_close_is_an_error_and_double_close_is_noop() {
        let mut it = iter(THREE_LINES, TimeRange::unbounded());
        it.close();
        it.close();
        assert!(matches!(it.next(), Err(LogSearchError::Closed(_))));
    }
}
