//! 로그 이터레이터 -- 파일 하나에서 [`LogItem`]을 순서대로 방출
//!
//! - [`FileIterator`]: 일반 로그 파일 (헤더 형식 자동 감지)
//! - [`SlowQueryIterator`]: `#` 주석 블록 + SQL 라인으로 이루어진 슬로우 쿼리 로그
//! - [`Filtered`]: 텍스트/레벨 조건으로 다른 이터레이터를 감싸는 어댑터
//!
//! 모든 이터레이터는 `[begin, end)` 시간 범위를 지키며, 범위 끝이나 파일 끝에서
//! `Ok(None)`을 반환합니다.

pub mod file;
pub mod slow;

pub use file::FileIterator;
pub use slow::SlowQueryIterator;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use memchr::memmem::Finder;
use foresight_core::types::LogLevel;
use tracing::debug;

use crate::config::SearchConfig;
use crate::error::LogSearchError;
use crate::format::FormatRouter;
use crate::item::{ItemType, LogItem};
use crate::resolver::FileDescriptor;

/// 로그 이터레이터 trait
///
/// `next`가 `Ok(None)`을 반환하면 스트림의 끝입니다.
/// `close`는 여러 번 호출해도 안전해야 합니다.
pub trait LogIterator: Send {
    /// 다음 아이템을 읽습니다.
    fn next(&mut self) -> Result<Option<LogItem>, LogSearchError>;

    /// 파일 핸들을 닫습니다.
    fn close(&mut self);
}

impl LogIterator for Box<dyn LogIterator> {
    fn next(&mut self) -> Result<Option<LogItem>, LogSearchError> {
        (**self).next()
    }

    fn close(&mut self) {
        (**self).close();
    }
}

/// 타임스탬프의 범위 내 위치
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePosition {
    /// `begin` 이전 -- 건너뜀
    Before,
    /// `[begin, end)` 내부 -- 방출
    Within,
    /// `end` 이후 -- 스트림 종료
    After,
}

/// 반개구간 `[begin, end)` 시간 범위
///
/// 경계가 `None`이면 해당 방향으로 제한이 없습니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    /// 포함 시작
    pub begin: Option<DateTime<FixedOffset>>,
    /// 제외 끝
    pub end: Option<DateTime<FixedOffset>>,
}

impl TimeRange {
    /// 제한 없는 범위
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// `[begin, end)` 범위를 생성합니다.
    pub fn new(begin: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Self {
        Self {
            begin: Some(begin),
            end: Some(end),
        }
    }

    /// 타임스탬프의 위치를 판정합니다. 비교는 절대 시각 기준입니다.
    pub fn position(&self, t: &DateTime<FixedOffset>) -> RangePosition {
        if self.begin.is_some_and(|b| *t < b) {
            return RangePosition::Before;
        }
        if self.end.is_some_and(|e| *t >= e) {
            return RangePosition::After;
        }
        RangePosition::Within
    }
}

/// 아이템 필터 -- 본문 부분 문자열 + 최소 레벨
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// 빈 텍스트면 `None`
    finder: Option<Finder<'static>>,
    min_level: Option<LogLevel>,
}

impl ItemFilter {
    /// 새 필터를 생성합니다. 빈 텍스트는 모든 라인과 일치합니다.
    pub fn new(text: impl Into<String>, min_level: Option<LogLevel>) -> Self {
        let text = text.into();
        Self {
            finder: (!text.is_empty()).then(|| Finder::new(text.as_bytes()).into_owned()),
            min_level,
        }
    }

    /// 아무 조건도 없는 필터인지 여부
    pub fn is_empty(&self) -> bool {
        self.finder.is_none() && self.min_level.is_none()
    }

    /// 아이템이 조건을 만족하는지 판정합니다.
    ///
    /// 레벨이 없는 아이템(슬로우 쿼리 블록)은 레벨 조건을 통과합니다.
    pub fn matches(&self, item: &LogItem) -> bool {
        if let (Some(min), Some(level)) = (self.min_level, item.level) {
            if level < min {
                return false;
            }
        }
        self.finder
            .as_ref()
            .is_none_or(|finder| finder.find(item.body()).is_some())
    }
}

/// 필터 어댑터
pub struct Filtered<I> {
    inner: I,
    filter: ItemFilter,
}

impl<I: LogIterator> Filtered<I> {
    /// 이터레이터를 필터로 감쌉니다.
    pub fn new(inner: I, filter: ItemFilter) -> Self {
        Self { inner, filter }
    }
}

impl<I: LogIterator> LogIterator for Filtered<I> {
    fn next(&mut self) -> Result<Option<LogItem>, LogSearchError> {
        while let Some(item) = self.inner.next()? {
            if self.filter.matches(&item) {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

/// 파일 서술자에 맞는 이터레이터를 엽니다.
///
/// 검색 대상이 아닌 컴포넌트는 `Ok(None)`입니다.
pub fn open_iterator(
    descriptor: &FileDescriptor,
    config: &SearchConfig,
    router: &Arc<FormatRouter>,
    range: TimeRange,
    filter: &ItemFilter,
) -> Result<Option<Box<dyn LogIterator>>, LogSearchError> {
    let (component, port) = descriptor.parse_folder()?;
    let Some(component) = component else {
        debug!(folder = %descriptor.folder, "skipping unsupported component");
        return Ok(None);
    };
    let slow_query = descriptor.filename == config.slow_query_file;
    let Some(item_type) = ItemType::for_component(component, slow_query) else {
        debug!(folder = %descriptor.folder, "skipping unsupported component");
        return Ok(None);
    };

    let path = descriptor.path();
    let file = File::open(&path).map_err(|source| LogSearchError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let reader = BufReader::with_capacity(config.reader_capacity, file);
    let origin = ItemOrigin {
        file: descriptor.filename.clone(),
        host: descriptor.host.clone(),
        port,
        component,
        item_type,
    };

    let iter: Box<dyn LogIterator> = if item_type == ItemType::TidbSlowQuery {
        let inner = SlowQueryIterator::new(origin, reader, range, config.max_line_size);
        if filter.is_empty() {
            Box::new(inner)
        } else {
            Box::new(Filtered::new(inner, filter.clone()))
        }
    } else {
        let inner = FileIterator::new(
            origin,
            reader,
            Arc::clone(router),
            range,
            config.max_line_size,
        );
        if filter.is_empty() {
            Box::new(inner)
        } else {
            Box::new(Filtered::new(inner, filter.clone()))
        }
    };
    Ok(Some(iter))
}

/// 아이템 출처 정보 -- 이터레이터가 방출하는 모든 아이템에 복사됩니다.
#[derive(Debug, Clone)]
pub struct ItemOrigin {
    /// 파일 이름
    pub file: String,
    /// 호스트
    pub host: String,
    /// 포트
    pub port: u16,
    /// 컴포넌트
    pub component: foresight_core::types::Component,
    /// 아이템 타입
    pub item_type: ItemType,
}

/// 논리 라인 하나를 읽습니다.
///
/// 버퍼보다 긴 라인도 조각을 이어 붙여 하나로 만들며, `max_size`를 넘는
/// 부분은 버립니다. 줄 끝의 `\n`/`\r\n`은 제거됩니다.
/// 파일 끝에서 읽은 바이트가 없으면 `false`를 반환합니다.
pub(crate) fn read_logical_line<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_size: usize,
) -> std::io::Result<bool> {
    buf.clear();
    let mut read_any = false;
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            break;
        }
        read_any = true;
        let (chunk, consumed, done) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (&available[..pos], pos + 1, true),
            None => (available, available.len(), false),
        };
        let room = max_size.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
        reader.consume(consumed);
        if done {
            break;
        }
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(read_any)
}
