//! 회전된 슬로우 쿼리 로그 파일에서 구조화된 행을 추출합니다.
//!
//! - 설정된 경로의 확장자를 뗀 경로를 접두어로 공유하는 파일을 모두 찾습니다.
//! - 각 파일의 처음/마지막 128줄 안의 `# Time:`으로 파일 구간을 구하고,
//!   요청 구간과 겹치지 않는 파일은 건너뜁니다.
//! - 블록은 배치 단위로 병렬 파싱되며, 결과는 파일 순서를 유지합니다.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tokio::task::JoinSet;

use crate::error::CheckerError;

/// 블록 시작 접두어
const START_PREFIX: &str = "# Time: ";
/// 필드 라인 접두어
const ROW_PREFIX: &str = "# ";
const USER_HOST_PREFIX: &str = "User@Host: ";
const SQL_SUFFIX: char = ';';

/// 파일 구간 탐색 라인 수
const SPAN_SCAN_LINES: usize = 128;
/// 워커 하나가 파싱하는 블록 수
pub const PARSE_BATCH_SIZE: usize = 64;
const READER_CAPACITY: usize = 64 * 1024;

/// 이전 버전 시각 형식
const OLD_TIME_FORMAT: &str = "%Y-%m-%d-%H:%M:%S%.f %z";
/// 행에 기록되는 시각 형식
pub const ROW_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// 슬로우 쿼리 시각을 파싱합니다. RFC3339, 실패하면 이전 형식을 시도합니다.
pub fn parse_time(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, OLD_TIME_FORMAT))
        .ok()
}

/// 출력 컬럼 목록과 이름 → 위치 조회
#[derive(Debug, Clone)]
pub struct Columns {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Columns {
    /// 컬럼 이름 목록으로 생성합니다.
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        let names: Vec<String> = names.iter().map(|n| n.as_ref().to_owned()).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        Self { names, index }
    }

    /// 컬럼 위치
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// 필수 컬럼 위치. 없으면 에러입니다.
    pub fn require(&self, name: &str) -> Result<usize, CheckerError> {
        self.position(name).ok_or_else(|| CheckerError::SourceData {
            path: "slow query columns".to_owned(),
            reason: format!("column '{name}' is required"),
        })
    }

    /// 컬럼 수
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// 컬럼이 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// 컬럼 이름 목록
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// 닫힌 시간 구간 `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlowTimeRange {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl SlowTimeRange {
    fn contains(&self, t: &DateTime<FixedOffset>) -> bool {
        *t >= self.start && *t <= self.end
    }

    fn overlaps(&self, start: &DateTime<FixedOffset>, end: &DateTime<FixedOffset>) -> bool {
        !(*start > self.end || *end < self.start)
    }
}

/// 블록 파서 -- 워커 간에 공유됩니다.
#[derive(Debug)]
struct BlockParser {
    columns: Columns,
    ranges: Vec<SlowTimeRange>,
    offset: FixedOffset,
}

impl BlockParser {
    fn in_ranges(&self, t: &DateTime<FixedOffset>) -> bool {
        self.ranges.is_empty() || self.ranges.iter().any(|r| r.contains(t))
    }

    fn set(&self, row: &mut [String], field: &str, value: &str) {
        if let Some(idx) = self.columns.position(field) {
            row[idx] = value.to_owned();
        }
    }

    /// 블록 하나를 행으로 변환합니다. 유효하지 않은 블록은 `None`입니다.
    fn parse_block(&self, block: &[String]) -> Option<Vec<String>> {
        let (first, rest) = block.split_first()?;
        let time = parse_time(first.strip_prefix(START_PREFIX)?)?;
        if !self.in_ranges(&time) {
            return None;
        }

        let mut row = vec![String::new(); self.columns.len()];
        let formatted = time.with_timezone(&self.offset).format(ROW_TIME_FORMAT);
        self.set(&mut row, "Time", &formatted.to_string());

        for line in rest {
            if let Some(fields) = line.strip_prefix(ROW_PREFIX) {
                if let Some(value) = fields.strip_prefix(USER_HOST_PREFIX) {
                    let Some((user, host)) = value.split_once('@') else {
                        continue;
                    };
                    self.set(&mut row, "User", user_or_host(user));
                    self.set(&mut row, "Host", user_or_host(host));
                } else {
                    let parts: Vec<&str> = fields.split(' ').collect();
                    for pair in parts.chunks_exact(2) {
                        self.set(&mut row, pair[0].trim_end_matches(':'), pair[1]);
                    }
                }
            } else if line.ends_with(SQL_SUFFIX) {
                if line.starts_with("use") {
                    continue;
                }
                self.set(&mut row, "Query", line);
                return Some(row);
            } else {
                return None;
            }
        }
        None
    }
}

/// `root[root] ` → `root`
fn user_or_host(value: &str) -> &str {
    let value = value.trim();
    match value.find('[') {
        Some(idx) => value[..idx].trim(),
        None => value,
    }
}

/// 탐색된 로그 파일
#[derive(Debug, Clone)]
pub struct SlowLogFile {
    pub path: PathBuf,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

/// 슬로우 쿼리 행 추출기
#[derive(Debug, Clone)]
pub struct SlowQueryRetriever {
    path: PathBuf,
    concurrency: usize,
    parser: Arc<BlockParser>,
}

impl SlowQueryRetriever {
    /// 추출기를 생성합니다.
    ///
    /// `columns`는 행에 담을 컬럼, `offset`은 `Time` 컬럼의 표시 시간대입니다.
    pub fn new(
        path: impl Into<PathBuf>,
        columns: Columns,
        offset: FixedOffset,
        concurrency: usize,
    ) -> Self {
        Self {
            path: path.into(),
            concurrency: concurrency.max(1),
            parser: Arc::new(BlockParser {
                columns,
                ranges: Vec::new(),
                offset,
            }),
        }
    }

    /// 시간 구간을 추가합니다. 구간이 없으면 모든 블록을 허용합니다.
    pub fn with_time_range(
        mut self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Self {
        let mut parser = BlockParser {
            columns: self.parser.columns.clone(),
            ranges: self.parser.ranges.clone(),
            offset: self.parser.offset,
        };
        parser.ranges.push(SlowTimeRange { start, end });
        self.parser = Arc::new(parser);
        self
    }

    /// 출력 컬럼
    pub fn columns(&self) -> &Columns {
        &self.parser.columns
    }

    /// 요청 구간과 겹치는 회전 파일을 시작 시각 순으로 찾습니다.
    ///
    /// 시각을 읽을 수 없는 파일은 경고 후 건너뜁니다.
    pub fn log_files(&self) -> Result<Vec<SlowLogFile>, CheckerError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let stem = self.path.file_stem().ok_or_else(|| CheckerError::SourceData {
            path: self.path.display().to_string(),
            reason: "slow log path has no file name".to_owned(),
        })?;

        let entries = std::fs::read_dir(dir).map_err(|e| CheckerError::SourceData {
            path: dir.display().to_string(),
            reason: format!("failed to read slow log directory: {e}"),
        })?;

        let mut files = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || !entry.file_name().as_encoded_bytes().starts_with(stem.as_encoded_bytes()) {
                continue;
            }
            match file_span(&path) {
                Ok(Some((start, end))) => {
                    let ranges = &self.parser.ranges;
                    if ranges.is_empty() || ranges.iter().any(|r| r.overlaps(&start, &end)) {
                        files.push(SlowLogFile { path, start, end });
                    } else {
                        tracing::debug!(path = %path.display(), "slow log file outside time ranges");
                    }
                }
                Ok(None) => {
                    tracing::warn!(path = %path.display(), "no '# Time:' found near slow log boundaries, skipping");
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read slow log file, skipping");
                }
            }
        }
        files.sort_by(|a, b| a.start.cmp(&b.start));
        Ok(files)
    }

    /// 모든 대상 파일의 행을 추출합니다.
    pub async fn retrieve(&self) -> Result<Vec<Vec<String>>, CheckerError> {
        let this = self.clone();
        let files = tokio::task::spawn_blocking(move || this.log_files())
            .await
            .map_err(|e| CheckerError::Task(format!("spawn_blocking failed: {e}")))??;

        let mut rows = Vec::new();
        for file in files {
            let path = file.path.clone();
            let blocks = tokio::task::spawn_blocking(move || read_blocks(&file.path))
                .await
                .map_err(|e| CheckerError::Task(format!("spawn_blocking failed: {e}")))?
                .map_err(|e| CheckerError::SourceData {
                    path: path.display().to_string(),
                    reason: format!("failed to read slow log: {e}"),
                })?;
            let parsed = self.parse_blocks(blocks).await?;
            tracing::debug!(path = %path.display(), rows = parsed.len(), "slow log file parsed");
            rows.extend(parsed);
        }
        Ok(rows)
    }

    /// 블록을 배치로 나눠 병렬 파싱합니다. 결과는 입력 순서를 유지합니다.
    async fn parse_blocks(&self, blocks: Vec<Vec<String>>) -> Result<Vec<Vec<String>>, CheckerError> {
        let mut batches = Vec::new();
        let mut iter = blocks.into_iter().peekable();
        while iter.peek().is_some() {
            batches.push(iter.by_ref().take(PARSE_BATCH_SIZE).collect::<Vec<_>>());
        }

        let mut pending = batches.into_iter().enumerate();
        let mut set = JoinSet::new();
        let mut done: Vec<(usize, Vec<Vec<String>>)> = Vec::new();
        loop {
            while set.len() < self.concurrency {
                let Some((idx, batch)) = pending.next() else {
                    break;
                };
                let parser = Arc::clone(&self.parser);
                set.spawn_blocking(move || {
                    let rows: Vec<Vec<String>> =
                        batch.iter().filter_map(|b| parser.parse_block(b)).collect();
                    (idx, rows)
                });
            }
            match set.join_next().await {
                Some(joined) => done.push(
                    joined.map_err(|e| CheckerError::Task(format!("slow log worker failed: {e}")))?,
                ),
                None => break,
            }
        }

        done.sort_by_key(|(idx, _)| *idx);
        Ok(done.into_iter().flat_map(|(_, rows)| rows).collect())
    }
}

/// 줄 하나를 읽습니다. 줄 끝 문자는 떼고, UTF-8이 아닌 바이트는 대체 문자로 바꿉니다.
fn read_line_lossy<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

/// 파일을 `# Time:` 단위 블록으로 나눕니다. 첫 블록 이전 라인은 버립니다.
fn read_blocks(path: &Path) -> std::io::Result<Vec<Vec<String>>> {
    let mut reader = BufReader::with_capacity(READER_CAPACITY, File::open(path)?);
    let mut buf = Vec::new();
    let mut blocks: Vec<Vec<String>> = Vec::new();
    while let Some(line) = read_line_lossy(&mut reader, &mut buf)? {
        if line.starts_with(START_PREFIX) {
            blocks.push(vec![line]);
        } else if let Some(block) = blocks.last_mut() {
            block.push(line);
        }
    }
    Ok(blocks)
}

/// 파일의 첫/마지막 블록 시각
fn file_span(
    path: &Path,
) -> std::io::Result<Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)>> {
    let mut reader = BufReader::with_capacity(READER_CAPACITY, File::open(path)?);
    let mut buf = Vec::new();
    let mut start = None;
    let mut tail: VecDeque<String> = VecDeque::with_capacity(SPAN_SCAN_LINES);
    let mut idx = 0;
    while let Some(line) = read_line_lossy(&mut reader, &mut buf)? {
        if start.is_none() && idx < SPAN_SCAN_LINES {
            start = line.strip_prefix(START_PREFIX).and_then(parse_time);
        }
        idx += 1;
        if tail.len() == SPAN_SCAN_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    let end = tail
        .iter()
        .rev()
        .find_map(|line| line.strip_prefix(START_PREFIX).and_then(parse_time));
    Ok(start.zip(end))
}
