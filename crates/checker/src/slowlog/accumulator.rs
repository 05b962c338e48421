//! 슬로우 쿼리 행 누산기
//!
//! 세 누산기 모두 [`Accumulator::feed`]로 행을 받고 `build`로 결과를 냅니다.
//! 숫자 필드가 비어 있으면 0으로 취급합니다.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use super::retriever::{Columns, ROW_TIME_FORMAT};
use crate::error::CheckerError;

/// 평균 처리 시간 집계 대상 최소 `Process_keys` (초과)
pub const AVG_PROCESS_KEYS_THRESHOLD: u64 = 1_000_000;
/// 이전 버전/툼스톤 탐지 최소 `Process_keys` (초과)
pub const SCAN_PROCESS_KEYS_THRESHOLD: u64 = 10_000;
/// 툼스톤 탐지 허용 차이
pub const TOMBSTONE_TOLERANCE: u64 = 1_000;

/// 누산기가 읽는 컬럼
pub const SLOW_QUERY_COLUMNS: [&str; 7] = [
    "Time",
    "Digest",
    "Plan_digest",
    "Process_time",
    "Process_keys",
    "Rocksdb_delete_skipped_count",
    "Total_keys",
];

/// 슬로우 쿼리 행 누산기
pub trait Accumulator: Send {
    /// 행 하나를 반영합니다.
    fn feed(&mut self, row: &[String]) -> Result<(), CheckerError>;
}

fn field<'a>(row: &'a [String], idx: usize) -> &'a str {
    row.get(idx).map(|s| s.trim()).unwrap_or_default()
}

fn parse_u64(row: &[String], idx: usize, name: &str) -> Result<u64, CheckerError> {
    let value = field(row, idx);
    if value.is_empty() {
        return Ok(0);
    }
    value.parse().map_err(|_| invalid(name, value))
}

fn parse_f64(row: &[String], idx: usize, name: &str) -> Result<f64, CheckerError> {
    let value = field(row, idx);
    if value.is_empty() {
        return Ok(0.0);
    }
    value.parse().map_err(|_| invalid(name, value))
}

fn invalid(name: &str, value: &str) -> CheckerError {
    CheckerError::SourceData {
        path: "slow query row".to_owned(),
        reason: format!("invalid {name} value '{value}'"),
    }
}

/// 다이제스트별 실행 계획 정보
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlanInfo {
    pub plan_digest: String,
    /// 평균 처리 시간 (초, 소수점 이하 버림)
    pub avg_process_time: i64,
    /// 마지막 실행 시각 (unix 초)
    pub max_last_time: i64,
}

#[derive(Debug, Default, Clone, Copy)]
struct PlanStat {
    count: u64,
    total: f64,
    last_unix: i64,
}

/// `(digest, plan_digest)`별 평균 처리 시간
#[derive(Debug)]
pub struct AvgProcessTime {
    offset: FixedOffset,
    active_since: Option<i64>,
    time_idx: usize,
    digest_idx: usize,
    plan_idx: usize,
    process_time_idx: usize,
    process_keys_idx: usize,
    stats: BTreeMap<String, BTreeMap<String, PlanStat>>,
}

impl AvgProcessTime {
    /// 누산기를 생성합니다. `offset`은 행의 `Time` 컬럼 시간대입니다.
    pub fn new(columns: &Columns, offset: FixedOffset) -> Result<Self, CheckerError> {
        Ok(Self {
            offset,
            active_since: None,
            time_idx: columns.require("Time")?,
            digest_idx: columns.require("Digest")?,
            plan_idx: columns.require("Plan_digest")?,
            process_time_idx: columns.require("Process_time")?,
            process_keys_idx: columns.require("Process_keys")?,
            stats: BTreeMap::new(),
        })
    }

    /// 마지막 실행이 `since` 이전인 계획을 결과에서 제외합니다.
    pub fn with_active_since(mut self, since: DateTime<FixedOffset>) -> Self {
        self.active_since = Some(since.timestamp());
        self
    }

    fn row_unix(&self, row: &[String]) -> Result<i64, CheckerError> {
        let value = field(row, self.time_idx);
        let naive = NaiveDateTime::parse_from_str(value, ROW_TIME_FORMAT)
            .map_err(|_| invalid("Time", value))?;
        self.offset
            .from_local_datetime(&naive)
            .single()
            .map(|t| t.timestamp())
            .ok_or_else(|| invalid("Time", value))
    }

    /// 계획이 두 개 이상인 다이제스트의 `[최소, 최대]` 평균 처리 시간 계획
    pub fn build(&self) -> BTreeMap<String, [ExecutionPlanInfo; 2]> {
        let mut result = BTreeMap::new();
        for (digest, plans) in &self.stats {
            let infos: Vec<ExecutionPlanInfo> = plans
                .iter()
                .filter(|(_, s)| self.active_since.is_none_or(|since| s.last_unix >= since))
                .map(|(plan, s)| ExecutionPlanInfo {
                    plan_digest: plan.clone(),
                    avg_process_time: (s.total / s.count as f64) as i64,
                    max_last_time: s.last_unix,
                })
                .collect();
            if infos.len() < 2 {
                continue;
            }
            let min = infos.iter().min_by_key(|i| i.avg_process_time);
            let max = infos.iter().max_by_key(|i| i.avg_process_time);
            if let (Some(min), Some(max)) = (min, max) {
                result.insert(digest.clone(), [min.clone(), max.clone()]);
            }
        }
        result
    }
}

impl Accumulator for AvgProcessTime {
    fn feed(&mut self, row: &[String]) -> Result<(), CheckerError> {
        if parse_u64(row, self.process_keys_idx, "Process_keys")? <= AVG_PROCESS_KEYS_THRESHOLD {
            return Ok(());
        }
        let process_time = parse_f64(row, self.process_time_idx, "Process_time")?;
        let unix = self.row_unix(row)?;
        let stat = self
            .stats
            .entry(field(row, self.digest_idx).to_owned())
            .or_default()
            .entry(field(row, self.plan_idx).to_owned())
            .or_default();
        stat.count += 1;
        stat.total += process_time;
        stat.last_unix = stat.last_unix.max(unix);
        Ok(())
    }
}

/// 조건을 만족한 서로 다른 `(digest, plan_digest)` 수를 셉니다.
#[derive(Debug)]
struct DistinctPlans {
    digest_idx: usize,
    plan_idx: usize,
    seen: HashSet<(String, String)>,
}

impl DistinctPlans {
    fn new(columns: &Columns) -> Result<Self, CheckerError> {
        Ok(Self {
            digest_idx: columns.require("Digest")?,
            plan_idx: columns.require("Plan_digest")?,
            seen: HashSet::new(),
        })
    }

    fn mark(&mut self, row: &[String]) {
        self.seen.insert((
            field(row, self.digest_idx).to_owned(),
            field(row, self.plan_idx).to_owned(),
        ));
    }
}

/// 이전 버전 데이터를 과도하게 스캔하는 쿼리 탐지
///
/// `process_keys > 10000`이고 `total_keys >= 2 * process_keys`
#[derive(Debug)]
pub struct OldVersionScan {
    plans: DistinctPlans,
    process_keys_idx: usize,
    total_keys_idx: usize,
}

impl OldVersionScan {
    pub fn new(columns: &Columns) -> Result<Self, CheckerError> {
        Ok(Self {
            plans: DistinctPlans::new(columns)?,
            process_keys_idx: columns.require("Process_keys")?,
            total_keys_idx: columns.require("Total_keys")?,
        })
    }

    pub fn build(&self) -> u64 {
        self.plans.seen.len() as u64
    }
}

impl Accumulator for OldVersionScan {
    fn feed(&mut self, row: &[String]) -> Result<(), CheckerError> {
        let process_keys = parse_u64(row, self.process_keys_idx, "Process_keys")?;
        let total_keys = parse_u64(row, self.total_keys_idx, "Total_keys")?;
        if process_keys > SCAN_PROCESS_KEYS_THRESHOLD
            && total_keys >= process_keys.saturating_mul(2)
        {
            self.plans.mark(row);
        }
        Ok(())
    }
}

/// 삭제된 키를 건너뛰느라 느린 쿼리 탐지
///
/// `process_keys > 10000`이고 `|delete_skipped - process_keys| <= 1000`
#[derive(Debug)]
pub struct TombstoneSkip {
    plans: DistinctPlans,
    process_keys_idx: usize,
    skipped_idx: usize,
}

impl TombstoneSkip {
    pub fn new(columns: &Columns) -> Result<Self, CheckerError> {
        Ok(Self {
            plans: DistinctPlans::new(columns)?,
            process_keys_idx: columns.require("Process_keys")?,
            skipped_idx: columns.require("Rocksdb_delete_skipped_count")?,
        })
    }

    pub fn build(&self) -> u64 {
        self.plans.seen.len() as u64
    }
}

impl Accumulator for TombstoneSkip {
    fn feed(&mut self, row: &[String]) -> Result<(), CheckerError> {
        let process_keys = parse_u64(row, self.process_keys_idx, "Process_keys")?;
        let skipped = parse_u64(row, self.skipped_idx, "Rocksdb_delete_skipped_count")?;
        if process_keys > SCAN_PROCESS_KEYS_THRESHOLD
            && skipped.abs_diff(process_keys) <= TOMBSTONE_TOLERANCE
        {
            self.plans.mark(row);
        }
        Ok(())
    }
}

/// 세 누산기를 함께 돌린 결과
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlowQueryStats {
    pub execution_plans: BTreeMap<String, [ExecutionPlanInfo; 2]>,
    pub old_version_count: u64,
    pub tombstone_count: u64,
}

/// 행 목록을 세 누산기에 모두 반영합니다.
pub fn accumulate(
    rows: &[Vec<String>],
    columns: &Columns,
    offset: FixedOffset,
    active_since: Option<DateTime<FixedOffset>>,
) -> Result<SlowQueryStats, CheckerError> {
    let mut avg = AvgProcessTime::new(columns, offset)?;
    if let Some(since) = active_since {
        avg = avg.with_active_since(since);
    }
    let mut old_version = OldVersionScan::new(columns)?;
    let mut tombstone = TombstoneSkip::new(columns)?;

    let mut skipped: HashMap<&'static str, usize> = HashMap::new();
    for row in rows {
        let accumulators: [(&'static str, &mut dyn Accumulator); 3] = [
            ("avg_process_time", &mut avg),
            ("old_version", &mut old_version),
            ("tombstone", &mut tombstone),
        ];
        for (name, acc) in accumulators {
            if let Err(e) = acc.feed(row) {
                tracing::debug!(accumulator = name, error = %e, "slow query row skipped");
                *skipped.entry(name).or_default() += 1;
            }
        }
    }
    if !skipped.is_empty() {
        tracing::warn!(skipped = ?skipped, "some slow query rows could not be accumulated");
    }

    Ok(SlowQueryStats {
        execution_plans: avg.build(),
        old_version_count: old_version.build(),
        tombstone_count: tombstone.build(),
    })
}
