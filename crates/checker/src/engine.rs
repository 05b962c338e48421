//! 점검 엔진 -- 규칙 로딩부터 결과 집계까지
//!
//! 1. 규칙 코퍼스를 로딩하고 ([`RuleSpec::load`])
//! 2. 소스 데이터를 읽어 버전/카테고리로 규칙을 거른 뒤 ([`FileFetcher::fetch`])
//! 3. 규칙마다 바인딩된 데이터의 `uqi_tag`별로 평가 단위를 조립하고
//! 4. 평가 단위를 `spawn_blocking`으로 병렬 실행한 뒤
//! 5. 조립 순서대로 결과를 집계합니다.
//!
//! # 사용 예시
//! ```ignore
//! let engine = CheckEngine::new(CheckConfig::default())?;
//! let report = engine.run("/data/diag-xxxx").await?;
//! for result in &report.results {
//!     println!("{} abnormal={}", result.rule_name, result.abnormal);
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use foresight_core::metrics as m;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::aggregate::{Aggregator, RuleResult};
use crate::binder::Binder;
use crate::compute::ComputeUnit;
use crate::config::CheckConfig;
use crate::error::CheckerError;
use crate::expr::RuleResults;
use crate::rule::{RuleSet, RuleSpec};
use crate::source::{ClusterInfo, FileFetcher, SourceData};

/// 컴파일 또는 집계에 실패한 평가 단위
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub uqi_tag: String,
    pub rules: Vec<String>,
    pub error: String,
}

/// 점검 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub cluster_info: ClusterInfo,
    pub cluster_version: String,
    /// 필터를 통과한 규칙 수
    pub rules_total: usize,
    /// 규칙 집합 순서의 규칙별 결과
    pub results: Vec<RuleResult>,
    pub failures: Vec<UnitFailure>,
}

impl CheckReport {
    /// 이상 결과가 있는 규칙
    pub fn abnormal(&self) -> impl Iterator<Item = &RuleResult> {
        self.results.iter().filter(|r| r.abnormal)
    }
}

/// 설정 점검 엔진
#[derive(Debug, Clone)]
pub struct CheckEngine {
    config: CheckConfig,
}

impl CheckEngine {
    /// 설정을 검증하고 엔진을 생성합니다.
    pub fn new(config: CheckConfig) -> Result<Self, CheckerError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 엔진 설정
    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// 설정된 규칙 파일(없으면 내장 규칙)을 로딩합니다.
    pub async fn load_rules(&self) -> Result<RuleSpec, CheckerError> {
        RuleSpec::load(self.config.rule_file.as_deref()).await
    }

    /// 데이터 디렉토리를 점검합니다.
    pub async fn run(&self, data_dir: impl AsRef<Path>) -> Result<CheckReport, CheckerError> {
        let spec = self.load_rules().await?;
        let fetcher = FileFetcher::new(data_dir.as_ref(), self.config.clone());
        let (source, rule_set) = fetcher.fetch(&spec).await?;
        self.evaluate(source, rule_set).await
    }

    /// 로딩된 소스 데이터에 규칙 집합을 평가합니다.
    pub async fn evaluate(
        &self,
        source: SourceData,
        rule_set: RuleSet,
    ) -> Result<CheckReport, CheckerError> {
        metrics::gauge!(m::CHECK_RULES_LOADED).set(rule_set.len() as f64);
        let rule_set = Arc::new(rule_set);
        let units = assemble(&source, &rule_set)?;
        tracing::info!(
            rules = rule_set.len(),
            units = units.len(),
            version = %source.cluster_version,
            "check started"
        );

        let outcomes = run_units(units).await?;

        let mut aggregator = Aggregator::new(Arc::clone(&rule_set));
        let mut failures = Vec::new();
        for (unit, outcome) in &outcomes {
            let empty;
            let results = match outcome {
                Ok(results) => results,
                Err(e) => {
                    tracing::error!(uqi_tag = %unit.handle_data.uqi_tag, error = %e, "compute unit failed");
                    metrics::counter!(m::CHECK_UNIT_FAILURES_TOTAL).increment(1);
                    failures.push(UnitFailure {
                        uqi_tag: unit.handle_data.uqi_tag.clone(),
                        rules: unit.rules.iter().map(|r| r.name.clone()).collect(),
                        error: e.to_string(),
                    });
                    empty = unit.empty_results();
                    &empty
                }
            };
            for (rule, e) in aggregator.collect(&unit.handle_data, results) {
                tracing::error!(uqi_tag = %unit.handle_data.uqi_tag, rule = %rule, error = %e, "aggregate rule failed");
                failures.push(UnitFailure {
                    uqi_tag: unit.handle_data.uqi_tag.clone(),
                    rules: vec![rule],
                    error: e.to_string(),
                });
            }
        }

        let results = aggregator.results();
        for result in &results {
            for deploy in &result.deploy_results {
                metrics::counter!(m::CHECK_RULES_EVALUATED_TOTAL, m::LABEL_RESULT => deploy.res.clone())
                    .increment(1);
            }
        }
        let abnormal = results.iter().filter(|r| r.abnormal).count();
        tracing::info!(
            rules = results.len(),
            abnormal,
            failures = failures.len(),
            "check finished"
        );

        Ok(CheckReport {
            cluster_info: source.cluster_info,
            cluster_version: source.cluster_version,
            rules_total: rule_set.len(),
            results,
            failures,
        })
    }
}

/// 규칙 집합 순서로 평가 단위를 조립합니다. 단위는 처음 등장한 순서를 유지합니다.
pub fn assemble(source: &SourceData, rule_set: &RuleSet) -> Result<Vec<ComputeUnit>, CheckerError> {
    let binder = Binder::new(source);
    let mut units: Vec<ComputeUnit> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for rule in rule_set.iter() {
        for hd in binder.bind(&rule.name_struct)? {
            let idx = *index.entry(hd.uqi_tag.clone()).or_insert_with(|| {
                units.push(ComputeUnit::new(hd));
                units.len() - 1
            });
            units[idx].push(Arc::clone(rule));
        }
    }
    Ok(units)
}

type UnitOutcome = (ComputeUnit, Result<RuleResults, CheckerError>);

/// 평가 단위를 병렬 실행하고 조립 순서대로 돌려줍니다.
async fn run_units(units: Vec<ComputeUnit>) -> Result<Vec<UnitOutcome>, CheckerError> {
    let mut set = JoinSet::new();
    for (idx, unit) in units.into_iter().enumerate() {
        set.spawn_blocking(move || {
            let outcome = unit.compute();
            (idx, unit, outcome)
        });
    }

    let mut outcomes = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        let (idx, unit, outcome) =
            joined.map_err(|e| CheckerError::Task(format!("spawn_blocking failed: {e}")))?;
        outcomes.push((idx, (unit, outcome)));
    }
    outcomes.sort_by_key(|(idx, _)| *idx);
    Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
}
