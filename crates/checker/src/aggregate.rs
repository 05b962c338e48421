//! 규칙 결과 집계
//!
//! 평가 단위마다 나온 `rule name → verdict` 결과를 규칙별 [`Printer`]에
//! 모읍니다. 프린터는 점검 종류에 따라 두 가지입니다.
//!
//! - [`ConfPrinter`]: 대상별 `{id, value, res}` 행 (`config`, `default_config`)
//! - [`SqlPerformancePrinter`]: `"<n> Digest trigger cordon"` 요약 (`performance`)

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use foresight_core::types::CheckCategory;
use serde::{Deserialize, Serialize};

use crate::binder::HandleData;
use crate::error::CheckerError;
use crate::expr::{RuleResults, Value};
use crate::rule::{Rule, RuleSet};

/// 통과
pub const RES_OK: &str = "OK";
/// 데이터 없음
pub const RES_NO_DATA: &str = "NoData";
/// 성능 규칙 안내 문구
pub const SQL_PERFORMANCE_INFO: &str = "Please check the collect csv file for specific information";

/// 대상 하나의 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployResult {
    /// 대상 `uqi_tag`
    pub id: String,
    /// 보고 값
    pub value: String,
    /// `OK`, `NoData` 또는 규칙의 `warn_level`
    pub res: String,
}

/// 규칙별 결과 수집기
pub trait Printer: Send + Sync + fmt::Debug {
    /// 대상 하나의 판정을 반영합니다.
    fn collect(&mut self, hd: &HandleData, verdict: Option<&Value>) -> Result<(), CheckerError>;

    /// 생성 순서의 대상별 결과
    fn deploy_results(&self) -> Vec<DeployResult>;

    /// 리포트의 이상 항목에 포함될지 여부
    fn is_abnormal(&self) -> bool;

    /// 결과 표를 출력합니다.
    fn print(&self, out: &mut dyn fmt::Write) -> fmt::Result;
}

/// 점검 종류에 맞는 프린터를 만듭니다.
pub fn new_printer(rule: &Arc<Rule>) -> Result<Box<dyn Printer>, CheckerError> {
    match rule.category() {
        Some(CheckCategory::Config | CheckCategory::DefaultConfig) => {
            Ok(Box::new(ConfPrinter::new(Arc::clone(rule))))
        }
        Some(CheckCategory::Performance) => Ok(Box::new(SqlPerformancePrinter::new(Arc::clone(rule)))),
        None => Err(CheckerError::Aggregate {
            rule: rule.name.clone(),
            reason: format!("can't handle '{}' type rule", rule.check_type),
        }),
    }
}

/// 설정 규칙 프린터
#[derive(Debug)]
pub struct ConfPrinter {
    rule: Arc<Rule>,
    /// 이름 구조 → 태그 경로 목록
    paths: BTreeMap<String, Vec<String>>,
    results: Vec<DeployResult>,
}

impl ConfPrinter {
    pub fn new(rule: Arc<Rule>) -> Self {
        let paths = split_variation(&rule.variation);
        Self {
            rule,
            paths,
            results: Vec::new(),
        }
    }

    fn status(&self, verdict: Option<&Value>) -> String {
        match verdict {
            Some(Value::Bool(true)) => RES_OK.to_owned(),
            Some(Value::Bool(false)) => self.rule.warn_level.clone(),
            _ => RES_NO_DATA.to_owned(),
        }
    }

    /// `"<name_struct>.<path>:<value>"` 목록을 `,`로 연결합니다.
    fn value_str(&self, hd: &HandleData) -> String {
        let mut values = Vec::new();
        for datum in &hd.data {
            let Some(paths) = self.paths.get(datum.name_struct()) else {
                continue;
            };
            for path in paths {
                let value = datum
                    .tree()
                    .map_or_else(|| "<nil>".to_owned(), |t| t.get_path(path).to_string());
                values.push(format!("{}.{path}:{value}", datum.name_struct()));
            }
        }
        values.join(",")
    }
}

/// `TidbConfig.log.level,TikvConfig.log-level` → 이름 구조별 경로
fn split_variation(variation: &str) -> BTreeMap<String, Vec<String>> {
    let mut paths: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entry in variation.split(',').map(str::trim) {
        let Some((name_struct, path)) = entry.split_once('.') else {
            continue;
        };
        if path.is_empty() {
            continue;
        }
        paths.entry(name_struct.to_owned()).or_default().push(path.to_owned());
    }
    paths
}

impl Printer for ConfPrinter {
    fn collect(&mut self, hd: &HandleData, verdict: Option<&Value>) -> Result<(), CheckerError> {
        let result = DeployResult {
            id: hd.uqi_tag.clone(),
            value: self.value_str(hd),
            res: self.status(verdict),
        };
        self.results.push(result);
        Ok(())
    }

    fn deploy_results(&self) -> Vec<DeployResult> {
        self.results.clone()
    }

    fn is_abnormal(&self) -> bool {
        self.results
            .iter()
            .any(|r| r.res != RES_OK && r.res != RES_NO_DATA)
    }

    fn print(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        let id_width = self.results.iter().map(|r| r.id.len()).max().unwrap_or(0);
        let value_width = self.results.iter().map(|r| r.value.len()).max().unwrap_or(0);
        for r in &self.results {
            writeln!(
                out,
                "  {:<id_width$}  {:<value_width$}  {}",
                r.id, r.value, r.res
            )?;
        }
        Ok(())
    }
}

/// 성능 규칙 프린터
#[derive(Debug)]
pub struct SqlPerformancePrinter {
    rule: Arc<Rule>,
    id: String,
    digests: Option<i64>,
    collected: bool,
}

impl SqlPerformancePrinter {
    pub fn new(rule: Arc<Rule>) -> Self {
        Self {
            rule,
            id: String::new(),
            digests: None,
            collected: false,
        }
    }

    /// `"<n> Digest trigger cordon"`
    pub fn num_digest(&self) -> String {
        format!("{} Digest trigger cordon", self.digests.unwrap_or(0))
    }

    fn res(&self) -> String {
        match self.digests {
            None => RES_NO_DATA.to_owned(),
            Some(0) => RES_OK.to_owned(),
            Some(_) => self.rule.warn_level.clone(),
        }
    }
}

impl Printer for SqlPerformancePrinter {
    fn collect(&mut self, hd: &HandleData, verdict: Option<&Value>) -> Result<(), CheckerError> {
        self.id = hd.uqi_tag.clone();
        self.collected = true;
        let dashboard = hd.dashboard().ok_or_else(|| CheckerError::Aggregate {
            rule: self.rule.name.clone(),
            reason: "bound data is not dashboard data".to_owned(),
        })?;
        let count_at = |path: &str| dashboard.get_path(path).as_i64().unwrap_or(0);

        self.digests = match (self.rule.name.as_str(), verdict) {
            (_, None) => None,
            ("poor_execution_plan", Some(Value::Int(n))) => Some(*n),
            ("poor_execution_plan", Some(other)) => {
                return Err(CheckerError::Aggregate {
                    rule: self.rule.name.clone(),
                    reason: format!("expected int verdict, got {}", other.type_name()),
                });
            }
            ("old_version_count", Some(Value::Bool(true))) => {
                Some(count_at("old_version_processkey.count"))
            }
            ("old_version_count", Some(Value::Bool(false))) => Some(0),
            ("old_version_count", Some(other)) => {
                return Err(CheckerError::Aggregate {
                    rule: self.rule.name.clone(),
                    reason: format!("expected bool verdict, got {}", other.type_name()),
                });
            }
            ("scan_key_skip", Some(_)) => Some(count_at("tombstone_statistics.count")),
            (_, Some(Value::Int(n))) => Some(*n),
            (_, Some(Value::Bool(pass))) => Some(i64::from(!*pass)),
            (_, Some(_)) => None,
        };
        Ok(())
    }

    fn deploy_results(&self) -> Vec<DeployResult> {
        if !self.collected {
            return Vec::new();
        }
        vec![DeployResult {
            id: self.id.clone(),
            value: self.num_digest(),
            res: self.res(),
        }]
    }

    fn is_abnormal(&self) -> bool {
        self.digests.is_some_and(|n| n > 0)
    }

    fn print(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "  {}  {}", self.num_digest(), SQL_PERFORMANCE_INFO)
    }
}

/// 규칙 하나의 집계 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_name: String,
    pub rule_id: i64,
    pub check_type: String,
    pub variation: String,
    pub alerting_rule: String,
    pub suggestion: String,
    pub abnormal: bool,
    pub deploy_results: Vec<DeployResult>,
    /// 리포트용 결과 표
    #[serde(skip)]
    pub table: String,
}

/// 규칙별 프린터 모음
#[derive(Debug)]
pub struct Aggregator {
    rule_set: Arc<RuleSet>,
    printers: HashMap<String, Box<dyn Printer>>,
}

impl Aggregator {
    pub fn new(rule_set: Arc<RuleSet>) -> Self {
        Self {
            rule_set,
            printers: HashMap::new(),
        }
    }

    /// 평가 단위 하나의 결과를 반영합니다.
    ///
    /// 실패한 규칙은 건너뛰지 않고 해당 대상을 `NoData`로 남긴 뒤,
    /// `(규칙 이름, 에러)` 목록으로 돌려줍니다.
    pub fn collect(&mut self, hd: &HandleData, results: &RuleResults) -> Vec<(String, CheckerError)> {
        let mut names: Vec<&String> = results.keys().collect();
        names.sort_by_key(|name| self.rule_set.get(name).map(|r| r.id));

        let mut errors = Vec::new();
        for name in names {
            if let Err(e) = self.collect_rule(hd, name, results[name].as_ref()) {
                if let Err(fallback) = self.collect_rule(hd, name, None) {
                    tracing::debug!(rule = %name, error = %fallback, "no data fallback failed");
                }
                errors.push((name.clone(), e));
            }
        }
        errors
    }

    /// 규칙 하나의 판정을 반영합니다. 규칙 집합에 없는 이름은 에러입니다.
    pub fn collect_rule(
        &mut self,
        hd: &HandleData,
        name: &str,
        verdict: Option<&Value>,
    ) -> Result<(), CheckerError> {
        let rule = self.rule_set.get(name).ok_or_else(|| CheckerError::Aggregate {
            rule: name.to_owned(),
            reason: "no such rule".to_owned(),
        })?;
        let printer = match self.printers.entry(name.to_owned()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(new_printer(rule)?),
        };
        printer.collect(hd, verdict)
    }

    /// 규칙의 프린터
    pub fn printer(&self, rule_name: &str) -> Option<&dyn Printer> {
        self.printers.get(rule_name).map(|p| p.as_ref())
    }

    /// 규칙 집합 순서로 결과를 만듭니다. 대상이 없던 규칙은 빠집니다.
    pub fn results(&self) -> Vec<RuleResult> {
        self.rule_set
            .iter()
            .filter_map(|rule| {
                let printer = self.printers.get(&rule.name)?;
                let mut table = String::new();
                if let Err(e) = printer.print(&mut table) {
                    tracing::warn!(rule = %rule.name, error = %e, "failed to print rule result");
                }
                Some(RuleResult {
                    rule_name: rule.name.clone(),
                    rule_id: rule.id,
                    check_type: rule.check_type.clone(),
                    variation: rule.variation.clone(),
                    alerting_rule: rule.alerting_rule.clone(),
                    suggestion: rule.suggestion.clone(),
                    abnormal: printer.is_abnormal(),
                    deploy_results: printer.deploy_results(),
                    table,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::Datum;
    use crate::rule::types::sample_rule;
    use crate::source::{DashboardData, NodeConfig};
    use crate::value::ConfigValue;
    use foresight_core::types::Component;
    use serde_json::json;

    fn node_hd(host: &str, config: Option<serde_json::Value>) -> HandleData {
        HandleData::new(vec![Datum::Node(NodeConfig {
            component: Component::Tidb,
            host: host.to_owned(),
            port: 4000,
            config: config.map(|c| Arc::new(ConfigValue::from(c))),
        })])
    }

    fn dashboard_hd(old_version: u64, tombstone: u64) -> HandleData {
        let mut data = DashboardData::default();
        data.old_version_processkey.count = old_version;
        data.tombstone_statistics.count = tombstone;
        HandleData::new(vec![Datum::Dashboard(Arc::new(data.to_tree().unwrap()))])
    }

    fn conf_rule() -> Arc<Rule> {
        let mut rule = sample_rule("log-level", "TidbConfig", "x");
        rule.variation = "TidbConfig.log.level,TikvConfig.log-level".to_owned();
        Arc::new(rule)
    }

    fn perf_rule(name: &str) -> Arc<Rule> {
        let mut rule = sample_rule(name, "performance.dashboard", "x");
        rule.check_type = "performance".to_owned();
        Arc::new(rule)
    }

    // =========================================================================
    // ConfPrinter
    // =========================================================================

    #[test]
    fn conf_printer_maps_verdicts() {
        let mut printer = ConfPrinter::new(conf_rule());
        let hd = node_hd("10.0.1.1", Some(json!({"log": {"level": "debug"}})));
        printer.collect(&hd, Some(&Value::Bool(true))).unwrap();
        printer.collect(&hd, Some(&Value::Bool(false))).unwrap();
        printer.collect(&hd, None).unwrap();
        printer.collect(&hd, Some(&Value::Int(1))).unwrap();

        let res: Vec<String> = printer.deploy_results().into_iter().map(|r| r.res).collect();
        assert_eq!(res, vec!["OK", "warning", "NoData", "NoData"]);
        assert!(printer.is_abnormal());
        assert_eq!(printer.deploy_results()[0].id, "tidb_10.0.1.1:4000");
        assert_eq!(printer.deploy_results()[0].value, "TidbConfig.log.level:debug");
    }

    #[test]
    fn conf_printer_missing_config_value() {
        let mut printer = ConfPrinter::new(conf_rule());
        printer.collect(&node_hd("10.0.1.2", None), None).unwrap();
        let result = &printer.deploy_results()[0];
        assert_eq!(result.value, "TidbConfig.log.level:<nil>");
        assert_eq!(result.res, "NoData");
        assert!(!printer.is_abnormal());
    }

    #[test]
    fn split_variation_groups_paths() {
        let paths = split_variation("TidbConfig.a.b, TidbConfig.c,PdConfig.d,bogus,Empty.");
        assert_eq!(paths["TidbConfig"], vec!["a.b", "c"]);
        assert_eq!(paths["PdConfig"], vec!["d"]);
        assert_eq!(paths.len(), 2);
    }

    // =========================================================================
    // SqlPerformancePrinter
    // =========================================================================

    #[test]
    fn poor_execution_plan_uses_int_verdict() {
        let mut printer = SqlPerformancePrinter::new(perf_rule("poor_execution_plan"));
        printer.collect(&dashboard_hd(0, 0), Some(&Value::Int(3))).unwrap();
        assert_eq!(printer.num_digest(), "3 Digest trigger cordon");
        assert!(printer.is_abnormal());
        assert!(
            printer
                .collect(&dashboard_hd(0, 0), Some(&Value::Bool(true)))
                .is_err()
        );
    }

    #[test]
    fn old_version_count_uses_dashboard_when_triggered() {
        let mut printer = SqlPerformancePrinter::new(perf_rule("old_version_count"));
        printer.collect(&dashboard_hd(7, 0), Some(&Value::Bool(true))).unwrap();
        assert_eq!(printer.num_digest(), "7 Digest trigger cordon");
        printer.collect(&dashboard_hd(7, 0), Some(&Value::Bool(false))).unwrap();
        assert_eq!(printer.num_digest(), "0 Digest trigger cordon");
        assert!(!printer.is_abnormal());
        assert_eq!(printer.deploy_results()[0].res, "OK");
    }

    #[test]
    fn scan_key_skip_uses_tombstone_count() {
        let mut printer = SqlPerformancePrinter::new(perf_rule("scan_key_skip"));
        printer.collect(&dashboard_hd(0, 4), Some(&Value::Bool(true))).unwrap();
        assert_eq!(printer.num_digest(), "4 Digest trigger cordon");
        let mut out = String::new();
        printer.print(&mut out).unwrap();
        assert!(out.contains(SQL_PERFORMANCE_INFO));
        assert_eq!(printer.deploy_results()[0].id, "performance.dashboard");
    }

    // =========================================================================
    // Aggregator
    // =========================================================================

    #[test]
    fn aggregator_collects_in_rule_set_order() {
        let rules = Arc::new(RuleSet::new(vec![conf_rule(), perf_rule("scan_key_skip")]));
        let mut agg = Aggregator::new(Arc::clone(&rules));

        let hd1 = node_hd("10.0.1.1", Some(json!({"log": {"level": "info"}})));
        let hd2 = node_hd("10.0.1.2", Some(json!({"log": {"level": "debug"}})));
        let ok: RuleResults = [("log-level".to_owned(), Some(Value::Bool(true)))].into();
        let bad: RuleResults = [("log-level".to_owned(), Some(Value::Bool(false)))].into();
        assert!(agg.collect(&hd1, &ok).is_empty());
        assert!(agg.collect(&hd2, &bad).is_empty());

        let results = agg.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rule_name, "log-level");
        assert!(results[0].abnormal);
        let ids: Vec<&str> = results[0].deploy_results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["tidb_10.0.1.1:4000", "tidb_10.0.1.2:4000"]);
    }

    #[test]
    fn aggregator_rejects_unknown_rule() {
        let rules = Arc::new(RuleSet::new(vec![conf_rule()]));
        let mut agg = Aggregator::new(rules);
        let results: RuleResults = [("ghost".to_owned(), None)].into();
        let errors = agg.collect(&node_hd("h", None), &results);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "ghost");
        assert!(matches!(errors[0].1, CheckerError::Aggregate { .. }));
        assert!(agg.results().is_empty());
    }

    #[test]
    fn aggregator_keeps_failed_rule_as_no_data() {
        let rules = Arc::new(RuleSet::new(vec![perf_rule("poor_execution_plan")]));
        let mut agg = Aggregator::new(rules);
        let results: RuleResults =
            [("poor_execution_plan".to_owned(), Some(Value::Bool(true)))].into();
        let errors = agg.collect(&dashboard_hd(0, 0), &results);
        assert_eq!(errors.len(), 1);

        let results = agg.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].deploy_results[0].res, "NoData");
        assert!(!results[0].abnormal);
    }

    #[test]
    fn unknown_check_type_has_no_printer() {
        let mut rule = sample_rule("r", "TidbConfig", "x");
        rule.check_type = "security".to_owned();
        assert!(new_printer(&Arc::new(rule)).is_err());
    }
}
