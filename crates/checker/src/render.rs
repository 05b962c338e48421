//! 점검 리포트 렌더링
//!
//! - `check-report.txt`: 클러스터/샘플 정보와 이상 결과 요약
//! - `detailed-check-record.txt`: 모든 규칙 결과
//!
//! 규칙은 점검 종류(`config` → `performance` → `default_config`)로 묶고
//! 각 묶음 안에서 규칙 ID 순으로 출력합니다.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use foresight_core::types::CheckCategory;

use crate::aggregate::RuleResult;
use crate::engine::CheckReport;
use crate::error::CheckerError;

/// 요약 리포트 파일 이름
pub const REPORT_FILE: &str = "check-report.txt";
/// 상세 기록 파일 이름
pub const RECORD_FILE: &str = "detailed-check-record.txt";

/// 작성된 리포트 파일 경로
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFiles {
    pub report: PathBuf,
    pub record: PathBuf,
}

fn category_order(check_type: &str) -> usize {
    CheckCategory::from_name(check_type)
        .and_then(|c| CheckCategory::ALL.iter().position(|x| *x == c))
        .unwrap_or(CheckCategory::ALL.len())
}

/// 점검 종류별로 묶고 ID 순으로 정렬합니다.
fn group_by_type(results: &[RuleResult]) -> Vec<(&str, Vec<&RuleResult>)> {
    let mut groups: BTreeMap<(usize, &str), Vec<&RuleResult>> = BTreeMap::new();
    for result in results {
        groups
            .entry((category_order(&result.check_type), result.check_type.as_str()))
            .or_default()
            .push(result);
    }
    groups
        .into_iter()
        .map(|((_, check_type), mut rules)| {
            rules.sort_by_key(|r| r.rule_id);
            (check_type, rules)
        })
        .collect()
}

fn write_rule(out: &mut String, rule: &RuleResult) {
    let _ = writeln!(out, "\n#### Rule Name: {}", rule.rule_name);
    let _ = writeln!(out, "- RuleID: {}", rule.rule_id);
    let _ = writeln!(out, "- Variation: {}", rule.variation);
    if !rule.alerting_rule.is_empty() {
        let _ = writeln!(out, "- Alerting Rule: {}", rule.alerting_rule);
    }
    if !rule.suggestion.is_empty() {
        let _ = writeln!(out, "- Suggestion: {}", rule.suggestion);
    }
    let _ = writeln!(out, "- Check Result: ");
    out.push_str(&rule.table);
}

/// 요약 리포트 본문
pub fn render_summary(report: &CheckReport) -> String {
    let info = &report.cluster_info;
    let mut out = String::new();
    let _ = writeln!(out, "# Check Result Report");
    let _ = writeln!(out, "{} {}", info.cluster_name, info.begin_time);

    let _ = writeln!(out, "\n## 1. Cluster Information");
    let _ = writeln!(out, "- Cluster ID: {}", info.cluster_id);
    let _ = writeln!(out, "- Cluster Name: {}", info.cluster_name);
    let _ = writeln!(out, "- Cluster Version: {}", report.cluster_version);

    let _ = writeln!(out, "\n## 2. Sample Information");
    let _ = writeln!(out, "- Sample ID: {}", info.session);
    let _ = writeln!(out, "- Sampling Date: {}", info.begin_time);
    let _ = writeln!(out, "- Sample Content: [{}]", info.collectors.join(" "));

    let groups = group_by_type(&report.results);
    let count_abnormal = |check_type: &str| {
        groups
            .iter()
            .filter(|(t, _)| *t == check_type)
            .flat_map(|(_, rules)| rules.iter())
            .filter(|r| r.abnormal)
            .count()
    };
    let total = report.results.len();
    let abnormal_total = report.results.iter().filter(|r| r.abnormal).count();

    let _ = writeln!(out, "\n## 3. Main results and abnormalities");
    let _ = writeln!(
        out,
        "In this inspection, {total} rules were executed.\n\
         The results of **{abnormal_total}** rules were abnormal and needed to be further discussed with support team.\n\
         The following is the details of the abnormalities."
    );

    for (check_type, rules) in &groups {
        match CheckCategory::from_name(check_type) {
            Some(CheckCategory::Config) => {
                let _ = writeln!(out, "\n### Configuration Summary");
                let _ = writeln!(
                    out,
                    "If the results of the configuration rules are found to be abnormal, they may cause the cluster to fail.\n\
                     There were **{}** abnormal results.",
                    count_abnormal(check_type)
                );
            }
            Some(CheckCategory::DefaultConfig) => {
                let _ = writeln!(out, "\n### Default Configuration Summary");
                let _ = writeln!(
                    out,
                    "The default configuration rules can find out which configurations are inconsistent with the default values.\n\
                     There were **{}** abnormal results.",
                    count_abnormal(check_type)
                );
            }
            _ => {}
        }
        for rule in rules.iter().filter(|r| r.abnormal) {
            write_rule(&mut out, rule);
        }
    }

    if !report.failures.is_empty() {
        let _ = writeln!(out, "\n## 4. Evaluation failures");
        for failure in &report.failures {
            let _ = writeln!(
                out,
                "- {}: {} ({})",
                failure.uqi_tag,
                failure.error,
                failure.rules.join(", ")
            );
        }
    }
    out
}

/// 상세 기록 본문
pub fn render_detail(report: &CheckReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## Check Result Log");
    for (check_type, rules) in group_by_type(&report.results) {
        let title = match CheckCategory::from_name(check_type) {
            Some(CheckCategory::Config) => "Configuration",
            Some(CheckCategory::Performance) => "SQL Performance",
            Some(CheckCategory::DefaultConfig) => "Default Configuration",
            None => check_type,
        };
        let _ = writeln!(out, "\n### {title}");
        for rule in rules {
            write_rule(&mut out, rule);
        }
    }
    out
}

/// 두 리포트 파일을 디렉토리에 씁니다.
pub async fn write_report(report: &CheckReport, dir: &Path) -> Result<RenderedFiles, CheckerError> {
    tokio::fs::create_dir_all(dir).await?;
    let files = RenderedFiles {
        report: dir.join(REPORT_FILE),
        record: dir.join(RECORD_FILE),
    };
    tokio::fs::write(&files.report, render_summary(report)).await?;
    tokio::fs::write(&files.record, render_detail(report)).await?;
    tracing::info!(dir = %dir.display(), "check report saved");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::DeployResult;
    use crate::source::ClusterInfo;

    fn result(name: &str, id: i64, check_type: &str, abnormal: bool) -> RuleResult {
        RuleResult {
            rule_name: name.to_owned(),
            rule_id: id,
            check_type: check_type.to_owned(),
            variation: "TidbConfig.log.level".to_owned(),
            alerting_rule: String::new(),
            suggestion: String::new(),
            abnormal,
            deploy_results: vec![DeployResult {
                id: "tidb_10.0.1.1:4000".to_owned(),
                value: "TidbConfig.log.level:debug".to_owned(),
                res: if abnormal { "warning" } else { "OK" }.to_owned(),
            }],
            table: format!("  row-of-{name}\n"),
        }
    }

    fn report() -> CheckReport {
        CheckReport {
            cluster_info: ClusterInfo {
                cluster_name: "prod".to_owned(),
                cluster_id: "42".to_owned(),
                begin_time: "2021-06-01T10:00:00+08:00".to_owned(),
                session: "s1".to_owned(),
                collectors: vec!["config".to_owned(), "log".to_owned()],
                ..ClusterInfo::default()
            },
            cluster_version: "v5.0.1".to_owned(),
            rules_total: 3,
            results: vec![
                result("default-a", 300, "default_config", true),
                result("config-b", 20, "config", false),
                result("config-a", 10, "config", true),
            ],
            failures: Vec::new(),
        }
    }

    #[test]
    fn summary_lists_only_abnormal_rules() {
        let text = render_summary(&report());
        assert!(text.starts_with("# Check Result Report\nprod 2021-06-01T10:00:00+08:00\n"));
        assert!(text.contains("- Cluster Version: v5.0.1"));
        assert!(text.contains("In this inspection, 3 rules were executed."));
        assert!(text.contains("**2** rules were abnormal"));
        assert!(text.contains("#### Rule Name: config-a"));
        assert!(!text.contains("#### Rule Name: config-b"));
        let config = text.find("### Configuration Summary").unwrap();
        let default = text.find("### Default Configuration Summary").unwrap();
        assert!(config < default);
        assert!(text.contains("row-of-default-a"));
    }

    #[test]
    fn detail_lists_every_rule_by_id() {
        let text = render_detail(&report());
        let a = text.find("config-a").unwrap();
        let b = text.find("config-b").unwrap();
        assert!(a < b);
        assert!(text.contains("### Default Configuration"));
        assert!(text.contains("- RuleID: 300"));
    }

    #[tokio::test]
    async fn writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let files = write_report(&report(), &out).await.unwrap();
        let summary = tokio::fs::read_to_string(&files.report).await.unwrap();
        assert!(summary.contains("## 3. Main results and abnormalities"));
        assert!(files.record.ends_with(RECORD_FILE));
    }
}
