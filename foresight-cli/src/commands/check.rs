//! `foresight check` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use foresight_checker::{CheckConfig, CheckEngine, CheckReport, RuleResult, UnitFailure, write_report};
use foresight_core::config::ForesightConfig;
use foresight_core::types::CheckCategory;

use crate::cli::CheckArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `check` command.
///
/// Runs the engine over `data_dir`, writes the report files unless
/// `--no-report`, and prints the per-rule results.
pub async fn execute(
    args: CheckArgs,
    config: &ForesightConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let check_config = build_config(&args, config)?;
    let engine = CheckEngine::new(check_config)?;
    info!(
        data_dir = %args.data_dir.display(),
        categories = ?engine.config().categories,
        "running check"
    );

    let report = engine.run(&args.data_dir).await?;
    let files = if args.no_report {
        None
    } else {
        Some(write_report(&report, &engine.config().report_dir).await?)
    };

    let summary = CheckSummary::new(report, files.map(|f| (f.report, f.record)));
    writer.render(&summary)?;

    if args.strict && summary.abnormal > 0 {
        return Err(CliError::Abnormal(summary.abnormal));
    }
    Ok(())
}

/// `[check]` section overridden by the command-line flags.
fn build_config(args: &CheckArgs, config: &ForesightConfig) -> Result<CheckConfig, CliError> {
    let mut check = CheckConfig::from_core(&config.check);
    if let Some(rules) = &args.rules {
        check = check.with_rule_file(rules);
    }
    if !args.categories.is_empty() {
        let categories = args
            .categories
            .iter()
            .map(|name| {
                CheckCategory::from_name(name).ok_or_else(|| {
                    CliError::Config(format!(
                        "unknown category '{name}', must be one of: config, performance, default_config"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        check = check.with_categories(categories);
    }
    if let Some(dir) = &args.report_dir {
        check = check.with_report_dir(dir);
    }
    Ok(check)
}

#[derive(Serialize)]
pub struct CheckSummary {
    pub cluster_name: String,
    pub cluster_version: String,
    pub rules_total: usize,
    pub abnormal: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_file: Option<String>,
    pub results: Vec<RuleResult>,
    pub failures: Vec<UnitFailure>,
}

impl CheckSummary {
    fn new(report: CheckReport, files: Option<(std::path::PathBuf, std::path::PathBuf)>) -> Self {
        let abnormal = report.abnormal().count();
        let (report_file, record_file) = match files {
            Some((report, record)) => (
                Some(report.display().to_string()),
                Some(record.display().to_string()),
            ),
            None => (None, None),
        };
        Self {
            cluster_name: report.cluster_info.cluster_name,
            cluster_version: report.cluster_version,
            rules_total: report.rules_total,
            abnormal,
            report_file,
            record_file,
            results: report.results,
            failures: report.failures,
        }
    }
}

impl Render for CheckSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let name = if self.cluster_name.is_empty() {
            "<unnamed>"
        } else {
            self.cluster_name.as_str()
        };
        writeln!(
            w,
            "Check Results: {} {} ({} rules, {} abnormal)",
            name.bold(),
            self.cluster_version,
            self.rules_total,
            if self.abnormal > 0 {
                self.abnormal.to_string().red().bold()
            } else {
                self.abnormal.to_string().green()
            }
        )?;
        writeln!(w)?;
        writeln!(w, "{:<6} {:<36} {:<15} Status", "ID", "Rule", "Type")?;
        writeln!(w, "{}", "-".repeat(70))?;

        for result in &self.results {
            let status = if result.abnormal {
                "ABNORMAL".red().bold()
            } else {
                "OK".green()
            };
            writeln!(
                w,
                "{:<6} {:<36} {:<15} {}",
                result.rule_id, result.rule_name, result.check_type, status
            )?;
            if result.abnormal {
                for deploy in result.deploy_results.iter().filter(|d| d.res != "OK") {
                    writeln!(w, "         {} {} -> {}", deploy.id, deploy.value, deploy.res.yellow())?;
                }
            }
        }

        if !self.failures.is_empty() {
            writeln!(w)?;
            writeln!(w, "Evaluation failures:")?;
            for failure in &self.failures {
                writeln!(w, "  {}: {}", failure.uqi_tag.red(), failure.error)?;
            }
        }

        if let (Some(report), Some(record)) = (&self.report_file, &self.record_file) {
            writeln!(w)?;
            writeln!(w, "Report: {report}")?;
            writeln!(w, "Record: {record}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foresight_checker::DeployResult;
    use std::path::PathBuf;

    fn args() -> CheckArgs {
        CheckArgs {
            data_dir: PathBuf::from("/data/diag"),
            rules: None,
            categories: Vec::new(),
            report_dir: None,
            no_report: true,
            strict: false,
        }
    }

    #[test]
    fn test_build_config_uses_file_defaults() {
        let check = build_config(&args(), &ForesightConfig::default()).expect("config");
        assert!(check.rule_file.is_none());
        assert_eq!(check.categories, vec![CheckCategory::Config]);
        assert_eq!(check.report_dir, PathBuf::from("."));
    }

    #[test]
    fn test_build_config_flags_override() {
        let args = CheckArgs {
            rules: Some(PathBuf::from("rules.toml")),
            categories: vec!["performance".to_owned(), "default_config".to_owned()],
            report_dir: Some(PathBuf::from("/tmp/out")),
            ..args()
        };
        let check = build_config(&args, &ForesightConfig::default()).expect("config");
        assert_eq!(check.rule_file, Some(PathBuf::from("rules.toml")));
        assert_eq!(
            check.categories,
            vec![CheckCategory::Performance, CheckCategory::DefaultConfig]
        );
        assert_eq!(check.report_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_build_config_rejects_unknown_category() {
        let args = CheckArgs {
            categories: vec!["security".to_owned()],
            ..args()
        };
        let err = build_config(&args, &ForesightConfig::default()).err().expect("unknown");
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("unknown category 'security'"));
    }

    fn summary(abnormal: bool) -> CheckSummary {
        CheckSummary {
            cluster_name: "prod".to_owned(),
            cluster_version: "v5.0.1".to_owned(),
            rules_total: 1,
            abnormal: usize::from(abnormal),
            report_file: None,
            record_file: None,
            results: vec![RuleResult {
                rule_name: "tidb-log-level".to_owned(),
                rule_id: 101,
                check_type: "config".to_owned(),
                variation: "TidbConfig.log.level".to_owned(),
                alerting_rule: String::new(),
                suggestion: String::new(),
                abnormal,
                deploy_results: vec![DeployResult {
                    id: "tidb_10.0.1.2:4000".to_owned(),
                    value: "TidbConfig.log.level:debug".to_owned(),
                    res: if abnormal { "warning" } else { "OK" }.to_owned(),
                }],
                table: String::new(),
            }],
            failures: Vec::new(),
        }
    }

    #[test]
    fn test_summary_text_lists_abnormal_targets() {
        let mut buffer = Vec::new();
        summary(true).render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf8");
        assert!(output.contains("tidb-log-level"));
        assert!(output.contains("ABNORMAL"));
        assert!(output.contains("tidb_10.0.1.2:4000 TidbConfig.log.level:debug"));
    }

    #[test]
    fn test_summary_text_hides_ok_targets() {
        let mut buffer = Vec::new();
        summary(false).render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf8");
        assert!(!output.contains("tidb_10.0.1.2:4000"));
    }

    #[test]
    fn test_summary_json_omits_missing_files() {
        let json = serde_json::to_value(summary(true)).expect("json");
        assert!(json.get("report_file").is_none());
        assert_eq!(json["abnormal"].as_u64(), Some(1));
        assert_eq!(json["results"][0]["deploy_results"][0]["res"], "warning");
    }
}
