//! `foresight rules` command handler

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use foresight_checker::rule::BUNDLED_SOURCE;
use foresight_checker::{Program, Rule, RuleSpec};
use foresight_core::config::ForesightConfig;

use crate::cli::{RulesAction, RulesArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `rules` command.
pub async fn execute(
    args: RulesArgs,
    config: &ForesightConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        RulesAction::List { version, rules } => {
            let path = rules.or_else(|| {
                (!config.check.rule_file.is_empty()).then(|| PathBuf::from(&config.check.rule_file))
            });
            execute_list(path.as_deref(), version, writer).await
        }
        RulesAction::Validate { path } => execute_validate(&path, writer).await,
    }
}

async fn execute_list(
    path: Option<&Path>,
    version: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let spec = RuleSpec::load(path).await?;
    let source = path.map_or_else(|| BUNDLED_SOURCE.to_owned(), |p| p.display().to_string());
    let report = list_report(&spec, source, version)?;
    writer.render(&report)
}

fn list_report(
    spec: &RuleSpec,
    source: String,
    version: Option<String>,
) -> Result<RuleListReport, CliError> {
    let rules: Vec<RuleEntry> = match &version {
        Some(v) => spec
            .filter_on_version(v)?
            .iter()
            .map(|r| RuleEntry::from(r.as_ref()))
            .collect(),
        None => spec.rule.iter().map(RuleEntry::from).collect(),
    };
    Ok(RuleListReport {
        source,
        version,
        total: rules.len(),
        rules,
    })
}

async fn execute_validate(path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %path.display(), "validating check rules");

    let report = match RuleSpec::load_file(path).await {
        Ok(spec) => validate_spec(path, &spec),
        Err(e) => RuleValidationReport {
            path: path.display().to_string(),
            total: 0,
            valid: 0,
            invalid: 1,
            errors: vec![RuleError {
                rule: None,
                error: e.to_string(),
            }],
        },
    };

    writer.render(&report)?;

    if report.invalid > 0 {
        return Err(CliError::Rule(format!("{} invalid rules", report.invalid)));
    }
    Ok(())
}

/// Compiles every rule expression; the loader has already checked fields and versions.
fn validate_spec(path: &Path, spec: &RuleSpec) -> RuleValidationReport {
    let errors: Vec<RuleError> = spec
        .rule
        .iter()
        .filter_map(|rule| {
            Program::compile(&rule.execute_rule).err().map(|e| RuleError {
                rule: Some(rule.name.clone()),
                error: e.to_string(),
            })
        })
        .collect();
    RuleValidationReport {
        path: path.display().to_string(),
        total: spec.len(),
        valid: spec.len() - errors.len(),
        invalid: errors.len(),
        errors,
    }
}

#[derive(Serialize)]
pub struct RuleListReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub total: usize,
    pub rules: Vec<RuleEntry>,
}

#[derive(Serialize)]
pub struct RuleEntry {
    pub id: i64,
    pub name: String,
    pub check_type: String,
    pub name_struct: String,
    pub warn_level: String,
    pub version: String,
}

impl From<&Rule> for RuleEntry {
    fn from(rule: &Rule) -> Self {
        Self {
            id: rule.id,
            name: rule.name.clone(),
            check_type: rule.check_type.clone(),
            name_struct: rule.name_struct.clone(),
            warn_level: rule.warn_level.clone(),
            version: rule.version.as_str().to_owned(),
        }
    }
}

impl Render for RuleListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match &self.version {
            Some(v) => writeln!(
                w,
                "Check Rules ({} for {v}, source: {})",
                self.total.to_string().bold(),
                self.source
            )?,
            None => writeln!(
                w,
                "Check Rules ({} total, source: {})",
                self.total.to_string().bold(),
                self.source
            )?,
        }
        writeln!(w)?;
        writeln!(
            w,
            "{:<6} {:<36} {:<15} {:<22} {:<8} Version",
            "ID", "Name", "Type", "Name Struct", "Level"
        )?;
        writeln!(w, "{}", "-".repeat(100))?;

        for r in &self.rules {
            let level = match r.warn_level.as_str() {
                "error" => r.warn_level.red(),
                "warning" => r.warn_level.yellow(),
                _ => r.warn_level.normal(),
            };
            let version = if r.version.is_empty() { "*" } else { r.version.as_str() };
            writeln!(
                w,
                "{:<6} {:<36} {:<15} {:<22} {:<8} {}",
                r.id, r.name, r.check_type, r.name_struct, level, version
            )?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct RuleValidationReport {
    pub path: String,
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub errors: Vec<RuleError>,
}

#[derive(Serialize)]
pub struct RuleError {
    /// `None` when the whole file failed to load.
    pub rule: Option<String>,
    pub error: String,
}

impl Render for RuleValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Rule Validation: {}", self.path.bold())?;
        writeln!(
            w,
            "  Rules: {} total, {} valid, {} invalid",
            self.total,
            self.valid.to_string().green(),
            if self.invalid > 0 {
                self.invalid.to_string().red()
            } else {
                self.invalid.to_string().normal()
            }
        )?;

        if !self.errors.is_empty() {
            writeln!(w)?;
            writeln!(w, "Errors:")?;
            for e in &self.errors {
                let target = e.rule.as_deref().unwrap_or("<file>");
                writeln!(w, "  {}: {}", target.red(), e.error)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = r#"
[[rule]]
id = 1
name = "R1"
execute_rule = 'rule "R1" begin return true end'
name_struct = "TidbConfig"
check_type = "config"
version = ">=v5.0.1,<v5.0.2"

[[rule]]
id = 2
name = "R2"
execute_rule = 'rule "R2" begin return 1 + end'
name_struct = "TidbConfig"
check_type = "config"
version = "<v4.0.2||>=v5.0"
"#;

    fn spec() -> RuleSpec {
        RuleSpec::parse_toml(RULES, "rules.toml").expect("valid corpus")
    }

    #[test]
    fn test_list_report_filters_on_version() {
        let report = list_report(&spec(), "rules.toml".to_owned(), Some("v4.0.1".to_owned()))
            .expect("list");
        assert_eq!(report.total, 1);
        assert_eq!(report.rules[0].name, "R2");

        let all = list_report(&spec(), "rules.toml".to_owned(), None).expect("list");
        assert_eq!(all.total, 2);
        assert_eq!(all.rules[0].version, ">=v5.0.1,<v5.0.2");
    }

    #[test]
    fn test_list_report_rejects_bad_version() {
        assert!(list_report(&spec(), String::new(), Some("not-a-version".to_owned())).is_err());
    }

    #[test]
    fn test_validate_spec_reports_compile_errors() {
        let report = validate_spec(Path::new("rules.toml"), &spec());
        assert_eq!(report.total, 2);
        assert_eq!(report.valid, 1);
        assert_eq!(report.invalid, 1);
        assert_eq!(report.errors[0].rule.as_deref(), Some("R2"));
    }

    #[test]
    fn test_bundled_corpus_compiles() {
        let spec = RuleSpec::bundled().expect("bundled corpus");
        let report = validate_spec(Path::new(BUNDLED_SOURCE), &spec);
        assert_eq!(report.invalid, 0, "{:?}", report.errors.first().map(|e| &e.error));
    }

    #[test]
    fn test_validation_report_text() {
        let report = validate_spec(Path::new("rules.toml"), &spec());
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf8");
        assert!(output.contains("2 total"));
        assert!(output.contains("R2"));
    }
}
