//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no I/O happens here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Foresight -- log search and configuration check over collected cluster diagnostics.
///
/// Use `foresight <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "foresight", version, about, long_about = None)]
pub struct Cli {
    /// Path to the foresight.toml configuration file.
    #[arg(short, long, global = true, default_value = "foresight.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search a collected log tree and print merged items.
    Search(SearchArgs),

    /// Run the configuration check against a data bundle.
    Check(CheckArgs),

    /// Inspect and validate check rules.
    Rules(RulesArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- search ----

/// Merge every log file under a directory in timestamp order.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Log tree root (`<dir>/<host>/<component>-<port>/<file>`).
    pub dir: PathBuf,

    /// Substring the line (or slow query block) must contain.
    #[arg(short, long, default_value = "")]
    pub text: String,

    /// Minimum level (debug, info, warn, error, fatal).
    #[arg(short, long)]
    pub level: Option<String>,

    /// Inclusive lower time bound (RFC3339).
    #[arg(long)]
    pub begin: Option<String>,

    /// Exclusive upper time bound (RFC3339).
    #[arg(long)]
    pub end: Option<String>,

    /// Maximum number of items to print (0 = unlimited).
    #[arg(long, default_value_t = 100)]
    pub limit: usize,
}

// ---- check ----

/// Evaluate check rules against a collected data bundle.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Data bundle root (contains cluster.json / meta.yaml).
    pub data_dir: PathBuf,

    /// Rule file (default: `[check].rule_file`, else the bundled corpus).
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Check category to enable; repeatable (config, performance, default_config).
    #[arg(long = "category")]
    pub categories: Vec<String>,

    /// Directory for check-report.txt and detailed-check-record.txt.
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Print results without writing report files.
    #[arg(long)]
    pub no_report: bool,

    /// Exit with a non-zero status when any rule is abnormal.
    #[arg(long)]
    pub strict: bool,
}

// ---- rules ----

/// Inspect check rules.
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub action: RulesAction,
}

#[derive(Subcommand, Debug)]
pub enum RulesAction {
    /// List rules, optionally only those applying to a cluster version.
    List {
        /// Cluster version to filter on (e.g. v5.0.1).
        #[arg(long)]
        version: Option<String>,

        /// Rule file (default: `[check].rule_file`, else the bundled corpus).
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Parse a rule file and compile every rule expression.
    Validate {
        /// TOML rule file.
        path: PathBuf,
    },
}

// ---- config ----

/// Manage foresight configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, search, check).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_search_defaults() {
        let cli = Cli::try_parse_from(["foresight", "search", "/data/logs"]).expect("parse");
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.dir, PathBuf::from("/data/logs"));
                assert!(args.text.is_empty());
                assert!(args.level.is_none());
                assert!(args.begin.is_none() && args.end.is_none());
                assert_eq!(args.limit, 100);
            }
            _ => panic!("expected Search command"),
        }
    }

    #[test]
    fn test_cli_parse_search_filters() {
        let cli = Cli::try_parse_from([
            "foresight",
            "search",
            "/data/logs",
            "--text",
            "Welcome",
            "--level",
            "warn",
            "--begin",
            "2021-06-01T10:00:00+08:00",
            "--limit",
            "0",
        ])
        .expect("parse");
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.text, "Welcome");
                assert_eq!(args.level.as_deref(), Some("warn"));
                assert_eq!(args.begin.as_deref(), Some("2021-06-01T10:00:00+08:00"));
                assert_eq!(args.limit, 0);
            }
            _ => panic!("expected Search command"),
        }
    }

    #[test]
    fn test_cli_parse_search_requires_dir() {
        assert!(Cli::try_parse_from(["foresight", "search"]).is_err());
    }

    #[test]
    fn test_cli_parse_check_defaults() {
        let cli = Cli::try_parse_from(["foresight", "check", "/data/diag"]).expect("parse");
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.data_dir, PathBuf::from("/data/diag"));
                assert!(args.rules.is_none());
                assert!(args.categories.is_empty());
                assert!(args.report_dir.is_none());
                assert!(!args.no_report);
                assert!(!args.strict);
            }
            _ => panic!("expected Check command"),
        }
    }

    #[test]
    fn test_cli_parse_check_repeated_categories() {
        let cli = Cli::try_parse_from([
            "foresight",
            "check",
            "/data/diag",
            "--category",
            "config",
            "--category",
            "performance",
            "--rules",
            "rules.toml",
            "--strict",
        ])
        .expect("parse");
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.categories, vec!["config", "performance"]);
                assert_eq!(args.rules, Some(PathBuf::from("rules.toml")));
                assert!(args.strict);
            }
            _ => panic!("expected Check command"),
        }
    }

    #[test]
    fn test_cli_parse_rules_list_with_version() {
        let cli =
            Cli::try_parse_from(["foresight", "rules", "list", "--version", "v5.0.1"]).expect("parse");
        match cli.command {
            Commands::Rules(RulesArgs {
                action: RulesAction::List { version, rules },
            }) => {
                assert_eq!(version.as_deref(), Some("v5.0.1"));
                assert!(rules.is_none());
            }
            _ => panic!("expected rules list"),
        }
    }

    #[test]
    fn test_cli_parse_rules_validate_requires_path() {
        assert!(Cli::try_parse_from(["foresight", "rules", "validate"]).is_err());
        let cli = Cli::try_parse_from(["foresight", "rules", "validate", "r.toml"]).expect("parse");
        match cli.command {
            Commands::Rules(RulesArgs {
                action: RulesAction::Validate { path },
            }) => assert_eq!(path, PathBuf::from("r.toml")),
            _ => panic!("expected rules validate"),
        }
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let cli =
            Cli::try_parse_from(["foresight", "config", "show", "--section", "search"]).expect("parse");
        match cli.command {
            Commands::Config(ConfigArgs {
                action: ConfigAction::Show { section },
            }) => assert_eq!(section.as_deref(), Some("search")),
            _ => panic!("expected config show"),
        }
    }

    #[test]
    fn test_cli_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "foresight",
            "config",
            "validate",
            "--output",
            "json",
            "--log-level",
            "debug",
            "-c",
            "/etc/foresight.toml",
        ])
        .expect("parse");
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config, PathBuf::from("/etc/foresight.toml"));
    }

    #[test]
    fn test_cli_parse_invalid_output_fails() {
        assert!(Cli::try_parse_from(["foresight", "--output", "yaml", "config", "show"]).is_err());
    }

    #[test]
    fn test_cli_parse_missing_command_fails() {
        assert!(Cli::try_parse_from(["foresight"]).is_err());
    }

    #[test]
    fn test_cli_verify_command_structure() {
        let cmd = Cli::command();
        assert_eq!(cmd.get_name(), "foresight");
        let subcommands: Vec<_> = cmd.get_subcommands().map(|s| s.get_name()).collect();
        for name in ["search", "check", "rules", "config"] {
            assert!(subcommands.contains(&name), "should have '{name}' subcommand");
        }
    }
}
