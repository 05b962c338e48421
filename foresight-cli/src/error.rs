//! CLI-specific error types and exit code mapping

use foresight_checker::CheckerError;
use foresight_core::error::ForesightError;
use foresight_log_search::LogSearchError;

/// CLI-specific error type.
///
/// `exit_code()` maps each variant to the process exit status.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// Bad subcommand input (unknown section, malformed time bound, ...).
    #[error("{0}")]
    Command(String),

    /// Log search failure.
    #[error("search error: {0}")]
    Search(#[from] LogSearchError),

    /// Check engine failure.
    #[error("check error: {0}")]
    Check(#[from] CheckerError),

    /// Rule file is invalid.
    #[error("rule error: {0}")]
    Rule(String),

    /// `check --strict` found abnormal rules.
    #[error("{0} rules reported abnormal results")]
    Abnormal(usize),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (stdout write, report files, ...).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from foresight-core.
    #[error("{0}")]
    Core(#[from] ForesightError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                         |
    /// |------|---------------------------------|
    /// | 0    | Success                         |
    /// | 1    | General / command error         |
    /// | 2    | Configuration error             |
    /// | 3    | Search failed                   |
    /// | 4    | Abnormal results (`--strict`)   |
    /// | 10   | IO error                        |
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Core(ForesightError::Config(_)) => 2,
            Self::Search(_) => 3,
            Self::Abnormal(_) => 4,
            Self::Io(_) => 10,
            Self::Command(_)
            | Self::Check(_)
            | Self::Rule(_)
            | Self::JsonSerialize(_)
            | Self::Core(_) => 1,
        }
    }
}
