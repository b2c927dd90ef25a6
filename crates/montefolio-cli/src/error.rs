use montefolio_core::{CoreError, ValidationError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("command error: {0}")]
    Command(String),

    #[error("strict mode failed: warnings={warning_count}, errors={error_count}")]
    StrictModeViolation {
        warning_count: usize,
        error_count: usize,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) | Self::Core(CoreError::Validation(_)) => 2,
            Self::Core(_) | Self::Config(_) => 3,
            Self::StrictModeViolation { .. } => 5,
            Self::Command(_) | Self::Serialization(_) | Self::Io(_) => 10,
        }
    }

    /// Stable code for envelope error records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "core.validation",
            Self::Core(error) => error.code(),
            Self::Config(_) => "cli.config",
            Self::Command(_) => "cli.command",
            Self::StrictModeViolation { .. } => "cli.strict_mode",
            Self::Serialization(_) => "cli.serialization",
            Self::Io(_) => "cli.io",
        }
    }
}
