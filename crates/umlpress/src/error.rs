//! CLI error types.

use umlpress_builder::BuildError;
use umlpress_config::ConfigError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Build(#[from] BuildError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("{0} diagram(s) failed to render")]
    DiagramsFailed(usize),
}
