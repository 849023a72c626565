//! CLI error types.

use std::path::PathBuf;

use headlens_api::ApiError;
use headlens_core::AggregateError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The configuration file could not be read.
    #[error("failed to read config file '{}': {source}", path.display())]
    ConfigRead {
        /// Path that was read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this tool.
    #[error("invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The API client could not be built.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// An aggregation pass failed as a whole.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Creates a `Config` error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns `true` if the server rejected our credentials.
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::Api(err) => err.is_auth_error(),
            Self::Aggregate(AggregateError::Api { source, .. }) => source.is_auth_error(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_error_display_config() {
        let err = CliError::config("missing server url");
        assert_eq!(err.to_string(), "configuration error: missing server url");
    }

    #[test]
    fn cli_error_display_config_read() {
        let err = CliError::ConfigRead {
            path: PathBuf::from("/nope.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "failed to read config file '/nope.toml': not found");
    }

    #[test]
    fn cli_error_auth_classification() {
        let err = CliError::from(AggregateError::api(
            "machines",
            ApiError::status("/api/v1/machine", 401, "unauthorized"),
        ));
        assert!(err.is_auth_error());
        assert!(!CliError::config("x").is_auth_error());
    }

    #[test]
    fn cli_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let cli_err = CliError::from(io_err);
        assert!(matches!(cli_err, CliError::Io(_)));
    }
}
