//! Error types for headscale API calls.
//!
//! Every failure of a remote call (transport, authorization, non-2xx
//! status, undecodable body) is reported as an [`ApiError`]. Callers
//! decide whether a failure is fatal for a whole pass or only for the
//! entity the call was made for.

use thiserror::Error;

/// Result type alias for headscale API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors that can occur when talking to the headscale API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The server answered with a non-success HTTP status.
    #[error("{endpoint} returned status {status}: {message}")]
    Status {
        /// Endpoint path that was requested.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The request never produced a response (DNS, TLS, connect, timeout).
    #[error("transport error calling {endpoint}: {message}")]
    Transport {
        /// Endpoint path that was requested.
        endpoint: String,
        /// Description of the transport failure.
        message: String,
    },

    /// The response body could not be decoded into the expected records.
    #[error("invalid response from {endpoint}: {message}")]
    InvalidResponse {
        /// Endpoint path that was requested.
        endpoint: String,
        /// Description of the decode failure.
        message: String,
    },

    /// The client was built with unusable settings.
    #[error("invalid client configuration: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },
}

impl ApiError {
    /// Creates a `Status` error.
    #[must_use]
    pub fn status(endpoint: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        }
    }

    /// Creates a `Transport` error.
    #[must_use]
    pub fn transport(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates an `InvalidResponse` error.
    #[must_use]
    pub fn invalid_response(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a `Config` error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// HTTP status code, if the server answered at all.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if the server rejected the API key.
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(self.status_code(), Some(401 | 403))
    }

    /// Returns `true` if retrying the same call later may succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidResponse { .. } | Self::Config { .. } => false,
        }
    }
}
