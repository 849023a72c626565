//! Error types for the aggregation core.
//!
//! - [`DataError`]: a record is missing a required field or carries a
//!   value that cannot be interpreted.
//! - [`EnrichError`]: why one enrichment task produced no view model.
//! - [`AggregateError`]: a whole pass failed.

use headlens_api::ApiError;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for whole-pass operations.
pub type AggregateResult<T> = Result<T, AggregateError>;

/// A record from the API cannot be turned into a view model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataError {
    /// A required field is absent or empty.
    #[error("missing required field '{field}'")]
    MissingField {
        /// Wire name of the field.
        field: &'static str,
    },

    /// A timestamp is not valid RFC 3339.
    #[error("unparseable {field} timestamp '{value}': {reason}")]
    InvalidTimestamp {
        /// Wire name of the field.
        field: &'static str,
        /// Raw value received.
        value: String,
        /// Parser message.
        reason: String,
    },

    /// An identifier is not a decimal integer.
    #[error("invalid {field} '{value}'")]
    InvalidId {
        /// Wire name of the field.
        field: &'static str,
        /// Raw value received.
        value: String,
    },
}

impl DataError {
    /// Creates a `MissingField` error.
    #[must_use]
    pub const fn missing(field: &'static str) -> Self {
        Self::MissingField { field }
    }
}

/// Coarse failure category carried in degraded output slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A remote call failed.
    Api,
    /// The record was unusable.
    Data,
    /// The task exceeded its time bound.
    Timeout,
    /// The task panicked or never ran.
    Internal,
}

/// Why a single enrichment task produced no view model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnrichError {
    /// A lookup against the API failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The entity's record was unusable.
    #[error(transparent)]
    Data(#[from] DataError),

    /// The task did not finish within the configured bound.
    #[error("task did not finish within {timeout_ms} ms")]
    Timeout {
        /// Bound that was exceeded, in milliseconds.
        timeout_ms: u64,
    },

    /// The task panicked.
    #[error("task panicked: {message}")]
    Panicked {
        /// Panic payload, when it was a string.
        message: String,
    },

    /// The worker pool was shut down before the task could run.
    #[error("task was cancelled before it ran")]
    Cancelled,
}

impl EnrichError {
    /// Failure category for presentation.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Api(_) => FailureKind::Api,
            Self::Data(_) => FailureKind::Data,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Panicked { .. } | Self::Cancelled => FailureKind::Internal,
        }
    }

    /// Returns `true` if the task ran out of time.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// A whole aggregation pass failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AggregateError {
    /// A list call the pass depends on failed.
    #[error("failed to fetch {what}: {source}")]
    Api {
        /// What was being fetched.
        what: &'static str,
        /// Underlying API error.
        #[source]
        source: ApiError,
    },

    /// A record needed for a batch-level result was unusable.
    #[error("invalid {entity}: {source}")]
    Data {
        /// Which record was unusable.
        entity: String,
        /// Underlying data error.
        #[source]
        source: DataError,
    },

    /// Every per-entity task failed.
    #[error("all {total} {what} failed; first error: {first}")]
    AllFailed {
        /// Kind of entity being enriched.
        what: &'static str,
        /// Number of entities in the pass.
        total: usize,
        /// Message of the first failure, by input order.
        first: String,
    },
}

impl AggregateError {
    /// Creates an `Api` error.
    #[must_use]
    pub const fn api(what: &'static str, source: ApiError) -> Self {
        Self::Api { what, source }
    }

    /// Creates a `Data` error.
    #[must_use]
    pub fn data(entity: impl Into<String>, source: DataError) -> Self {
        Self::Data {
            entity: entity.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_display() {
        assert_eq!(
            DataError::missing("lastSeen").to_string(),
            "missing required field 'lastSeen'"
        );
        let err = DataError::InvalidId {
            field: "id",
            value: "abc".into(),
        };
        assert_eq!(err.to_string(), "invalid id 'abc'");
    }

    #[test]
    fn test_enrich_error_kind() {
        let api = EnrichError::from(ApiError::status("/x", 500, "boom"));
        assert_eq!(api.kind(), FailureKind::Api);
        assert_eq!(api.to_string(), "/x returned status 500: boom");

        let data = EnrichError::from(DataError::missing("name"));
        assert_eq!(data.kind(), FailureKind::Data);

        let timeout = EnrichError::Timeout { timeout_ms: 250 };
        assert!(timeout.is_timeout());
        assert_eq!(timeout.kind(), FailureKind::Timeout);
        assert_eq!(timeout.to_string(), "task did not finish within 250 ms");

        assert_eq!(EnrichError::Cancelled.kind(), FailureKind::Internal);
    }

    #[test]
    fn test_aggregate_error_display() {
        let cause = ApiError::transport("/api/v1/machine", "refused");
        let err = AggregateError::api("machines", cause);
        assert_eq!(
            err.to_string(),
            "failed to fetch machines: transport error calling /api/v1/machine: refused"
        );

        let err = AggregateError::AllFailed {
            what: "machines",
            total: 3,
            first: "timeout".into(),
        };
        assert_eq!(err.to_string(), "all 3 machines failed; first error: timeout");
    }

    #[test]
    fn test_errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EnrichError>();
        assert_send_sync::<AggregateError>();
    }
}
