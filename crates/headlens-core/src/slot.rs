//! Output slots of a fan-out pass.
//!
//! Slot `i` of a result always belongs to entity `i` of the input. A slot
//! either holds the computed view model or an [`EntityFailure`] that the
//! presentation layer renders as a degraded row.

use serde::Serialize;

use crate::error::{EnrichError, FailureKind};

/// Placeholder text for degraded rows.
pub const UNAVAILABLE: &str = "data unavailable";

/// The outcome for one input entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Slot<T> {
    /// The view model was computed.
    Ready(T),
    /// The entity could not be enriched.
    Unavailable(EntityFailure),
}

impl<T> Slot<T> {
    /// Build a slot from a task outcome.
    pub fn from_outcome(index: usize, label: String, outcome: Result<T, EnrichError>) -> Self {
        match outcome {
            Ok(value) => Self::Ready(value),
            Err(err) => Self::Unavailable(EntityFailure::new(index, label, &err)),
        }
    }

    /// Returns `true` if the view model is present.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// The view model, if present.
    #[must_use]
    pub const fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Unavailable(_) => None,
        }
    }

    /// The failure, if the slot is degraded.
    #[must_use]
    pub const fn failure(&self) -> Option<&EntityFailure> {
        match self {
            Self::Ready(_) => None,
            Self::Unavailable(failure) => Some(failure),
        }
    }
}

/// Why an entity's slot is degraded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityFailure {
    /// Position of the entity in the input.
    pub index: usize,
    /// Human-readable identity of the entity (name or ID).
    pub label: String,
    /// Failure category.
    pub kind: FailureKind,
    /// Error message.
    pub message: String,
}

impl EntityFailure {
    /// Describe a failed task.
    #[must_use]
    pub fn new(index: usize, label: String, error: &EnrichError) -> Self {
        Self {
            index,
            label,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
