//! Engine error taxonomy.
//!
//! Callers match on these variants: validation errors mutate nothing,
//! `BackendFailure` leaves the record failed, and `BackendIndeterminate`
//! leaves the record flagged for reconciliation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The owner already holds `quota` active or pending credentials.
    #[error("active credential quota of {quota} reached")]
    QuotaExceeded { quota: u32 },

    /// The owner already has an active-equivalent credential with this
    /// label (case-insensitive).
    #[error("a credential named '{label}' already exists")]
    DuplicateLabel { label: String },

    /// The target record does not exist, belongs to another owner, or is
    /// not in the `active` state. Deliberately one error: callers learn
    /// nothing about other owners' records.
    #[error("credential not found, not owned by caller, or not active")]
    NotOwnedOrInactive,

    /// The backend reported a definite failure. The record is `failed` and
    /// its quota slot is released.
    #[error("backend invocation failed: {diagnostic}")]
    BackendFailure { diagnostic: String },

    /// The backend outcome is unknown (timeout or killed process). The
    /// record keeps its in-flight state and is flagged for reconciliation;
    /// never retried automatically.
    #[error("backend outcome unknown; credential flagged for reconciliation")]
    BackendIndeterminate,

    /// Identity generation collided twice with existing records.
    #[error("could not derive a unique backend identity after one retry")]
    IdentityCollisionRetryExhausted,

    /// Catalog load or save failed.
    #[error("catalog persistence error: {0}")]
    Persistence(anyhow::Error),
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Persistence(err)
    }
}
