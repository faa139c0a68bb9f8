//! Credential record and its lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a credential record.
///
/// `Pending` and `Revoking` are in-flight states: the backend call has been
/// started (or is about to start) and the final outcome is not yet durable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    Pending,
    Active,
    Revoking,
    Revoked,
    Failed,
}

impl RecordState {
    /// States that hold the owner's `(owner, label)` slot. A revoked or
    /// failed record frees the label for reuse.
    pub fn is_active_equivalent(self) -> bool {
        matches!(
            self,
            RecordState::Pending | RecordState::Active | RecordState::Revoking
        )
    }

    /// States counted against the owner's quota. `Revoking` is excluded:
    /// the slot is already on its way out, and counting it would let a
    /// stuck revocation block new creates forever.
    pub fn counts_toward_quota(self) -> bool {
        matches!(self, RecordState::Pending | RecordState::Active)
    }
}

impl std::fmt::Display for RecordState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecordState::Pending => "pending",
            RecordState::Active => "active",
            RecordState::Revoking => "revoking",
            RecordState::Revoked => "revoked",
            RecordState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A single provisioned credential. Records are never deleted; revocation
/// and failure are recorded as state transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Catalog-assigned key, unique across the catalog lifetime.
    pub id: u64,
    /// Owning user; immutable after creation.
    pub owner_id: String,
    /// User-chosen display name, unique per owner among active-equivalent
    /// records (case-insensitive).
    pub label: String,
    /// Identity the backend knows this credential by. Unique across the
    /// whole catalog and never reused, even after revocation.
    pub external_identity: String,
    pub state: RecordState,
    /// Set when a backend outcome was indeterminate and the record awaits
    /// an explicit reconciliation probe.
    #[serde(default)]
    pub needs_reconciliation: bool,
    pub created_at: DateTime<Utc>,
    pub state_changed_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Apply a confirmed state transition and clear the reconciliation flag.
    pub fn transition(&mut self, state: RecordState, now: DateTime<Utc>) {
        self.state = state;
        self.state_changed_at = now;
        self.needs_reconciliation = false;
    }

    /// Leave the in-flight state in place and flag the record for
    /// reconciliation after an indeterminate backend outcome.
    pub fn flag_for_reconciliation(&mut self, now: DateTime<Utc>) {
        self.needs_reconciliation = true;
        self.state_changed_at = now;
    }
}
