//! Per-owner quota enforcement.
//!
//! `reserve` must run inside the same catalog transaction as the pending
//! record insertion; the transaction lock is what makes check-then-insert
//! race-free across concurrent requests for the same owner.

use crate::core::catalog::CatalogTxn;
use crate::core::errors::EngineError;
use crate::models::catalog_file::CatalogFile;
use crate::models::record::RecordState;
use serde::Serialize;

/// Quota view for one owner, as surfaced to the front-end.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaStatus {
    pub active: u32,
    /// Pending records, including those awaiting reconciliation. These hold
    /// a quota slot but are shown separately from active credentials.
    pub pending: u32,
    pub quota: u32,
}

impl QuotaStatus {
    pub fn remaining(&self) -> u32 {
        self.quota.saturating_sub(self.active + self.pending)
    }
}

/// Check that the owner has a free slot. The caller inserts the pending
/// record in the same transaction before committing.
pub fn reserve(txn: &CatalogTxn<'_>, owner_id: &str, quota: u32) -> Result<(), EngineError> {
    if txn.quota_usage(owner_id) >= quota {
        return Err(EngineError::QuotaExceeded { quota });
    }
    Ok(())
}

/// Compute the owner's quota view from a catalog snapshot.
pub fn status(file: &CatalogFile, owner_id: &str, quota: u32) -> QuotaStatus {
    let mut active = 0;
    let mut pending = 0;
    for record in file.records.iter().filter(|r| r.owner_id == owner_id) {
        match record.state {
            RecordState::Active => active += 1,
            RecordState::Pending => pending += 1,
            _ => {}
        }
    }
    QuotaStatus {
        active,
        pending,
        quota,
    }
}
