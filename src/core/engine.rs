//! Provisioning orchestrator.
//!
//! Sequences quota reservation, identity generation, backend invocation,
//! and catalog confirmation for each request. The request moves through
//! RESERVING (transaction 1), INVOKING (no lock held), and CONFIRMING
//! (transaction 2). The reserving transaction commits before the backend
//! runs, which is why an indeterminate outcome survives a crash as a
//! durable pending/revoking record instead of being lost.

use crate::core::backend::{Backend, Outcome, Probe};
use crate::core::catalog::{Catalog, CatalogTxn};
use crate::core::errors::EngineError;
use crate::core::identity;
use crate::core::quota::{self, QuotaStatus};
use crate::models::catalog_file::ProvisionerSection;
use crate::models::record::{CredentialRecord, RecordState};
use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

/// Result of a successful create: the durable record plus the credential
/// material to hand to the requester.
#[derive(Debug)]
pub struct CreatedCredential {
    pub record: CredentialRecord,
    pub material: Zeroizing<Vec<u8>>,
}

/// How a reconciliation probe resolved a flagged record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Backend has the credential; record is now active.
    Activated,
    /// Backend no longer has it; revocation is confirmed.
    MarkedRevoked,
    /// Backend never got it; the create is a confirmed failure.
    MarkedFailed,
    /// Probe could not answer; record stays flagged.
    Unresolved,
}

pub struct ProvisioningEngine<B: Backend> {
    catalog: Catalog,
    backend: B,
    config: ProvisionerSection,
}

impl<B: Backend> ProvisioningEngine<B> {
    pub fn new(catalog: Catalog, backend: B, config: ProvisionerSection) -> Self {
        Self {
            catalog,
            backend,
            config,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Provision a new credential for `owner_id` under `label`.
    pub fn create(
        &self,
        owner_id: &str,
        owner_label: &str,
        label: &str,
    ) -> Result<CreatedCredential, EngineError> {
        self.create_with_clock(owner_id, owner_label, label, Utc::now(), Utc::now)
    }

    /// Create with an explicit timestamp for the identity and a clock for
    /// its one collision retry. Split out so tests can force collisions.
    fn create_with_clock(
        &self,
        owner_id: &str,
        owner_label: &str,
        label: &str,
        now: DateTime<Utc>,
        retry_clock: impl FnOnce() -> DateTime<Utc>,
    ) -> Result<CreatedCredential, EngineError> {
        let label = label.trim();

        // RESERVING: validation, quota, identity, and the pending record
        // all commit in one transaction before any external call.
        let (record_id, external_identity) = {
            let mut txn = self.catalog.begin()?;
            txn.upsert_user(owner_id, owner_label, now);
            if txn.label_taken(owner_id, label) {
                return Err(EngineError::DuplicateLabel {
                    label: label.to_string(),
                });
            }
            quota::reserve(&txn, owner_id, self.config.quota)?;
            let external_identity =
                self.unique_identity(&txn, owner_id, label, now, retry_clock)?;
            let record_id = txn.insert_pending(owner_id, label, &external_identity, now);
            txn.commit()?;
            (record_id, external_identity)
        };

        // INVOKING: sole blocking step, bounded by the backend timeout,
        // with no catalog lock held.
        let outcome = self.backend.provision(&external_identity);

        // CONFIRMING
        let now = Utc::now();
        let mut txn = self.catalog.begin()?;
        match outcome {
            Outcome::Success(material) => {
                let record = require_record(&mut txn, record_id)?;
                record.transition(RecordState::Active, now);
                let record = record.clone();
                txn.commit()?;
                Ok(CreatedCredential { record, material })
            }
            Outcome::Failure(diagnostic) => {
                let record = require_record(&mut txn, record_id)?;
                record.transition(RecordState::Failed, now);
                txn.commit()?;
                Err(EngineError::BackendFailure { diagnostic })
            }
            Outcome::Indeterminate => {
                let record = require_record(&mut txn, record_id)?;
                record.flag_for_reconciliation(now);
                txn.commit()?;
                Err(EngineError::BackendIndeterminate)
            }
        }
    }

    /// Revoke `record_id`, which must belong to `owner_id` and be active.
    pub fn revoke(
        &self,
        owner_id: &str,
        record_id: u64,
    ) -> Result<CredentialRecord, EngineError> {
        let external_identity = {
            let mut txn = self.catalog.begin()?;
            let now = Utc::now();
            let record = match txn.record_mut(record_id) {
                Some(record)
                    if record.owner_id == owner_id && record.state == RecordState::Active =>
                {
                    record
                }
                _ => return Err(EngineError::NotOwnedOrInactive),
            };
            record.transition(RecordState::Revoking, now);
            let external_identity = record.external_identity.clone();
            txn.commit()?;
            external_identity
        };

        let outcome = self.backend.revoke(&external_identity);

        let now = Utc::now();
        let mut txn = self.catalog.begin()?;
        match outcome {
            Outcome::Success(_) => {
                let record = require_record(&mut txn, record_id)?;
                record.transition(RecordState::Revoked, now);
                let record = record.clone();
                txn.commit()?;
                Ok(record)
            }
            Outcome::Failure(diagnostic) => {
                let record = require_record(&mut txn, record_id)?;
                record.transition(RecordState::Failed, now);
                txn.commit()?;
                Err(EngineError::BackendFailure { diagnostic })
            }
            Outcome::Indeterminate => {
                let record = require_record(&mut txn, record_id)?;
                record.flag_for_reconciliation(now);
                txn.commit()?;
                Err(EngineError::BackendIndeterminate)
            }
        }
    }

    /// All records for an owner, every state included. Pending records
    /// flagged for reconciliation are the caller's "pending verification"
    /// view.
    pub fn list(&self, owner_id: &str) -> Result<Vec<CredentialRecord>, EngineError> {
        let file = self.catalog.snapshot()?;
        Ok(file
            .records
            .into_iter()
            .filter(|r| r.owner_id == owner_id)
            .collect())
    }

    pub fn quota_status(&self, owner_id: &str) -> Result<QuotaStatus, EngineError> {
        let file = self.catalog.snapshot()?;
        Ok(quota::status(&file, owner_id, self.config.quota))
    }

    /// Records awaiting reconciliation, across all owners.
    pub fn flagged_records(&self) -> Result<Vec<CredentialRecord>, EngineError> {
        let file = self.catalog.snapshot()?;
        Ok(file
            .records
            .into_iter()
            .filter(|r| r.needs_reconciliation)
            .collect())
    }

    /// Resolve one flagged record by asking the backend whether its
    /// identity actually exists. Operator-triggered; never part of the
    /// create/revoke hot path.
    pub fn reconcile(
        &self,
        record_id: u64,
    ) -> Result<(CredentialRecord, Reconciliation), EngineError> {
        let (external_identity, observed_state) = {
            let file = self.catalog.snapshot()?;
            let record = file
                .records
                .iter()
                .find(|r| r.id == record_id)
                .ok_or(EngineError::NotOwnedOrInactive)?;
            // An in-flight record whose confirming transaction never landed
            // (crash, persistence error after the backend call) is
            // reconcilable even though the flag was never set.
            let eligible = record.needs_reconciliation
                || matches!(record.state, RecordState::Pending | RecordState::Revoking);
            if !eligible {
                return Err(EngineError::NotOwnedOrInactive);
            }
            (record.external_identity.clone(), record.state)
        };

        // Probe without holding the catalog lock.
        let probe = self.backend.probe(&external_identity);

        let now = Utc::now();
        let mut txn = self.catalog.begin()?;
        let record = require_record(&mut txn, record_id)?;
        // Someone may have resolved it while we probed.
        if record.state != observed_state {
            let record = record.clone();
            return Ok((record, Reconciliation::Unresolved));
        }

        let resolution = match (observed_state, probe) {
            (RecordState::Pending, Probe::Exists) => {
                record.transition(RecordState::Active, now);
                Reconciliation::Activated
            }
            (RecordState::Pending, Probe::Absent) => {
                record.transition(RecordState::Failed, now);
                Reconciliation::MarkedFailed
            }
            (RecordState::Revoking, Probe::Absent) => {
                record.transition(RecordState::Revoked, now);
                Reconciliation::MarkedRevoked
            }
            // The revocation never took effect: the credential is live, so
            // the catalog must say so. The caller may retry the revoke.
            (RecordState::Revoking, Probe::Exists) => {
                record.transition(RecordState::Active, now);
                Reconciliation::Activated
            }
            _ => Reconciliation::Unresolved,
        };

        let record = record.clone();
        if resolution != Reconciliation::Unresolved {
            txn.commit()?;
        }
        Ok((record, resolution))
    }

    fn unique_identity(
        &self,
        txn: &CatalogTxn<'_>,
        owner_id: &str,
        label: &str,
        now: DateTime<Utc>,
        retry_clock: impl FnOnce() -> DateTime<Utc>,
    ) -> Result<String, EngineError> {
        let first = identity::generate(&self.config.identity_prefix, owner_id, label, now);
        if !txn.identity_exists(&first) {
            return Ok(first);
        }
        // One retry with a fresh timestamp, then give up; blind loops here
        // would only mask a broken clock or a runaway caller. The clock is
        // sampled only now so the retry reflects any time that has passed
        // since the first attempt.
        let second =
            identity::generate(&self.config.identity_prefix, owner_id, label, retry_clock());
        if second != first && !txn.identity_exists(&second) {
            return Ok(second);
        }
        Err(EngineError::IdentityCollisionRetryExhausted)
    }
}

fn require_record<'a>(
    txn: &'a mut CatalogTxn<'_>,
    record_id: u64,
) -> Result<&'a mut CredentialRecord, EngineError> {
    txn.record_mut(record_id).ok_or_else(|| {
        EngineError::Persistence(anyhow::anyhow!(
            "record {} vanished from catalog",
            record_id
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::paths::CatalogPaths;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Scripted fake: fixed outcome per action, call counting for
    /// no-double-invocation assertions.
    struct FakeBackend {
        mode: Mode,
        probe: Probe,
        provision_calls: AtomicUsize,
        revoke_calls: AtomicUsize,
        identities: Mutex<Vec<String>>,
    }

    #[derive(Clone, Copy)]
    enum Mode {
        Succeed,
        Fail,
        Hang,
    }

    impl FakeBackend {
        fn new(mode: Mode) -> Self {
            Self {
                mode,
                probe: Probe::Unknown,
                provision_calls: AtomicUsize::new(0),
                revoke_calls: AtomicUsize::new(0),
                identities: Mutex::new(Vec::new()),
            }
        }

        fn with_probe(mode: Mode, probe: Probe) -> Self {
            Self {
                probe,
                ..Self::new(mode)
            }
        }

        fn outcome(&self) -> Outcome {
            match self.mode {
                Mode::Succeed => Outcome::Success(Zeroizing::new(b"material".to_vec())),
                Mode::Fail => Outcome::Failure("exit status 1: CA error".into()),
                Mode::Hang => Outcome::Indeterminate,
            }
        }
    }

    impl Backend for FakeBackend {
        fn provision(&self, identity: &str) -> Outcome {
            self.provision_calls.fetch_add(1, Ordering::SeqCst);
            self.identities.lock().unwrap().push(identity.to_string());
            self.outcome()
        }

        fn revoke(&self, _identity: &str) -> Outcome {
            self.revoke_calls.fetch_add(1, Ordering::SeqCst);
            self.outcome()
        }

        fn probe(&self, _identity: &str) -> Probe {
            self.probe
        }
    }

    fn engine_with(
        mode: Mode,
        quota: u32,
    ) -> (TempDir, ProvisioningEngine<FakeBackend>) {
        engine_with_probe(mode, Probe::Unknown, quota)
    }

    fn engine_with_probe(
        mode: Mode,
        probe: Probe,
        quota: u32,
    ) -> (TempDir, ProvisioningEngine<FakeBackend>) {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::open(CatalogPaths::from_root(dir.path().to_path_buf()));
        let config = ProvisionerSection {
            quota,
            ..ProvisionerSection::default()
        };
        let engine = ProvisioningEngine::new(catalog, FakeBackend::with_probe(mode, probe), config);
        (dir, engine)
    }

    #[test]
    fn test_create_success_activates_record() {
        let (_dir, engine) = engine_with(Mode::Succeed, 3);
        let created = engine.create("u1", "Alice", "phone").unwrap();
        assert_eq!(created.record.state, RecordState::Active);
        assert_eq!(created.record.label, "phone");
        assert_eq!(&created.material[..], b"material");

        let records = engine.list("u1").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].state, RecordState::Active);
    }

    #[test]
    fn test_create_failure_marks_failed_and_releases_quota() {
        let (dir, engine) = engine_with(Mode::Fail, 1);
        let err = engine.create("u1", "Alice", "phone").unwrap_err();
        assert!(matches!(err, EngineError::BackendFailure { .. }));
        assert_eq!(engine.list("u1").unwrap()[0].state, RecordState::Failed);

        // The failed record freed both the quota slot and the label.
        let catalog = Catalog::open(CatalogPaths::from_root(dir.path().to_path_buf()));
        let engine2 = ProvisioningEngine::new(
            catalog,
            FakeBackend::new(Mode::Succeed),
            ProvisionerSection {
                quota: 1,
                ..ProvisionerSection::default()
            },
        );
        let created = engine2.create("u1", "Alice", "phone").unwrap();
        assert_eq!(created.record.state, RecordState::Active);
    }

    #[test]
    fn test_create_indeterminate_stays_pending_and_flagged() {
        let (_dir, engine) = engine_with(Mode::Hang, 3);
        let err = engine.create("u1", "Alice", "phone").unwrap_err();
        assert!(matches!(err, EngineError::BackendIndeterminate));

        let records = engine.list("u1").unwrap();
        assert_eq!(records[0].state, RecordState::Pending);
        assert!(records[0].needs_reconciliation);

        // Pending verification still occupies the quota slot.
        let status = engine.quota_status("u1").unwrap();
        assert_eq!(status.active, 0);
        assert_eq!(status.pending, 1);
    }

    #[test]
    fn test_duplicate_label_is_case_insensitive() {
        let (_dir, engine) = engine_with(Mode::Succeed, 3);
        engine.create("u1", "Alice", "phone").unwrap();
        let err = engine.create("u1", "Alice", "PHONE").unwrap_err();
        assert!(matches!(err, EngineError::DuplicateLabel { .. }));
        // A different owner may reuse the label.
        engine.create("u2", "Bob", "phone").unwrap();
    }

    #[test]
    fn test_quota_exceeded() {
        let (_dir, engine) = engine_with(Mode::Succeed, 2);
        engine.create("u1", "Alice", "phone").unwrap();
        engine.create("u1", "Alice", "laptop").unwrap();
        let err = engine.create("u1", "Alice", "tablet").unwrap_err();
        assert!(matches!(err, EngineError::QuotaExceeded { quota: 2 }));
    }

    #[test]
    fn test_revoke_happy_path() {
        let (_dir, engine) = engine_with(Mode::Succeed, 3);
        let created = engine.create("u1", "Alice", "phone").unwrap();
        let revoked = engine.revoke("u1", created.record.id).unwrap();
        assert_eq!(revoked.state, RecordState::Revoked);
        assert_eq!(engine.quota_status("u1").unwrap().remaining(), 3);
    }

    #[test]
    fn test_double_revoke_does_not_reinvoke_backend() {
        let (_dir, engine) = engine_with(Mode::Succeed, 3);
        let created = engine.create("u1", "Alice", "phone").unwrap();
        engine.revoke("u1", created.record.id).unwrap();
        let err = engine.revoke("u1", created.record.id).unwrap_err();
        assert!(matches!(err, EngineError::NotOwnedOrInactive));
        let err = engine.revoke("u1", created.record.id).unwrap_err();
        assert!(matches!(err, EngineError::NotOwnedOrInactive));
        assert_eq!(engine.backend.revoke_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_revoke_rejects_foreign_and_missing_records() {
        let (_dir, engine) = engine_with(Mode::Succeed, 3);
        let created = engine.create("u1", "Alice", "phone").unwrap();
        assert!(matches!(
            engine.revoke("u2", created.record.id).unwrap_err(),
            EngineError::NotOwnedOrInactive
        ));
        assert!(matches!(
            engine.revoke("u1", 999).unwrap_err(),
            EngineError::NotOwnedOrInactive
        ));
        // No backend call was made for either rejection.
        assert_eq!(engine.backend.revoke_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_revoke_then_recreate_gets_fresh_identity() {
        let (_dir, engine) = engine_with(Mode::Succeed, 3);
        let first = engine.create("u1", "Alice", "phone").unwrap();
        engine.revoke("u1", first.record.id).unwrap();
        let second = engine.create("u1", "Alice", "phone").unwrap();
        assert_ne!(
            first.record.external_identity,
            second.record.external_identity
        );

        // Both records persist; identities stay unique across all states.
        let records = engine.list("u1").unwrap();
        assert_eq!(records.len(), 2);
        let mut identities: Vec<_> =
            records.iter().map(|r| r.external_identity.clone()).collect();
        identities.sort();
        identities.dedup();
        assert_eq!(identities.len(), 2);
    }

    #[test]
    fn test_identity_collision_retries_once() {
        let (_dir, engine) = engine_with(Mode::Succeed, 3);
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let retry = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 1).unwrap();

        // Occupy the identity the first attempt will derive.
        let colliding = identity::generate(
            constants_prefix(&engine),
            "u1",
            "phone",
            now,
        );
        let mut txn = engine.catalog().begin().unwrap();
        txn.insert_pending("u9", "other", &colliding, now);
        txn.commit().unwrap();

        let created = engine
            .create_with_clock("u1", "Alice", "phone", now, || retry)
            .unwrap();
        assert_ne!(created.record.external_identity, colliding);
        // The backend was invoked with the retried identity, never the
        // colliding one.
        let seen = engine.backend.identities.lock().unwrap();
        assert_eq!(seen.as_slice(), [created.record.external_identity.clone()]);
    }

    #[test]
    fn test_retry_clock_sampled_only_on_collision() {
        let (_dir, engine) = engine_with(Mode::Succeed, 3);
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let sampled = std::cell::Cell::new(false);
        engine
            .create_with_clock("u1", "Alice", "phone", now, || {
                sampled.set(true);
                now
            })
            .unwrap();
        assert!(!sampled.get());

        // A colliding identity from another owner forces the one retry; the
        // clock must be read at that point, not up front.
        let colliding = identity::generate(constants_prefix(&engine), "u2", "phone", now);
        let mut txn = engine.catalog().begin().unwrap();
        txn.insert_pending("u9", "other", &colliding, now);
        txn.commit().unwrap();

        let retry = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 1).unwrap();
        engine
            .create_with_clock("u2", "Bob", "phone", now, || {
                sampled.set(true);
                retry
            })
            .unwrap();
        assert!(sampled.get());
    }

    #[test]
    fn test_identity_collision_retry_exhausted() {
        let (_dir, engine) = engine_with(Mode::Succeed, 3);
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        let colliding = identity::generate(constants_prefix(&engine), "u1", "phone", now);
        let mut txn = engine.catalog().begin().unwrap();
        txn.insert_pending("u9", "other", &colliding, now);
        txn.commit().unwrap();

        // Retry with the same second regenerates the same identity.
        let err = engine
            .create_with_clock("u1", "Alice", "phone", now, || now)
            .unwrap_err();
        assert!(matches!(err, EngineError::IdentityCollisionRetryExhausted));
        // No pending record was committed and no backend call happened.
        assert!(engine.list("u1").unwrap().is_empty());
        assert_eq!(engine.backend.provision_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reconcile_pending_exists_activates() {
        let (_dir, engine) = engine_with_probe(Mode::Hang, Probe::Exists, 3);
        engine.create("u1", "Alice", "phone").unwrap_err();
        let id = engine.list("u1").unwrap()[0].id;

        let (record, resolution) = engine.reconcile(id).unwrap();
        assert_eq!(resolution, Reconciliation::Activated);
        assert_eq!(record.state, RecordState::Active);
        assert!(!record.needs_reconciliation);
        assert_eq!(engine.quota_status("u1").unwrap().active, 1);
    }

    #[test]
    fn test_reconcile_pending_absent_fails() {
        let (_dir, engine) = engine_with_probe(Mode::Hang, Probe::Absent, 3);
        engine.create("u1", "Alice", "phone").unwrap_err();
        let id = engine.list("u1").unwrap()[0].id;

        let (record, resolution) = engine.reconcile(id).unwrap();
        assert_eq!(resolution, Reconciliation::MarkedFailed);
        assert_eq!(record.state, RecordState::Failed);
    }

    #[test]
    fn test_reconcile_unknown_probe_leaves_record_flagged() {
        let (_dir, engine) = engine_with_probe(Mode::Hang, Probe::Unknown, 3);
        engine.create("u1", "Alice", "phone").unwrap_err();
        let id = engine.list("u1").unwrap()[0].id;

        let (_, resolution) = engine.reconcile(id).unwrap();
        assert_eq!(resolution, Reconciliation::Unresolved);
        let records = engine.list("u1").unwrap();
        assert_eq!(records[0].state, RecordState::Pending);
        assert!(records[0].needs_reconciliation);
    }

    #[test]
    fn test_reconcile_revoking_absent_marks_revoked() {
        let (_dir, engine) = engine_with_probe(Mode::Succeed, Probe::Absent, 3);
        let created = engine.create("u1", "Alice", "phone").unwrap();

        // Flip the record into a flagged revoking state by hand, as a
        // crashed revoke would leave it.
        let mut txn = engine.catalog().begin().unwrap();
        let record = txn.record_mut(created.record.id).unwrap();
        record.transition(RecordState::Revoking, Utc::now());
        record.flag_for_reconciliation(Utc::now());
        txn.commit().unwrap();

        let (record, resolution) = engine.reconcile(created.record.id).unwrap();
        assert_eq!(resolution, Reconciliation::MarkedRevoked);
        assert_eq!(record.state, RecordState::Revoked);
    }

    #[test]
    fn test_reconcile_revoking_exists_reactivates() {
        let (_dir, engine) = engine_with_probe(Mode::Succeed, Probe::Exists, 3);
        let created = engine.create("u1", "Alice", "phone").unwrap();

        let mut txn = engine.catalog().begin().unwrap();
        let record = txn.record_mut(created.record.id).unwrap();
        record.transition(RecordState::Revoking, Utc::now());
        record.flag_for_reconciliation(Utc::now());
        txn.commit().unwrap();

        let (record, resolution) = engine.reconcile(created.record.id).unwrap();
        assert_eq!(resolution, Reconciliation::Activated);
        assert_eq!(record.state, RecordState::Active);
    }

    #[test]
    fn test_reconcile_rejects_settled_records() {
        let (_dir, engine) = engine_with(Mode::Succeed, 3);
        let created = engine.create("u1", "Alice", "phone").unwrap();
        let err = engine.reconcile(created.record.id).unwrap_err();
        assert!(matches!(err, EngineError::NotOwnedOrInactive));
    }

    #[test]
    fn test_reconcile_accepts_unflagged_pending_record() {
        // A crash between the backend call and the confirming transaction
        // leaves a pending record with no flag set.
        let (_dir, engine) = engine_with_probe(Mode::Succeed, Probe::Exists, 3);
        let now = Utc::now();
        let id = {
            let mut txn = engine.catalog().begin().unwrap();
            let id = txn.insert_pending("u1", "phone", "vpn_phone_u1_x", now);
            txn.commit().unwrap();
            id
        };

        let (record, resolution) = engine.reconcile(id).unwrap();
        assert_eq!(resolution, Reconciliation::Activated);
        assert_eq!(record.state, RecordState::Active);
    }

    #[test]
    fn test_flagged_records_lists_all_owners() {
        let (_dir, engine) = engine_with(Mode::Hang, 3);
        engine.create("u1", "Alice", "phone").unwrap_err();
        engine.create("u2", "Bob", "laptop").unwrap_err();
        let flagged = engine.flagged_records().unwrap();
        assert_eq!(flagged.len(), 2);
    }

    fn constants_prefix<'a>(engine: &'a ProvisioningEngine<FakeBackend>) -> &'a str {
        &engine.config.identity_prefix
    }
}
