//! Durable credential catalog.
//!
//! The catalog is one TOML document persisted atomically (temp file plus
//! rename, mode 0600). A transaction is the exclusive-lock window from load
//! to saved commit: every read-then-write that establishes an invariant
//! (quota check plus insert, ownership check plus transition) happens inside
//! one `CatalogTxn`, so concurrent requests serialize instead of racing.
//! No transaction is held across a backend invocation.

use crate::constants;
use crate::core::file_lock::FileLock;
use crate::core::paths::CatalogPaths;
use crate::models::catalog_file::CatalogFile;
use crate::models::record::{CredentialRecord, RecordState};
use crate::models::user::UserMeta;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Handle to the on-disk catalog. Cheap to clone; all state lives on disk.
#[derive(Debug, Clone)]
pub struct Catalog {
    paths: CatalogPaths,
}

impl Catalog {
    pub fn open(paths: CatalogPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &CatalogPaths {
        &self.paths
    }

    /// Begin a transaction: take the exclusive lock, then load the current
    /// document. Mutations become durable only on `commit`.
    pub fn begin(&self) -> Result<CatalogTxn<'_>> {
        let lock = FileLock::exclusive(&self.paths.catalog_lock)?;
        let file = load(&self.paths.catalog_toml)?;
        Ok(CatalogTxn {
            paths: &self.paths,
            _lock: lock,
            file,
        })
    }

    /// Read a consistent snapshot without taking the lock. Safe because the
    /// document is replaced atomically; used for list-style views only.
    pub fn snapshot(&self) -> Result<CatalogFile> {
        load(&self.paths.catalog_toml)
    }
}

/// An open catalog transaction. Dropping without `commit` discards all
/// mutations (the document on disk was never touched).
pub struct CatalogTxn<'a> {
    paths: &'a CatalogPaths,
    _lock: FileLock,
    pub file: CatalogFile,
}

impl CatalogTxn<'_> {
    /// Persist the document atomically and release the lock.
    pub fn commit(self) -> Result<()> {
        save(&self.paths.catalog_toml, &self.file)
    }

    /// Register or refresh a user on contact.
    pub fn upsert_user(&mut self, id: &str, label: &str, now: DateTime<Utc>) {
        if let Some(user) = self.file.users.iter_mut().find(|u| u.id == id) {
            user.label = label.to_string();
            user.last_seen = now;
            return;
        }
        self.file.users.push(UserMeta {
            id: id.to_string(),
            label: label.to_string(),
            first_seen: now,
            last_seen: now,
        });
        self.file.users.sort_by(|a, b| a.id.cmp(&b.id));
    }

    /// Whether the owner already holds this label in an active-equivalent
    /// state (case-insensitive).
    pub fn label_taken(&self, owner_id: &str, label: &str) -> bool {
        let wanted = label.to_lowercase();
        self.file.records.iter().any(|r| {
            r.owner_id == owner_id
                && r.state.is_active_equivalent()
                && r.label.to_lowercase() == wanted
        })
    }

    /// Records counted against the owner's quota (active plus pending).
    pub fn quota_usage(&self, owner_id: &str) -> u32 {
        self.file
            .records
            .iter()
            .filter(|r| r.owner_id == owner_id && r.state.counts_toward_quota())
            .count() as u32
    }

    /// Whether any record, in any state, already uses this backend
    /// identity. Identities are never reused, even after revocation.
    pub fn identity_exists(&self, identity: &str) -> bool {
        self.file
            .records
            .iter()
            .any(|r| r.external_identity == identity)
    }

    /// Insert a new record in `pending` state and assign its id.
    pub fn insert_pending(
        &mut self,
        owner_id: &str,
        label: &str,
        external_identity: &str,
        now: DateTime<Utc>,
    ) -> u64 {
        let id = self.file.catalog.next_record_id;
        self.file.catalog.next_record_id += 1;
        self.file.records.push(CredentialRecord {
            id,
            owner_id: owner_id.to_string(),
            label: label.to_string(),
            external_identity: external_identity.to_string(),
            state: RecordState::Pending,
            needs_reconciliation: false,
            created_at: now,
            state_changed_at: now,
        });
        id
    }

    pub fn record(&self, id: u64) -> Option<&CredentialRecord> {
        self.file.records.iter().find(|r| r.id == id)
    }

    pub fn record_mut(&mut self, id: u64) -> Option<&mut CredentialRecord> {
        self.file.records.iter_mut().find(|r| r.id == id)
    }
}

fn load(path: &Path) -> Result<CatalogFile> {
    if !path.exists() {
        return Ok(CatalogFile::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("read catalog {}", path.display()))?;
    let file: CatalogFile = toml::from_str(&content)
        .with_context(|| format!("parse catalog {}", path.display()))?;
    Ok(file)
}

pub(crate) fn save(path: &Path, file: &CatalogFile) -> Result<()> {
    let content = toml::to_string_pretty(file).context("serialize catalog")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create dir {}", parent.display()))?;
    }
    let mut tmp = tempfile::NamedTempFile::new_in(
        path.parent().unwrap_or_else(|| Path::new(".")),
    )
    .context("create temp catalog file")?;
    tmp.write_all(content.as_bytes()).context("write catalog")?;
    tmp.flush().ok();

    #[cfg(unix)]
    {
        let perm = fs::Permissions::from_mode(constants::CATALOG_TOML_MODE);
        tmp.as_file()
            .set_permissions(perm)
            .context("set permissions on temp catalog file")?;
    }

    tmp.persist(path)
        .map_err(|err| anyhow::anyhow!("persist catalog: {}", err))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_catalog() -> (TempDir, Catalog) {
        let dir = TempDir::new().unwrap();
        let paths = CatalogPaths::from_root(dir.path().to_path_buf());
        (dir, Catalog::open(paths))
    }

    #[test]
    fn test_begin_on_missing_file_yields_default() {
        let (_dir, catalog) = test_catalog();
        let txn = catalog.begin().unwrap();
        assert!(txn.file.records.is_empty());
        assert_eq!(txn.file.catalog.next_record_id, 1);
    }

    #[test]
    fn test_commit_roundtrip() {
        let (_dir, catalog) = test_catalog();
        let now = Utc::now();
        let mut txn = catalog.begin().unwrap();
        txn.upsert_user("u1", "Alice", now);
        let id = txn.insert_pending("u1", "phone", "vpn_phone_u1_x", now);
        assert_eq!(id, 1);
        txn.commit().unwrap();

        let txn = catalog.begin().unwrap();
        assert_eq!(txn.file.users.len(), 1);
        assert_eq!(txn.file.records.len(), 1);
        assert_eq!(txn.file.catalog.next_record_id, 2);
        assert_eq!(txn.record(1).unwrap().state, RecordState::Pending);
    }

    #[test]
    fn test_drop_without_commit_discards() {
        let (_dir, catalog) = test_catalog();
        {
            let mut txn = catalog.begin().unwrap();
            txn.insert_pending("u1", "phone", "id-x", Utc::now());
            // dropped here
        }
        let txn = catalog.begin().unwrap();
        assert!(txn.file.records.is_empty());
    }

    #[test]
    fn test_label_taken_case_insensitive() {
        let (_dir, catalog) = test_catalog();
        let mut txn = catalog.begin().unwrap();
        let now = Utc::now();
        txn.insert_pending("u1", "Phone", "id-1", now);
        assert!(txn.label_taken("u1", "phone"));
        assert!(txn.label_taken("u1", "PHONE"));
        assert!(!txn.label_taken("u2", "phone"));
    }

    #[test]
    fn test_label_freed_by_revocation() {
        let (_dir, catalog) = test_catalog();
        let mut txn = catalog.begin().unwrap();
        let now = Utc::now();
        let id = txn.insert_pending("u1", "phone", "id-1", now);
        txn.record_mut(id).unwrap().transition(RecordState::Revoked, now);
        assert!(!txn.label_taken("u1", "phone"));
    }

    #[test]
    fn test_quota_usage_counts_active_and_pending() {
        let (_dir, catalog) = test_catalog();
        let mut txn = catalog.begin().unwrap();
        let now = Utc::now();
        let a = txn.insert_pending("u1", "a", "id-a", now);
        txn.insert_pending("u1", "b", "id-b", now);
        let c = txn.insert_pending("u1", "c", "id-c", now);
        txn.record_mut(a).unwrap().transition(RecordState::Active, now);
        txn.record_mut(c).unwrap().transition(RecordState::Failed, now);
        assert_eq!(txn.quota_usage("u1"), 2);
        assert_eq!(txn.quota_usage("u2"), 0);
    }

    #[test]
    fn test_identity_exists_across_all_states() {
        let (_dir, catalog) = test_catalog();
        let mut txn = catalog.begin().unwrap();
        let now = Utc::now();
        let id = txn.insert_pending("u1", "phone", "id-1", now);
        txn.record_mut(id).unwrap().transition(RecordState::Revoked, now);
        assert!(txn.identity_exists("id-1"));
        assert!(!txn.identity_exists("id-2"));
    }

    #[test]
    fn test_upsert_user_refreshes_label() {
        let (_dir, catalog) = test_catalog();
        let mut txn = catalog.begin().unwrap();
        let t0 = Utc::now();
        txn.upsert_user("u1", "Alice", t0);
        txn.upsert_user("u1", "Alice B", Utc::now());
        assert_eq!(txn.file.users.len(), 1);
        assert_eq!(txn.file.users[0].label, "Alice B");
        assert_eq!(txn.file.users[0].first_seen, t0);
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_catalog_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, catalog) = test_catalog();
        let txn = catalog.begin().unwrap();
        txn.commit().unwrap();
        let mode = fs::metadata(&catalog.paths().catalog_toml)
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, constants::CATALOG_TOML_MODE);
    }
}
