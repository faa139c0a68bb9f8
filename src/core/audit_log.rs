//! Append-only audit trail for provisioning operations.
//!
//! Each line is one JSON entry carrying a SHA-256 hash chain: `entry_hash`
//! covers the canonicalized entry, `prev_hash` links to the previous line.
//! Tampering with any line breaks the chain for everything after it.

use crate::constants;
use crate::core::file_lock::FileLock;
use crate::core::paths::CatalogPaths;
use crate::util::privilege;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Outcome recorded for an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResult {
    /// One of "done", "failed", "indeterminate".
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    /// Operation name: create, revoke, reconcile.
    pub action: String,
    /// Local user that ran the command (SUDO_USER aware).
    pub actor: String,
    /// Owner the operation was performed for.
    pub owner: String,
    /// Backend identity of the credential, when one was assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AuditResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_hash: Option<String>,
}

/// Subject of an audit entry: which record, for which owner.
pub struct AuditSubject<'a> {
    pub owner: &'a str,
    pub identity: Option<&'a str>,
    pub record_id: Option<u64>,
}

/// Append an entry for a completed (or failed) operation.
pub fn log(
    paths: &CatalogPaths,
    action: &str,
    subject: AuditSubject<'_>,
    outcome: &str,
    error: Option<String>,
) -> Result<()> {
    let _lock = FileLock::exclusive(&paths.audit_lock)?;
    let prev_hash = last_entry_hash(paths).unwrap_or(None);

    let mut entry = AuditEntry {
        timestamp: Utc::now(),
        action: action.to_string(),
        actor: privilege::detect_actor(),
        owner: subject.owner.to_string(),
        identity: subject.identity.map(str::to_string),
        record_id: subject.record_id,
        result: Some(AuditResult {
            outcome: outcome.to_string(),
            error,
        }),
        prev_hash,
        entry_hash: None,
    };
    entry.entry_hash = Some(compute_entry_hash(&entry)?);

    let line = serde_json::to_string(&entry).context("serialize audit entry")?;
    append_line(paths, &line)
}

/// Compute canonical hash for an entry (excludes the entry_hash field).
fn compute_entry_hash(entry: &AuditEntry) -> Result<String> {
    let mut value = serde_json::to_value(entry).context("serialize for hash")?;
    if let Some(obj) = value.as_object_mut() {
        obj.remove("entry_hash");
    }
    let canonical = canonicalize_value(&value);
    let canonical_str = serde_json::to_string(&canonical).context("serialize canonical json")?;
    let hash = Sha256::digest(canonical_str.as_bytes());
    Ok(format!("{:064x}", hash))
}

/// Canonicalize JSON by recursively sorting object keys.
fn canonicalize_value(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for k in keys {
                out.insert(k.clone(), canonicalize_value(&map[k]));
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(canonicalize_value).collect())
        }
        other => other.clone(),
    }
}

fn append_line(paths: &CatalogPaths, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.audit_log)
        .with_context(|| format!("open audit log {}", paths.audit_log.display()))?;
    writeln!(file, "{}", line).context("write audit entry")?;

    #[cfg(unix)]
    {
        let perm = fs::Permissions::from_mode(constants::AUDIT_LOG_MODE);
        fs::set_permissions(&paths.audit_log, perm).context("set audit log permissions")?;
    }

    Ok(())
}

fn last_entry_hash(paths: &CatalogPaths) -> Result<Option<String>> {
    let path = &paths.audit_log;
    if !path.exists() {
        return Ok(None);
    }

    let mut file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let len = file
        .metadata()
        .with_context(|| format!("stat {}", path.display()))?
        .len();
    if len == 0 {
        return Ok(None);
    }

    const CHUNK: u64 = 8192;
    let mut offset = len;
    let mut buf = Vec::new();

    while offset > 0 {
        let read_size = std::cmp::min(CHUNK, offset);
        offset -= read_size;
        file.seek(SeekFrom::Start(offset))
            .with_context(|| format!("seek {}", path.display()))?;
        let mut tmp = vec![0u8; read_size as usize];
        file.read_exact(&mut tmp)
            .with_context(|| format!("read {}", path.display()))?;
        buf.splice(0..0, tmp);

        if buf.contains(&b'\n') || offset == 0 {
            for line in buf.split(|b| *b == b'\n').rev() {
                if line.iter().all(|b| b.is_ascii_whitespace()) {
                    continue;
                }
                if let Ok(entry) = serde_json::from_slice::<AuditEntry>(line) {
                    if let Some(hash) = entry.entry_hash {
                        return Ok(Some(hash));
                    }
                }
                // Malformed trailing line: chain from its raw hash so the
                // damage stays visible in verify rather than vanishing.
                let hash = Sha256::digest(line);
                return Ok(Some(format!("{:064x}", hash)));
            }
            return Ok(None);
        }
    }

    Ok(None)
}

/// Read audit entries from the log file, newest last.
pub fn read_log(paths: &CatalogPaths, limit: Option<usize>) -> Result<Vec<AuditEntry>> {
    if !paths.audit_log.exists() {
        return Ok(Vec::new());
    }

    let file = fs::File::open(&paths.audit_log)
        .with_context(|| format!("open audit log {}", paths.audit_log.display()))?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    let mut malformed = 0usize;

    for line in reader.lines() {
        let line = line.context("read audit log line")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<AuditEntry>(trimmed) {
            Ok(entry) => entries.push(entry),
            Err(_) => {
                malformed += 1;
            }
        }
    }

    if malformed > 0 {
        eprintln!("warning: {} malformed audit entries skipped", malformed);
    }

    if let Some(limit) = limit {
        if entries.len() > limit {
            entries = entries.split_off(entries.len() - limit);
        }
    }

    Ok(entries)
}

/// Verify the integrity of the audit chain. Returns (total, errors).
pub fn verify_chain(paths: &CatalogPaths) -> Result<(usize, Vec<String>)> {
    let entries = read_log(paths, None)?;
    let mut errors = Vec::new();
    let mut prev_entry_hash: Option<String> = None;

    for (i, entry) in entries.iter().enumerate() {
        if i > 0 && entry.prev_hash != prev_entry_hash {
            errors.push(format!(
                "entry {}: prev_hash mismatch (expected {:?}, got {:?})",
                i + 1,
                prev_entry_hash,
                entry.prev_hash
            ));
        }

        if let Some(ref stored_hash) = entry.entry_hash {
            match compute_entry_hash(entry) {
                Ok(computed) => {
                    if &computed != stored_hash {
                        errors.push(format!("entry {}: entry_hash mismatch (tampered?)", i + 1));
                    }
                }
                Err(e) => {
                    errors.push(format!("entry {}: cannot compute hash: {}", i + 1, e));
                }
            }
        } else {
            errors.push(format!("entry {}: missing entry_hash", i + 1));
        }

        prev_entry_hash = entry.entry_hash.clone();
    }

    Ok((entries.len(), errors))
}
