use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A credential owner. Created on first contact, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMeta {
    /// Opaque identifier supplied by the front-end (chat id, account name).
    pub id: String,
    /// Human-readable display label, refreshed on each contact.
    pub label: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}
