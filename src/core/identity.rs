//! Backend identity generation.
//!
//! The backend references a credential by a bounded name derived from the
//! configured prefix, a sanitized form of the user's label, the owner id,
//! and a second-granularity UTC timestamp. Two credentials for the same
//! owner can only collide when generated within the same second; the
//! orchestrator handles that with a single regeneration retry.

use crate::constants;
use chrono::{DateTime, Utc};

/// Derive the backend identity for a credential.
pub fn generate(prefix: &str, owner_id: &str, label: &str, now: DateTime<Utc>) -> String {
    let label = sanitize_label(label);
    let stamp = now.format("%Y%m%d%H%M%S");
    let mut identity = format!("{}_{}_{}_{}", prefix, label, owner_id, stamp);
    truncate_in_place(&mut identity, constants::MAX_IDENTITY_LEN);
    identity
}

/// Keep ASCII alphanumerics plus `-`/`_`, drop everything else, and bound
/// the result so free-text labels cannot blow up the identity length.
fn sanitize_label(label: &str) -> String {
    let mut clean: String = label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    truncate_in_place(&mut clean, constants::MAX_LABEL_COMPONENT_LEN);
    clean
}

fn truncate_in_place(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    // Prefix and owner id come from config and the front-end; back off to a
    // char boundary in case either carries multi-byte text.
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}
