//! Privilege checks for root/sudo enforcement.
//!
//! The backend tool signs and revokes certificates under /etc, so every
//! mutating command refuses to start without euid 0.

use anyhow::{bail, Result};

/// Check if the current process is running as root (euid 0).
pub fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Require root for a given command, or bail with an error.
pub fn require_root(command: &str) -> Result<()> {
    if !is_root() {
        bail!("'{}' requires root privileges. Run with sudo.", command);
    }
    Ok(())
}

/// Best-effort actor name for the audit trail: the invoking sudo user when
/// present, otherwise $USER.
pub fn detect_actor() -> String {
    if let Ok(user) = std::env::var("SUDO_USER") {
        if !user.is_empty() {
            return format!("{}(sudo)", user);
        }
    }
    std::env::var("USER").unwrap_or_else(|_| "unknown".to_string())
}
