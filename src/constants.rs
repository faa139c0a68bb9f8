//! Centralized constants for permissions, paths, and limits.

/// Default catalog root directory.
pub const DEFAULT_CATALOG_ROOT: &str = "/var/lib/vpnsmith";

/// Default path of the privileged credential backend tool.
pub const DEFAULT_BACKEND_TOOL: &str = "/usr/local/sbin/vpn-backend";

/// Default wall-clock bound for a single backend invocation, in seconds.
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 60;

/// Default number of simultaneously active credentials per owner.
pub const DEFAULT_QUOTA: u32 = 3;

/// Default prefix for generated backend identities.
pub const DEFAULT_IDENTITY_PREFIX: &str = "vpn";

/// Permission mode for catalog.toml.
pub const CATALOG_TOML_MODE: u32 = 0o600;

/// Permission mode for the audit log.
pub const AUDIT_LOG_MODE: u32 = 0o640;

/// Permission mode for the backend material directory.
pub const MATERIAL_DIR_MODE: u32 = 0o700;

/// Permission mode for delivered credential material files.
pub const MATERIAL_FILE_MODE: u32 = 0o600;

/// Maximum length of the sanitized label component inside an identity.
pub const MAX_LABEL_COMPONENT_LEN: usize = 15;

/// Maximum length of a full backend identity.
pub const MAX_IDENTITY_LEN: usize = 50;

/// Action token the backend accepts for provisioning.
pub const ACTION_CREATE: &str = "create";

/// Action token the backend accepts for revocation.
pub const ACTION_REVOKE: &str = "revoke";

/// Action token for the reconciliation existence probe.
pub const ACTION_STATUS: &str = "status";
