//! Catalog file model: the single TOML document holding configuration,
//! users, and credential records.

use crate::constants;
use crate::models::record::CredentialRecord;
use crate::models::user::UserMeta;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub catalog: CatalogSection,
    #[serde(default)]
    pub provisioner: ProvisionerSection,
    #[serde(default)]
    pub users: Vec<UserMeta>,
    #[serde(default)]
    pub records: Vec<CredentialRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSection {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Next record id to assign. Monotonic; never reset.
    #[serde(default = "default_next_record_id")]
    pub next_record_id: u64,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            version: default_version(),
            next_record_id: default_next_record_id(),
        }
    }
}

/// Engine configuration, supplied at process start. No hot reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionerSection {
    /// Maximum simultaneously active credentials per owner.
    #[serde(default = "default_quota")]
    pub quota: u32,
    /// Path of the privileged backend tool.
    #[serde(default = "default_tool")]
    pub tool: PathBuf,
    /// Working directory the backend is executed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<PathBuf>,
    /// Directory where the backend writes credential material files
    /// (`<identity>.*`). Defaults to `<root>/material`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_dir: Option<PathBuf>,
    /// Wall-clock bound for a single backend invocation.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Prefix of generated backend identities.
    #[serde(default = "default_identity_prefix")]
    pub identity_prefix: String,
}

impl Default for ProvisionerSection {
    fn default() -> Self {
        Self {
            quota: default_quota(),
            tool: default_tool(),
            workdir: None,
            material_dir: None,
            timeout_secs: default_timeout_secs(),
            identity_prefix: default_identity_prefix(),
        }
    }
}

impl ProvisionerSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_version() -> u32 {
    1
}

fn default_next_record_id() -> u64 {
    1
}

fn default_quota() -> u32 {
    constants::DEFAULT_QUOTA
}

fn default_tool() -> PathBuf {
    PathBuf::from(constants::DEFAULT_BACKEND_TOOL)
}

fn default_timeout_secs() -> u64 {
    constants::DEFAULT_BACKEND_TIMEOUT_SECS
}

fn default_identity_prefix() -> String {
    constants::DEFAULT_IDENTITY_PREFIX.to_string()
}
