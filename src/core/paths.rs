//! Catalog path resolution and directory structure.

use crate::constants;
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CatalogPaths {
    pub root: PathBuf,
    pub catalog_toml: PathBuf,
    pub catalog_lock: PathBuf,
    pub audit_lock: PathBuf,
    pub audit_log: PathBuf,
    /// Default material directory; overridable via the provisioner section.
    pub material: PathBuf,
}

impl CatalogPaths {
    /// Resolve catalog paths from CLI arg, env var, or auto-detection.
    pub fn resolve(root_arg: Option<PathBuf>) -> Result<Self> {
        if let Some(root) = root_arg {
            return Ok(Self::from_root(root));
        }
        if let Ok(root) = env::var("VPNSMITH_ROOT") {
            return Ok(Self::from_root(PathBuf::from(root)));
        }
        if let Some(found) = find_catalog_root()? {
            return Ok(Self::from_root(found));
        }
        Ok(Self::from_root(PathBuf::from(constants::DEFAULT_CATALOG_ROOT)))
    }

    /// Create catalog paths from a root directory.
    pub fn from_root(root: PathBuf) -> Self {
        let catalog_toml = root.join("catalog.toml");
        let catalog_lock = root.join("catalog.lock");
        let audit_lock = root.join("audit.lock");
        let audit_log = root.join("audit.log");
        let material = root.join("material");
        Self {
            root,
            catalog_toml,
            catalog_lock,
            audit_lock,
            audit_log,
            material,
        }
    }
}

fn find_catalog_root() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir().context("resolve current directory")?;
    for ancestor in cwd.ancestors() {
        if looks_like_root(ancestor) {
            return Ok(Some(ancestor.to_path_buf()));
        }
    }
    Ok(None)
}

fn looks_like_root(path: &Path) -> bool {
    path.join("catalog.toml").is_file()
}

impl std::fmt::Display for CatalogPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "catalog@{}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_root() {
        let paths = CatalogPaths::from_root(PathBuf::from("/test"));
        assert_eq!(paths.root, PathBuf::from("/test"));
        assert_eq!(paths.catalog_toml, PathBuf::from("/test/catalog.toml"));
        assert_eq!(paths.catalog_lock, PathBuf::from("/test/catalog.lock"));
        assert_eq!(paths.audit_lock, PathBuf::from("/test/audit.lock"));
        assert_eq!(paths.audit_log, PathBuf::from("/test/audit.log"));
        assert_eq!(paths.material, PathBuf::from("/test/material"));
    }
}
