//! VPN client credential provisioning and reconciliation engine.
//!
//! Drives an external privileged backend (certificate authority script or
//! key-management tool) to create and revoke client credentials, keeps a
//! durable catalog of ownership and lifecycle state, enforces per-user
//! quotas, and reconciles catalog/backend divergence after partial failure.
//!
//! ## Modules
//! - `cli` — Command-line handlers
//! - `core` — Catalog, orchestrator, backend invocation, audit
//! - `models` — Persisted data structures
//! - `util` — System utilities (fs, journald, privilege)

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod util;
