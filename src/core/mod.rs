//! Core provisioning logic: catalog, orchestration, backend invocation.

pub mod audit_log;
pub mod backend;
pub mod catalog;
pub mod engine;
pub mod errors;
pub mod file_lock;
pub mod identity;
pub mod paths;
pub mod quota;
