//! Utility modules for filesystem and system integration.

pub mod fs;
pub mod journald;
pub mod privilege;
