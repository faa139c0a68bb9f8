//! Data structures persisted in the catalog.

pub mod catalog_file;
pub mod record;
pub mod user;
