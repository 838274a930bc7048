//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `core-service`, `provider-google-drive`,
//! `provider-local`). Host applications can depend on `notes-sync-workspace`
//! and enable the documented features without needing to wire each crate
//! individually.

#[cfg(any(feature = "desktop-shims", feature = "google-drive", feature = "local-fs"))]
pub use core_service::*;
