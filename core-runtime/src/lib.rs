//! # Core Runtime
//!
//! Shared runtime infrastructure for the sync workspace:
//! - [`logging`]: `tracing` subscriber setup and host log forwarding
//! - [`config`]: validated [`SyncConfig`](config::SyncConfig) with host bridges
//! - [`events`]: broadcast [`EventBus`](events::EventBus) for auth and sync events

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
