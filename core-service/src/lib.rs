//! Core service façade and bootstrap helpers.
//!
//! This crate wires a validated [`SyncConfig`] into concrete sync targets.
//! Desktop apps typically enable the `desktop-shims` feature, which pulls in
//! the `bridge-desktop` adapters and both bundled targets. Hosts that bring
//! their own bridges enable `google-drive` and/or `local-fs` directly.

pub mod error;
#[cfg(feature = "google-drive")]
pub mod google;
#[cfg(feature = "local-fs")]
pub mod local;
pub mod registry;

pub use error::{CoreError, Result};
#[cfg(feature = "google-drive")]
pub use google::{GoogleDriveSyncTarget, GOOGLE_DRIVE_TARGET_ID, GOOGLE_DRIVE_TARGET_NAME};
#[cfg(feature = "local-fs")]
pub use local::{LocalSyncTarget, LOCAL_TARGET_ID, LOCAL_TARGET_NAME};
pub use registry::SyncTargetRegistry;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore, TokioFileSystem};

use core_runtime::config::SyncConfig;
use core_runtime::events::{CoreEvent, EventBus, Receiver, TargetEvents};
use core_sync::SyncTarget;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: SyncConfig,
    event_bus: EventBus,
    targets: SyncTargetRegistry,
}

impl CoreService {
    /// Builds every target the configuration names.
    ///
    /// With `desktop-shims`, a missing `FileSystemAccess` falls back to
    /// [`TokioFileSystem`].
    pub async fn bootstrap(config: SyncConfig) -> Result<Self> {
        #[cfg(feature = "desktop-shims")]
        let config = {
            let mut config = config;
            if config.file_system.is_none() {
                config.file_system = Some(Arc::new(TokioFileSystem::new()));
            }
            config
        };

        config.validate()?;

        let event_bus = EventBus::new(DEFAULT_EVENT_CAPACITY);
        let targets = SyncTargetRegistry::from_config(&config, Some(event_bus.clone())).await?;
        info!(targets = ?targets.ids(), "Core service ready");

        Ok(Self {
            config,
            event_bus,
            targets,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    /// Events of one registered target only.
    pub fn subscribe_target_events(&self, id: u32) -> Result<TargetEvents> {
        self.targets.require(id)?;
        Ok(self.event_bus.subscribe_target(id))
    }

    pub fn targets(&self) -> &SyncTargetRegistry {
        &self.targets
    }

    pub fn target(&self, id: u32) -> Result<Arc<dyn SyncTarget>> {
        self.targets.require(id)
    }

    pub fn target_by_name(&self, name: &str) -> Result<Arc<dyn SyncTarget>> {
        self.targets
            .by_name(name)
            .ok_or_else(|| CoreError::UnknownTarget(name.to_string()))
    }
}
