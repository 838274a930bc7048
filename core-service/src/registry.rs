//! Lookup of configured sync targets by id or name.

use core_runtime::config::SyncConfig;
use core_runtime::events::EventBus;
use core_sync::SyncTarget;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::error::{CoreError, Result};

#[derive(Clone, Default)]
pub struct SyncTargetRegistry {
    targets: BTreeMap<u32, Arc<dyn SyncTarget>>,
}

impl SyncTargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every target `config` has settings for.
    pub async fn from_config(config: &SyncConfig, event_bus: Option<EventBus>) -> Result<Self> {
        let mut registry = Self::new();

        #[cfg(feature = "google-drive")]
        {
            if let Some(settings) = &config.google_drive {
                let target =
                    crate::google::GoogleDriveSyncTarget::new(config, settings, event_bus.clone())
                        .await?;
                registry.register(Arc::new(target))?;
            }
        }

        #[cfg(feature = "local-fs")]
        {
            if let Some(root) = &config.local_sync_dir {
                let target = crate::local::LocalSyncTarget::new(config, root, event_bus.clone());
                registry.register(Arc::new(target))?;
            }
        }

        #[cfg(not(any(feature = "google-drive", feature = "local-fs")))]
        let _ = (config, event_bus);

        Ok(registry)
    }

    /// Adds `target`. Ids and names must be unique.
    pub fn register(&mut self, target: Arc<dyn SyncTarget>) -> Result<()> {
        let id = target.id();
        if self.targets.contains_key(&id) || self.by_name(target.name()).is_some() {
            return Err(CoreError::DuplicateTarget { id });
        }
        info!(target_id = id, name = target.name(), "Registered sync target");
        self.targets.insert(id, target);
        Ok(())
    }

    pub fn get(&self, id: u32) -> Option<Arc<dyn SyncTarget>> {
        self.targets.get(&id).cloned()
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<dyn SyncTarget>> {
        self.targets
            .values()
            .find(|target| target.name() == name)
            .cloned()
    }

    /// Like [`get`](Self::get), failing with [`CoreError::UnknownTarget`].
    pub fn require(&self, id: u32) -> Result<Arc<dyn SyncTarget>> {
        self.get(id)
            .ok_or_else(|| CoreError::UnknownTarget(id.to_string()))
    }

    pub fn ids(&self) -> Vec<u32> {
        self.targets.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SyncTarget>> {
        self.targets.values()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
