//! Local directory sync target. Needs no sign-in.

use async_trait::async_trait;
use core_runtime::config::SyncConfig;
use core_runtime::events::EventBus;
use core_sync::{DeltaOptions, FileApi, SnapshotStore, SyncSession, SyncTarget, SyncTargetState};
use provider_local::LocalFileDriver;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const LOCAL_TARGET_ID: u32 = 2;
pub const LOCAL_TARGET_NAME: &str = "filesystem";
const LABEL: &str = "File system";

pub struct LocalSyncTarget {
    file_api: Arc<FileApi>,
    snapshots: SnapshotStore,
    state: Arc<Mutex<SyncTargetState>>,
    event_bus: Option<EventBus>,
}

impl LocalSyncTarget {
    pub fn new(config: &SyncConfig, root: &Path, event_bus: Option<EventBus>) -> Self {
        let driver = LocalFileDriver::new(root).with_page_size(config.page_size as usize);

        let mut file_api =
            FileApi::new(Arc::new(driver), LOCAL_TARGET_ID).with_delta_options(DeltaOptions {
                page_limit: config.delta_page_limit,
                recursive: true,
            });
        if let Some(fs) = &config.file_system {
            file_api = file_api.with_file_system(fs.clone());
        }

        Self {
            file_api: Arc::new(file_api),
            snapshots: SnapshotStore::new(config.settings_store.clone(), LOCAL_TARGET_ID),
            state: Arc::new(Mutex::new(SyncTargetState::initial(true))),
            event_bus,
        }
    }
}

#[async_trait]
impl SyncTarget for LocalSyncTarget {
    fn id(&self) -> u32 {
        LOCAL_TARGET_ID
    }

    fn name(&self) -> &str {
        LOCAL_TARGET_NAME
    }

    fn label(&self) -> &str {
        LABEL
    }

    async fn is_authenticated(&self) -> bool {
        true
    }

    async fn state(&self) -> SyncTargetState {
        *self.state.lock().await
    }

    fn file_api(&self) -> Arc<FileApi> {
        self.file_api.clone()
    }

    fn auth_route(&self) -> Option<&str> {
        None
    }

    async fn synchronizer(&self) -> core_sync::Result<SyncSession> {
        let session = SyncSession::new(
            self.file_api.clone(),
            self.snapshots.clone(),
            self.state.clone(),
        );
        Ok(match &self.event_bus {
            Some(bus) => session.with_event_bus(bus.clone()),
            None => session,
        })
    }
}
