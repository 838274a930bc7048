//! # Sync Session
//!
//! One synchronizer run against a single target. A session drives delta
//! passes: it pulls pages from the [`FileApi`], hands them to a [`ChangeSink`]
//! owned by the note database, and persists the new snapshot once the whole
//! pass has been applied.
//!
//! ## Workflow
//!
//! ```text
//! load snapshot ─► delta page 1 ─► sink.apply ─► ... ─► last page ─► save snapshot
//!                       ▲                          │
//!                       └── cancelled? (checked between pages)
//! ```
//!
//! Cancellation is advisory: a page already handed to the sink is finished,
//! and the pass stops before requesting the next one. A cancelled or failed
//! pass leaves the stored snapshot untouched, so the next pass replays it.

use async_trait::async_trait;
use bridge_traits::storage::SettingsStore;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::delta::{DeltaCursor, DeltaRequest, DeltaSnapshot};
use crate::error::{Result, SyncError};
use crate::file_api::FileApi;
use crate::state::SyncTargetState;
use crate::types::{ChangeEvent, ChangeKind};

/// Receives each page of changes, in order.
#[async_trait]
pub trait ChangeSink: Send + Sync {
    async fn apply(&self, changes: &[ChangeEvent]) -> Result<()>;
}

/// Settings-backed storage of a target's last completed snapshot.
#[derive(Clone)]
pub struct SnapshotStore {
    settings: Arc<dyn SettingsStore>,
    key: String,
}

impl SnapshotStore {
    pub fn new(settings: Arc<dyn SettingsStore>, target_id: u32) -> Self {
        Self {
            settings,
            key: Self::key_for(target_id),
        }
    }

    pub fn key_for(target_id: u32) -> String {
        format!("sync.{}.delta_snapshot", target_id)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stored snapshot; missing or unreadable data yields an empty one.
    pub async fn load(&self) -> Result<DeltaSnapshot> {
        let Some(json) = self.settings.get_string(&self.key).await? else {
            return Ok(DeltaSnapshot::new());
        };

        match serde_json::from_str(&json) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Discarding unreadable delta snapshot");
                Ok(DeltaSnapshot::new())
            }
        }
    }

    pub async fn save(&self, snapshot: &DeltaSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot).map_err(|e| SyncError::Parse {
            context: "delta snapshot".to_string(),
            message: e.to_string(),
        })?;
        self.settings.set_string(&self.key, &json).await?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.settings.delete(&self.key).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaPassStats {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub pages: u32,
}

impl DeltaPassStats {
    /// Changes handed to the sink so far.
    pub fn applied(&self) -> u64 {
        self.created + self.updated + self.deleted
    }

    fn record(&mut self, changes: &[ChangeEvent]) {
        for change in changes {
            match change.kind {
                ChangeKind::Created => self.created += 1,
                ChangeKind::Updated => self.updated += 1,
                ChangeKind::Deleted => self.deleted += 1,
            }
        }
        self.pages += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaPassOutcome {
    /// Every page was applied and the new snapshot stored.
    Completed { stats: DeltaPassStats },
    /// Stopped between pages; the stored snapshot is unchanged.
    Cancelled { applied: u64 },
}

pub struct SyncSession {
    id: Uuid,
    file_api: Arc<FileApi>,
    snapshots: SnapshotStore,
    state: Arc<Mutex<SyncTargetState>>,
    cancellation_token: CancellationToken,
    event_bus: Option<EventBus>,
}

impl SyncSession {
    pub fn new(
        file_api: Arc<FileApi>,
        snapshots: SnapshotStore,
        state: Arc<Mutex<SyncTargetState>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_api,
            snapshots,
            state,
            cancellation_token: CancellationToken::new(),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn file_api(&self) -> &Arc<FileApi> {
        &self.file_api
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub async fn state(&self) -> SyncTargetState {
        *self.state.lock().await
    }

    /// Asks a running pass to stop before its next page.
    pub fn cancel(&self) {
        info!(session_id = %self.id, "Cancellation requested");
        self.cancellation_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Runs one delta pass over `path`.
    ///
    /// The target moves to `Syncing` for the duration of the pass. Errors
    /// that need a new sign-in leave it in `AuthExpired`.
    #[instrument(skip(self, sink), fields(session_id = %self.id, target_id = self.file_api.target_id()))]
    pub async fn run_delta_pass(&self, path: &str, sink: &dyn ChangeSink) -> Result<DeltaPassOutcome> {
        self.state.lock().await.transition(SyncTargetState::Syncing)?;

        let started = Instant::now();
        let mut stats = DeltaPassStats::default();
        let result = self.pass(path, sink, &mut stats).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        self.finish_state(result.as_ref().err()).await;

        match &result {
            Ok(DeltaPassOutcome::Completed { stats }) => {
                info!(
                    created = stats.created,
                    updated = stats.updated,
                    deleted = stats.deleted,
                    pages = stats.pages,
                    duration_ms,
                    "Delta pass completed"
                );
                self.emit(SyncEvent::Completed {
                    session_id: self.id.to_string(),
                    target_id: self.file_api.target_id(),
                    created: stats.created,
                    updated: stats.updated,
                    deleted: stats.deleted,
                    duration_ms,
                });
            }
            Ok(DeltaPassOutcome::Cancelled { applied }) => {
                info!(applied, "Delta pass cancelled");
                self.emit(SyncEvent::Cancelled {
                    session_id: self.id.to_string(),
                    target_id: self.file_api.target_id(),
                    changes_applied: *applied,
                });
            }
            Err(e) => {
                warn!(error = %e, applied = stats.applied(), "Delta pass failed");
                self.emit(SyncEvent::Failed {
                    session_id: self.id.to_string(),
                    target_id: self.file_api.target_id(),
                    message: e.to_string(),
                    changes_applied: stats.applied(),
                });
            }
        }

        result
    }

    async fn pass(
        &self,
        path: &str,
        sink: &dyn ChangeSink,
        stats: &mut DeltaPassStats,
    ) -> Result<DeltaPassOutcome> {
        let snapshot = self.snapshots.load().await?;
        let options = self.file_api.delta_options();

        self.emit(SyncEvent::Started {
            session_id: self.id.to_string(),
            target_id: self.file_api.target_id(),
            path: path.to_string(),
            is_full_sync: snapshot.is_empty(),
        });

        let mut request = DeltaRequest::start(snapshot).with_options(options);

        loop {
            if self.is_cancelled() {
                return Ok(DeltaPassOutcome::Cancelled {
                    applied: stats.applied(),
                });
            }

            let page = self.file_api.delta(path, request).await?;
            if !page.items.is_empty() {
                sink.apply(&page.items).await?;
            }
            stats.record(&page.items);

            debug!(page = stats.pages, items = page.items.len(), has_more = page.has_more, "Applied delta page");
            self.emit(SyncEvent::Progress {
                session_id: self.id.to_string(),
                target_id: self.file_api.target_id(),
                page: stats.pages,
                changes_applied: stats.applied(),
            });

            if !page.has_more {
                if let Some(next) = &page.snapshot {
                    self.snapshots.save(next).await?;
                }
                return Ok(DeltaPassOutcome::Completed { stats: *stats });
            }

            let cursor: DeltaCursor = page.cursor.ok_or_else(|| SyncError::Parse {
                context: "delta page".to_string(),
                message: "more pages announced without a cursor".to_string(),
            })?;
            request = DeltaRequest::resume(cursor).with_options(options);
        }
    }

    async fn finish_state(&self, error: Option<&SyncError>) {
        let mut state = self.state.lock().await;

        let next = match error {
            Some(e) if e.requires_authentication() => SyncTargetState::AuthExpired,
            _ => SyncTargetState::Authenticated,
        };

        // A sign-out during the pass already moved the target elsewhere.
        if *state == SyncTargetState::Syncing {
            if let Err(e) = state.transition(next) {
                warn!(error = %e, "Could not leave syncing state");
            }
        }
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Sync(event));
        }
    }
}
