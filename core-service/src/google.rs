//! Google Drive sync target.
//!
//! Binds one [`AuthClient`] to one [`GoogleDriveDriver`]. The token is
//! restored from settings when the target is built and written back on
//! every change through a [`SettingsTokenObserver`].

use async_trait::async_trait;
use core_auth::{AuthClient, SettingsTokenObserver, TokenStore};
use core_runtime::config::{GoogleDriveSettings, SyncConfig};
use core_runtime::events::EventBus;
use core_sync::{
    DeltaOptions, FileApi, PathIdCache, SnapshotStore, SyncError, SyncSession, SyncTarget,
    SyncTargetState,
};
use provider_google_drive::{google_oauth_config, GoogleDriveDriver};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::error::Result;

pub const GOOGLE_DRIVE_TARGET_ID: u32 = 8;
pub const GOOGLE_DRIVE_TARGET_NAME: &str = "google";
const LABEL: &str = "Google Drive";
const AUTH_ROUTE: &str = "GoogleLogin";

pub struct GoogleDriveSyncTarget {
    auth: Arc<AuthClient>,
    file_api: Arc<FileApi>,
    snapshots: SnapshotStore,
    state: Arc<Mutex<SyncTargetState>>,
    event_bus: Option<EventBus>,
}

impl GoogleDriveSyncTarget {
    /// Builds the target and restores a previously stored token.
    #[instrument(skip_all, fields(target_id = GOOGLE_DRIVE_TARGET_ID))]
    pub async fn new(
        config: &SyncConfig,
        settings: &GoogleDriveSettings,
        event_bus: Option<EventBus>,
    ) -> Result<Self> {
        settings.validate()?;

        let mut auth = AuthClient::new(
            GOOGLE_DRIVE_TARGET_ID,
            google_oauth_config(settings),
            config.http_client.clone(),
        )
        .with_clock(config.clock.clone())
        .with_max_attempts(config.max_auth_attempts)
        .with_request_timeout(config.request_timeout);
        if let Some(bus) = &event_bus {
            auth = auth.with_event_bus(bus.clone());
        }

        let tokens = TokenStore::new(config.settings_store.clone(), GOOGLE_DRIVE_TARGET_ID);
        let auth = Arc::new(auth.with_token(tokens.load().await?));
        auth.add_observer(Arc::new(SettingsTokenObserver::new(tokens)))
            .await;

        let path_cache = Arc::new(PathIdCache::new(
            config.path_cache_capacity,
            config.path_cache_ttl,
            config.clock.clone(),
        ));
        let driver = GoogleDriveDriver::new(auth.clone(), path_cache)
            .with_root_folder_name(settings.root_folder_name.clone())
            .with_page_size(config.page_size);

        let mut file_api =
            FileApi::new(Arc::new(driver), GOOGLE_DRIVE_TARGET_ID).with_delta_options(DeltaOptions {
                page_limit: config.delta_page_limit,
                recursive: true,
            });
        if let Some(fs) = &config.file_system {
            file_api = file_api.with_file_system(fs.clone());
        }

        let authenticated = auth.is_authenticated().await;
        info!(authenticated, "Google Drive target ready");

        Ok(Self {
            auth,
            file_api: Arc::new(file_api),
            snapshots: SnapshotStore::new(config.settings_store.clone(), GOOGLE_DRIVE_TARGET_ID),
            state: Arc::new(Mutex::new(SyncTargetState::initial(authenticated))),
            event_bus,
        })
    }

    pub fn auth_client(&self) -> &Arc<AuthClient> {
        &self.auth
    }

    /// Starts sign-in and returns the consent URL to open.
    ///
    /// An authenticated target has to sign out first.
    pub async fn begin_sign_in(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        if *state != SyncTargetState::Authenticating {
            state.transition(SyncTargetState::Authenticating)?;
        }
        Ok(self.auth.authorization_url()?)
    }

    /// Exchanges the code returned by the consent page.
    #[instrument(skip(self, code))]
    pub async fn complete_sign_in(&self, code: &str) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if *state != SyncTargetState::Authenticating {
                state.transition(SyncTargetState::Authenticating)?;
            }
        }

        match self.auth.exchange_code(code).await {
            Ok(_) => {
                self.state
                    .lock()
                    .await
                    .transition(SyncTargetState::Authenticated)?;
                Ok(())
            }
            Err(e) => {
                *self.state.lock().await = SyncTargetState::Unauthenticated;
                Err(e.into())
            }
        }
    }

    /// Clears the token and the stored delta snapshot.
    pub async fn sign_out(&self) -> Result<()> {
        self.auth.sign_out().await;
        self.state
            .lock()
            .await
            .transition(SyncTargetState::Unauthenticated)?;
        if let Err(e) = self.snapshots.clear().await {
            warn!(error = %e, "Failed to clear delta snapshot on sign-out");
        }
        Ok(())
    }
}

#[async_trait]
impl SyncTarget for GoogleDriveSyncTarget {
    fn id(&self) -> u32 {
        GOOGLE_DRIVE_TARGET_ID
    }

    fn name(&self) -> &str {
        GOOGLE_DRIVE_TARGET_NAME
    }

    fn label(&self) -> &str {
        LABEL
    }

    async fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated().await
    }

    async fn state(&self) -> SyncTargetState {
        let mut state = self.state.lock().await;
        // The token may have been dropped by a failed refresh outside a session.
        if *state == SyncTargetState::Authenticated && !self.auth.is_authenticated().await {
            *state = SyncTargetState::AuthExpired;
        }
        *state
    }

    fn file_api(&self) -> Arc<FileApi> {
        self.file_api.clone()
    }

    fn auth_route(&self) -> Option<&str> {
        Some(AUTH_ROUTE)
    }

    async fn synchronizer(&self) -> core_sync::Result<SyncSession> {
        if !self.auth.is_authenticated().await {
            return Err(SyncError::NotAuthenticated {
                target_id: GOOGLE_DRIVE_TARGET_ID,
            });
        }

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
