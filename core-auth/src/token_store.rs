//! Token persistence
//!
//! Tokens are serialized to JSON and kept in the host [`SettingsStore`] under
//! `sync.{target_id}.auth`, the key the note database already uses for
//! per-target settings.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{AuthClient, SettingsTokenObserver, TokenStore};
//! use std::sync::Arc;
//! # async fn example(client: AuthClient, settings: Arc<dyn bridge_traits::SettingsStore>) -> core_auth::Result<()> {
//! let store = TokenStore::new(settings, 8);
//!
//! // Restore a previous session, then keep the store current.
//! let client = client.with_token(store.load().await?);
//! client.add_observer(Arc::new(SettingsTokenObserver::new(store))).await;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::observer::TokenObserver;
use crate::types::AuthToken;
use async_trait::async_trait;
use bridge_traits::storage::SettingsStore;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Settings-backed storage for one sync target's token.
#[derive(Clone)]
pub struct TokenStore {
    settings: Arc<dyn SettingsStore>,
    key: String,
}

impl TokenStore {
    pub fn new(settings: Arc<dyn SettingsStore>, target_id: u32) -> Self {
        Self {
            settings,
            key: Self::key_for(target_id),
        }
    }

    /// Settings key holding the token for `target_id`.
    pub fn key_for(target_id: u32) -> String {
        format!("sync.{}.auth", target_id)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Loads the stored token.
    ///
    /// A value that is not a valid token is logged and treated as absent so a
    /// corrupted entry only forces a new sign-in.
    pub async fn load(&self) -> Result<Option<AuthToken>> {
        let raw = self
            .settings
            .get_string(&self.key)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }

        match serde_json::from_str::<AuthToken>(&raw) {
            Ok(token) if !token.access_token.is_empty() => Ok(Some(token)),
            Ok(_) => {
                warn!(key = %self.key, "Stored token has an empty access token, ignoring");
                Ok(None)
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Could not parse stored token, ignoring");
                Ok(None)
            }
        }
    }

    pub async fn save(&self, token: &AuthToken) -> Result<()> {
        let json = serde_json::to_string(token).map_err(|e| AuthError::Storage(e.to_string()))?;

        self.settings
            .set_string(&self.key, &json)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        debug!(
            key = %self.key,
            has_refresh_token = token.has_refresh_token(),
            "Token saved"
        );
        Ok(())
    }

    pub async fn delete(&self) -> Result<()> {
        self.settings
            .delete(&self.key)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        debug!(key = %self.key, "Token deleted");
        Ok(())
    }
}

/// Keeps a [`TokenStore`] in step with the client's token.
pub struct SettingsTokenObserver {
    store: TokenStore,
}

impl SettingsTokenObserver {
    pub fn new(store: TokenStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TokenObserver for SettingsTokenObserver {
    async fn on_token_changed(&self, token: Option<&AuthToken>) {
        let result = match token {
            Some(token) => self.store.save(token).await,
            None => self.store.delete().await,
        };

        if let Err(e) = result {
            error!(key = %self.store.key(), error = %e, "Failed to persist token change");
        }
    }
}
