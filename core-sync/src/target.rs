//! Sync target contract.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::file_api::FileApi;
use crate::session::SyncSession;
use crate::state::SyncTargetState;

/// A configured remote (or local) destination for note synchronization.
#[async_trait]
pub trait SyncTarget: Send + Sync {
    /// Stable numeric id, also used in settings keys.
    fn id(&self) -> u32;

    /// Machine name, e.g. `google`.
    fn name(&self) -> &str;

    /// Human-readable name.
    fn label(&self) -> &str;

    async fn is_authenticated(&self) -> bool;

    async fn state(&self) -> SyncTargetState;

    fn file_api(&self) -> Arc<FileApi>;

    /// UI route that starts sign-in, if the target needs one.
    fn auth_route(&self) -> Option<&str>;

    /// New session for this target.
    ///
    /// Fails with [`crate::SyncError::NotAuthenticated`] when no token exists.
    async fn synchronizer(&self) -> Result<SyncSession>;
}
