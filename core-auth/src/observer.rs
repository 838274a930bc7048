use async_trait::async_trait;

use crate::types::AuthToken;

/// Notified whenever the token held by an [`AuthClient`](crate::AuthClient)
/// changes: after sign-in, after a refresh, and with `None` when the token is
/// cleared.
#[async_trait]
pub trait TokenObserver: Send + Sync {
    async fn on_token_changed(&self, token: Option<&AuthToken>);
}
