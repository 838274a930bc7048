//! # Sync Target Lifecycle
//!
//! ```text
//! Unauthenticated → Authenticating → Authenticated ⇄ Syncing
//!                        ↑                 │          │
//!                        └──── AuthExpired ←──────────┘
//!
//! any state → Unauthenticated (sign-out)
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTargetState {
    Unauthenticated,
    /// The external sign-in flow is running
    Authenticating,
    Authenticated,
    Syncing,
    /// A refresh failed; the user has to sign in again
    AuthExpired,
}

impl SyncTargetState {
    /// Starting state for a target with or without a restored token.
    pub fn initial(authenticated: bool) -> Self {
        if authenticated {
            SyncTargetState::Authenticated
        } else {
            SyncTargetState::Unauthenticated
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTargetState::Unauthenticated => "unauthenticated",
            SyncTargetState::Authenticating => "authenticating",
            SyncTargetState::Authenticated => "authenticated",
            SyncTargetState::Syncing => "syncing",
            SyncTargetState::AuthExpired => "auth_expired",
        }
    }

    pub fn can_transition_to(&self, to: SyncTargetState) -> bool {
        use SyncTargetState::*;

        match (*self, to) {
            (_, Unauthenticated) => true,
            (Unauthenticated, Authenticating) => true,
            (AuthExpired, Authenticating) => true,
            (Authenticating, Authenticated) => true,
            (Authenticated, Syncing) => true,
            (Syncing, Authenticated) => true,
            (Authenticated, AuthExpired) => true,
            (Syncing, AuthExpired) => true,
            _ => false,
        }
    }

    /// Moves to `to`, or fails leaving the state unchanged.
    pub fn transition(&mut self, to: SyncTargetState) -> Result<()> {
        if !self.can_transition_to(to) {
            return Err(SyncError::InvalidStateTransition {
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        *self = to;
        Ok(())
    }
}

impl std::fmt::Display for SyncTargetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SyncTargetState::*;

    #[test]
    fn test_sign_in_and_sync_loop() {
        let mut state = SyncTargetState::initial(false);
        state.transition(Authenticating).unwrap();
        state.transition(Authenticated).unwrap();
        for _ in 0..2 {
            state.transition(Syncing).unwrap();
            state.transition(Authenticated).unwrap();
        }
        assert_eq!(state, Authenticated);
    }

    #[test]
    fn test_expiry_requires_new_sign_in() {
        let mut state = SyncTargetState::initial(true);
        state.transition(Syncing).unwrap();
        state.transition(AuthExpired).unwrap();
        assert!(state.transition(Syncing).is_err());
        state.transition(Authenticating).unwrap();
        state.transition(Authenticated).unwrap();
    }

    #[test]
    fn test_sign_out_from_any_state() {
        for from in [Unauthenticated, Authenticating, Authenticated, Syncing, AuthExpired] {
            let mut state = from;
            state.transition(Unauthenticated).unwrap();
        }
    }

    #[test]
    fn test_invalid_transition_keeps_state() {
        let mut state = Unauthenticated;
        let err = state.transition(Syncing).unwrap_err();
        assert_eq!(state, Unauthenticated);
        assert_eq!(
            err.to_string(),
            "Invalid state transition from unauthenticated to syncing"
        );
    }
}
