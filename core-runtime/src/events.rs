//! # Event Bus System
//!
//! Typed events broadcast over `tokio::sync::broadcast` so hosts can observe
//! authentication and synchronization without coupling to the crates that
//! produce them.
//!
//! ```text
//! ┌──────────────┐   emit   ┌────────────┐  subscribe  ┌────────────┐
//! │ AuthClient   ├─────────>│            ├────────────>│ Host UI    │
//! └──────────────┘          │  EventBus  │             └────────────┘
//! ┌──────────────┐   emit   │            │  subscribe  ┌────────────┐
//! │ SyncSession  ├─────────>│            ├────────────>│ Logger     │
//! └──────────────┘          └────────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
//!
//! let event_bus = EventBus::new(100);
//! let mut receiver = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Auth(AuthEvent::SignedIn {
//!         target_id: 8,
//!         provider: "google".to_string(),
//!     }))
//!     .ok();
//!
//! assert!(receiver.try_recv().is_ok());
//! ```
//!
//! `emit` fails only when nobody is subscribed; producers ignore that error.
//! Slow subscribers get `RecvError::Lagged(n)` and can keep receiving.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Auth(AuthEvent),
    Sync(SyncEvent),
}

impl CoreEvent {
    /// Human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Sync(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Cancelled { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SignedIn { .. })
            | CoreEvent::Auth(AuthEvent::SignedOut { .. })
            | CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Sync target the event belongs to.
    pub fn target_id(&self) -> u32 {
        match self {
            CoreEvent::Auth(e) => e.target_id(),
            CoreEvent::Sync(e) => e.target_id(),
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Token lifecycle events emitted by an auth client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// The stored token was cleared (sign-out or failed refresh).
    SignedOut { target_id: u32 },
    /// An authorization code is being exchanged.
    SigningIn { target_id: u32, provider: String },
    /// A token was obtained from an authorization code.
    SignedIn { target_id: u32, provider: String },
    TokenRefreshing { target_id: u32 },
    TokenRefreshed {
        target_id: u32,
        /// Expiry of the new access token (Unix epoch seconds), when known.
        expires_at: Option<i64>,
    },
    AuthError {
        target_id: u32,
        message: String,
        /// False when the user has to sign in again.
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SignedOut { .. } => "Signed out",
            AuthEvent::SigningIn { .. } => "Exchanging authorization code",
            AuthEvent::SignedIn { .. } => "Signed in",
            AuthEvent::TokenRefreshing { .. } => "Refreshing access token",
            AuthEvent::TokenRefreshed { .. } => "Access token refreshed",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }

    fn target_id(&self) -> u32 {
        match self {
            AuthEvent::SignedOut { target_id }
            | AuthEvent::SigningIn { target_id, .. }
            | AuthEvent::SignedIn { target_id, .. }
            | AuthEvent::TokenRefreshing { target_id }
            | AuthEvent::TokenRefreshed { target_id, .. }
            | AuthEvent::AuthError { target_id, .. } => *target_id,
        }
    }
}

/// Delta-pass events emitted by a sync session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    Started {
        session_id: String,
        target_id: u32,
        /// Sync-root-relative path being scanned.
        path: String,
        /// True when no previous snapshot exists.
        is_full_sync: bool,
    },
    /// One delta page was handed to the change sink.
    Progress {
        session_id: String,
        target_id: u32,
        page: u32,
        changes_applied: u64,
    },
    Completed {
        session_id: String,
        target_id: u32,
        created: u64,
        updated: u64,
        deleted: u64,
        duration_ms: u64,
    },
    Failed {
        session_id: String,
        target_id: u32,
        message: String,
        changes_applied: u64,
    },
    Cancelled {
        session_id: String,
        target_id: u32,
        changes_applied: u64,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Delta pass started",
            SyncEvent::Progress { .. } => "Delta page applied",
            SyncEvent::Completed { .. } => "Delta pass completed",
            SyncEvent::Failed { .. } => "Delta pass failed",
            SyncEvent::Cancelled { .. } => "Delta pass cancelled",
        }
    }

    fn target_id(&self) -> u32 {
        match self {
            SyncEvent::Started { target_id, .. }
            | SyncEvent::Progress { target_id, .. }
            | SyncEvent::Completed { target_id, .. }
            | SyncEvent::Failed { target_id, .. }
            | SyncEvent::Cancelled { target_id, .. } => *target_id,
        }
    }
}

/// Broadcast channel for [`CoreEvent`]s. Clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// `capacity` is the per-subscriber backlog before it starts lagging.
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: broadcast::channel(capacity).0,
        }
    }

    /// Number of subscribers reached. Errors when there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Receiver that only yields events of one sync target.
    pub fn subscribe_target(&self, target_id: u32) -> TargetEvents {
        TargetEvents {
            target_id,
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventBus({} subscribers)", self.subscriber_count())
    }
}

/// Events of a single sync target, see [`EventBus::subscribe_target`].
#[derive(Debug)]
pub struct TargetEvents {
    target_id: u32,
    receiver: Receiver<CoreEvent>,
}

impl TargetEvents {
    pub fn target_id(&self) -> u32 {
        self.target_id
    }

    /// Waits for the next event of this target.
    ///
    /// Lagging and a closed bus surface as the underlying [`RecvError`].
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if event.target_id() == self.target_id {
                return Ok(event);
            }
        }
    }

    /// Drains buffered events of other targets. `None` once nothing of this
    /// target is buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(n)) => return Some(Err(RecvError::Lagged(n))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            };
            if event.target_id() == self.target_id {
                return Some(Ok(event));
            }
        }
    }
}
