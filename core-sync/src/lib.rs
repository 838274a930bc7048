//! # Sync Module
//!
//! Backend-neutral synchronization plumbing for the note database.
//!
//! ## Overview
//!
//! - **Driver** (`driver`): the [`FileApiDriver`] contract every backend implements
//! - **File API** (`file_api`): path-addressable facade with base-directory scoping
//! - **Delta** (`delta`): listing-based change detection with paged, resumable passes
//! - **Path cache** (`path_cache`): LRU/TTL cache of path → backend id resolutions
//! - **Session** (`session`): runs delta passes into a [`ChangeSink`]
//! - **Target** (`target`, `state`): the [`SyncTarget`] contract and its lifecycle

pub mod delta;
pub mod driver;
pub mod error;
pub mod file_api;
pub mod path;
pub mod path_cache;
pub mod session;
pub mod state;
pub mod target;
pub mod types;

pub use delta::{
    basic_delta, compute_changes, list_tree, DeltaCursor, DeltaOptions, DeltaPage, DeltaRequest,
    DeltaSnapshot, DEFAULT_PAGE_LIMIT,
};
pub use driver::FileApiDriver;
pub use error::{Result, SyncError};
pub use file_api::FileApi;
pub use path_cache::{PathIdCache, ResolvedId};
pub use session::{ChangeSink, DeltaPassOutcome, DeltaPassStats, SnapshotStore, SyncSession};
pub use state::SyncTargetState;
pub use target::SyncTarget;
pub use types::{
    ChangeEvent, ChangeKind, Content, EntryKind, Fetched, GetTarget, ListOptions, ListResult,
    PutSource, Stat, TransferMode,
};
