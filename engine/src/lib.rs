//! # Offsync Engine
//!
//! The sync core of an offline-first application.
//!
//! Every user mutation is written to the local store first and then, if the
//! user is entitled to remote sync and the device is online, pushed once to
//! the remote store. Anything that could not be pushed is flagged and later
//! flushed by a reconciliation sweep. Local reads never wait on the network.
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`SyncableRecord`] carries:
//! - A client-generated id, stable across local and remote stores
//! - Collection and owner
//! - A JSON payload and an `active` flag (deactivation is a soft delete)
//! - Timestamps and a version bumped on every local edit
//! - A [`SyncStatus`] and the `needs_upload` worklist marker, always coupled
//!
//! ### Commits
//!
//! The [`SyncOrchestrator`] applies [`CreateOp`] and [`UpdateOp`]:
//! exactly one local write and at most one remote call per commit. Remote
//! failures never reach the caller; the record is left pending instead.
//!
//! ### Reconciliation
//!
//! The [`Reconciler`] pushes the session user's pending records, oldest
//! first, one at a time. A failing record never blocks the others. A
//! [`RetryPolicy`] spaces out retries of a failing record and can park it.
//! [`spawn_sweeper`] runs sweeps in the background on a schedule and on
//! connectivity, entitlement and sign-in events.
//!
//! ### Collaborators
//!
//! All collaborators are passed in through [`SyncServices`]: the
//! [`LocalStore`], the [`RemoteClient`], the [`Session`], a
//! [`ConnectivityOracle`], an [`EntitlementGate`], an [`IdGenerator`] and a
//! [`Clock`].
//!
//! ## Quick Start
//!
//! ```rust
//! use offsync_engine::{
//!     MemoryStore, PushKind, RemoteAck, RemoteClient, RemoteError, RemotePush, Session,
//!     SyncOrchestrator, SyncServices, SyncStatus, Tier, User, WatchConnectivity,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct Accepting;
//!
//! #[async_trait::async_trait]
//! impl RemoteClient for Accepting {
//!     async fn create_remote(&self, push: &RemotePush) -> Result<RemoteAck, RemoteError> {
//!         Ok(RemoteAck { id: push.id.clone(), revision: None })
//!     }
//!     async fn update_remote(&self, id: &str, _: &RemotePush) -> Result<RemoteAck, RemoteError> {
//!         Ok(RemoteAck { id: id.to_string(), revision: None })
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let services = SyncServices::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(Accepting),
//!     Arc::new(Session::signed_in(User::new("user-1", "remote-1", Tier::Paid))),
//!     Arc::new(WatchConnectivity::new(true)),
//! );
//! let orchestrator = SyncOrchestrator::new(Arc::new(services));
//!
//! let record = orchestrator
//!     .create("budgets", json!({"name": "Groceries", "limit": 400}))
//!     .await
//!     .unwrap();
//! assert_eq!(record.sync_status, SyncStatus::Synced);
//! # });
//! ```
//!
//! ## Persistence
//!
//! [`MemoryStore::open`] keeps a JSON [`StoreSnapshot`] on disk and
//! rewrites it atomically on every write.

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod lock;
pub mod operation;
pub mod orchestrator;
pub mod reconcile;
pub mod record;
pub mod remote;
pub mod scheduler;
pub mod services;
pub mod snapshot;
pub mod store;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SyncConfig;
pub use context::{
    AccountTiers, ConnectivityOracle, EntitlementGate, IdGenerator, Session, Tier, User,
    UserTierGate, UuidGenerator, WatchConnectivity,
};
pub use error::{CommitError, ConfigError, RemoteError, StoreError, StoreResult};
pub use operation::{CreateOp, Operation, UpdateOp};
pub use orchestrator::SyncOrchestrator;
pub use reconcile::{AbortReason, ReconciliationReport, Reconciler, RetryPolicy, RetryState};
pub use record::{RecordKey, SyncStatus, SyncableRecord};
pub use remote::{PushKind, PushOutcome, RemoteAck, RemoteClient, RemotePush};
pub use scheduler::{spawn_sweeper, SweepSchedule, SweeperHandle};
pub use services::{Eligibility, SyncServices};
pub use snapshot::{StoreSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use store::{LocalStore, MemoryStore, RecordFilter, WriteFn, WriteTxn};

/// Type aliases for clarity
pub type RecordId = String;
pub type CollectionName = String;
pub type UserId = String;
pub type Version = u64;
/// Milliseconds since the Unix epoch
pub type Timestamp = u64;
