//! # syncdir engine
//!
//! Commit-response reconciliation and cycle-end bookkeeping.
//!
//! This crate provides:
//! - [`ProcessCommitResponseCommand`]: applies the server's per-entry commit
//!   acknowledgments to the local directory in one write transaction
//! - [`NameAside`]: the two-phase rename that keeps sibling names unique
//!   while a batch is applied
//! - [`SyncerEndCommand`]: marks the first full sync as done and announces
//!   the end of the cycle
//! - [`SyncerEventChannel`]: synchronous, failure-isolating broadcast to
//!   registered listeners
//!
//! ## Flow
//!
//! The network layer has already sent the pending local changes and
//! received one [`CommitResponseEntry`] per committed item. A
//! [`SyncSession`] carries those responses together with the directory
//! manager and the event channel:
//!
//! 1. `ProcessCommitResponseCommand` reconciles the batch
//! 2. `SyncerEndCommand` updates directory state and notifies listeners
//!
//! [`Syncer::run_cycle`] runs both steps in order.
//!
//! ## Key Invariants
//!
//! - One write transaction per processing pass; all-or-nothing
//! - A bad or unmatched response never aborts the rest of the batch
//! - Replaying an applied batch changes nothing
//! - `SYNC_CYCLE_ENDED` is broadcast even when the directory is unavailable

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod commit;
mod config;
mod cycle;
mod error;
mod event;
mod finalizer;
mod response;
mod session;
mod status;

pub use commit::{
    order_parents_first, CommitResponseOutcome, NameAside, NameAsideState,
    ProcessCommitResponseCommand,
};
pub use config::{EngineConfig, ParentOrdering};
pub use cycle::{CycleReport, Syncer};
pub use error::{ListenerError, SyncError, SyncResult};
pub use event::{
    ListenerId, NotifyReport, SenderListener, SyncSessionSnapshot, SyncerEvent,
    SyncerEventChannel, SyncerEventKind, SyncerEventListener,
};
pub use finalizer::SyncerEndCommand;
pub use response::{CommitResponseEntry, MalformedResponse, ResponseType};
pub use session::{Session, SyncSession};
pub use status::{CommitOutcome, ConflictTally, SyncerStatus};
