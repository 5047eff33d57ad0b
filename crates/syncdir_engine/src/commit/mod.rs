//! Commit-response reconciliation.

mod name_aside;
mod ordering;
mod processor;

pub use name_aside::{NameAside, NameAsideState};
pub use ordering::order_parents_first;
pub use processor::{CommitResponseOutcome, ProcessCommitResponseCommand};
