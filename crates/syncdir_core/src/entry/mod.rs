//! Entry types.

mod id;
mod kernel;

pub use id::EntryId;
pub use kernel::EntryKernel;
