pub mod entry;
pub mod pool;
pub mod priority;

pub use entry::{Account, Entry, EntryKey, EntryRef, EntryState, EntryStatus};
pub use pool::{Pool, PoolCatalog, StaticPoolCatalog};
pub use priority::{Candidate, PriorityPolicy};

#[cfg(test)]
pub use pool::MockPoolCatalog;
