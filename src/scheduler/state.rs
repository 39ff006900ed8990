use serde::{Deserialize, Serialize};

use crate::domain::EntryKey;

/// Point-in-time view of the round scheduler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerState {
    /// Entries currently occupying a slot
    pub mixing: Vec<EntryKey>,
    pub max_concurrency: usize,
    pub idle: usize,
    /// Entries waiting for a slot
    pub queued: usize,
}

impl SchedulerState {
    pub fn nb_mixing(&self) -> usize {
        self.mixing.len()
    }
}
