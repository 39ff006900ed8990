//! Queue ordering
//!
//! Both policies are total: the entry key is the final tie-break, so the same
//! queue always yields the same pick.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::entry::{EntryRef, EntryState};

/// Rule used to pick the next queued entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityPolicy {
    /// Higher pool denomination first, then earliest queued
    #[default]
    LargestPoolFirst,
    /// Earliest queued first
    Fifo,
}

/// A queued entry together with the state it was read with
#[derive(Debug, Clone)]
pub struct Candidate {
    pub entry: EntryRef,
    pub state: EntryState,
}

impl Candidate {
    pub async fn read(entry: EntryRef) -> Self {
        let state = entry.snapshot().await;
        Self { entry, state }
    }

    fn queue_order(&self) -> u64 {
        // Entries queued outside the scheduler go last
        self.state.queued_seq.unwrap_or(u64::MAX)
    }

    fn denomination(&self) -> u64 {
        self.state.denomination_sats().unwrap_or(0)
    }
}

impl PriorityPolicy {
    pub fn compare(&self, a: &Candidate, b: &Candidate) -> Ordering {
        let by_queue = || {
            a.queue_order()
                .cmp(&b.queue_order())
                .then_with(|| a.entry.key().cmp(b.entry.key()))
        };
        match self {
            PriorityPolicy::LargestPoolFirst => b
                .denomination()
                .cmp(&a.denomination())
                .then_with(by_queue),
            PriorityPolicy::Fifo => by_queue(),
        }
    }

    pub fn sort(&self, candidates: &mut [Candidate]) {
        candidates.sort_by(|a, b| self.compare(a, b));
    }
}
