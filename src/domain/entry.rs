use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::pool::Pool;

/// Stable identity of a coin: originating transaction hash + output index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryKey {
    pub tx_hash: String,
    pub vout: u32,
}

impl EntryKey {
    pub fn new(tx_hash: impl Into<String>, vout: u32) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            vout,
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_hash, self.vout)
    }
}

/// Wallet bucket a coin lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Account {
    Deposit,
    /// Inputs waiting for their first round
    Premix,
    /// Outputs of a previous round
    Postmix,
}

impl Account {
    pub fn as_str(&self) -> &'static str {
        match self {
            Account::Deposit => "DEPOSIT",
            Account::Premix => "PREMIX",
            Account::Postmix => "POSTMIX",
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scheduling status of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryStatus {
    /// Idle, not scheduled
    Ready,
    /// Waiting for a free slot
    Queued,
    /// Occupying a slot
    Started,
    Succeeded,
    Failed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Ready => "READY",
            EntryStatus::Queued => "QUEUED",
            EntryStatus::Started => "STARTED",
            EntryStatus::Succeeded => "SUCCEEDED",
            EntryStatus::Failed => "FAILED",
        }
    }

    /// Whether `mix_queue` accepts an entry in this status
    pub fn can_queue(&self) -> bool {
        matches!(self, EntryStatus::Ready | EntryStatus::Failed)
    }

    /// Whether `mix_stop` accepts an entry in this status
    pub fn can_stop(&self) -> bool {
        !matches!(self, EntryStatus::Ready)
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mutable part of an entry, shared between the wallet and the schedulers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryState {
    pub status: EntryStatus,
    /// Set before queueing; must not change while queued or started
    pub pool: Option<Pool>,
    pub confirmations: u32,
    pub mixes_done: u32,
    pub mixes_target: u32,
    /// Queue order, assigned by the round scheduler
    pub queued_seq: Option<u64>,
    pub queued_at: Option<DateTime<Utc>>,
    /// Advisory message for the user
    pub message: Option<String>,
    pub error: Option<String>,
}

impl Default for EntryState {
    fn default() -> Self {
        Self {
            status: EntryStatus::Ready,
            pool: None,
            confirmations: 0,
            mixes_done: 0,
            mixes_target: 1,
            queued_seq: None,
            queued_at: None,
            message: None,
            error: None,
        }
    }
}

impl EntryState {
    pub fn denomination_sats(&self) -> Option<u64> {
        self.pool.as_ref().map(|p| p.denomination_sats)
    }

    pub fn has_remaining_mixes(&self) -> bool {
        self.mixes_done < self.mixes_target
    }
}

/// One mixable coin as seen by the schedulers.
///
/// Identity fields are immutable; everything the schedulers touch lives
/// behind an async lock so wallet and rounds can share the same record.
#[derive(Debug)]
pub struct Entry {
    key: EntryKey,
    account: Account,
    value_sats: u64,
    state: RwLock<EntryState>,
}

pub type EntryRef = Arc<Entry>;

impl Entry {
    pub fn new(key: EntryKey, account: Account, value_sats: u64) -> Self {
        Self::with_state(key, account, value_sats, EntryState::default())
    }

    pub fn with_state(key: EntryKey, account: Account, value_sats: u64, state: EntryState) -> Self {
        Self {
            key,
            account,
            value_sats,
            state: RwLock::new(state),
        }
    }

    pub fn key(&self) -> &EntryKey {
        &self.key
    }

    pub fn account(&self) -> Account {
        self.account
    }

    pub fn value_sats(&self) -> u64 {
        self.value_sats
    }

    pub async fn snapshot(&self) -> EntryState {
        self.state.read().await.clone()
    }

    pub async fn status(&self) -> EntryStatus {
        self.state.read().await.status
    }

    pub async fn pool(&self) -> Option<Pool> {
        self.state.read().await.pool.clone()
    }

    pub async fn update<R>(&self, f: impl FnOnce(&mut EntryState) -> R) -> R {
        let mut state = self.state.write().await;
        f(&mut state)
    }

    pub async fn set_status(&self, status: EntryStatus) {
        self.state.write().await.status = status;
    }

    pub async fn set_confirmations(&self, confirmations: u32) {
        self.state.write().await.confirmations = confirmations;
    }

    pub async fn set_message(&self, message: impl Into<String>) {
        self.state.write().await.message = Some(message.into());
    }

    pub async fn set_error(&self, error: impl Into<String>) {
        self.state.write().await.error = Some(error.into());
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {} sats)", self.key, self.account, self.value_sats)
    }
}
