//! Wallet-side boundary consumed by the schedulers

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Account, EntryKey, EntryRef};
use crate::error::Result;
use crate::protocol::MixMessage;
use crate::round::{run_round, RoundOutcome, RoundStateMachine};

/// Completion callback handed to `WalletFacade::start_round`
#[async_trait]
pub trait RoundListener: Send + Sync {
    /// Called exactly once when the round reaches a terminal state
    async fn on_round_end(&self, outcome: RoundOutcome);
}

/// Reference to a started round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundHandle {
    pub id: Uuid,
    pub key: EntryKey,
    pub started_at: DateTime<Utc>,
}

impl RoundHandle {
    pub fn new(key: EntryKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            started_at: Utc::now(),
        }
    }
}

/// Coin listing, cache control and round start, implemented by the wallet
#[async_trait]
pub trait WalletFacade: Send + Sync {
    /// Entries of the given accounts, re-scanned when `force_refresh` is set
    async fn list_entries(&self, force_refresh: bool, accounts: &[Account]) -> Result<Vec<EntryRef>>;

    /// Drop cached balance and coin views for an account
    async fn invalidate_cache(&self, account: Account);

    /// Start a round for `entry`; `listener` must be notified on completion
    async fn start_round(
        &self,
        entry: EntryRef,
        listener: Arc<dyn RoundListener>,
    ) -> Result<RoundHandle>;
}

/// Run a prepared round on its own task and report the outcome to `listener`.
///
/// Helper for `WalletFacade::start_round` implementations.
pub fn spawn_round(
    key: EntryKey,
    machine: RoundStateMachine,
    inbound: mpsc::Receiver<MixMessage>,
    listener: Arc<dyn RoundListener>,
) -> RoundHandle {
    let handle = RoundHandle::new(key);
    let id = handle.id;
    tokio::spawn(async move {
        let outcome = run_round(machine, inbound).await;
        debug!(handle = %id, %outcome, "round task finished");
        listener.on_round_end(outcome).await;
    });
    handle
}
