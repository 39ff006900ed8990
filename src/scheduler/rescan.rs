//! Premix rescan loop
//!
//! Periodically forces a refresh of the premix account so newly spendable
//! coins surface as detection events, and queues detected premix entries
//! after assigning them a pool.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::round_scheduler::RoundScheduler;
use super::wallet::WalletFacade;
use crate::coordination::{LoopContext, LoopDriver};
use crate::domain::{Account, EntryRef, EntryStatus, PoolCatalog};
use crate::error::Result;

const MSG_NO_POOL: &str = "No pool for this denomination";

pub struct RescanScheduler {
    wallet: Arc<dyn WalletFacade>,
    pools: Arc<dyn PoolCatalog>,
    scheduler: Arc<RoundScheduler>,
}

impl RescanScheduler {
    pub fn new(
        wallet: Arc<dyn WalletFacade>,
        pools: Arc<dyn PoolCatalog>,
        scheduler: Arc<RoundScheduler>,
    ) -> Self {
        Self {
            wallet,
            pools,
            scheduler,
        }
    }

    /// Assign a pool to a ready premix entry if needed, then queue it
    pub async fn on_utxo_detected(&self, entry: &EntryRef) {
        if entry.account() != Account::Premix || entry.status().await != EntryStatus::Ready {
            debug!(" o new entry detected, not queueing: {}", entry);
            return;
        }

        if entry.pool().await.is_none() {
            // First eligible pool is the largest denomination
            let Some(pool) = self.pools.find_eligible_pools(entry).into_iter().next() else {
                warn!("no pool for this denomination: {}", entry);
                entry.set_error(MSG_NO_POOL).await;
                return;
            };
            debug!(entry = %entry.key(), pool = %pool.pool_id, "pool assigned");
            entry.update(|s| s.pool = Some(pool)).await;
        }

        debug!(" o new premix entry detected, adding to mix queue: {}", entry);
        if let Err(e) = self.scheduler.mix_queue(entry).await {
            error!(entry = %entry.key(), "could not queue detected entry: {}", e);
        }
    }
}

#[async_trait]
impl LoopDriver for RescanScheduler {
    async fn on_tick(&self, _ctx: &LoopContext) -> Result<()> {
        debug!("checking for premix entries ready to mix...");
        let entries = self.wallet.list_entries(true, &[Account::Premix]).await?;
        debug!("premix rescan found {} entries", entries.len());
        Ok(())
    }
}
