//! Round Scheduler
//!
//! Admission control over queued entries. Each tick fills idle slots one at a
//! time, spacing starts by `per_start_delay`, and never runs two entries from
//! the same origin transaction at once.
//!
//! The slot map is the only state shared with running rounds. Every read or
//! write of it goes through one mutex. The wallet is listed before the lock is
//! taken; picking among the listed entries and reserving the slot happen under
//! the lock, so `mix_stop` cannot interleave with a start.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::state::SchedulerState;
use super::wallet::{RoundHandle, RoundListener, WalletFacade};
use crate::config::SchedulerConfig;
use crate::coordination::{LoopContext, LoopDriver, LoopWaker};
use crate::domain::{Account, Candidate, EntryKey, EntryRef, EntryStatus};
use crate::error::{MixError, Result};
use crate::round::RoundOutcome;

/// Accounts whose queued entries compete for slots
pub const MIX_ACCOUNTS: [Account; 2] = [Account::Premix, Account::Postmix];

const MSG_UNCONFIRMED: &str = "Queued: unconfirmed";
const MSG_SAME_ORIGIN: &str = "Queued: another entry from the same origin is mixing";

/// One occupied concurrency unit
#[derive(Debug, Clone)]
struct Slot {
    entry: EntryRef,
    /// None between reservation and the wallet accepting the round
    handle: Option<RoundHandle>,
}

type SlotMap = HashMap<EntryKey, Slot>;

pub struct RoundScheduler {
    config: SchedulerConfig,
    wallet: Arc<dyn WalletFacade>,
    slots: Arc<Mutex<SlotMap>>,
    waker: LoopWaker,
    queue_seq: AtomicU64,
}

impl RoundScheduler {
    /// `waker` must be the one given to the loop driving this scheduler
    pub fn new(config: SchedulerConfig, wallet: Arc<dyn WalletFacade>, waker: LoopWaker) -> Self {
        Self {
            config,
            wallet,
            slots: Arc::new(Mutex::new(HashMap::new())),
            waker,
            queue_seq: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub async fn idle(&self) -> usize {
        let slots = self.slots.lock().await;
        self.config.max_concurrency.saturating_sub(slots.len())
    }

    pub async fn is_mixing(&self, key: &EntryKey) -> bool {
        self.slots.lock().await.contains_key(key)
    }

    pub async fn round_handle(&self, key: &EntryKey) -> Option<RoundHandle> {
        self.slots
            .lock()
            .await
            .get(key)
            .and_then(|slot| slot.handle.clone())
    }

    pub async fn state(&self) -> SchedulerState {
        let (mut mixing, idle) = {
            let slots = self.slots.lock().await;
            let mixing: Vec<EntryKey> = slots.values().map(|s| s.entry.key().clone()).collect();
            (mixing, self.config.max_concurrency.saturating_sub(slots.len()))
        };
        mixing.sort();

        let queued = match self.queued_candidates().await {
            Ok(candidates) => candidates.len(),
            Err(e) => {
                warn!("could not count queued entries: {}", e);
                0
            }
        };

        SchedulerState {
            mixing,
            max_concurrency: self.config.max_concurrency,
            idle,
            queued,
        }
    }

    /// Add an entry to the mix queue and wake the loop.
    ///
    /// Fails if the entry has no pool or is not `Ready`/`Failed`. Entries
    /// already queued or holding a slot are left alone.
    pub async fn mix_queue(&self, entry: &EntryRef) -> Result<()> {
        let slots = self.slots.lock().await;
        let state = entry.snapshot().await;

        if state.pool.is_none() {
            return Err(MixError::Validation(
                "cannot add to mix queue: no pool set".to_string(),
            ));
        }
        if state.status == EntryStatus::Queued {
            warn!(entry = %entry.key(), "mix_queue ignored: entry already queued");
            return Ok(());
        }
        if !state.status.can_queue() {
            return Err(MixError::Validation(format!(
                "cannot add to mix queue: status={}",
                state.status
            )));
        }
        if slots.contains_key(entry.key()) {
            warn!(entry = %entry.key(), "mix_queue ignored: entry is mixing");
            return Ok(());
        }

        let seq = self.queue_seq.fetch_add(1, Ordering::SeqCst);
        entry
            .update(|s| {
                s.status = EntryStatus::Queued;
                s.queued_seq = Some(seq);
                s.queued_at = Some(Utc::now());
                s.message = None;
                s.error = None;
            })
            .await;
        drop(slots);

        debug!(" + mix_queue: {}", entry);
        self.waker.wake();
        Ok(())
    }

    /// Take an entry out of scheduling. Refused while it holds a slot.
    pub async fn mix_stop(&self, entry: &EntryRef) -> Result<()> {
        let slots = self.slots.lock().await;
        let status = entry.status().await;

        if !status.can_stop() {
            return Err(MixError::Validation(format!(
                "cannot stop mixing: status={}",
                status
            )));
        }
        if slots.contains_key(entry.key()) {
            return Err(MixError::Validation(
                "cannot stop mixing: round in progress".to_string(),
            ));
        }

        entry
            .update(|s| {
                s.status = EntryStatus::Ready;
                s.queued_seq = None;
                s.queued_at = None;
                s.message = None;
            })
            .await;
        info!(" - mix_stop: {}", entry);
        Ok(())
    }

    /// Queue unfinished post-mix outputs as they appear
    pub async fn on_utxo_detected(&self, entry: &EntryRef) {
        if entry.account() != Account::Postmix {
            return;
        }
        let state = entry.snapshot().await;
        if state.status == EntryStatus::Ready && state.has_remaining_mixes() && state.pool.is_some()
        {
            info!(" o new POSTMIX entry detected, adding to mix queue: {}", entry);
            if let Err(e) = self.mix_queue(entry).await {
                error!(entry = %entry.key(), "on_utxo_detected failed: {}", e);
            }
        }
    }

    /// A queued entry reaching the confirmation threshold is a scheduling trigger
    pub async fn on_utxo_confirmed(&self, entry: &EntryRef) {
        let state = entry.snapshot().await;
        if state.status == EntryStatus::Queued
            && state.confirmations >= self.config.min_confirmations
        {
            info!(" o confirmed entry detected, checking for mix: {}", entry);
            self.waker.wake();
        }
    }

    /// Up to `limit` mixable entries by priority, at most one per origin
    pub async fn find_to_mix_by_priority(&self, limit: usize) -> Result<Vec<EntryRef>> {
        let candidates = self.sorted_candidates().await?;
        let slots = self.slots.lock().await;
        Ok(self.pick(&slots, candidates, limit).await)
    }

    async fn queued_candidates(&self) -> Result<Vec<Candidate>> {
        let entries = self.wallet.list_entries(false, &MIX_ACCOUNTS).await?;
        let mut candidates = Vec::with_capacity(entries.len());
        for entry in entries {
            let candidate = Candidate::read(entry).await;
            if candidate.state.status == EntryStatus::Queued {
                candidates.push(candidate);
            }
        }
        Ok(candidates)
    }

    async fn sorted_candidates(&self) -> Result<Vec<Candidate>> {
        let mut candidates = self.queued_candidates().await?;
        self.config.priority.sort(&mut candidates);
        Ok(candidates)
    }

    /// Walk listed candidates against the current slots. Caller holds the slots lock.
    async fn pick(
        &self,
        slots: &SlotMap,
        candidates: Vec<Candidate>,
        limit: usize,
    ) -> Vec<EntryRef> {
        let mut excluded: HashSet<String> = slots.keys().map(|k| k.tx_hash.clone()).collect();

        let mut picked = Vec::new();
        for candidate in candidates {
            if picked.len() >= limit {
                break;
            }
            let entry = candidate.entry;
            // Listed before the lock; may have been stopped since
            if entry.status().await != EntryStatus::Queued || slots.contains_key(entry.key()) {
                continue;
            }
            if excluded.contains(&entry.key().tx_hash) {
                entry.set_message(MSG_SAME_ORIGIN).await;
                continue;
            }
            if candidate.state.confirmations < self.config.min_confirmations {
                entry.set_message(MSG_UNCONFIRMED).await;
                continue;
            }
            excluded.insert(entry.key().tx_hash.clone());
            picked.push(entry);
        }
        picked
    }

    /// Reserve a slot for the best queued entry and start its round.
    /// Returns false when nothing is mixable.
    async fn find_queued_and_start(&self, ctx: &LoopContext) -> Result<bool> {
        if self.idle().await == 0 {
            return Ok(false);
        }
        let candidates = self.sorted_candidates().await?;
        let entry = {
            let mut slots = self.slots.lock().await;
            if slots.len() >= self.config.max_concurrency {
                return Ok(false);
            }
            let Some(entry) = self.pick(&slots, candidates, 1).await.into_iter().next() else {
                return Ok(false);
            };
            entry
                .update(|s| {
                    s.status = EntryStatus::Started;
                    s.message = None;
                    s.error = None;
                })
                .await;
            slots.insert(
                entry.key().clone(),
                Slot {
                    entry: entry.clone(),
                    handle: None,
                },
            );
            entry
        };
        ctx.set_last_run().await;

        let listener = Arc::new(SlotRelease {
            entry: entry.clone(),
            slots: self.slots.clone(),
            wallet: self.wallet.clone(),
            waker: self.waker.clone(),
            released: AtomicBool::new(false),
        });

        match self.wallet.start_round(entry.clone(), listener).await {
            Ok(handle) => {
                info!(entry = %entry.key(), handle = %handle.id, " o round started");
                if let Some(slot) = self.slots.lock().await.get_mut(entry.key()) {
                    slot.handle = Some(handle);
                }
            }
            Err(e) => {
                error!(entry = %entry.key(), "could not start round: {}", e);
                entry
                    .update(|s| {
                        s.status = EntryStatus::Failed;
                        s.error = Some(e.to_string());
                    })
                    .await;
                self.slots.lock().await.remove(entry.key());
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl LoopDriver for RoundScheduler {
    async fn on_reset(&self) {
        // In-flight rounds keep their slots across restarts
        let in_flight = self.slots.lock().await.len();
        info!(
            "round scheduler reset ({} rounds in flight, max {})",
            in_flight, self.config.max_concurrency
        );
    }

    async fn on_tick(&self, ctx: &LoopContext) -> Result<()> {
        while self.idle().await > 0 && !ctx.is_stopping() {
            let wait = ctx.wait_min_interval(self.config.per_start_delay()).await;
            if ctx.is_stopping() {
                debug!("loop stopping, no more rounds this tick");
                return Ok(());
            }
            if wait.waited() && self.idle().await == 0 {
                return Ok(());
            }

            debug!(
                "{}/{} rounds running, checking for queued entries",
                self.config.max_concurrency - self.idle().await,
                self.config.max_concurrency
            );
            if !self.find_queued_and_start(ctx).await? {
                debug!("no queued entry mixable now");
                return Ok(());
            }
        }

        debug!("all {} slots busy", self.config.max_concurrency);
        Ok(())
    }
}

/// Frees the slot of one round when it ends
struct SlotRelease {
    entry: EntryRef,
    slots: Arc<Mutex<SlotMap>>,
    wallet: Arc<dyn WalletFacade>,
    waker: LoopWaker,
    released: AtomicBool,
}

#[async_trait]
impl RoundListener for SlotRelease {
    async fn on_round_end(&self, outcome: RoundOutcome) {
        if self.released.swap(true, Ordering::SeqCst) {
            warn!(entry = %self.entry.key(), "round end reported twice, ignoring");
            return;
        }

        if outcome.is_success() {
            self.entry
                .update(|s| {
                    s.status = EntryStatus::Succeeded;
                    s.mixes_done += 1;
                    s.queued_seq = None;
                    s.error = None;
                })
                .await;
            let origin = self.entry.account();
            self.wallet.invalidate_cache(origin).await;
            if origin != Account::Postmix {
                self.wallet.invalidate_cache(Account::Postmix).await;
            }
            info!(entry = %self.entry.key(), " o round succeeded");
        } else {
            self.entry
                .update(|s| {
                    s.status = EntryStatus::Failed;
                    s.queued_seq = None;
                    s.error = Some(outcome.to_string());
                })
                .await;
            warn!(entry = %self.entry.key(), %outcome, " x round failed");
        }

        self.slots.lock().await.remove(self.entry.key());
        self.waker.wake();
    }
}
