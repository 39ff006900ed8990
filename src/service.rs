//! Mix Service
//!
//! Owns the round scheduler and the premix rescan loop, and routes wallet
//! events to both.

use std::sync::Arc;
use tracing::info;
use url::Url;

use crate::config::ClientConfig;
use crate::coordination::{LoopConfig, LoopWaker, OrchestratorLoop};
use crate::domain::{EntryRef, PoolCatalog};
use crate::error::{MixError, Result};
use crate::scheduler::{RescanScheduler, RoundScheduler, SchedulerState, WalletFacade};

pub struct MixService {
    register_output_url: Url,
    scheduler: Arc<RoundScheduler>,
    rescan: Arc<RescanScheduler>,
    mix_loop: OrchestratorLoop<RoundScheduler>,
    rescan_loop: OrchestratorLoop<RescanScheduler>,
}

impl MixService {
    pub fn new(
        config: &ClientConfig,
        wallet: Arc<dyn WalletFacade>,
        pools: Arc<dyn PoolCatalog>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|errors| MixError::Config(::config::ConfigError::Message(errors.join("; "))))?;
        let register_output_url = config
            .server
            .register_output_url()
            .map_err(|e| MixError::Internal(format!("invalid server url: {e}")))?;

        let mix_waker = LoopWaker::new();
        let scheduler = Arc::new(RoundScheduler::new(
            config.scheduler.clone(),
            wallet.clone(),
            mix_waker.clone(),
        ));
        let mix_loop = OrchestratorLoop::new(
            LoopConfig::new("mix", config.scheduler.loop_delay()),
            mix_waker,
            scheduler.clone(),
        );

        let rescan = Arc::new(RescanScheduler::new(wallet, pools, scheduler.clone()));
        let rescan_loop = OrchestratorLoop::new(
            LoopConfig::new("rescan", config.rescan.loop_delay()),
            LoopWaker::new(),
            rescan.clone(),
        );

        Ok(Self {
            register_output_url,
            scheduler,
            rescan,
            mix_loop,
            rescan_loop,
        })
    }

    /// Where rounds submit their output registration
    pub fn register_output_url(&self) -> &Url {
        &self.register_output_url
    }

    pub fn scheduler(&self) -> &Arc<RoundScheduler> {
        &self.scheduler
    }

    pub async fn start(&self) {
        info!("starting mix service");
        self.mix_loop.start().await;
        self.rescan_loop.start().await;
    }

    pub fn stop(&self) {
        info!("stopping mix service");
        self.mix_loop.stop();
        self.rescan_loop.stop();
    }

    pub fn is_started(&self) -> bool {
        self.mix_loop.is_started()
    }

    pub async fn mix_queue(&self, entry: &EntryRef) -> Result<()> {
        self.scheduler.mix_queue(entry).await
    }

    pub async fn mix_stop(&self, entry: &EntryRef) -> Result<()> {
        self.scheduler.mix_stop(entry).await
    }

    pub async fn on_utxo_detected(&self, entry: &EntryRef) {
        self.rescan.on_utxo_detected(entry).await;
        self.scheduler.on_utxo_detected(entry).await;
    }

    pub async fn on_utxo_confirmed(&self, entry: &EntryRef) {
        self.scheduler.on_utxo_confirmed(entry).await;
    }

    pub async fn state(&self) -> SchedulerState {
        self.scheduler.state().await
    }
}
