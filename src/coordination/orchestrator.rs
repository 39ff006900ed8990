//! Orchestrator Loop
//!
//! Cooperative polling loop bound to one driver. The loop ticks at most once
//! per `loop_delay`, can be woken early, and survives failing ticks.
//!
//! Wake-ups are coalesced: a wake that arrives mid-tick is remembered (once)
//! and triggers a re-tick right after the current one.

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::error::Result;

/// Loop configuration
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Name used in log fields
    pub name: String,
    /// Minimum delay between two tick starts, unless woken
    pub loop_delay: Duration,
}

impl LoopConfig {
    pub fn new(name: impl Into<String>, loop_delay: Duration) -> Self {
        Self {
            name: name.into(),
            loop_delay,
        }
    }
}

/// Clonable handle to wake a loop
#[derive(Debug, Clone, Default)]
pub struct LoopWaker {
    notify: Arc<Notify>,
}

impl LoopWaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interrupt the current sleep, or schedule an immediate re-tick if the
    /// loop is busy. Repeated wakes collapse into one.
    pub fn wake(&self) {
        self.notify.notify_one();
    }

    async fn woken(&self) {
        self.notify.notified().await;
    }

    /// Drop a wake left over from before the loop (re)started
    fn clear(&self) {
        let _ = self.notify.notified().now_or_never();
    }
}

/// Outcome of [`LoopContext::wait_min_interval`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Enough time had already passed since the last run
    NotNeeded,
    /// Slept the full remaining interval
    Elapsed,
    /// Sleep cut short by a wake
    Woken,
    /// Sleep cut short because the loop is stopping
    Stopped,
}

impl WaitOutcome {
    pub fn waited(&self) -> bool {
        !matches!(self, WaitOutcome::NotNeeded)
    }

    pub fn interrupted(&self) -> bool {
        matches!(self, WaitOutcome::Woken | WaitOutcome::Stopped)
    }
}

/// Hooks implemented by a loop consumer
#[async_trait]
pub trait LoopDriver: Send + Sync + 'static {
    /// Called on every (re)start before the first tick
    async fn on_reset(&self) {}

    async fn on_tick(&self, ctx: &LoopContext) -> Result<()>;
}

/// Run state of one loop generation. A generation is alive until `stop()` or
/// a later `start()` replaces it.
#[derive(Debug, Clone)]
struct Liveness {
    running: Arc<AtomicBool>,
    current: Arc<AtomicU64>,
    generation: u64,
    shutdown: Arc<Notify>,
}

impl Liveness {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            current: Arc::new(AtomicU64::new(0)),
            generation: 0,
            shutdown: Arc::new(Notify::new()),
        }
    }

    fn alive(&self) -> bool {
        self.running.load(Ordering::SeqCst)
            && self.current.load(Ordering::SeqCst) == self.generation
    }
}

/// Per-loop helpers available inside `on_tick`
#[derive(Debug, Clone)]
pub struct LoopContext {
    name: String,
    waker: LoopWaker,
    last_run: Arc<Mutex<Option<Instant>>>,
    liveness: Liveness,
}

impl LoopContext {
    /// Context not bound to a running loop, for driving a driver by hand
    pub fn detached(name: impl Into<String>, waker: LoopWaker) -> Self {
        let liveness = Liveness::new();
        liveness.running.store(true, Ordering::SeqCst);
        Self {
            name: name.into(),
            waker,
            last_run: Arc::new(Mutex::new(None)),
            liveness,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the loop was asked to stop; the current tick should wind down
    pub fn is_stopping(&self) -> bool {
        !self.liveness.alive()
    }

    /// Record a productive action for `wait_min_interval`
    pub async fn set_last_run(&self) {
        *self.last_run.lock().await = Some(Instant::now());
    }

    pub async fn last_run(&self) -> Option<Instant> {
        *self.last_run.lock().await
    }

    /// Sleep until `delay` has passed since the last recorded run, returning
    /// early if the loop is woken or stopped.
    pub async fn wait_min_interval(&self, delay: Duration) -> WaitOutcome {
        let Some(last_run) = self.last_run().await else {
            return WaitOutcome::NotNeeded;
        };
        let elapsed = last_run.elapsed();
        if elapsed >= delay {
            return WaitOutcome::NotNeeded;
        }

        // Registered before the check so a concurrent stop() is not missed
        let stopped = self.liveness.shutdown.notified();
        if self.is_stopping() {
            return WaitOutcome::Stopped;
        }

        let remaining = delay - elapsed;
        debug!(loop_name = %self.name, "sleeping {:?} for min interval", remaining);
        tokio::select! {
            _ = tokio::time::sleep(remaining) => WaitOutcome::Elapsed,
            _ = self.waker.woken() => {
                debug!(loop_name = %self.name, "min interval wait interrupted");
                WaitOutcome::Woken
            }
            _ = stopped => WaitOutcome::Stopped,
        }
    }
}

/// Start/stop-able cooperative loop around a [`LoopDriver`]
pub struct OrchestratorLoop<D: LoopDriver> {
    config: LoopConfig,
    driver: Arc<D>,
    waker: LoopWaker,
    last_run: Arc<Mutex<Option<Instant>>>,
    liveness: Liveness,
}

impl<D: LoopDriver> OrchestratorLoop<D> {
    pub fn new(config: LoopConfig, waker: LoopWaker, driver: Arc<D>) -> Self {
        Self {
            config,
            driver,
            waker,
            last_run: Arc::new(Mutex::new(None)),
            liveness: Liveness::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    pub fn waker(&self) -> LoopWaker {
        self.waker.clone()
    }

    pub fn wake(&self) {
        self.waker.wake();
    }

    pub fn is_started(&self) -> bool {
        self.liveness.running.load(Ordering::SeqCst)
    }

    /// Start the loop. No-op if already running; otherwise resets the driver
    /// and spawns the tick task. Returns whether the loop was started.
    pub async fn start(&self) -> bool {
        if self.liveness.running.swap(true, Ordering::SeqCst) {
            debug!(loop_name = %self.config.name, "loop already started");
            return false;
        }
        let liveness = Liveness {
            generation: self.liveness.current.fetch_add(1, Ordering::SeqCst) + 1,
            ..self.liveness.clone()
        };

        *self.last_run.lock().await = None;
        // The first tick runs right away and covers any earlier wake
        self.waker.clear();
        self.driver.on_reset().await;

        let ctx = LoopContext {
            name: self.config.name.clone(),
            waker: self.waker.clone(),
            last_run: self.last_run.clone(),
            liveness,
        };
        let driver = self.driver.clone();
        let loop_delay = self.config.loop_delay;

        info!(
            loop_name = %self.config.name,
            "loop started (loop_delay={:?})",
            loop_delay
        );

        tokio::spawn(async move {
            while !ctx.is_stopping() {
                let tick_started = Instant::now();

                match AssertUnwindSafe(driver.on_tick(&ctx)).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(loop_name = %ctx.name, "tick failed: {}", e),
                    Err(_) => error!(loop_name = %ctx.name, "tick panicked"),
                }

                let stopped = ctx.liveness.shutdown.notified();
                if ctx.is_stopping() {
                    break;
                }

                tokio::select! {
                    _ = tokio::time::sleep_until(tick_started + loop_delay) => {}
                    _ = ctx.waker.woken() => {
                        debug!(loop_name = %ctx.name, "woken");
                    }
                    _ = stopped => break,
                }
            }

            info!(loop_name = %ctx.name, "loop stopped");
        });

        true
    }

    /// Ask the loop to exit after the current tick. Idempotent. Does not wake
    /// the driver: a tick waiting in `wait_min_interval` sees `Stopped`.
    pub fn stop(&self) {
        if self.liveness.running.swap(false, Ordering::SeqCst) {
            info!(loop_name = %self.config.name, "stopping loop");
            self.liveness.shutdown.notify_waiters();
        }
    }
}
