//! Coordination Layer
//!
//! Generic cooperative loop shared by the schedulers:
//! - Start/stop lifecycle with reset hook
//! - Wake-ups coalesced into a single pending re-tick
//! - Minimum spacing between productive actions

pub mod orchestrator;

pub use orchestrator::{
    LoopConfig, LoopContext, LoopDriver, LoopWaker, OrchestratorLoop, WaitOutcome,
};
