//! Round scheduling
//!
//! `RoundScheduler` decides which queued entry starts next; `RescanScheduler`
//! feeds it newly detected premix coins. Both run on an `OrchestratorLoop`.

pub mod rescan;
pub mod round_scheduler;
pub mod state;
pub mod wallet;

pub use rescan::RescanScheduler;
pub use round_scheduler::{RoundScheduler, MIX_ACCOUNTS};
pub use state::SchedulerState;
pub use wallet::{spawn_round, RoundHandle, RoundListener, WalletFacade};
