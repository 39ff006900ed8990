pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod round;
pub mod scheduler;
pub mod service;

pub use crate::config::ClientConfig;
pub use coordination::{LoopConfig, LoopContext, LoopDriver, LoopWaker, OrchestratorLoop};
pub use domain::{
    Account, Entry, EntryKey, EntryRef, EntryState, EntryStatus, Pool, PoolCatalog,
    PriorityPolicy, StaticPoolCatalog,
};
pub use error::{ChannelError, MixError, ParticipantError, ProtocolError, Result};
pub use logging::{init_logging, init_logging_simple};
pub use protocol::{MessageChannel, MixMessage, Phase, QueueChannel, RoundParticipant};
pub use round::{run_round, RoundOutcome, RoundStateMachine};
pub use scheduler::{
    spawn_round, RescanScheduler, RoundHandle, RoundListener, RoundScheduler, SchedulerState,
    WalletFacade,
};
pub use service::MixService;
