//! Round execution
//!
//! `RoundStateMachine` holds the protocol logic; `run_round` feeds it the
//! inbound message queue of one transport session, one message at a time.

pub mod session;
pub mod state_machine;

pub use session::{RoundOutcome, RoundSession};
pub use state_machine::RoundStateMachine;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::ProtocolError;
use crate::protocol::MixMessage;

/// Drive a round until it reaches a terminal state.
///
/// If the session queue closes first, the round is aborted with
/// `ProtocolError::SessionClosed` so the participant still gets its terminal
/// callback.
pub async fn run_round(
    mut machine: RoundStateMachine,
    mut inbound: mpsc::Receiver<MixMessage>,
) -> RoundOutcome {
    while let Some(message) = inbound.recv().await {
        machine.on_notification(message).await;
        if let Some(outcome) = machine.outcome() {
            debug!(round = %machine.label(), %outcome, "round finished");
            return outcome.clone();
        }
    }

    warn!(round = %machine.label(), "session closed before round completion");
    machine.abort(ProtocolError::SessionClosed).await;
    machine
        .outcome()
        .cloned()
        .unwrap_or_else(|| RoundOutcome::ProtocolError(ProtocolError::SessionClosed.to_string()))
}
