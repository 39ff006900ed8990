//! Per-round protocol state
//!
//! Owned by exactly one `RoundStateMachine`; never shared across tasks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::ProtocolError;
use crate::protocol::{Phase, RegisterOutputNotification};

/// How a round ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundOutcome {
    Success,
    Fail,
    ProtocolError(String),
    ResponseError(String),
}

impl RoundOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RoundOutcome::Success)
    }
}

impl fmt::Display for RoundOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundOutcome::Success => write!(f, "success"),
            RoundOutcome::Fail => write!(f, "fail"),
            RoundOutcome::ProtocolError(e) => write!(f, "protocol error: {}", e),
            RoundOutcome::ResponseError(e) => write!(f, "response error: {}", e),
        }
    }
}

#[derive(Debug, Default)]
pub struct RoundSession {
    round_id: Option<String>,
    /// Highest phase notified so far
    current_phase: Option<Phase>,
    /// Most recent phase notified, for duplicate detection
    last_phase: Option<Phase>,
    completed: BTreeSet<Phase>,
    confirm_input_acknowledged: bool,
    early_register_output: Option<RegisterOutputNotification>,
    outcome: Option<RoundOutcome>,
}

impl RoundSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn round_id(&self) -> Option<&str> {
        self.round_id.as_deref()
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.current_phase
    }

    pub fn completed_phases(&self) -> impl Iterator<Item = Phase> + '_ {
        self.completed.iter().copied()
    }

    pub fn is_completed(&self, phase: Phase) -> bool {
        self.completed.contains(&phase)
    }

    pub fn confirm_input_acknowledged(&self) -> bool {
        self.confirm_input_acknowledged
    }

    pub fn has_early_register_output(&self) -> bool {
        self.early_register_output.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&RoundOutcome> {
        self.outcome.as_ref()
    }

    /// Set the round id on first sight, then require every message to match it
    pub fn accept_round_id(&mut self, round_id: &str) -> Result<(), ProtocolError> {
        match &self.round_id {
            None => {
                self.round_id = Some(round_id.to_string());
                Ok(())
            }
            Some(expected) if expected == round_id => Ok(()),
            Some(expected) => Err(ProtocolError::InvalidRoundId {
                expected: expected.clone(),
                actual: round_id.to_string(),
            }),
        }
    }

    /// Record an incoming phase notification. A phase that is not completed is
    /// always accepted; the chronology gate decides whether it is processed.
    /// `current_phase` only moves forward.
    pub fn advance(&mut self, phase: Phase) -> Result<(), ProtocolError> {
        if self.completed.contains(&phase) {
            return Err(ProtocolError::PhaseAlreadyCompleted(phase));
        }
        if self.last_phase == Some(phase) {
            return Err(ProtocolError::DuplicateNotification(phase));
        }
        self.last_phase = Some(phase);
        self.current_phase = self.current_phase.max(Some(phase));
        Ok(())
    }

    pub fn complete(&mut self, phase: Phase) {
        self.completed.insert(phase);
    }

    /// Returns false if the ack was already recorded
    pub fn acknowledge_confirm_input(&mut self) -> bool {
        !std::mem::replace(&mut self.confirm_input_acknowledged, true)
    }

    /// Keep a REGISTER_OUTPUT that arrived before our confirm-input ack
    pub fn buffer_register_output(&mut self, notification: RegisterOutputNotification) {
        self.early_register_output = Some(notification);
    }

    pub fn take_early_register_output(&mut self) -> Option<RegisterOutputNotification> {
        self.early_register_output.take()
    }

    /// Mark terminal. The first outcome wins.
    pub fn finish(&mut self, outcome: RoundOutcome) {
        if self.outcome.is_none() {
            self.outcome = Some(outcome);
        }
        self.early_register_output = None;
    }
}
