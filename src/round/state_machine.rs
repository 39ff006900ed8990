//! Round Protocol State Machine
//!
//! Drives one round from CONFIRM_INPUT to SUCCESS/FAIL:
//!
//! ```text
//! CONFIRM_INPUT → (ack) → REGISTER_OUTPUT ─┬→ SIGNING → SUCCESS
//!                                          └→ REVEAL_OUTPUT
//!        any phase → FAIL
//! ```
//!
//! Phases are processed only once their predecessor is completed. Early or
//! out-of-chronology notifications are logged and skipped; replays of a
//! completed phase abort the round. A REGISTER_OUTPUT that races ahead of the
//! confirm-input ack is held in a one-slot buffer and replayed on ack.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::session::{RoundOutcome, RoundSession};
use crate::error::{ProtocolError, RoundFault};
use crate::protocol::{
    ConfirmInputAck, Endpoint, MessageChannel, MixMessage, OutboundMessage, Phase,
    PhaseNotification, RegisterOutputNotification, RoundParticipant,
};

pub struct RoundStateMachine {
    label: String,
    participant: Arc<dyn RoundParticipant>,
    channel: Arc<dyn MessageChannel>,
    register_output_url: String,
    session: RoundSession,
}

impl RoundStateMachine {
    /// `label` identifies the round in logs (usually the entry key)
    pub fn new(
        label: impl Into<String>,
        participant: Arc<dyn RoundParticipant>,
        channel: Arc<dyn MessageChannel>,
        register_output_url: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            participant,
            channel,
            register_output_url: register_output_url.into(),
            session: RoundSession::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn round_id(&self) -> Option<&str> {
        self.session.round_id()
    }

    pub fn session(&self) -> &RoundSession {
        &self.session
    }

    pub fn is_terminal(&self) -> bool {
        self.session.is_terminal()
    }

    pub fn outcome(&self) -> Option<&RoundOutcome> {
        self.session.outcome()
    }

    /// Single entry point for inbound messages. Takes `&mut self`, so delivery
    /// for one session is serialized by construction.
    pub async fn on_notification(&mut self, message: MixMessage) {
        if self.session.is_terminal() {
            debug!(round = %self.label, "ignoring message, round is done");
            return;
        }

        let result = match message {
            MixMessage::Error { message } => Err(RoundFault::Response(message)),
            MixMessage::Phase(notification) => self.on_phase_notification(notification).await,
            MixMessage::ConfirmInputAck(ack) => self.on_confirm_input_ack(ack).await,
        };

        if let Err(fault) = result {
            match fault {
                RoundFault::Response(message) => self.exit_on_response_error(message).await,
                RoundFault::Protocol(cause) => self.exit_on_protocol_error(cause).await,
            }
        }
    }

    /// Decode and process a raw inbound frame. Undecodable frames abort the round.
    pub async fn on_raw_message(&mut self, raw: &str) {
        if self.session.is_terminal() {
            debug!(round = %self.label, "ignoring frame, round is done");
            return;
        }
        match MixMessage::parse(raw) {
            Ok(message) => self.on_notification(message).await,
            Err(cause) => self.exit_on_protocol_error(cause).await,
        }
    }

    /// Terminate a round whose session ended without a terminal phase
    pub async fn abort(&mut self, cause: ProtocolError) {
        if !self.session.is_terminal() {
            self.exit_on_protocol_error(cause).await;
        }
    }

    async fn on_phase_notification(
        &mut self,
        notification: PhaseNotification,
    ) -> Result<(), RoundFault> {
        let phase = notification.phase();
        self.session.accept_round_id(notification.round_id())?;
        self.session.advance(phase)?;
        debug!(
            round = %self.label,
            %phase,
            current = ?self.session.current_phase(),
            "phase notification"
        );

        match notification {
            PhaseNotification::Fail(_) => {
                self.session.finish(RoundOutcome::Fail);
                info!(round = %self.label, "round failed");
                self.participant.on_fail().await;
            }
            PhaseNotification::ConfirmInput(n) => {
                let request = self.participant.confirm_input(&n).await?;
                self.channel
                    .send(Endpoint::ConfirmInput, OutboundMessage::ConfirmInput(request))
                    .await?;
                self.session.complete(Phase::ConfirmInput);
            }
            PhaseNotification::RegisterOutput(n) => {
                if !self.session.is_completed(Phase::ConfirmInput) {
                    info!(round = %self.label, " > Waiting for next round...");
                } else if !self.session.confirm_input_acknowledged() {
                    info!(
                        round = %self.label,
                        " > Early REGISTER_OUTPUT, holding it until confirm-input is acknowledged"
                    );
                    self.session.buffer_register_output(n);
                } else {
                    self.register_output(&n).await?;
                }
            }
            PhaseNotification::RevealOutput(n) => {
                if !self.gate_open(phase) {
                    return Ok(());
                }
                if self.session.is_completed(Phase::Signing) {
                    warn!(round = %self.label, " x SIGNING already completed, not revealing output");
                    return Ok(());
                }
                let request = self.participant.reveal_output(&n).await?;
                self.channel
                    .send(Endpoint::RevealOutput, OutboundMessage::RevealOutput(request))
                    .await?;
                self.session.complete(Phase::RevealOutput);
            }
            PhaseNotification::Signing(n) => {
                if !self.gate_open(phase) {
                    return Ok(());
                }
                if self.session.is_completed(Phase::RevealOutput) {
                    warn!(round = %self.label, " x REVEAL_OUTPUT already completed, not signing");
                    return Ok(());
                }
                let request = self.participant.signing(&n).await?;
                self.channel
                    .send(Endpoint::Signing, OutboundMessage::Signing(request))
                    .await?;
                self.session.complete(Phase::Signing);
            }
            PhaseNotification::Success(_) => {
                if !self.gate_open(phase) {
                    return Ok(());
                }
                self.session.complete(Phase::Success);
                self.session.finish(RoundOutcome::Success);
                info!(round = %self.label, round_id = ?self.session.round_id(), "round succeeded");
                self.participant.on_success().await;
            }
        }
        Ok(())
    }

    /// Chronology gate for phases after REGISTER_OUTPUT
    fn gate_open(&self, phase: Phase) -> bool {
        if !self.session.is_completed(Phase::ConfirmInput) {
            info!(round = %self.label, %phase, " > Waiting for next round...");
            return false;
        }
        if !self.session.confirm_input_acknowledged() {
            info!(round = %self.label, %phase, " > Trying to join current round...");
            return false;
        }
        match phase.predecessor() {
            Some(required) if !self.session.is_completed(required) => {
                warn!(round = %self.label, %phase, " x {} not completed", required);
                false
            }
            _ => true,
        }
    }

    async fn on_confirm_input_ack(&mut self, ack: ConfirmInputAck) -> Result<(), RoundFault> {
        if let Some(expected) = self.session.round_id() {
            if expected != ack.round_id {
                return Err(ProtocolError::InvalidRoundId {
                    expected: expected.to_string(),
                    actual: ack.round_id,
                }
                .into());
            }
        }
        if !self.session.acknowledge_confirm_input() {
            warn!(round = %self.label, "ignoring duplicate confirm-input ack");
            return Ok(());
        }
        debug!(round = %self.label, "confirm-input acknowledged");
        self.participant.on_confirm_input_ack(&ack).await?;

        if let Some(early) = self.session.take_early_register_output() {
            info!(round = %self.label, " > Registering output from early REGISTER_OUTPUT");
            self.register_output(&early).await?;
        }
        Ok(())
    }

    async fn register_output(
        &mut self,
        notification: &RegisterOutputNotification,
    ) -> Result<(), RoundFault> {
        self.participant
            .register_output(notification, &self.register_output_url)
            .await?;
        self.session.complete(Phase::RegisterOutput);
        Ok(())
    }

    async fn exit_on_response_error(&mut self, message: String) {
        error!(round = %self.label, "round aborted by coordinator: {}", message);
        self.session.finish(RoundOutcome::ResponseError(message.clone()));
        self.participant.exit_on_response_error(&message).await;
    }

    async fn exit_on_protocol_error(&mut self, cause: ProtocolError) {
        error!(round = %self.label, "protocol error: {}", cause);
        self.session.finish(RoundOutcome::ProtocolError(cause.to_string()));
        self.participant.exit_on_protocol_error(&cause).await;
    }
}
