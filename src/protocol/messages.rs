//! Round Protocol Messages
//!
//! Wire model exchanged with the coordinator: phase notifications pushed by the
//! server, the confirm-input acknowledgment, and the requests sent back.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProtocolError;

/// Round phases, in protocol order. `Fail` is reachable from any phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    ConfirmInput,
    RegisterOutput,
    RevealOutput,
    Signing,
    Success,
    Fail,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::ConfirmInput => "CONFIRM_INPUT",
            Phase::RegisterOutput => "REGISTER_OUTPUT",
            Phase::RevealOutput => "REVEAL_OUTPUT",
            Phase::Signing => "SIGNING",
            Phase::Success => "SUCCESS",
            Phase::Fail => "FAIL",
        }
    }

    /// Phase that must be completed before this one may be processed.
    ///
    /// `RevealOutput` and `Signing` are alternative exits of the output
    /// registration gate, so both hang off `RegisterOutput`.
    pub fn predecessor(&self) -> Option<Phase> {
        match self {
            Phase::ConfirmInput | Phase::Fail => None,
            Phase::RegisterOutput => Some(Phase::ConfirmInput),
            Phase::RevealOutput | Phase::Signing => Some(Phase::RegisterOutput),
            Phase::Success => Some(Phase::Signing),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmInputNotification {
    pub round_id: String,
    /// Coordinator blinding key, base64
    pub public_key64: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOutputNotification {
    pub round_id: String,
    pub inputs_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealOutputNotification {
    pub round_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningNotification {
    pub round_id: String,
    /// Unsigned round transaction, base64
    pub transaction64: String,
}

/// Body-less notification for the terminal phases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStatusNotification {
    pub round_id: String,
}

/// Phase change pushed by the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseNotification {
    ConfirmInput(ConfirmInputNotification),
    RegisterOutput(RegisterOutputNotification),
    RevealOutput(RevealOutputNotification),
    Signing(SigningNotification),
    Success(RoundStatusNotification),
    Fail(RoundStatusNotification),
}

impl PhaseNotification {
    pub fn phase(&self) -> Phase {
        match self {
            PhaseNotification::ConfirmInput(_) => Phase::ConfirmInput,
            PhaseNotification::RegisterOutput(_) => Phase::RegisterOutput,
            PhaseNotification::RevealOutput(_) => Phase::RevealOutput,
            PhaseNotification::Signing(_) => Phase::Signing,
            PhaseNotification::Success(_) => Phase::Success,
            PhaseNotification::Fail(_) => Phase::Fail,
        }
    }

    pub fn round_id(&self) -> &str {
        match self {
            PhaseNotification::ConfirmInput(n) => &n.round_id,
            PhaseNotification::RegisterOutput(n) => &n.round_id,
            PhaseNotification::RevealOutput(n) => &n.round_id,
            PhaseNotification::Signing(n) => &n.round_id,
            PhaseNotification::Success(n) | PhaseNotification::Fail(n) => &n.round_id,
        }
    }
}

/// Coordinator acknowledgment of our confirm-input request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmInputAck {
    pub round_id: String,
    /// Blind signature over our output bordereau, base64
    pub signed_bordereau64: String,
}

/// Any inbound message delivered to a round session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MixMessage {
    Error { message: String },
    Phase(PhaseNotification),
    ConfirmInputAck(ConfirmInputAck),
}

impl MixMessage {
    /// Decode a raw inbound frame; unknown shapes are protocol violations
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(|e| ProtocolError::UnexpectedMessage(e.to_string()))
    }
}

impl From<PhaseNotification> for MixMessage {
    fn from(notification: PhaseNotification) -> Self {
        MixMessage::Phase(notification)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmInputRequest {
    pub round_id: String,
    pub blinded_bordereau64: String,
    pub user_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealOutputRequest {
    pub round_id: String,
    pub receive_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningRequest {
    pub round_id: String,
    pub witnesses64: Vec<String>,
}

/// Payload sent on a message channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    ConfirmInput(ConfirmInputRequest),
    RevealOutput(RevealOutputRequest),
    Signing(SigningRequest),
}

/// Coordinator endpoints addressed by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ConfirmInput,
    RevealOutput,
    Signing,
    RegisterOutput,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::ConfirmInput => "/ws/confirmInput",
            Endpoint::RevealOutput => "/ws/revealOutput",
            Endpoint::Signing => "/ws/signing",
            Endpoint::RegisterOutput => "/rest/registerOutput",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
