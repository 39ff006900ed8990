//! Round participant capability
//!
//! Implemented by the wallet/signing layer. The state machine calls these
//! mid-dispatch to build protocol responses and to report terminal outcomes.

use async_trait::async_trait;

use super::messages::{
    ConfirmInputAck, ConfirmInputNotification, ConfirmInputRequest, RegisterOutputNotification,
    RevealOutputNotification, RevealOutputRequest, SigningNotification, SigningRequest,
};
use crate::error::{ParticipantError, ProtocolError};

/// Capabilities a round needs from its participant.
///
/// Callbacks must return promptly: the scheduler only frees a slot once a
/// terminal callback has run.
#[async_trait]
pub trait RoundParticipant: Send + Sync {
    async fn confirm_input(
        &self,
        notification: &ConfirmInputNotification,
    ) -> Result<ConfirmInputRequest, ParticipantError>;

    async fn reveal_output(
        &self,
        notification: &RevealOutputNotification,
    ) -> Result<RevealOutputRequest, ParticipantError>;

    async fn signing(
        &self,
        notification: &SigningNotification,
    ) -> Result<SigningRequest, ParticipantError>;

    /// Submit the output registration to `submission_url`
    async fn register_output(
        &self,
        notification: &RegisterOutputNotification,
        submission_url: &str,
    ) -> Result<(), ParticipantError>;

    async fn on_confirm_input_ack(&self, ack: &ConfirmInputAck) -> Result<(), ParticipantError>;

    async fn on_success(&self);

    async fn on_fail(&self);

    async fn exit_on_protocol_error(&self, cause: &ProtocolError);

    async fn exit_on_response_error(&self, message: &str);
}
