use thiserror::Error;

use crate::protocol::Phase;

/// Main error type for the mix client
#[derive(Error, Debug)]
pub enum MixError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Local validation faults (mix_queue / mix_stop preconditions)
    #[error("Validation failed: {0}")]
    Validation(String),

    // Round protocol errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // Wallet collaborator errors
    #[error("Wallet error: {0}")]
    Wallet(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for MixError
pub type Result<T> = std::result::Result<T, MixError>;

/// Fatal round protocol violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid round id: expected {expected}, actual {actual}")]
    InvalidRoundId { expected: String, actual: String },

    #[error("phase already completed: {0}")]
    PhaseAlreadyCompleted(Phase),

    #[error("duplicate notification: {0}")]
    DuplicateNotification(Phase),

    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("session closed before round completion")]
    SessionClosed,

    #[error("channel failure: {0}")]
    Channel(ChannelError),

    #[error("participant failure: {0}")]
    Participant(String),
}

/// Transport failures reported by a message channel or the registration submitter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("HTTP {status}")]
    Http { status: u16, body: Option<String> },
}

/// Failures raised by a round participant callback
#[derive(Error, Debug)]
pub enum ParticipantError {
    /// Server-side rejection with a human readable reason
    #[error("{0}")]
    Rejected(String),

    #[error("channel failure: {0}")]
    Channel(#[from] ChannelError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Classification of a failure that ends a round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundFault {
    /// Server-originated failure carrying a message for the user
    Response(String),
    /// Anything else: local bug, transport failure, protocol violation
    Protocol(ProtocolError),
}

impl From<ProtocolError> for RoundFault {
    fn from(err: ProtocolError) -> Self {
        RoundFault::Protocol(err)
    }
}

impl From<ChannelError> for RoundFault {
    fn from(err: ChannelError) -> Self {
        let reason = match &err {
            ChannelError::Http {
                body: Some(body), ..
            } => crate::protocol::parse_rest_error_message(body),
            _ => None,
        };
        match reason {
            Some(message) => RoundFault::Response(message),
            None => RoundFault::Protocol(ProtocolError::Channel(err)),
        }
    }
}

impl From<ParticipantError> for RoundFault {
    fn from(err: ParticipantError) -> Self {
        match err {
            ParticipantError::Rejected(message) => RoundFault::Response(message),
            ParticipantError::Channel(e) => RoundFault::from(e),
            ParticipantError::Other(e) => {
                RoundFault::Protocol(ProtocolError::Participant(format!("{:#}", e)))
            }
        }
    }
}
