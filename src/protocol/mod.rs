//! Round protocol model and collaborator boundaries
//!
//! - Phase notifications, acknowledgments and requests (wire model)
//! - `MessageChannel`: outbound transport
//! - `RoundParticipant`: wallet-side capabilities invoked by a round

pub mod channel;
pub mod messages;
pub mod participant;

pub use channel::{MessageChannel, QueueChannel};
pub use messages::{
    ConfirmInputAck, ConfirmInputNotification, ConfirmInputRequest, Endpoint, MixMessage,
    OutboundMessage, Phase, PhaseNotification, RegisterOutputNotification,
    RevealOutputNotification, RevealOutputRequest, RoundStatusNotification, SigningNotification,
    SigningRequest,
};
pub use participant::RoundParticipant;

use serde::Deserialize;
use url::Url;

/// REST error body returned by the coordinator
#[derive(Debug, Deserialize)]
struct RestErrorResponse {
    message: Option<String>,
}

/// Extract the human readable reason from a coordinator REST error body
pub fn parse_rest_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<RestErrorResponse>(body)
        .ok()
        .and_then(|r| r.message)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

/// Output registration URL for a coordinator base URL
pub fn compute_register_output_url(server: &Url) -> Result<Url, url::ParseError> {
    let mut base = server.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(Endpoint::RegisterOutput.as_str().trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rest_error_message() {
        assert_eq!(
            parse_rest_error_message(r#"{"message":"Output already registered"}"#),
            Some("Output already registered".to_string())
        );
        assert_eq!(parse_rest_error_message(r#"{"message":"  "}"#), None);
        assert_eq!(parse_rest_error_message(r#"{"status":500}"#), None);
        assert_eq!(parse_rest_error_message("not json"), None);
    }

    #[test]
    fn test_compute_register_output_url() {
        let server = Url::parse("https://coordinator.example:8080").unwrap();
        assert_eq!(
            compute_register_output_url(&server).unwrap().as_str(),
            "https://coordinator.example:8080/rest/registerOutput"
        );

        let prefixed = Url::parse("http://127.0.0.1/mix").unwrap();
        assert_eq!(
            compute_register_output_url(&prefixed).unwrap().as_str(),
            "http://127.0.0.1/mix/rest/registerOutput"
        );
    }
}
