//! Message channel boundary
//!
//! The transport session that carries requests to the coordinator. Inbound
//! notifications travel the other way through an mpsc queue drained by
//! [`crate::round::run_round`].

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::messages::{Endpoint, OutboundMessage};
use crate::error::ChannelError;

/// Outbound half of a round's duplex channel
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send(&self, endpoint: Endpoint, payload: OutboundMessage) -> Result<(), ChannelError>;
}

/// Channel forwarding every request into a tokio mpsc queue.
///
/// Lets a transport task own the socket while rounds only see a `MessageChannel`.
#[derive(Debug, Clone)]
pub struct QueueChannel {
    tx: mpsc::Sender<(Endpoint, OutboundMessage)>,
}

impl QueueChannel {
    pub fn new(tx: mpsc::Sender<(Endpoint, OutboundMessage)>) -> Self {
        Self { tx }
    }

    /// Create a channel together with the receiving end
    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<(Endpoint, OutboundMessage)>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl MessageChannel for QueueChannel {
    async fn send(&self, endpoint: Endpoint, payload: OutboundMessage) -> Result<(), ChannelError> {
        debug!(%endpoint, "queueing outbound message");
        self.tx
            .send((endpoint, payload))
            .await
            .map_err(|_| ChannelError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::SigningRequest;

    #[tokio::test]
    async fn test_queue_channel_forwards() {
        let (channel, mut rx) = QueueChannel::with_capacity(4);
        let payload = OutboundMessage::Signing(SigningRequest {
            round_id: "r-1".into(),
            witnesses64: vec!["w".into()],
        });
        channel.send(Endpoint::Signing, payload.clone()).await.unwrap();

        let (endpoint, received) = rx.recv().await.unwrap();
        assert_eq!(endpoint, Endpoint::Signing);
        assert_eq!(received, payload);
    }

    #[tokio::test]
    async fn test_queue_channel_closed() {
        let (channel, rx) = QueueChannel::with_capacity(1);
        drop(rx);
        let payload = OutboundMessage::Signing(SigningRequest {
            round_id: "r-1".into(),
            witnesses64: vec![],
        });
        let err = channel.send(Endpoint::Signing, payload).await.unwrap_err();
        assert_eq!(err, ChannelError::Closed);
    }
}
