use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Close code for a caller-initiated, orderly shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the connection drops without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Frame(String),
    Closed { code: u16, reason: String },
}

/// An open connection: frames go out through `outbound`, frames and the
/// final close come back through `inbound`. Dropping `outbound` closes the
/// connection.
#[derive(Debug)]
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<OutboundFrame>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens duplex message connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<TransportLink, TransportError>;
}
