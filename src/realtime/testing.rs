//! In-memory connector for exercising the channel without a network.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::transport::{Connector, OutboundFrame, TransportEvent, TransportLink};
use crate::error::TransportError;

/// The server side of one mock connection. Dropping it ends the connection.
pub struct ServerEnd {
    pub sent: mpsc::UnboundedReceiver<OutboundFrame>,
    pub events: mpsc::UnboundedSender<TransportEvent>,
}

impl ServerEnd {
    pub fn push(&self, text: &str) {
        let _ = self.events.send(TransportEvent::Frame(text.to_string()));
    }

    pub fn close(&self, code: u16) {
        let _ = self.events.send(TransportEvent::Closed {
            code,
            reason: format!("mock close {code}"),
        });
    }

    /// Frames the client has sent so far.
    pub fn drain(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.sent.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

pub struct MockConnector {
    accept_limit: Option<usize>,
    hang: bool,
    attempts: AtomicUsize,
    servers: mpsc::UnboundedSender<ServerEnd>,
}

impl MockConnector {
    fn build(accept_limit: Option<usize>, hang: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            accept_limit,
            hang,
            attempts: AtomicUsize::new(0),
            servers: tx,
        };
        (Arc::new(connector), rx)
    }

    /// Accepts every connection.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        Self::build(None, false)
    }

    /// Accepts the first `n` connections and refuses the rest.
    pub fn accepting_first(n: usize) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        Self::build(Some(n), false)
    }

    /// Never completes a connection.
    pub fn hanging() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        Self::build(None, true)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &str) -> Result<TransportLink, TransportError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.accept_limit.is_some_and(|limit| n >= limit) {
            return Err(TransportError::Refused("mock server refused".to_string()));
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let _ = self.servers.send(ServerEnd {
            sent: out_rx,
            events: in_tx,
        });
        Ok(TransportLink {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}
