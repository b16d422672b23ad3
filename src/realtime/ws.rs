use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::transport::{Connector, OutboundFrame, TransportEvent, TransportLink, ABNORMAL_CLOSURE};
use crate::error::TransportError;

/// How long the server has to answer a client close frame.
pub const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// WebSocket connector over tokio-tungstenite.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<TransportLink, TransportError> {
        let (stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Refused(e.to_string()))?;
        info!("WebSocket connected to {} ({})", url, response.status());

        let (mut sink, mut source) = stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<OutboundFrame>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<TransportEvent>();

        // Reader: turns incoming messages into transport events and finishes
        // with exactly one `Closed` unless the writer cuts it short.
        let mut reader = tokio::spawn(async move {
            let closed = loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if in_tx.send(TransportEvent::Frame(text)).is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => {
                            if in_tx.send(TransportEvent::Frame(text)).is_err() {
                                return;
                            }
                        }
                        Err(_) => warn!("Dropping non UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(f) => TransportEvent::Closed {
                                code: u16::from(f.code),
                                reason: f.reason.into_owned(),
                            },
                            None => TransportEvent::Closed {
                                code: ABNORMAL_CLOSURE,
                                reason: "closed without status".to_string(),
                            },
                        };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        break TransportEvent::Closed {
                            code: ABNORMAL_CLOSURE,
                            reason: e.to_string(),
                        };
                    }
                    None => {
                        break TransportEvent::Closed {
                            code: ABNORMAL_CLOSURE,
                            reason: "stream ended".to_string(),
                        };
                    }
                }
            };
            let _ = in_tx.send(closed);
        });

        // Writer: forwards outbound frames until a close is sent or the
        // channel side drops its sender. After a client close the server gets
        // CLOSE_GRACE to acknowledge before the socket is dropped.
        tokio::spawn(async move {
            let mut closing = false;
            while let Some(frame) = out_rx.recv().await {
                let msg = match frame {
                    OutboundFrame::Text(text) => Message::Text(text),
                    OutboundFrame::Close { code, reason } => {
                        closing = true;
                        Message::Close(Some(CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        }))
                    }
                };
                if let Err(e) = sink.send(msg).await {
                    warn!("WebSocket send failed: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
            if closing && tokio::time::timeout(CLOSE_GRACE, &mut reader).await.is_err() {
                debug!("Close not acknowledged within {:?}; dropping socket", CLOSE_GRACE);
                reader.abort();
            }
            debug!("WebSocket writer stopped");
        });

        Ok(TransportLink {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}
