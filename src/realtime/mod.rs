//! Live hazard delivery over a reconnecting WebSocket, with HTTP polling as
//! the fallback when reconnection gives up.

pub mod channel;
pub mod events;
pub mod transport;
pub mod ws;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{ChannelOptions, ChannelStats, ConnectionState, RealtimeChannel};
pub use events::{ChannelEvent, EventBus, EventKind, ListenerHandle};
pub use transport::{Connector, OutboundFrame, TransportEvent, TransportLink, ABNORMAL_CLOSURE, NORMAL_CLOSURE};
pub use ws::WsConnector;
