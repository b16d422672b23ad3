use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error};

use crate::models::{HazardFeed, ServerMessage};

/// Everything a listener can observe on a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Disconnected { code: u16, reason: String },
    Reconnecting { attempt: u32, delay: Duration },
    /// Reconnection gave up. Emitted once per exhausted cycle.
    ReconnectFailed { attempts: u32 },
    Message(ServerMessage),
    /// Data obtained by fallback polling instead of the live channel.
    FallbackData(HazardFeed),
}

/// Selects which events a listener receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    Reconnecting,
    ReconnectFailed,
    FloodUpdate,
    FloodAlert,
    Subscribed,
    Unsubscribed,
    Pong,
    ServerError,
    Response,
    /// Frames with a `type` this client does not recognise.
    Unknown,
    FallbackData,
    /// Every event.
    All,
}

impl ChannelEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::Reconnecting { .. } => EventKind::Reconnecting,
            Self::ReconnectFailed { .. } => EventKind::ReconnectFailed,
            Self::FallbackData(_) => EventKind::FallbackData,
            Self::Message(msg) => match msg {
                ServerMessage::FloodUpdate(_) => EventKind::FloodUpdate,
                ServerMessage::FloodAlert(_) => EventKind::FloodAlert,
                ServerMessage::Subscribed { .. } => EventKind::Subscribed,
                ServerMessage::Unsubscribed { .. } => EventKind::Unsubscribed,
                ServerMessage::Pong { .. } => EventKind::Pong,
                ServerMessage::ServerError { .. } => EventKind::ServerError,
                ServerMessage::Response { .. } => EventKind::Response,
                ServerMessage::Unknown { .. } => EventKind::Unknown,
            },
        }
    }
}

pub type Listener = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

/// Returned by [`EventBus::on`]; pass it to [`EventBus::off`] to remove the
/// listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    id: u64,
    kind: EventKind,
}

impl ListenerHandle {
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

struct Registration {
    handle: ListenerHandle,
    listener: Listener,
}

/// Typed listener registry. Listeners run synchronously in registration
/// order on the emitting task.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Registration>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerHandle
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        let handle = ListenerHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind,
        };
        self.registry().push(Registration {
            handle,
            listener: Arc::new(listener),
        });
        handle
    }

    /// Removes a listener. Returns false if it was already removed.
    pub fn off(&self, handle: ListenerHandle) -> bool {
        let mut registry = self.registry();
        let before = registry.len();
        registry.retain(|r| r.handle != handle);
        registry.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.registry().len()
    }

    /// Delivers `event` to every matching listener and returns how many were
    /// called. A panicking listener is logged and skipped.
    pub fn emit(&self, event: &ChannelEvent) -> usize {
        let kind = event.kind();
        let targets: Vec<Listener> = self
            .registry()
            .iter()
            .filter(|r| r.handle.kind == kind || r.handle.kind == EventKind::All)
            .map(|r| Arc::clone(&r.listener))
            .collect();

        if targets.is_empty() {
            debug!("No listeners for {:?}", kind);
        }

        for listener in &targets {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                error!("Listener for {:?} panicked; continuing with the rest", kind);
            }
        }
        targets.len()
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Vec<Registration>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
