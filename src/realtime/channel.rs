use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::events::{ChannelEvent, EventBus, EventKind, ListenerHandle};
use super::transport::{Connector, OutboundFrame, TransportEvent, TransportLink, ABNORMAL_CLOSURE, NORMAL_CLOSURE};
use crate::error::{ChannelError, ValidationError};
use crate::models::{ClientMessage, ServerMessage, Subscription, SubscriptionFilters};
use crate::source::{fetch_feed, HazardQuery, HazardSource};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ChannelOptions {
    pub connect_timeout: Duration,
    /// Keep-alive ping period. Zero disables the heartbeat.
    pub heartbeat_interval: Duration,
    pub reconnect_base_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub fallback_poll_interval: Duration,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            reconnect_base_delay: Duration::from_secs(1),
            max_reconnect_attempts: 5,
            fallback_poll_interval: Duration::from_secs(30),
        }
    }
}

impl ChannelOptions {
    /// Delay before reconnect attempt `attempt` (counted from 0).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.reconnect_base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStats {
    pub state: ConnectionState,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub reconnect_attempts: u32,
    pub subscriptions: usize,
    pub fallback_active: bool,
    pub last_message_at: Option<DateTime<Utc>>,
}

type PendingResponse = oneshot::Sender<Result<Value, String>>;

struct Shared {
    state: ConnectionState,
    url: Option<String>,
    outbound: Option<mpsc::UnboundedSender<OutboundFrame>>,
    subscriptions: BTreeMap<String, Subscription>,
    pending: HashMap<String, PendingResponse>,
    /// Bumped on every new link and on disconnect; tasks tied to an older
    /// value are stale.
    generation: u64,
    manual_close: bool,
    reconnect_attempts: u32,
    messages_sent: u64,
    messages_received: u64,
    last_message_at: Option<DateTime<Utc>>,
    driver: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
    fallback: Option<JoinHandle<()>>,
}

struct Inner {
    connector: Arc<dyn Connector>,
    options: ChannelOptions,
    shared: Mutex<Shared>,
    bus: EventBus,
}

/// Reconnecting room-subscription client.
///
/// Cloning gives another handle to the same connection.
#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Arc<Inner>,
}

impl RealtimeChannel {
    pub fn new(connector: Arc<dyn Connector>, options: ChannelOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                options,
                shared: Mutex::new(Shared {
                    state: ConnectionState::Disconnected,
                    url: None,
                    outbound: None,
                    subscriptions: BTreeMap::new(),
                    pending: HashMap::new(),
                    generation: 0,
                    manual_close: false,
                    reconnect_attempts: 0,
                    messages_sent: 0,
                    messages_received: 0,
                    last_message_at: None,
                    driver: None,
                    heartbeat: None,
                    reconnect: None,
                    fallback: None,
                }),
                bus: EventBus::new(),
            }),
        }
    }

    pub fn options(&self) -> &ChannelOptions {
        &self.inner.options
    }

    /// Opens the connection. Resolves once connected; fails on error or when
    /// the connect timeout elapses, leaving the channel `Failed`.
    pub async fn connect(&self, url: &str) -> Result<(), ChannelError> {
        {
            let mut s = self.inner.lock();
            if s.state == ConnectionState::Connected {
                debug!("Already connected to {:?}", s.url);
                return Ok(());
            }
            abort_task(&mut s.reconnect);
            s.state = ConnectionState::Connecting;
            s.url = Some(url.to_string());
            s.manual_close = false;
            s.reconnect_attempts = 0;
        }

        info!("Connecting to {}", url);
        match self.inner.open(url).await {
            Ok(link) => {
                if self.inner.lock().manual_close {
                    return Err(ChannelError::Disconnected);
                }
                Inner::install(&self.inner, link);
                info!("Connected to {}", url);
                Ok(())
            }
            Err(e) => {
                self.inner.lock().state = ConnectionState::Failed;
                error!("Connection to {} failed: {}", url, e);
                Err(e)
            }
        }
    }

    /// Closes the connection with a normal close code. Cancels heartbeat,
    /// reconnect and fallback tasks and forgets all subscriptions.
    pub fn disconnect(&self) {
        let (outbound, previous) = {
            let mut s = self.inner.lock();
            s.manual_close = true;
            s.generation += 1;
            abort_task(&mut s.heartbeat);
            abort_task(&mut s.reconnect);
            abort_task(&mut s.driver);
            abort_task(&mut s.fallback);
            s.subscriptions.clear();
            s.pending.clear();
            s.reconnect_attempts = 0;
            let previous = std::mem::replace(&mut s.state, ConnectionState::Disconnected);
            (s.outbound.take(), previous)
        };

        let reason = "client disconnect".to_string();
        if let Some(tx) = outbound {
            let _ = tx.send(OutboundFrame::Close {
                code: NORMAL_CLOSURE,
                reason: reason.clone(),
            });
        }
        if previous != ConnectionState::Disconnected {
            info!("Disconnected by client");
            self.inner.bus.emit(&ChannelEvent::Disconnected {
                code: NORMAL_CLOSURE,
                reason,
            });
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Sends a message. Returns false when not connected.
    pub fn send(&self, message: &ClientMessage) -> bool {
        self.inner.transmit(message)
    }

    pub fn publish(&self, room: &str, payload: Value) -> bool {
        self.send(&ClientMessage::Publish {
            room: room.to_string(),
            payload,
        })
    }

    /// Records a subscription and sends it if connected. Recorded
    /// subscriptions are sent again after every reconnect. Returns whether a
    /// frame went out now.
    pub fn subscribe(&self, room: &str, filters: SubscriptionFilters) -> Result<bool, ValidationError> {
        if let Some(bounds) = &filters.bounds {
            bounds.validate()?;
        }
        self.inner.lock().subscriptions.insert(
            room.to_string(),
            Subscription {
                room: room.to_string(),
                filters: filters.clone(),
                created_at: Utc::now(),
            },
        );

        let sent = self.inner.transmit(&ClientMessage::Subscribe {
            room: room.to_string(),
            filters,
        });
        if sent {
            info!("Subscribed to room {}", room);
        } else {
            debug!("Subscription to {} recorded; it will be sent on connect", room);
        }
        Ok(sent)
    }

    /// Forgets a subscription and tells the server if connected. Returns
    /// false if the room was not subscribed or nothing could be sent.
    pub fn unsubscribe(&self, room: &str) -> bool {
        if self.inner.lock().subscriptions.remove(room).is_none() {
            return false;
        }
        info!("Unsubscribed from room {}", room);
        self.inner.transmit(&ClientMessage::Unsubscribe { room: room.to_string() })
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.inner.lock().subscriptions.values().cloned().collect()
    }

    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerHandle
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        self.inner.bus.on(kind, listener)
    }

    pub fn off(&self, handle: ListenerHandle) -> bool {
        self.inner.bus.off(handle)
    }

    /// Sends a request and waits for the matching `response` frame.
    pub async fn request(&self, action: &str, payload: Value, timeout: Duration) -> Result<Value, ChannelError> {
        let request_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.inner.lock().pending.insert(request_id.clone(), tx);

        let msg = ClientMessage::Request {
            request_id: request_id.clone(),
            action: action.to_string(),
            payload,
        };
        if !self.inner.transmit(&msg) {
            self.inner.lock().pending.remove(&request_id);
            return Err(ChannelError::NotConnected);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(ChannelError::Remote(message)),
            Ok(Err(_)) => Err(ChannelError::Disconnected),
            Err(_) => {
                self.inner.lock().pending.remove(&request_id);
                warn!("Request {} ({}) timed out after {:?}", request_id, action, timeout);
                Err(ChannelError::RequestTimeout { request_id, timeout })
            }
        }
    }

    /// Polls `source` at the fallback interval and emits each result as
    /// [`ChannelEvent::FallbackData`]. Replaces any running poller.
    pub fn enable_fallback_mode(&self, source: Arc<dyn HazardSource>, query: HazardQuery) {
        let inner = Arc::clone(&self.inner);
        let period = self.inner.options.fallback_poll_interval.max(MIN_POLL_INTERVAL);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let feed = fetch_feed(source.as_ref(), &query).await;
                inner.bus.emit(&ChannelEvent::FallbackData(feed));
            }
        });

        if let Some(previous) = self.inner.lock().fallback.replace(task) {
            previous.abort();
        }
        warn!("Fallback polling enabled every {:?}", period);
    }

    pub fn disable_fallback_mode(&self) -> bool {
        let stopped = abort_task(&mut self.inner.lock().fallback);
        if stopped {
            info!("Fallback polling disabled");
        }
        stopped
    }

    pub fn is_fallback_active(&self) -> bool {
        self.inner
            .lock()
            .fallback
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    pub fn stats(&self) -> ChannelStats {
        let s = self.inner.lock();
        ChannelStats {
            state: s.state,
            messages_sent: s.messages_sent,
            messages_received: s.messages_received,
            reconnect_attempts: s.reconnect_attempts,
            subscriptions: s.subscriptions.len(),
            fallback_active: s.fallback.as_ref().is_some_and(|h| !h.is_finished()),
            last_message_at: s.last_message_at,
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn open(&self, url: &str) -> Result<TransportLink, ChannelError> {
        let timeout = self.options.connect_timeout;
        match tokio::time::timeout(timeout, self.connector.connect(url)).await {
            Ok(Ok(link)) => Ok(link),
            Ok(Err(e)) => Err(ChannelError::Transport(e)),
            Err(_) => Err(ChannelError::ConnectTimeout(timeout)),
        }
    }

    fn transmit(&self, message: &ClientMessage) -> bool {
        let text = match serde_json::to_string(message) {
            Ok(t) => t,
            Err(e) => {
                error!("Failed to serialize outgoing message: {}", e);
                return false;
            }
        };

        let mut s = self.lock();
        if s.state != ConnectionState::Connected {
            return false;
        }
        let Some(tx) = s.outbound.as_ref() else {
            return false;
        };
        if tx.send(OutboundFrame::Text(text)).is_err() {
            return false;
        }
        s.messages_sent += 1;
        true
    }

    /// Takes over a freshly opened link: starts the heartbeat and the frame
    /// driver and re-sends every recorded subscription.
    fn install(self: &Arc<Self>, link: TransportLink) {
        let TransportLink { outbound, inbound } = link;

        let (generation, resend, fallback_stopped) = {
            let mut s = self.lock();
            s.generation += 1;
            s.state = ConnectionState::Connected;
            s.reconnect_attempts = 0;
            s.outbound = Some(outbound);
            // The reconnect task may be the caller; detach rather than abort.
            s.reconnect = None;
            abort_task(&mut s.heartbeat);
            abort_task(&mut s.driver);
            let fallback_stopped = abort_task(&mut s.fallback);
            if !self.options.heartbeat_interval.is_zero() {
                s.heartbeat = Some(tokio::spawn(heartbeat(Arc::clone(self), s.generation)));
            }
            let resend: Vec<ClientMessage> = s
                .subscriptions
                .values()
                .map(|sub| ClientMessage::Subscribe {
                    room: sub.room.clone(),
                    filters: sub.filters.clone(),
                })
                .collect();
            (s.generation, resend, fallback_stopped)
        };

        if fallback_stopped {
            info!("Live channel restored; fallback polling stopped");
        }
        let resent = resend.iter().filter(|msg| self.transmit(msg)).count();
        if resent > 0 {
            info!("Re-sent {} subscription(s)", resent);
        }

        self.bus.emit(&ChannelEvent::Connected);

        let driver = tokio::spawn(drive(Arc::clone(self), generation, inbound));
        let mut s = self.lock();
        if s.generation == generation {
            s.driver = Some(driver);
        } else {
            driver.abort();
        }
    }

    fn handle_frame(&self, text: &str) {
        {
            let mut s = self.lock();
            s.messages_received += 1;
            s.last_message_at = Some(Utc::now());
        }

        let msg = match ServerMessage::parse(text) {
            Ok(m) => m,
            Err(e) => {
                warn!("Dropping malformed frame: {}", e);
                return;
            }
        };

        match &msg {
            ServerMessage::Response { request_id, result } => {
                let waiter = self.lock().pending.remove(request_id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(result.clone());
                    }
                    None => debug!("Response for unknown or expired request {}", request_id),
                }
            }
            ServerMessage::Unknown { kind, .. } => warn!("Unrecognised message type '{}'", kind),
            ServerMessage::ServerError { message } => warn!("Server reported an error: {}", message),
            other => debug!("Received {}", other.kind()),
        }

        self.bus.emit(&ChannelEvent::Message(msg));
    }

    fn handle_close(self: &Arc<Self>, generation: u64, code: u16, reason: String) {
        let reconnect = {
            let mut s = self.lock();
            if s.generation != generation {
                return;
            }
            s.outbound = None;
            s.driver = None;
            abort_task(&mut s.heartbeat);
            s.pending.clear();
            if s.manual_close || code == NORMAL_CLOSURE {
                s.state = ConnectionState::Disconnected;
                false
            } else {
                s.state = ConnectionState::Reconnecting;
                true
            }
        };

        if reconnect {
            warn!(code, %reason, "Connection lost unexpectedly");
        } else {
            info!(code, %reason, "Connection closed");
        }
        self.bus.emit(&ChannelEvent::Disconnected { code, reason });

        if reconnect {
            let mut s = self.lock();
            if s.generation == generation && !s.manual_close && s.state == ConnectionState::Reconnecting {
                s.reconnect = Some(tokio::spawn(Arc::clone(self).reconnect_loop()));
            }
        }
    }

    async fn reconnect_loop(self: Arc<Self>) {
        let Some(url) = self.lock().url.clone() else {
            return;
        };
        let max = self.options.max_reconnect_attempts;

        loop {
            let attempt = {
                let mut s = self.lock();
                if s.manual_close {
                    return;
                }
                if s.reconnect_attempts >= max {
                    let attempts = s.reconnect_attempts;
                    s.state = ConnectionState::Failed;
                    s.reconnect = None;
                    drop(s);
                    error!("Giving up on {} after {} reconnect attempts", url, attempts);
                    self.bus.emit(&ChannelEvent::ReconnectFailed { attempts });
                    return;
                }
                s.state = ConnectionState::Reconnecting;
                let attempt = s.reconnect_attempts;
                s.reconnect_attempts += 1;
                attempt
            };

            let delay = self.options.backoff_delay(attempt);
            info!("Reconnect attempt {}/{} in {:?}", attempt + 1, max, delay);
            self.bus.emit(&ChannelEvent::Reconnecting {
                attempt: attempt + 1,
                delay,
            });
            tokio::time::sleep(delay).await;

            if self.lock().manual_close {
                return;
            }
            match self.open(&url).await {
                Ok(link) => {
                    if self.lock().manual_close {
                        return;
                    }
                    info!("Reconnected to {}", url);
                    Inner::install(&self, link);
                    return;
                }
                Err(e) => warn!("Reconnect attempt {} failed: {}", attempt + 1, e),
            }
        }
    }
}

async fn drive(inner: Arc<Inner>, generation: u64, mut inbound: mpsc::UnboundedReceiver<TransportEvent>) {
    let (code, reason) = loop {
        match inbound.recv().await {
            Some(TransportEvent::Frame(text)) => inner.handle_frame(&text),
            Some(TransportEvent::Closed { code, reason }) => break (code, reason),
            None => break (ABNORMAL_CLOSURE, "transport dropped".to_string()),
        }
    };
    Inner::handle_close(&inner, generation, code, reason);
}

async fn heartbeat(inner: Arc<Inner>, generation: u64) {
    let period = inner.options.heartbeat_interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if inner.lock().generation != generation {
            return;
        }
        let ping = ClientMessage::Ping {
            timestamp: Utc::now().timestamp_millis(),
        };
        if !inner.transmit(&ping) {
            debug!("Heartbeat stopped: channel not connected");
            return;
        }
    }
}

/// Aborts the task in `slot`. Returns whether it was still running.
fn abort_task(slot: &mut Option<JoinHandle<()>>) -> bool {
    match slot.take() {
        Some(handle) => {
            let running = !handle.is_finished();
            handle.abort();
            running
        }
        None => false,
    }
}
