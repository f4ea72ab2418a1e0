//! Persistent status/console websocket connection.
//!
//! [`StatusStream`] spawns a background task that owns the socket and all
//! connection state. The task dials, runs one session at a time, and
//! reconnects with capped exponential backoff when the connection is lost.
//! A heartbeat timer force-closes connections that go silent while nominally
//! ready. Callers interact through a [`StreamHandle`] and a bounded event
//! channel; events are delivered in order, at most one per received frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use crate::error::StreamError;
use crate::protocol::{InboundFrame, websocket_url};
use crate::session::{Effect, Session, SessionEvent};

pub use crate::protocol::StatusData;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(90);

const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Configuration for one status/console stream.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub token: String,
    pub server_id: String,
    /// Whether the console stream (chat relay, remote commands) is enabled.
    pub enable_console: bool,
    pub heartbeat_interval: Duration,
    pub stale_after: Duration,
}

impl StreamConfig {
    pub fn new(token: impl Into<String>, server_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            server_id: server_id.into(),
            enable_console: false,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    #[must_use]
    pub fn with_console(mut self, enable: bool) -> Self {
        self.enable_console = enable;
        self
    }

    #[must_use]
    pub fn with_heartbeat(mut self, interval: Duration, stale_after: Duration) -> Self {
        self.heartbeat_interval = interval;
        self.stale_after = stale_after;
        self
    }
}

/// Event emitted to the stream consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Ready,
    ServerConnected,
    ServerDisconnected,
    Status(StatusData),
    ConsoleLine(String),
    ConnectionLost { reason: String },
}

impl From<SessionEvent> for StreamEvent {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::Ready => Self::Ready,
            SessionEvent::ServerConnected => Self::ServerConnected,
            SessionEvent::ServerDisconnected => Self::ServerDisconnected,
            SessionEvent::Status(data) => Self::Status(data),
            SessionEvent::ConsoleLine(line) => Self::ConsoleLine(line),
        }
    }
}

/// One bidirectional text-frame connection.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> Result<(), StreamError>;
    /// `None` means the peer closed the connection.
    async fn recv(&mut self) -> Option<Result<String, StreamError>>;
    async fn close(&mut self);
}

/// Produces a connected [`Transport`]; called once per connection attempt.
#[async_trait]
pub trait Dial: Send + 'static {
    type Conn: Transport;
    async fn dial(&mut self) -> Result<Self::Conn, StreamError>;
}

pub struct WsTransport {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), StreamError> {
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(StreamError::from)
    }

    async fn recv(&mut self) -> Option<Result<String, StreamError>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(_)) => return None,
                // Pings are answered by tungstenite; binary frames do not
                // occur on this endpoint.
                Ok(_) => continue,
                Err(err) => return Some(Err(err.into())),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.inner.close(None).await;
    }
}

/// Dials the hosting provider's websocket endpoint with bearer auth.
pub struct WsDial {
    url: String,
    token: String,
}

impl WsDial {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            url: websocket_url(&config.server_id),
            token: config.token.clone(),
        }
    }
}

#[async_trait]
impl Dial for WsDial {
    type Conn = WsTransport;

    async fn dial(&mut self) -> Result<WsTransport, StreamError> {
        let mut request = self.url.as_str().into_client_request()?;
        let bearer = format!("Bearer {}", self.token)
            .parse()
            .map_err(|_| StreamError::InvalidToken)?;
        request.headers_mut().insert(AUTHORIZATION, bearer);
        let (socket, _) = connect_async(request).await?;
        Ok(WsTransport { inner: socket })
    }
}

#[derive(Default)]
struct Shared {
    ready: AtomicBool,
    server_connected: AtomicBool,
}

enum Cmd {
    Console(String),
}

/// Handle to a running stream. Dropping the handle aborts the background
/// task; call [`StreamHandle::stop`] for an orderly shutdown.
pub struct StreamHandle {
    cmd_tx: mpsc::UnboundedSender<Cmd>,
    stop_tx: watch::Sender<bool>,
    shared: Arc<Shared>,
    console_enabled: bool,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl StreamHandle {
    /// Queue a console command for delivery over the stream.
    ///
    /// Returns `false` without side effect when the console relay is
    /// disabled, the game server is not connected, or the text is empty
    /// after trimming. `true` means the command was accepted for best-effort
    /// delivery, not that it was delivered.
    pub fn send_console_command(&self, command: &str) -> bool {
        if !self.console_enabled {
            return false;
        }
        if !self.shared.server_connected.load(Ordering::Acquire) {
            return false;
        }
        let trimmed = command.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.cmd_tx.send(Cmd::Console(trimmed.to_string())).is_ok()
    }

    pub fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::Acquire)
    }

    pub fn is_server_connected(&self) -> bool {
        self.shared.server_connected.load(Ordering::Acquire)
    }

    /// Stop the stream: no further reconnect attempts, pending backoff timers
    /// never fire, the socket closes. Idempotent.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Stop and wait briefly for the background task to wind down.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(Duration::from_secs(1), &mut task)
                .await
                .is_err()
            {
                warn!("stream task did not exit in time; aborting");
                task.abort();
            }
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

pub struct StatusStream;

impl StatusStream {
    /// Spawn a stream against the real hosting endpoint.
    ///
    /// Missing credentials are a fatal configuration error: the stream is
    /// never spawned and no reconnects happen.
    pub fn connect(
        config: StreamConfig,
    ) -> Result<(StreamHandle, mpsc::Receiver<StreamEvent>), StreamError> {
        if config.token.trim().is_empty() || config.server_id.trim().is_empty() {
            return Err(StreamError::MissingCredentials);
        }
        let dial = WsDial::new(&config);
        Ok(Self::spawn(config, dial))
    }

    /// Spawn a stream over a caller-supplied dialer. Used by tests to drive
    /// the connection with mock transports and a paused clock.
    pub fn spawn<D: Dial>(
        config: StreamConfig,
        dial: D,
    ) -> (StreamHandle, mpsc::Receiver<StreamEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = watch::channel(false);
        let shared = Arc::new(Shared::default());
        let console_enabled = config.enable_console;

        let task = tokio::spawn(run(
            config,
            dial,
            cmd_rx,
            event_tx,
            Arc::clone(&shared),
            stop_rx,
        ));

        let handle = StreamHandle {
            cmd_tx,
            stop_tx,
            shared,
            console_enabled,
            task: Some(task),
        };
        (handle, event_rx)
    }
}

/// Backoff before reconnect attempt `attempts` (1-based):
/// `min(30s, 1s * 2^min(attempts, 5))`.
fn reconnect_delay(attempts: u32) -> Duration {
    Duration::from_secs(1 << attempts.min(5)).min(MAX_RECONNECT_DELAY)
}

enum SessionEnd {
    Stopped,
    Lost(String),
}

async fn run<D: Dial>(
    config: StreamConfig,
    mut dial: D,
    mut cmd_rx: mpsc::UnboundedReceiver<Cmd>,
    event_tx: mpsc::Sender<StreamEvent>,
    shared: Arc<Shared>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut attempts: u32 = 0;
    loop {
        if *stop_rx.borrow() {
            break;
        }
        match dial.dial().await {
            Ok(mut transport) => {
                info!("exaroton websocket connected");
                let end = run_session(
                    &config,
                    &mut transport,
                    &mut cmd_rx,
                    &event_tx,
                    &shared,
                    &mut stop_rx,
                    &mut attempts,
                )
                .await;
                transport.close().await;
                shared.ready.store(false, Ordering::Release);
                shared.server_connected.store(false, Ordering::Release);
                match end {
                    SessionEnd::Stopped => break,
                    SessionEnd::Lost(reason) => {
                        warn!(%reason, "exaroton websocket lost");
                        let _ = event_tx
                            .send(StreamEvent::ConnectionLost { reason })
                            .await;
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "exaroton websocket connect failed");
            }
        }

        attempts += 1;
        let delay = reconnect_delay(attempts);
        info!(delay_secs = delay.as_secs(), "exaroton websocket reconnecting");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop_rx.wait_for(|stopped| *stopped) => break,
        }
    }
    debug!("exaroton stream task exited");
}

async fn run_session<T: Transport>(
    config: &StreamConfig,
    transport: &mut T,
    cmd_rx: &mut mpsc::UnboundedReceiver<Cmd>,
    event_tx: &mpsc::Sender<StreamEvent>,
    shared: &Shared,
    stop_rx: &mut watch::Receiver<bool>,
    attempts: &mut u32,
) -> SessionEnd {
    let mut session = Session::new(config.enable_console);
    session.on_open();
    let mut heartbeat = tokio::time::interval(config.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_message = Instant::now();
    let mut effects = Vec::new();

    loop {
        effects.clear();
        tokio::select! {
            _ = stop_rx.wait_for(|stopped| *stopped) => return SessionEnd::Stopped,
            _ = heartbeat.tick() => {
                if session.ready() && last_message.elapsed() > config.stale_after {
                    return SessionEnd::Lost("no messages within staleness window".to_string());
                }
            }
            cmd = cmd_rx.recv() => match cmd {
                Some(Cmd::Console(text)) => {
                    session.send_console_command(&text, &mut effects);
                }
                // All handles dropped; nothing can reach this stream anymore.
                None => return SessionEnd::Stopped,
            },
            incoming = transport.recv() => match incoming {
                Some(Ok(text)) => {
                    last_message = Instant::now();
                    session.on_frame(InboundFrame::parse(&text), &mut effects);
                }
                Some(Err(err)) => return SessionEnd::Lost(err.to_string()),
                None => return SessionEnd::Lost("connection closed".to_string()),
            },
        }

        for effect in effects.drain(..) {
            match effect {
                Effect::Send(frame) => match serde_json::to_string(&frame) {
                    Ok(json) => {
                        if let Err(err) = transport.send(json).await {
                            return SessionEnd::Lost(err.to_string());
                        }
                    }
                    Err(err) => error!(error = %err, "failed to serialize outbound frame"),
                },
                Effect::Emit(event) => {
                    match &event {
                        SessionEvent::Ready => {
                            info!("exaroton websocket ready");
                            shared.ready.store(true, Ordering::Release);
                            *attempts = 0;
                        }
                        SessionEvent::ServerConnected => {
                            info!("exaroton websocket server connected");
                            shared.server_connected.store(true, Ordering::Release);
                        }
                        SessionEvent::ServerDisconnected => {
                            info!("exaroton websocket server disconnected");
                            shared.server_connected.store(false, Ordering::Release);
                        }
                        _ => {}
                    }
                    if event_tx.send(StreamEvent::from(event)).await.is_err() {
                        debug!("event receiver dropped, stopping stream");
                        return SessionEnd::Stopped;
                    }
                }
            }
        }
    }
}
