//! # WebSocket Transport
//!
//! Chat bridge client with automatic reconnection and backoff.
//!
//! ## Connection Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    WebSocket Connection States                          │
//! │                                                                         │
//! │  ┌────────────┐    connect()    ┌────────────┐                         │
//! │  │Disconnected│ ──────────────► │ Connecting │                         │
//! │  └────────────┘                 └─────┬──────┘                         │
//! │        ▲                              │                                 │
//! │        │                    success   │   failure                       │
//! │        │                        ┌─────┴─────┐                          │
//! │        │                        ▼           ▼                           │
//! │        │              ┌────────────┐  ┌────────────┐                   │
//! │        │              │ Connected  │  │ Backoff    │                   │
//! │        │              └─────┬──────┘  └─────┬──────┘                   │
//! │        │                    │               │                           │
//! │        │              disconnect/error      │  timer expired            │
//! │        │                    │               │                           │
//! │        │                    ▼               │                           │
//! │        │              ┌────────────┐        │                           │
//! │        └───────────── │Reconnecting│ ◄──────┘                          │
//! │                       └────────────┘                                    │
//! │                                                                         │
//! │  Only the connection retries. Publishes are fire-and-forget: a          │
//! │  publish while disconnected fails immediately and the caller            │
//! │  surfaces it. Nothing is queued for later.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::error::{AgentError, AgentResult};
use crate::protocol::{Envelope, Frame};

// =============================================================================
// Transport State
// =============================================================================

/// Connection state for the WebSocket transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected.
    Disconnected,
    /// Attempting to connect.
    Connecting,
    /// Connected and ready.
    Connected,
    /// Waiting before reconnection attempt.
    Backoff,
    /// Reconnection in progress.
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Backoff => write!(f, "backoff"),
            ConnectionState::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

// =============================================================================
// Transport Configuration
// =============================================================================

/// Configuration for the WebSocket transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// WebSocket URL of the chat bridge.
    pub url: String,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Initial backoff duration.
    pub initial_backoff: Duration,

    /// Maximum backoff duration.
    pub max_backoff: Duration,

    /// Maximum reconnection attempts (0 = infinite).
    pub max_retries: u32,

    /// Ping interval for keepalive.
    pub ping_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            url: String::new(),
            connect_timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            max_retries: 0, // Infinite
            ping_interval: Duration::from_secs(30),
        }
    }
}

// =============================================================================
// Delivery
// =============================================================================

/// One inbound envelope with its broker delivery token.
///
/// The token decodes to the broker-assigned send time; the inbound applier
/// orders messages by it instead of by arrival.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// The delivered envelope.
    pub envelope: Envelope,

    /// Broker delivery token, when the broker assigned one.
    pub token: Option<String>,
}

// =============================================================================
// Signaling Seam
// =============================================================================

/// Outbound side of the chat bridge.
///
/// Services take `Arc<dyn Signaling>` so tests can swap in a loopback
/// double without a live bridge.
#[async_trait]
pub trait Signaling: Send + Sync {
    /// Publishes one envelope to a channel. Fire-and-forget: errors are
    /// returned to the caller, never retried.
    async fn publish(&self, channel: &str, envelope: Envelope) -> AgentResult<()>;

    /// Returns true if the bridge connection is currently up.
    async fn is_connected(&self) -> bool;
}

// =============================================================================
// WebSocket Transport
// =============================================================================

/// Handle to the WebSocket transport task.
///
/// ## Usage
/// ```rust,ignore
/// let config = TransportConfig {
///     url: "wss://bridge.example.pk/chat".into(),
///     ..Default::default()
/// };
///
/// let (transport, mut deliveries) = WsTransport::spawn(config);
///
/// // Publish envelopes
/// transport.publish("dm.923001112222", envelope).await?;
///
/// // Consume deliveries (usually handed to the inbound applier)
/// while let Some(delivery) = deliveries.recv().await {
///     println!("Received: {}", delivery.envelope.kind_name());
/// }
/// ```
#[derive(Clone)]
pub struct WsTransport {
    /// Sender for outgoing frames.
    outgoing_tx: mpsc::Sender<Frame>,

    /// Current connection state.
    state: Arc<RwLock<ConnectionState>>,

    /// Shutdown signal.
    shutdown_tx: mpsc::Sender<()>,
}

impl WsTransport {
    /// Creates the transport and spawns its background task.
    ///
    /// Returns the handle and a receiver for inbound deliveries.
    pub fn spawn(config: TransportConfig) -> (WsTransport, mpsc::Receiver<Delivery>) {
        let (outgoing_tx, outgoing_rx) = mpsc::channel::<Frame>(100);
        let (incoming_tx, incoming_rx) = mpsc::channel::<Delivery>(100);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let state = Arc::new(RwLock::new(ConnectionState::Disconnected));

        let task = TransportTask {
            config,
            state: state.clone(),
            outgoing_rx,
            incoming_tx,
            shutdown_rx,
        };

        tokio::spawn(task.run());

        let handle = WsTransport {
            outgoing_tx,
            state,
            shutdown_tx,
        };

        (handle, incoming_rx)
    }

    /// Returns the current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> AgentResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| AgentError::ChannelClosed("transport shutdown".into()))
    }
}

#[async_trait]
impl Signaling for WsTransport {
    async fn publish(&self, channel: &str, envelope: Envelope) -> AgentResult<()> {
        if *self.state.read().await != ConnectionState::Connected {
            return Err(AgentError::Disconnected);
        }

        let frame = Frame::outbound(channel, envelope);
        self.outgoing_tx
            .send(frame)
            .await
            .map_err(|_| AgentError::ChannelClosed("transport outgoing".into()))
    }

    async fn is_connected(&self) -> bool {
        *self.state.read().await == ConnectionState::Connected
    }
}

// =============================================================================
// Transport Task
// =============================================================================

/// The background connect/reconnect loop behind [`WsTransport`].
struct TransportTask {
    config: TransportConfig,
    state: Arc<RwLock<ConnectionState>>,
    outgoing_rx: mpsc::Receiver<Frame>,
    incoming_tx: mpsc::Sender<Delivery>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl TransportTask {
    /// Main transport loop.
    async fn run(mut self) {
        info!(url = %self.config.url, "Transport starting");

        let mut backoff = self.create_backoff();
        let mut retry_count = 0u32;

        loop {
            // Check for shutdown
            if self.shutdown_rx.try_recv().is_ok() {
                info!("Transport received shutdown signal");
                break;
            }

            // Try to connect
            *self.state.write().await = ConnectionState::Connecting;

            match self.connect_with_timeout().await {
                Ok(ws_stream) => {
                    info!("WebSocket connected");
                    *self.state.write().await = ConnectionState::Connected;

                    // Reset backoff on successful connection
                    backoff.reset();
                    retry_count = 0;

                    if let Err(e) = self.connection_loop(ws_stream).await {
                        warn!(?e, "Connection loop ended");
                    }
                }
                Err(e) => {
                    error!(?e, "Failed to connect");
                }
            }

            // Connection lost or failed - enter backoff
            *self.state.write().await = ConnectionState::Backoff;

            // Check retry limit
            if self.config.max_retries > 0 {
                retry_count += 1;
                if retry_count >= self.config.max_retries {
                    error!(
                        max_retries = self.config.max_retries,
                        "Max reconnection attempts reached"
                    );
                    break;
                }
            }

            // Wait for backoff duration
            if let Some(duration) = backoff.next_backoff() {
                debug!(?duration, attempt = retry_count, "Waiting before reconnect");

                tokio::select! {
                    _ = tokio::time::sleep(duration) => {
                        *self.state.write().await = ConnectionState::Reconnecting;
                    }
                    _ = self.shutdown_rx.recv() => {
                        info!("Shutdown during backoff");
                        break;
                    }
                }
            } else {
                error!("Backoff exhausted");
                break;
            }
        }

        *self.state.write().await = ConnectionState::Disconnected;
        info!("Transport stopped");
    }

    /// Connects with timeout.
    async fn connect_with_timeout(
        &self,
    ) -> AgentResult<WebSocketStream<MaybeTlsStream<TcpStream>>> {
        let connect_future = connect_async(&self.config.url);

        match timeout(self.config.connect_timeout, connect_future).await {
            Ok(Ok((ws_stream, response))) => {
                debug!(status = ?response.status(), "WebSocket handshake complete");
                Ok(ws_stream)
            }
            Ok(Err(e)) => Err(AgentError::from(e)),
            Err(_) => Err(AgentError::Timeout(self.config.connect_timeout.as_secs())),
        }
    }

    /// Main connection loop - handles sending and receiving.
    async fn connection_loop(
        &mut self,
        ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    ) -> AgentResult<()> {
        let (write, mut read) = ws_stream.split();
        let write = Arc::new(Mutex::new(write));

        let mut ping_interval = tokio::time::interval(self.config.ping_interval);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // Handle outgoing frames
                Some(frame) = self.outgoing_rx.recv() => {
                    let json = frame.to_json()?;
                    debug!(
                        channel = %frame.channel,
                        kind = %frame.message.kind_name(),
                        "Publishing envelope"
                    );
                    let mut writer = write.lock().await;
                    writer.send(WsMessage::Text(json.into())).await?;
                }

                // Handle incoming frames. An ended stream (None) exits the
                // loop so reconnection starts now, not at the next keepalive.
                maybe_message = read.next() => {
                    let result = match maybe_message {
                        Some(result) => result,
                        None => {
                            info!("WebSocket stream ended");
                            return Ok(());
                        }
                    };
                    match result {
                        Ok(WsMessage::Text(text)) => {
                            match Frame::from_json(&text) {
                                Ok(frame) => {
                                    debug!(
                                        channel = %frame.channel,
                                        kind = %frame.message.kind_name(),
                                        "Received envelope"
                                    );
                                    let delivery = Delivery {
                                        envelope: frame.message,
                                        token: frame.token,
                                    };
                                    if self.incoming_tx.send(delivery).await.is_err() {
                                        warn!("Delivery receiver dropped");
                                        return Err(AgentError::ChannelClosed(
                                            "transport deliveries".into(),
                                        ));
                                    }
                                }
                                Err(e) => {
                                    warn!(?e, "Failed to parse frame");
                                }
                            }
                        }
                        Ok(WsMessage::Ping(data)) => {
                            let mut writer = write.lock().await;
                            writer.send(WsMessage::Pong(data)).await?;
                        }
                        Ok(WsMessage::Pong(_)) => {
                            debug!("Received pong");
                        }
                        Ok(WsMessage::Close(frame)) => {
                            info!(?frame, "Received close frame");
                            // Keep reading: the close reply still has to
                            // flush before the stream ends.
                        }
                        Ok(WsMessage::Binary(_)) => {
                            warn!("Received unexpected binary message");
                        }
                        Ok(WsMessage::Frame(_)) => {
                            // Raw frame, ignore
                        }
                        Err(e) => {
                            error!(?e, "WebSocket error");
                            return Err(AgentError::from(e));
                        }
                    }
                }

                // Send periodic pings
                _ = ping_interval.tick() => {
                    let mut writer = write.lock().await;
                    writer.send(WsMessage::Ping(vec![].into())).await?;
                    debug!("Sent ping");
                }

                // Check for shutdown
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received, closing connection");
                    let mut writer = write.lock().await;
                    let _ = writer.send(WsMessage::Close(None)).await;
                    return Ok(());
                }
            }
        }
    }

    /// Creates the exponential backoff configuration.
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_backoff,
            max_interval: self.config.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None, // No limit on total time
            ..Default::default()
        }
    }
}

// =============================================================================
// Loopback Double (tests)
// =============================================================================

/// In-process transport double: records publishes, no bridge needed.
#[cfg(test)]
pub(crate) struct LoopbackSignaling {
    connected: std::sync::atomic::AtomicBool,
    sent: std::sync::Mutex<Vec<(String, Envelope)>>,
}

#[cfg(test)]
impl LoopbackSignaling {
    pub(crate) fn new() -> Self {
        LoopbackSignaling {
            connected: std::sync::atomic::AtomicBool::new(true),
            sent: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected
            .store(connected, std::sync::atomic::Ordering::SeqCst);
    }

    pub(crate) fn sent(&self) -> Vec<(String, Envelope)> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Signaling for LoopbackSignaling {
    async fn publish(&self, channel: &str, envelope: Envelope) -> AgentResult<()> {
        if !self.connected.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AgentError::Disconnected);
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel.to_string(), envelope));
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(ConnectionState::Backoff.to_string(), "backoff");
    }

    #[test]
    fn test_transport_config_default() {
        let config = TransportConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 0); // Infinite
        assert_eq!(config.ping_interval, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_loopback_records_publishes() {
        let loopback = LoopbackSignaling::new();
        assert!(loopback.is_connected().await);

        loopback
            .publish("dm.1", Envelope::typing("me", "dm.1", true))
            .await
            .unwrap();

        let sent = loopback.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "dm.1");
        assert_eq!(sent[0].1.kind_name(), "typing");
    }

    #[tokio::test]
    async fn test_loopback_disconnected_rejects() {
        let loopback = LoopbackSignaling::new();
        loopback.set_connected(false);

        let err = loopback
            .publish("dm.1", Envelope::typing("me", "dm.1", true))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Disconnected));
    }

    #[tokio::test]
    async fn test_publish_before_connect_fails_fast() {
        let config = TransportConfig {
            // Discard port: connection refused immediately
            url: "ws://127.0.0.1:9".into(),
            ..Default::default()
        };
        let (transport, _deliveries) = WsTransport::spawn(config);

        let err = transport
            .publish("dm.1", Envelope::typing("me", "dm.1", true))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Disconnected));

        transport.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_clean_server_close_exits_connection_loop() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // One-shot bridge: close the connection cleanly right after accepting
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let _ = ws.close(None).await;
            // Drain until the close handshake completes
            while let Some(message) = ws.next().await {
                if message.is_err() {
                    break;
                }
            }
        });

        let config = TransportConfig {
            url: format!("ws://{}", addr),
            // Park both timers past the test window: only the ended
            // stream itself can move the state off Connected.
            ping_interval: Duration::from_secs(600),
            initial_backoff: Duration::from_secs(600),
            max_backoff: Duration::from_secs(600),
            ..Default::default()
        };
        let (transport, _deliveries) = WsTransport::spawn(config);

        let mut state = transport.state().await;
        for _ in 0..200 {
            state = transport.state().await;
            if state == ConnectionState::Backoff {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(state, ConnectionState::Backoff);

        transport.shutdown().await.unwrap();
    }
}
