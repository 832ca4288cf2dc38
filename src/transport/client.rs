//! WebSocket client for the chat server
//!
//! Provides a WebSocket client with:
//! - Automatic reconnection with exponential backoff
//! - Decoding of inbound chat frames into [`ClientEvent`]s
//! - Outbound reply delivery through a command channel

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message as WsMessage},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::TransportSettings;
use crate::error::{Error, Result};
use crate::protocol::{InboundEvent, OutboundEvent};
use crate::responder::ReplySink;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ─────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for the transport client
#[derive(Debug, Clone)]
pub struct TransportClientConfig {
    /// WebSocket URL of the chat server
    pub url: String,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Maximum reconnection attempts (0 = infinite)
    pub max_reconnect_attempts: u32,

    /// Initial reconnect delay
    pub initial_reconnect_delay: Duration,

    /// Maximum reconnect delay
    pub max_reconnect_delay: Duration,

    /// Event and command queue size
    pub queue_size: usize,
}

impl Default for TransportClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3000".to_string(),
            connect_timeout: Duration::from_secs(30),
            max_reconnect_attempts: 0, // Infinite
            initial_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(60),
            queue_size: 100,
        }
    }
}

impl TransportClientConfig {
    /// Build from the `[transport]` settings
    pub fn from_settings(settings: &TransportSettings) -> Self {
        Self {
            url: settings.address.clone(),
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            max_reconnect_attempts: settings.max_reconnect_attempts,
            initial_reconnect_delay: Duration::from_millis(settings.reconnect_interval_ms),
            max_reconnect_delay: Duration::from_millis(settings.max_reconnect_delay_ms),
            queue_size: settings.queue_size.max(1),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Connection State
// ─────────────────────────────────────────────────────────────────

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Connected and receiving chat events
    Connected,
    /// Connection error, will retry
    Reconnecting,
    /// Shutting down
    ShuttingDown,
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

// ─────────────────────────────────────────────────────────────────
// Client State
// ─────────────────────────────────────────────────────────────────

/// Internal client state
#[derive(Debug, Default)]
struct ClientState {
    /// Current connection state
    connection_state: ConnectionState,

    /// Reconnection attempt count
    reconnect_attempts: u32,

    /// Inbound data frames received across all connections
    frames_received: u64,

    /// Replies written to the socket
    replies_sent: u64,

    /// Replies that were queued but never reached a socket
    replies_dropped: u64,
}

/// Snapshot of transport counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub frames_received: u64,
    pub replies_sent: u64,
    pub replies_dropped: u64,
    pub reconnect_attempts: u32,
}

// ─────────────────────────────────────────────────────────────────
// Command Channel
// ─────────────────────────────────────────────────────────────────

/// Commands that can be sent to the client
#[derive(Debug)]
pub enum ClientCommand {
    /// Send a reply to the chat server
    Send(OutboundEvent),

    /// Initiate graceful shutdown
    Shutdown,
}

// ─────────────────────────────────────────────────────────────────
// Event Channel
// ─────────────────────────────────────────────────────────────────

/// Events emitted by the client
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Connected to the chat server
    Connected,

    /// Disconnected from the chat server
    Disconnected { reason: String },

    /// Decoded chat post
    Chat(InboundEvent),

    /// Data frame that is not a chat post
    Malformed { reason: String },

    /// Error occurred
    Error { message: String, fatal: bool },

    /// Reconnecting
    Reconnecting { attempt: u32 },
}

// ─────────────────────────────────────────────────────────────────
// Transport Client
// ─────────────────────────────────────────────────────────────────

/// WebSocket client for the chat server
pub struct TransportClient {
    config: TransportClientConfig,
    state: Arc<RwLock<ClientState>>,
    command_tx: mpsc::Sender<ClientCommand>,
}

impl TransportClient {
    /// Create a new transport client
    pub fn new(config: TransportClientConfig) -> Self {
        let (command_tx, _command_rx) = mpsc::channel(config.queue_size.max(1));

        Self {
            config,
            state: Arc::new(RwLock::new(ClientState::default())),
            command_tx,
        }
    }

    /// Start the client and return the event receiver
    pub async fn start(&mut self) -> Result<mpsc::Receiver<ClientEvent>> {
        let url = Url::parse(&self.config.url).map_err(|e| Error::ConnectionFailed {
            url: self.config.url.clone(),
            message: format!("Invalid URL: {}", e),
        })?;

        let (event_tx, event_rx) = mpsc::channel(self.config.queue_size.max(1));
        let (command_tx, command_rx) = mpsc::channel(self.config.queue_size.max(1));

        self.command_tx = command_tx;

        // Spawn the connection task
        let config = self.config.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            run_client_loop(config, url, state, command_rx, event_tx).await;
        });

        Ok(event_rx)
    }

    /// Send a command to the client
    pub async fn send_command(&self, command: ClientCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| Error::Connection("Client channel closed".to_string()))
    }

    /// Handle for sending replies; valid once [`start`](Self::start) returned
    pub fn reply_sender(&self) -> ReplySender {
        ReplySender {
            command_tx: self.command_tx.clone(),
            state: self.state.clone(),
        }
    }

    /// Snapshot of transport counters
    pub fn stats(&self) -> TransportStats {
        let s = self.state.read();
        TransportStats {
            frames_received: s.frames_received,
            replies_sent: s.replies_sent,
            replies_dropped: s.replies_dropped,
            reconnect_attempts: s.reconnect_attempts,
        }
    }

    /// Request graceful shutdown
    pub async fn shutdown(&self) -> Result<()> {
        self.send_command(ClientCommand::Shutdown).await
    }
}

/// Cloneable reply handle bound to a started client.
///
/// Replies are refused unless the client is connected, so the caller sees
/// the failure instead of the reply vanishing in the queue.
#[derive(Debug, Clone)]
pub struct ReplySender {
    command_tx: mpsc::Sender<ClientCommand>,
    state: Arc<RwLock<ClientState>>,
}

#[async_trait]
impl ReplySink for ReplySender {
    async fn send_reply(&self, event: OutboundEvent) -> Result<()> {
        let connection_state = self.state.read().connection_state;
        if connection_state != ConnectionState::Connected {
            return Err(Error::Connection(format!(
                "Not connected to chat server ({:?})",
                connection_state
            )));
        }

        self.command_tx
            .send(ClientCommand::Send(event))
            .await
            .map_err(|_| Error::Connection("Client channel closed".to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────
// Client Loop
// ─────────────────────────────────────────────────────────────────

/// Main client loop with reconnection logic
async fn run_client_loop(
    config: TransportClientConfig,
    url: Url,
    state: Arc<RwLock<ClientState>>,
    mut command_rx: mpsc::Receiver<ClientCommand>,
    event_tx: mpsc::Sender<ClientEvent>,
) {
    let mut backoff = ExponentialBackoff {
        current_interval: config.initial_reconnect_delay,
        initial_interval: config.initial_reconnect_delay,
        max_interval: config.max_reconnect_delay,
        max_elapsed_time: None, // Retry forever
        ..Default::default()
    };

    loop {
        state.write().connection_state = ConnectionState::Connecting;

        info!(url = %url, "Connecting to chat server");

        let Some(connected) = connect_serving_commands(&config, &url, &state, &mut command_rx).await
        else {
            break;
        };

        match connected {
            Ok(ws_stream) => {
                info!("WebSocket connection established");

                // Reset backoff on successful connection
                backoff.reset();
                {
                    let mut s = state.write();
                    s.connection_state = ConnectionState::Connected;
                    s.reconnect_attempts = 0;
                }

                let _ = event_tx.send(ClientEvent::Connected).await;

                let (write, read) = ws_stream.split();
                let result = handle_connection(&state, &mut command_rx, &event_tx, write, read).await;

                {
                    let mut s = state.write();
                    if s.connection_state == ConnectionState::Connected {
                        s.connection_state = ConnectionState::Disconnected;
                    }
                }

                if let Err(e) = result {
                    warn!(error = %e, "Connection error");
                    let _ = event_tx
                        .send(ClientEvent::Disconnected {
                            reason: e.to_string(),
                        })
                        .await;
                } else if state.read().connection_state != ConnectionState::ShuttingDown {
                    let _ = event_tx
                        .send(ClientEvent::Disconnected {
                            reason: "Server closed the connection".to_string(),
                        })
                        .await;
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to connect to chat server");
                let _ = event_tx
                    .send(ClientEvent::Error {
                        message: e.to_string(),
                        fatal: false,
                    })
                    .await;
            }
        }

        if state.read().connection_state == ConnectionState::ShuttingDown {
            break;
        }

        let attempts = {
            let mut s = state.write();
            s.connection_state = ConnectionState::Reconnecting;
            s.reconnect_attempts += 1;
            s.reconnect_attempts
        };

        if config.max_reconnect_attempts > 0 && attempts >= config.max_reconnect_attempts {
            error!(
                attempts = attempts,
                max = config.max_reconnect_attempts,
                "Max reconnection attempts reached"
            );
            let _ = event_tx
                .send(ClientEvent::Error {
                    message: "Max reconnection attempts reached".to_string(),
                    fatal: true,
                })
                .await;
            break;
        }

        let delay = backoff.next_backoff().unwrap_or(config.max_reconnect_delay);

        let _ = event_tx.send(ClientEvent::Reconnecting { attempt: attempts }).await;

        info!(
            delay_ms = delay.as_millis() as u64,
            attempt = attempts,
            "Waiting before reconnection"
        );

        if wait_for_retry(delay, &state, &mut command_rx).await {
            break;
        }
    }

    state.write().connection_state = ConnectionState::ShuttingDown;
    info!("Client loop terminated");
}

/// Open the WebSocket, bounded by the connect timeout
async fn connect(config: &TransportClientConfig, url: &Url) -> Result<WsStream> {
    match tokio::time::timeout(config.connect_timeout, connect_async(url.clone())).await {
        Ok(Ok((ws_stream, _response))) => Ok(ws_stream),
        Ok(Err(e)) => Err(Error::connection_failed(url.as_str(), e.to_string())),
        Err(_) => Err(Error::ConnectionTimeout {
            url: url.to_string(),
            timeout_secs: config.connect_timeout.as_secs(),
        }),
    }
}

/// Open the WebSocket while still serving commands.
///
/// Returns `None` if shutdown was requested before the attempt finished.
async fn connect_serving_commands(
    config: &TransportClientConfig,
    url: &Url,
    state: &Arc<RwLock<ClientState>>,
    command_rx: &mut mpsc::Receiver<ClientCommand>,
) -> Option<Result<WsStream>> {
    let connecting = connect(config, url);
    tokio::pin!(connecting);

    loop {
        tokio::select! {
            result = &mut connecting => return Some(result),
            cmd = command_rx.recv() => {
                if serve_offline_command(cmd, state) {
                    return None;
                }
            }
        }
    }
}

/// Sleep out the reconnect delay while still serving commands.
///
/// Returns `true` if shutdown was requested.
async fn wait_for_retry(
    delay: Duration,
    state: &Arc<RwLock<ClientState>>,
    command_rx: &mut mpsc::Receiver<ClientCommand>,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            cmd = command_rx.recv() => {
                if serve_offline_command(cmd, state) {
                    return true;
                }
            }
        }
    }
}

/// Serve a command while no socket is open.
///
/// Queued replies are dropped and counted. Returns `true` on shutdown or
/// when the command channel has closed.
fn serve_offline_command(cmd: Option<ClientCommand>, state: &Arc<RwLock<ClientState>>) -> bool {
    match cmd {
        Some(ClientCommand::Send(event)) => {
            state.write().replies_dropped += 1;
            warn!(fingerprint = %event.fingerprint, "Not connected, reply dropped");
            false
        }
        Some(ClientCommand::Shutdown) | None => {
            state.write().connection_state = ConnectionState::ShuttingDown;
            true
        }
    }
}

/// Handle an active WebSocket connection
async fn handle_connection<S, R>(
    state: &Arc<RwLock<ClientState>>,
    command_rx: &mut mpsc::Receiver<ClientCommand>,
    event_tx: &mpsc::Sender<ClientEvent>,
    mut write: S,
    mut read: R,
) -> Result<()>
where
    S: SinkExt<WsMessage, Error = WsError> + Unpin,
    R: StreamExt<Item = std::result::Result<WsMessage, WsError>> + Unpin,
{
    loop {
        tokio::select! {
            // Incoming frame from the chat server
            msg = read.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        state.write().frames_received += 1;
                        forward_frame(InboundEvent::from_json(&text), event_tx).await;
                    }
                    Some(Ok(WsMessage::Binary(data))) => {
                        state.write().frames_received += 1;
                        forward_frame(InboundEvent::from_json_bytes(&data), event_tx).await;
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        write.send(WsMessage::Pong(data)).await?;
                    }
                    Some(Ok(WsMessage::Pong(_))) => {
                        // Ignore pong
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(frame = ?frame, "Received close frame");
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        return Err(Error::Connection(e.to_string()));
                    }
                    None => {
                        info!("WebSocket stream ended");
                        return Ok(());
                    }
                    _ => {}
                }
            }

            // Command from the application
            cmd = command_rx.recv() => {
                match cmd {
                    Some(ClientCommand::Send(event)) => {
                        let json = event.to_json()?;
                        if let Err(e) = write.send(WsMessage::Text(json)).await {
                            state.write().replies_dropped += 1;
                            return Err(e.into());
                        }
                        state.write().replies_sent += 1;
                        debug!(fingerprint = %event.fingerprint, "Reply sent");
                    }
                    Some(ClientCommand::Shutdown) => {
                        info!("Shutdown command received");
                        let _ = write.send(WsMessage::Close(None)).await;
                        state.write().connection_state = ConnectionState::ShuttingDown;
                        return Ok(());
                    }
                    None => {
                        info!("Command channel closed");
                        state.write().connection_state = ConnectionState::ShuttingDown;
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Forward a decoded frame, or report it as malformed
async fn forward_frame(decoded: Result<InboundEvent>, event_tx: &mpsc::Sender<ClientEvent>) {
    let event = match decoded {
        Ok(inbound) => {
            debug!(sender = %inbound.sender_key, "Received chat post");
            ClientEvent::Chat(inbound)
        }
        Err(e) => {
            debug!(error = %e, "Received non-chat frame");
            ClientEvent::Malformed {
                reason: e.to_string(),
            }
        }
    };
    let _ = event_tx.send(event).await;
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    fn local_config(url: String) -> TransportClientConfig {
        TransportClientConfig {
            url,
            connect_timeout: Duration::from_secs(5),
            max_reconnect_attempts: 0,
            initial_reconnect_delay: Duration::from_millis(50),
            max_reconnect_delay: Duration::from_millis(200),
            queue_size: 16,
        }
    }

    #[test]
    fn test_config_default() {
        let config = TransportClientConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.max_reconnect_attempts, 0);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = TransportSettings {
            address: "wss://chat.example.com/ws".to_string(),
            connect_timeout_ms: 2500,
            reconnect_interval_ms: 100,
            max_reconnect_delay_ms: 800,
            max_reconnect_attempts: 3,
            queue_size: 0,
            ..Default::default()
        };
        let config = TransportClientConfig::from_settings(&settings);
        assert_eq!(config.url, "wss://chat.example.com/ws");
        assert_eq!(config.connect_timeout, Duration::from_millis(2500));
        assert_eq!(config.initial_reconnect_delay, Duration::from_millis(100));
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.queue_size, 1);
    }

    #[test]
    fn test_connection_state_default() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_url() {
        let mut client = TransportClient::new(local_config("not a url".to_string()));
        assert!(matches!(
            client.start().await,
            Err(Error::ConnectionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = local_config(format!("ws://{}", addr));
        config.max_reconnect_attempts = 2;
        let mut client = TransportClient::new(config);
        let mut events = client.start().await.unwrap();

        let mut fatal = false;
        while let Some(event) = events.recv().await {
            if let ClientEvent::Error { fatal: true, .. } = event {
                fatal = true;
                break;
            }
        }
        assert!(fatal);
    }

    #[tokio::test]
    async fn test_chat_roundtrip_over_websocket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();

            ws.send(WsMessage::Text("{\"hello\": 1}".to_string()))
                .await
                .unwrap();
            ws.send(WsMessage::Text(
                r#"{"chat":{"key":"k1","value":{"message":"hi friend"}}}"#.to_string(),
            ))
            .await
            .unwrap();

            loop {
                match ws.next().await {
                    Some(Ok(WsMessage::Text(text))) => return text,
                    Some(Ok(_)) => continue,
                    other => panic!("unexpected frame: {other:?}"),
                }
            }
        });

        let mut client = TransportClient::new(local_config(format!("ws://{}", addr)));
        let mut events = client.start().await.unwrap();

        assert!(matches!(events.recv().await, Some(ClientEvent::Connected)));
        assert!(matches!(events.recv().await, Some(ClientEvent::Malformed { .. })));
        match events.recv().await {
            Some(ClientEvent::Chat(inbound)) => {
                assert_eq!(inbound.sender_key, "k1");
                assert_eq!(inbound.message, "hi friend");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        client
            .reply_sender()
            .send_reply(OutboundEvent {
                api_key: "secret".to_string(),
                message: "Hey there!".to_string(),
                fingerprint: "0".repeat(28) + "Grub",
                picture: String::new(),
            })
            .await
            .unwrap();

        let received = server.await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&received).unwrap();
        assert_eq!(json["apiKey"], "secret");
        assert_eq!(json["message"], "Hey there!");
        assert_eq!(json["picture"], "");

        let stats = client.stats();
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.replies_dropped, 0);

        client.shutdown().await.unwrap();
    }

    fn grub_reply() -> OutboundEvent {
        OutboundEvent {
            api_key: "secret".to_string(),
            message: "Hey there!".to_string(),
            fingerprint: "0".repeat(28) + "Grub",
            picture: String::new(),
        }
    }

    #[tokio::test]
    async fn test_reply_refused_while_reconnecting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = local_config(format!("ws://{}", addr));
        config.initial_reconnect_delay = Duration::from_secs(30);
        config.max_reconnect_delay = Duration::from_secs(30);
        let mut client = TransportClient::new(config);
        let mut events = client.start().await.unwrap();

        loop {
            match events.recv().await {
                Some(ClientEvent::Reconnecting { .. }) => break,
                Some(_) => continue,
                None => panic!("client loop ended early"),
            }
        }

        let err = client.reply_sender().send_reply(grub_reply()).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert_eq!(client.stats().replies_sent, 0);

        client.shutdown().await.unwrap();
    }

    #[test]
    fn test_offline_commands_drop_replies() {
        let state = Arc::new(RwLock::new(ClientState::default()));

        assert!(!serve_offline_command(Some(ClientCommand::Send(grub_reply())), &state));
        assert!(!serve_offline_command(Some(ClientCommand::Send(grub_reply())), &state));
        assert_eq!(state.read().replies_dropped, 2);
        assert_eq!(state.read().replies_sent, 0);

        assert!(serve_offline_command(Some(ClientCommand::Shutdown), &state));
        assert_eq!(state.read().connection_state, ConnectionState::ShuttingDown);
    }

    #[tokio::test]
    async fn test_shutdown_and_queued_replies_served_while_connecting() {
        // Accepts TCP but never answers the handshake, so connect() hangs
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut config = local_config(format!("ws://{}", addr));
        config.connect_timeout = Duration::from_secs(60);
        let mut client = TransportClient::new(config);
        let mut events = client.start().await.unwrap();

        client
            .send_command(ClientCommand::Send(grub_reply()))
            .await
            .unwrap();
        client.shutdown().await.unwrap();

        // The loop exits and drops its event sender well before the timeout
        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while events.recv().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok(), "client loop still blocked in connect");

        let stats = client.stats();
        assert_eq!(stats.replies_dropped, 1);
        assert_eq!(stats.replies_sent, 0);
        drop(listener);
    }
}
