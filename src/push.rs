//! Push channel: server-initiated task events over a WebSocket.
//!
//! The channel is an owned handle injected into a board session, never a
//! process-wide socket. Joining tags every delivery with the
//! [`Subscription`] it arrived under so the sync core can drop deliveries
//! that were already queued when the subscription was left.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use taskboard_common::{AuthToken, ClientFrame, ServerFrame, Task};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::errors::SyncError;
use crate::sync::Subscription;

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

/// A task change pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Updated(Task),
    Created(Task),
}

/// A push event together with the subscription it was received under.
#[derive(Debug, Clone, PartialEq)]
pub struct PushDelivery {
    pub subscription: Subscription,
    pub event: PushEvent,
}

/// Source of push deliveries for one board session.
#[async_trait]
pub trait PushChannel: Send {
    /// Start receiving events for `sub`'s project.
    async fn join(&mut self, sub: &Subscription) -> Result<(), SyncError>;

    /// Stop receiving events for `sub`'s project.
    async fn leave(&mut self, sub: &Subscription) -> Result<(), SyncError>;

    /// Next delivery, or `None` once the channel has shut down.
    /// Must be cancel-safe; it is polled inside `tokio::select!`.
    async fn recv(&mut self) -> Option<PushDelivery>;
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Decode one server text frame.
///
/// Returns `Ok(None)` for frame types this client does not consume, and
/// `Err` for frames that claim to carry a task but whose payload is not a
/// valid task (for example, no identifier).
pub fn decode_frame(text: &str) -> Result<Option<PushEvent>, String> {
    let raw: RawFrame =
        serde_json::from_str(text).map_err(|e| format!("Invalid push frame: {}", e))?;
    let kind = raw.kind.as_str();
    let created = ServerFrame::CREATED_TYPES.contains(&kind);
    if !created && !ServerFrame::UPDATED_TYPES.contains(&kind) {
        return Ok(None);
    }

    // Frames carry `{"task": {...}}`; bare task payloads are accepted too.
    let payload = match raw.data {
        serde_json::Value::Object(mut map) if map.contains_key("task") => {
            map.remove("task").unwrap_or_default()
        }
        other => other,
    };
    let task: Task = serde_json::from_value(payload)
        .map_err(|e| format!("Invalid task payload in {} frame: {}", kind, e))?;

    Ok(Some(if created {
        PushEvent::Created(task)
    } else {
        PushEvent::Updated(task)
    }))
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum SocketCommand {
    Join(Subscription),
    Leave(Subscription),
}

/// WebSocket-backed push channel.
///
/// A background task owns the socket; join/leave are forwarded to it and
/// decoded events come back over an mpsc channel. Dropping the handle
/// stops the background task.
pub struct WsPushChannel {
    commands: mpsc::UnboundedSender<SocketCommand>,
    deliveries: mpsc::UnboundedReceiver<PushDelivery>,
    task: JoinHandle<()>,
}

impl WsPushChannel {
    /// Connect to `url` (`ws://` or `wss://`), sending the bearer token in
    /// the upgrade request when one is given.
    pub async fn connect(url: &str, token: Option<&AuthToken>) -> Result<Self, SyncError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| SyncError::PushChannel(format!("Invalid push URL '{}': {}", url, e)))?;
        if let Some(token) = token {
            let value = HeaderValue::from_str(&token.bearer_header())
                .map_err(|e| SyncError::PushChannel(format!("Invalid token header: {}", e)))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| SyncError::PushChannel(format!("Failed to connect to {}: {}", url, e)))?;
        debug!(url, "Push channel connected");

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (delivery_tx, deliveries) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_socket_loop(stream, command_rx, delivery_tx));

        Ok(Self {
            commands,
            deliveries,
            task,
        })
    }

    fn send(&self, command: SocketCommand) -> Result<(), SyncError> {
        self.commands
            .send(command)
            .map_err(|_| SyncError::PushChannel("Push connection closed".to_string()))
    }
}

impl Drop for WsPushChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl PushChannel for WsPushChannel {
    async fn join(&mut self, sub: &Subscription) -> Result<(), SyncError> {
        self.send(SocketCommand::Join(sub.clone()))
    }

    async fn leave(&mut self, sub: &Subscription) -> Result<(), SyncError> {
        self.send(SocketCommand::Leave(sub.clone()))
    }

    async fn recv(&mut self) -> Option<PushDelivery> {
        self.deliveries.recv().await
    }
}

fn frame_text(frame: &ClientFrame) -> Option<String> {
    match serde_json::to_string(frame) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(error = %e, "Failed to serialize client frame");
            None
        }
    }
}

/// Socket loop with ping/pong keepalive.
///
/// Combines outgoing join/leave frames, incoming event frames and periodic
/// ping health checks in one select loop. Frames received while no
/// subscription is joined are dropped here; the rest are tagged with the
/// current subscription and forwarded.
async fn run_socket_loop(
    stream: Socket,
    mut commands: mpsc::UnboundedReceiver<SocketCommand>,
    deliveries: mpsc::UnboundedSender<PushDelivery>,
) {
    let (mut sender, mut receiver) = stream.split();
    let mut current: Option<Subscription> = None;

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // The first tick completes immediately.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    warn!("Push channel missed pong; closing");
                    break;
                }
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            command = commands.recv() => {
                let Some(command) = command else { break };
                let frame = match command {
                    SocketCommand::Join(sub) => {
                        let frame = ClientFrame::JoinProject { project_id: sub.project_id().clone() };
                        current = Some(sub);
                        frame
                    }
                    SocketCommand::Leave(sub) => {
                        if current.as_ref() == Some(&sub) {
                            current = None;
                        }
                        ClientFrame::LeaveProject { project_id: sub.project_id().clone() }
                    }
                };
                if let Some(text) = frame_text(&frame)
                    && sender.send(Message::Text(text)).await.is_err()
                {
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let event = match decode_frame(&text) {
                            Ok(Some(event)) => event,
                            Ok(None) => {
                                debug!("Ignoring unrecognised push frame");
                                continue;
                            }
                            Err(e) => {
                                warn!(error = %e, "Dropping malformed push frame");
                                continue;
                            }
                        };
                        let Some(sub) = current.clone() else {
                            debug!("Dropping push frame received outside a subscription");
                            continue;
                        };
                        if deliveries.send(PushDelivery { subscription: sub, event }).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Push channel read failed");
                        break;
                    }
                }
            }
        }
    }

    // Best-effort close frame
    let _ = sender.send(Message::Close(None)).await;
}
