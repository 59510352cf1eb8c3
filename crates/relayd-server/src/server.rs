//! HTTP/WebSocket server for the relay daemon.
//!
//! One axum listener serves the status routes and the WebSocket endpoint.
//! Every mutation of shared relay state happens under one mutex, locked per
//! inbound event; delivery to peers goes through per-connection unbounded
//! senders drained by a dedicated send task, never awaited under the lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use relayd_core::{Actuator, NullActuator, Outbound, Router as RelayRouter};
use relayd_proto::{ClientMessage, ServerMessage};
use relayd_types::PeerId;

use crate::config::Config;
use crate::error::Result;
use crate::gpio::SysfsActuator;

/// Mutable relay state, guarded by the one serialization point.
pub struct Shared {
    pub router: RelayRouter<Box<dyn Actuator>>,
    pub senders: HashMap<PeerId, mpsc::UnboundedSender<ServerMessage>>,
}

pub struct AppState {
    pub shared: Mutex<Shared>,
    token: Option<String>,
    started_at: Instant,
}

impl AppState {
    /// Build state from config, picking the GPIO backend when enabled.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let actuator: Box<dyn Actuator> = if config.gpio.enabled {
            Box::new(SysfsActuator::new(&config.gpio.lines))
        } else {
            Box::new(NullActuator::new(config.relay.channels))
        };
        Self::with_actuator(config, actuator)
    }

    #[must_use]
    pub fn with_actuator(config: &Config, actuator: Box<dyn Actuator>) -> Self {
        Self {
            shared: Mutex::new(Shared {
                router: RelayRouter::new(config.relay.slots, config.relay.channels, actuator),
                senders: HashMap::new(),
            }),
            token: config.auth.token.clone(),
            started_at: Instant::now(),
        }
    }
}

/// Build the axum router: identity route, status route, WebSocket endpoint.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/status", get(api_status))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

/// Run the daemon server until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if the listen address cannot be bound or the server
/// fails while running.
pub async fn run(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(&config));
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");
    if config.auth.token.is_some() {
        info!("Token auth enabled for WebSocket upgrades");
    }

    axum::serve(listener, app(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drive every channel off and release hardware before exit
    let mut shared = state.shared.lock().await;
    shared.router.shutdown();
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("Shutdown signal received");
}

async fn root(State(state): State<Arc<AppState>>) -> Json<Value> {
    let shared = state.shared.lock().await;
    Json(json!({
        "name": "relayd",
        "status": "running",
        "availableChannels": shared.router.available_channels(),
    }))
}

async fn api_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let shared = state.shared.lock().await;
    let counts = shared.router.counts();
    let available = shared.router.available_channels();
    Json(json!({
        "server": "relayd",
        "running": true,
        "clients": { "control": counts.control, "device": counts.device },
        "devices": shared.router.roster().devices,
        "relayState": shared.router.snapshot(),
        "gpioStatus": if available.is_empty() { "inactive" } else { "active" },
        "availableChannels": available,
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
    }))
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    if !authorized(state.token.as_deref(), &headers, query.token.as_deref()) {
        warn!("WebSocket upgrade rejected: bad or missing token");
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Token gate for the WebSocket upgrade. With a token configured, either
/// `Authorization: Bearer <token>` or a `?token=` query parameter must
/// match; with none configured, the gate is open.
#[must_use]
pub fn authorized(expected: Option<&str>, headers: &HeaderMap, query_token: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    let header_token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    header_token == Some(expected) || query_token == Some(expected)
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    let peer = PeerId::new();
    debug!("New connection: {peer}");

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    {
        let mut shared = state.shared.lock().await;
        shared.router.connect(peer.clone());
        shared.senders.insert(peer.clone(), tx);
    }

    let send_peer = peer.clone();
    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let json = match message.to_json() {
                Ok(json) => json,
                Err(err) => {
                    error!("[{send_peer}] failed to serialize outbound message: {err}");
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                debug!("[{send_peer}] send failed, closing");
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match ClientMessage::parse(text.as_ref()) {
                Ok(message) => {
                    let mut shared = state.shared.lock().await;
                    let out = shared.router.handle(&peer, message);
                    deliver(&shared.senders, out);
                }
                Err(err) => {
                    warn!("[{peer}] unparseable frame: {err}");
                }
            },
            Ok(Message::Binary(_)) => {
                warn!("[{peer}] binary frame ignored");
            }
            Ok(Message::Close(_)) => break,
            // Ping/pong frames are answered by axum
            Ok(_) => {}
            Err(err) => {
                debug!("[{peer}] read error: {err}");
                break;
            }
        }
    }

    debug!("Connection closed: {peer}");
    {
        let mut shared = state.shared.lock().await;
        shared.senders.remove(&peer);
        let out = shared.router.disconnect(&peer);
        deliver(&shared.senders, out);
    }
    send_task.abort();
}

/// Best-effort fan-out of one planned batch. A recipient that departed
/// between planning and delivery is skipped silently.
pub fn deliver(
    senders: &HashMap<PeerId, mpsc::UnboundedSender<ServerMessage>>,
    out: Vec<Outbound>,
) {
    for Outbound { to, message } in out {
        if let Some(tx) = senders.get(&to)
            && tx.send(message).is_err()
        {
            debug!("[{to}] dropped message for closed connection");
        }
    }
}
