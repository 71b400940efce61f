use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use xo_store::Database;

use crate::client::{self, ClientId, ClientRegistry};
use crate::handlers::{self, HandlerState};
use crate::protocol::{ErrorFrame, Frame, Request};

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    pub max_send_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9090,
            max_send_queue: 256,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub handler_state: Arc<HandlerState>,
    pub client_registry: Arc<ClientRegistry>,
    pub message_tx: mpsc::Sender<(ClientId, String)>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle that keeps it alive.
pub async fn start(config: ServerConfig, db: Database) -> Result<ServerHandle, std::io::Error> {
    let client_registry = Arc::new(ClientRegistry::new(config.max_send_queue));

    // Dead-client cleanup task (every 60s)
    let _cleanup = client::start_cleanup_task(
        Arc::clone(&client_registry),
        std::time::Duration::from_secs(60),
    );

    // Inbound frame channel, consumed by a single dispatcher task so
    // each connection's requests are handled strictly in arrival order.
    let (msg_tx, msg_rx) = mpsc::channel::<(ClientId, String)>(1024);

    let handler_state = Arc::new(HandlerState::new(db));

    let app_state = AppState {
        handler_state: Arc::clone(&handler_state),
        client_registry: Arc::clone(&client_registry),
        message_tx: msg_tx,
    };

    let dispatch_state = Arc::clone(&handler_state);
    let dispatch_registry = Arc::clone(&client_registry);
    let dispatch_handle =
        tokio::spawn(process_messages(msg_rx, dispatch_state, dispatch_registry));

    let router = build_router(app_state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "xo server started");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server_handle,
        _dispatch: dispatch_handle,
        _cleanup,
    })
}

/// Handle returned by `start()` — keeps background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
    _dispatch: tokio::task::JoinHandle<()>,
    _cleanup: tokio::task::JoinHandle<()>,
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a new WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (client_id, rx) = state.client_registry.register();
    tracing::info!(client_id = %client_id, "client connected");

    client::handle_ws_connection(
        socket,
        client_id,
        rx,
        state.client_registry,
        state.message_tx,
    )
    .await;
}

/// Health check HTTP endpoint. Verifies the store answers a trivial query.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = state
        .handler_state
        .db
        .with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))
                .map_err(|e| xo_store::StoreError::Database(e.to_string()))
        })
        .is_ok();

    let http_status = if healthy {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };

    let status = if healthy { "healthy" } else { "unhealthy" };
    (
        http_status,
        axum::Json(serde_json::json!({
            "status": status,
            "clients": state.client_registry.count(),
        })),
    )
}

/// Process inbound frames from WebSocket clients. Malformed frames are
/// answered with a 400 error; the connection stays open either way.
async fn process_messages(
    mut rx: mpsc::Receiver<(ClientId, String)>,
    state: Arc<HandlerState>,
    registry: Arc<ClientRegistry>,
) {
    while let Some((client_id, raw_message)) = rx.recv().await {
        let frame = match serde_json::from_str::<Request>(&raw_message) {
            Ok(request) => {
                tracing::debug!(client_id = %client_id, command = %request.command, "received command");
                handlers::dispatch(&state, &request)
            }
            Err(e) => {
                tracing::warn!(client_id = %client_id, error = %e, "malformed request frame");
                Frame::Err(ErrorFrame::bad_request("malformed request"))
            }
        };

        if let Ok(json) = serde_json::to_string(&frame) {
            registry.send_to(&client_id, json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn server_starts_and_serves_health() {
        let db = Database::in_memory().unwrap();

        let config = ServerConfig {
            port: 0, // random port
            ..Default::default()
        };

        let handle = start(config, db).await.unwrap();
        assert!(handle.port > 0);

        let url = format!("http://127.0.0.1:{}/health", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[test]
    fn build_router_creates_routes() {
        let db = Database::in_memory().unwrap();
        let handler_state = Arc::new(HandlerState::new(db));
        let client_registry = Arc::new(ClientRegistry::new(32));
        let (msg_tx, _) = mpsc::channel(32);

        let state = AppState {
            handler_state,
            client_registry,
            message_tx: msg_tx,
        };

        let _router = build_router(state);
    }

    #[tokio::test]
    async fn dispatcher_answers_malformed_frame() {
        let db = Database::in_memory().unwrap();
        let state = Arc::new(HandlerState::new(db));
        let registry = Arc::new(ClientRegistry::new(32));
        let (tx, rx) = mpsc::channel(32);

        let (client_id, mut out_rx) = registry.register();
        let _task = tokio::spawn(process_messages(rx, state, Arc::clone(&registry)));

        tx.send((client_id, "this is not json".to_string())).await.unwrap();

        let reply = out_rx.recv().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(parsed["code"], 400);
        assert_eq!(parsed["error"], "malformed request");
    }
}
