use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use safari_core::events::SessionEvent;
use safari_core::ids::{ObserverId, SessionId};
use safari_engine::AgentDeps;
use safari_llm::ModelRegistry;
use safari_settings::{AutoplaySettings, ServerSettings, WorldSettings};

use crate::client;
use crate::handlers;
use crate::orchestrator::RunOrchestrator;
use crate::protocol::ObserverCommand;
use crate::registry::SessionRegistry;

/// Inbound commands buffered per connection.
const COMMAND_QUEUE: usize = 64;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_send_queue: usize,
    pub heartbeat: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            max_send_queue: settings.max_send_queue.max(1),
            heartbeat: Duration::from_millis(settings.heartbeat_interval_ms.max(1000)),
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub orchestrator: Arc<RunOrchestrator>,
    pub models: Arc<ModelRegistry>,
    pub max_send_queue: usize,
    pub heartbeat: Duration,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/api/models", get(models_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind the listener and serve in the background.
pub async fn start(
    config: ServerConfig,
    deps: Arc<AgentDeps>,
    world: WorldSettings,
    autoplay: AutoplaySettings,
) -> Result<ServerHandle, std::io::Error> {
    let registry = Arc::new(SessionRegistry::new(world));
    let models = Arc::clone(&deps.models);
    let orchestrator = Arc::new(RunOrchestrator::new(deps, Arc::clone(&registry), autoplay));

    let app_state = AppState {
        registry,
        orchestrator: Arc::clone(&orchestrator),
        models,
        max_send_queue: config.max_send_queue,
        heartbeat: config.heartbeat,
    };

    let router = build_router(app_state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(host = %config.host, port = local_addr.port(), "safari server started");

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(signal.cancelled_owned())
            .await
        {
            tracing::error!(error = %e, "server stopped with error");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        orchestrator,
        shutdown,
        server,
    })
}

/// Handle returned by `start()`. Keeps the listener task alive.
pub struct ServerHandle {
    pub port: u16,
    orchestrator: Arc<RunOrchestrator>,
    shutdown: CancellationToken,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Stop every run, then stop accepting connections.
    pub async fn shutdown(self) {
        self.orchestrator.shutdown().await;
        self.shutdown.cancel();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.server).await.is_err() {
            tracing::warn!("server did not stop within the grace period");
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WsParams {
    session_id: Option<String>,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let session_id = params
        .session_id
        .filter(|s| !s.trim().is_empty())
        .map(SessionId::from_raw)
        .unwrap_or_default();
    ws.on_upgrade(move |socket| handle_socket(socket, session_id, state))
}

/// Attach the observer, greet it with the current state and pump commands until it leaves.
async fn handle_socket(socket: WebSocket, session_id: SessionId, state: AppState) {
    let observer_id = ObserverId::new();
    let (tx, rx) = mpsc::channel(state.max_send_queue);
    let session = state.registry.attach(&session_id, observer_id.clone(), tx);
    tracing::info!(session_id = %session_id, observer_id = %observer_id, observers = session.hub.len(), "observer connected");

    let snapshot = session.state.world().lock().state();
    session
        .hub
        .send_to(&observer_id, &SessionEvent::game_state(snapshot));
    if let Some(progress) = session.state.autoplay_progress() {
        session.hub.send_to(&observer_id, &progress);
    }

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<String>(COMMAND_QUEUE);
    let commands = {
        let session = Arc::clone(&session);
        let orchestrator = Arc::clone(&state.orchestrator);
        tokio::spawn(async move {
            while let Some(raw) = cmd_rx.recv().await {
                if let Some(command) = ObserverCommand::parse(&raw) {
                    handlers::dispatch(&session, &orchestrator, command);
                }
            }
        })
    };

    client::handle_ws_connection(socket, observer_id.clone(), rx, state.heartbeat, cmd_tx).await;
    let _ = commands.await;

    drop(session);
    state.registry.detach(&session_id, &observer_id);
    tracing::info!(session_id = %session_id, observer_id = %observer_id, "observer disconnected");
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "sessions": state.registry.count(),
        "activeRuns": state.orchestrator.active_runs(),
    }))
}

async fn models_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.models.list())
}
