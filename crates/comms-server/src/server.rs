//! `CommsServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::error::CommsError;
use crate::health::{self, HealthResponse};
use crate::service::CommsService;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The comms service every socket is driven through.
    pub service: Arc<CommsService>,
    /// When the server started.
    pub start_time: Instant,
    /// Max inbound WebSocket message size.
    pub max_message_size: usize,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The comms HTTP server.
pub struct CommsServer {
    config: ServerConfig,
    service: Arc<CommsService>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl CommsServer {
    /// Create a server fronting `service`.
    pub fn new(config: ServerConfig, service: Arc<CommsService>) -> Self {
        Self {
            config,
            service,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics: None,
            start_time: Instant::now(),
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router.
    ///
    /// The comms route is mounted at `<base>/comms` unless disabled.
    pub fn router(&self) -> Router {
        let state = AppState {
            service: Arc::clone(&self.service),
            start_time: self.start_time,
            max_message_size: self.config.max_message_size,
            metrics: self.metrics.clone(),
        };

        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler));
        if !self.config.disabled {
            router = router.route(&self.config.comms_path(), get(ws_handler));
        }
        router.with_state(state).layer(TraceLayer::new_for_http())
    }

    /// Bind and serve in a background task until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), CommsError> {
        let requested = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&requested)
            .await
            .map_err(|source| CommsError::Bind {
                addr: requested.clone(),
                source,
            })?;
        let addr = listener.local_addr()?;

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
        });
        info!(%addr, path = %self.config.comms_path(), disabled = self.config.disabled, "comms server listening");
        Ok((addr, handle))
    }

    /// The comms service.
    pub fn service(&self) -> &Arc<CommsService> {
        &self.service
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.service.registry().len();
    Json(health::health_check(
        state.start_time,
        connections,
        !state.service.config().disabled,
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET `<base>/comms`
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let service = state.service;
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, service))
}
