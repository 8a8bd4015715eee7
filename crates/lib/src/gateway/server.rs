//! Gateway HTTP server.

use crate::channels::{verify_and_parse, LineChannel};
use crate::config::{Config, RelaySettings};
use crate::llm::ChatCompletionClient;
use crate::relay::Dispatcher;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// Body of `GET /`.
pub const HEALTH_TEXT: &str = "LINE bot relay is running.";

const SIGNATURE_HEADER: &str = "X-Line-Signature";

/// Shared state for the gateway. Read-only apart from the set of in-flight dispatch tasks.
#[derive(Clone)]
pub struct GatewayState {
    channel_secret: Arc<str>,
    dispatcher: Arc<Dispatcher>,
    /// One task per inbound event; drained on shutdown.
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl GatewayState {
    pub fn new(channel_secret: impl Into<Arc<str>>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            channel_secret: channel_secret.into(),
            dispatcher,
            tasks: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    /// Wait for every spawned dispatch task to finish.
    pub async fn drain(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                log::warn!("gateway: dispatch task failed: {}", e);
            }
        }
    }
}

/// Routes: health on `/`, webhook on `callback_path`.
pub fn router(state: GatewayState, callback_path: &str) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route(callback_path, post(line_callback))
        .with_state(state)
}

/// Run the gateway on config.gateway.bind:config.gateway.port until SIGINT/SIGTERM.
/// In-flight events are finished before this returns.
pub async fn run_gateway(config: Config, settings: RelaySettings) -> Result<()> {
    let settings = Arc::new(settings);
    let line = Arc::new(LineChannel::new(&settings.line).context("building LINE client")?);
    let backend = Arc::new(
        ChatCompletionClient::new(&settings.backend).context("building backend client")?,
    );
    let dispatcher = Dispatcher::new(settings.clone(), backend, line.clone(), line);
    log::info!(
        "gateway: image strategy {}, model {}",
        dispatcher.strategy().name(),
        settings.backend.model
    );
    let state = GatewayState::new(settings.line.channel_secret.as_str(), Arc::new(dispatcher));
    let app = router(state.clone(), &config.gateway.callback_path);

    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!(
        "gateway listening on {} (webhook {})",
        bind_addr,
        config.gateway.callback_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    state.drain().await;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, finishing in-flight events");
}

/// Webhook handler: verify X-Line-Signature, spawn one dispatch task per event, answer OK.
async fn line_callback(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let events = match verify_and_parse(&body, signature, &state.channel_secret) {
        Ok(events) => events,
        Err(e) => {
            log::warn!("gateway: rejected webhook: {}", e);
            return (StatusCode::BAD_REQUEST, "Bad Request");
        }
    };
    log::debug!("gateway: webhook with {} event(s)", events.len());
    let mut tasks = state.tasks.lock().await;
    while let Some(res) = tasks.try_join_next() {
        if let Err(e) = res {
            log::warn!("gateway: dispatch task failed: {}", e);
        }
    }
    for event in events {
        let dispatcher = state.dispatcher.clone();
        tasks.spawn(async move {
            dispatcher.dispatch(event).await;
        });
    }
    (StatusCode::OK, "OK")
}

/// GET / returns a fixed liveness string.
async fn health_http() -> &'static str {
    HEALTH_TEXT
}
