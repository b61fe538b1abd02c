//! Application startup and lifecycle management.

use crate::config::RelayConfig;
use crate::handlers;
use crate::services::providers::gemini::GeminiChatProvider;
use crate::services::providers::ChatProvider;
use crate::services::{KeepAlive, SessionStore};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    ip_rate_limit_middleware, request_id_middleware, MultiWindowRateLimiter,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn ChatProvider>,
    pub sessions: SessionStore,
    pub rate_limiter: MultiWindowRateLimiter,
}

impl AppState {
    pub fn new(config: &RelayConfig, provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            provider,
            sessions: SessionStore::new(),
            rate_limiter: MultiWindowRateLimiter::new(
                &config.rate_limit.windows(),
                config.rate_limit.trust_forwarded_for,
            ),
        }
    }
}

/// `/ask` behind the per-IP limiter, `/ping` open.
pub fn build_router(state: AppState) -> Router {
    let ask_routes = Router::new()
        .route("/ask", get(handlers::ask))
        .route_layer(from_fn_with_state(
            state.rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    Router::new()
        .merge(ask_routes)
        .route("/ping", get(handlers::ping))
        .fallback(handlers::not_found)
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    keep_alive: Option<KeepAlive>,
    shutdown: CancellationToken,
}

impl Application {
    /// Build the application with the Gemini provider.
    pub async fn build(config: RelayConfig) -> Result<Self, AppError> {
        let provider = GeminiChatProvider::new(config.gemini.clone())
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        tracing::info!(model = %provider.model(), "Initialized Gemini chat provider");

        Self::build_with_provider(config, Arc::new(provider)).await
    }

    /// Build the application around any provider.
    pub async fn build_with_provider(
        config: RelayConfig,
        provider: Arc<dyn ChatProvider>,
    ) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::InternalError(anyhow::anyhow!("Failed to bind {}: {}", addr, e))
        })?;
        let port = listener
            .local_addr()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))?
            .port();

        // An unreachable provider is logged, not fatal: /ping must stay up.
        match provider.health_check().await {
            Ok(()) => tracing::info!("Chat provider reachable"),
            Err(e) => tracing::warn!(error = %e, "Chat provider health check failed"),
        }

        let keep_alive = match &config.keep_alive.url {
            Some(url) => Some(KeepAlive::new(url.clone(), config.keep_alive.interval)),
            None => {
                tracing::info!("KEEP_ALIVE_URL not set, keep-alive loop disabled");
                None
            }
        };

        Ok(Self {
            port,
            listener,
            state: AppState::new(&config, provider),
            keep_alive,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Token that stops the server and the keep-alive loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serve until a shutdown signal arrives or the shutdown token is cancelled.
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        let shutdown = self.shutdown;
        let keep_alive = self
            .keep_alive
            .map(|keep_alive| keep_alive.spawn(shutdown.child_token()));

        tracing::info!("Relay listening on port {}", self.port);

        let router = build_router(self.state);
        let signal_token = shutdown.clone();
        let result = axum::serve(
            self.listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown_signal() => {},
                _ = signal_token.cancelled() => {},
            }
        })
        .await;

        shutdown.cancel();
        if let Some(handle) = keep_alive {
            if let Err(e) = handle.await {
                tracing::error!("Keep-alive task ended abnormally: {}", e);
            }
        }

        result.map_err(|e| {
            tracing::error!("HTTP server error: {}", e);
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
