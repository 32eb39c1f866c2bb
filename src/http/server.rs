//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the inference handlers
//! - Wire up the request layers in a fixed order
//! - Serve on a bound listener until shutdown is signalled
//!
//! # Layer order (outermost first)
//! ```text
//! CatchPanic → RequestObservability → body limit → routes
//! ```
//! The panic layer sits outside the observability middleware so a panic is
//! logged with its request ID before it is turned into a 500.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;

use crate::config::ServiceConfig;
use crate::http::handlers;
use crate::http::middleware::request_observability;
use crate::http::response::panic_response;
use crate::inference::ModelSlot;

/// Application state injected into handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub model: ModelSlot,
    pub config: Arc<ServiceConfig>,
}

/// HTTP server for the inference service.
pub struct HttpServer {
    router: Router,
    config: Arc<ServiceConfig>,
}

impl HttpServer {
    /// Create a new HTTP server serving `model`.
    ///
    /// The slot may still be empty; handlers answer 503 until it is filled.
    pub fn new(config: ServiceConfig, model: ModelSlot) -> Self {
        let config = Arc::new(config);
        let state = AppState {
            model,
            config: config.clone(),
        };
        let router = Self::build_router(state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(state: AppState) -> Router {
        let max_body_bytes = state.config.listener.max_body_bytes;
        let routes = Router::new()
            .route("/health", get(handlers::health))
            .route("/predict", post(handlers::predict))
            .with_state(state);
        with_request_layers(routes, max_body_bytes)
    }

    /// The router this server will serve.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(component = "api", "HTTP server listening on {addr}");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!(component = "api", "HTTP server stopped");
        Ok(())
    }
}

/// Wrap `routes` in the service's request layers.
///
/// Any router wrapped this way gets correlation IDs, request records and
/// panic containment, whatever its handlers do.
pub fn with_request_layers(routes: Router, max_body_bytes: usize) -> Router {
    routes
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(middleware::from_fn(request_observability))
        .layer(CatchPanicLayer::custom(panic_response))
}
