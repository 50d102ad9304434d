//! Main web server setup and startup.
//!
//! [`WebServer`] composes the Axum router, registers all routes, and starts
//! the HTTP listener.

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::http::request::Parts;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;

use tablescout_agent::Coordinator;

use crate::WebConfig;
use crate::api;
use crate::state::AppState;

/// The TableScout web server.
pub struct WebServer {
    config: WebConfig,
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server around a ready coordinator.
    pub fn new(config: WebConfig, coordinator: Arc<Coordinator>) -> Self {
        let state = Arc::new(AppState {
            coordinator,
            config: config.clone(),
        });
        Self { config, state }
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.bind_addr, self.config.port)
    }

    /// Build the Axum router with all routes registered.
    pub fn router(&self) -> Router {
        router(Arc::clone(&self.state))
    }

    /// Bind the configured address and serve until shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.addr();
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(
        self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let router = self.router();
        tracing::info!(
            addr = %listener.local_addr()?,
            static_dir = %self.config.static_dir.display(),
            "starting web server"
        );
        axum::serve(listener, router).await?;
        Ok(())
    }
}

/// The application router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        // Configuration.
        .route(
            "/agent/config",
            get(api::get_config)
                .post(api::post_config)
                .delete(api::delete_config),
        )
        // Runs.
        .route("/agent/run", post(api::run_agent))
        .route("/agent/runs", get(api::list_runs))
        .route("/agent/runs/{id}", get(api::get_run).delete(api::delete_run))
        // Image assets referenced by UI payloads.
        .nest_service("/static", static_files)
        .layer(cors_layer())
        .with_state(state)
}

/// CORS for local front ends: any `http://localhost:<port>` origin, with
/// credentials.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            |origin: &HeaderValue, _parts: &Parts| is_local_origin(origin),
        ))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

fn is_local_origin(origin: &HeaderValue) -> bool {
    origin
        .to_str()
        .ok()
        .and_then(|o| o.strip_prefix("http://localhost:"))
        .is_some_and(|port| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
}
