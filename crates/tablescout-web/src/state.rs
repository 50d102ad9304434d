//! Shared application state for the web server.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request
//! handlers.  Configuration changes go through the coordinator, which swaps
//! its pipeline atomically, so handlers never need a lock of their own.

use std::sync::Arc;

use tablescout_agent::Coordinator;

use crate::WebConfig;

/// Shared state accessible from every Axum handler.
#[derive(Clone)]
pub struct AppState {
    /// Runs queries and owns the active pipeline configuration.
    pub coordinator: Arc<Coordinator>,

    /// Web server configuration.
    pub config: WebConfig,
}
