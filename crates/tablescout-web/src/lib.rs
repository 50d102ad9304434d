//! Web interface for TableScout.
//!
//! This crate exposes the restaurant-finding pipeline over HTTP:
//!
//! - `GET|POST|DELETE /agent/config` to read, update and reset the pipeline
//!   configuration.
//! - `POST /agent/run` to run a query, streamed back as server-sent events.
//! - `GET /agent/runs` and `GET /agent/runs/{id}` to inspect checkpointed
//!   runs.
//! - `/static` for the image assets referenced by UI payloads.

pub mod api;
pub mod server;
pub mod state;

use std::path::PathBuf;

use tablescout_agent::config::ServerSettings;

pub use server::WebServer;
pub use state::AppState;

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
    /// Directory served under `/static`.
    pub static_dir: PathBuf,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for WebConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            bind_addr: settings.bind.clone(),
            port: settings.port,
            static_dir: settings.static_dir.clone(),
        }
    }
}
