//! Shared helpers for the CLI subcommands.

use std::sync::Arc;

use anyhow::{Context, Result};
use tablescout_agent::{Coordinator, LlmClient, Settings};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::LogFormat;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
///
/// Logs go to stderr so that `ask` and `config` output stays clean on
/// stdout.
pub fn init_tracing(default_level: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Wire the model client, the place tool providers and the pipeline.
pub async fn build_coordinator(settings: &Settings) -> Result<Arc<Coordinator>> {
    let llm = LlmClient::new(settings.llm.client_config())
        .context("failed to create LLM client (is TABLESCOUT_LLM_API_KEY or OPENAI_API_KEY set?)")?;
    let registry = tablescout_tools::default_registry(&settings.tools.data_dir);

    let coordinator = Coordinator::from_settings(settings, Arc::new(llm), Arc::new(registry))
        .await
        .context("failed to build the agent pipeline")?;

    info!(
        model = %settings.llm.default_model,
        data_dir = %settings.tools.data_dir.display(),
        "coordinator ready"
    );
    Ok(Arc::new(coordinator))
}
