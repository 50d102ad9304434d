//! CLI entry point for TableScout.
//!
//! This binary provides the `tablescout` command with subcommands for
//! serving the HTTP API, asking a single question from the terminal, and
//! inspecting the effective configuration.

mod cli;
mod helpers;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use tablescout_agent::{RunEvent, Settings};
use tablescout_web::{WebConfig, WebServer};
use tracing::info;

use crate::cli::{Cli, Commands};
use crate::helpers::{build_coordinator, init_tracing};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("info", cli.log_format);

    let settings =
        Settings::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Serve { host, port } => cmd_serve(settings, host, port).await,
        Commands::Ask {
            query,
            run_id,
            structured,
        } => cmd_ask(settings, &query, run_id, structured).await,
        Commands::Config => cmd_config(&settings),
    }
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve(mut settings: Settings, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        settings.server.bind = host;
    }
    if let Some(port) = port {
        settings.server.port = port;
    }

    let coordinator = build_coordinator(&settings).await?;
    let server = WebServer::new(WebConfig::from(&settings.server), coordinator);
    info!(addr = %server.addr(), base_url = %settings.server.base_url, "serving TableScout");

    server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("web server failed: {e}"))
}

// ---------------------------------------------------------------------------
// Subcommand: ask
// ---------------------------------------------------------------------------

async fn cmd_ask(
    settings: Settings,
    query: &str,
    run_id: Option<String>,
    structured: bool,
) -> Result<()> {
    let coordinator = build_coordinator(&settings).await?;
    let run_id = run_id.unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
    info!(run_id = %run_id, structured, "asking");

    let events = coordinator.run(query, &run_id, structured);
    futures::pin_mut!(events);

    while let Some(event) = events.next().await {
        match event.context("run failed")? {
            RunEvent::Progress { timeline, .. } => println!("  {timeline}"),
            RunEvent::Complete {
                content,
                token_count,
                ..
            } => {
                println!();
                println!("{content}");
                println!();
                println!("run: {run_id}  tokens: {token_count}");
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: config
// ---------------------------------------------------------------------------

fn cmd_config(settings: &Settings) -> Result<()> {
    let json = serde_json::to_string_pretty(&settings.pipeline)
        .context("failed to serialize pipeline configuration")?;
    println!("{json}");
    Ok(())
}
