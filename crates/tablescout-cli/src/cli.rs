//! CLI argument definitions for TableScout.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// TableScout -- find restaurants and cafes with a pipeline of agents.
#[derive(Parser)]
#[command(
    name = "tablescout",
    version,
    about = "TableScout -- restaurant and cafe finder",
    long_about = "Answers questions like \"Chinese restaurants in New York\" by passing the query \
                  through a place finder, a data finder and a presenter agent."
)]
pub struct Cli {
    /// Configuration file (TOML or JSON).  Defaults to `tablescout.toml`.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Address to bind the HTTP server to.
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on.
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Run one query and print its progress and answer.
    Ask {
        /// The question, e.g. "Top 5 Chinese restaurants in New York".
        query: String,

        /// Continue the conversation of an earlier run.
        #[arg(long)]
        run_id: Option<String>,

        /// Ask for a UI payload in addition to the text answer.
        #[arg(long)]
        structured: bool,
    },

    /// Print the effective pipeline configuration as JSON.
    Config,
}

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}
