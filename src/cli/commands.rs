use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `Helpline` - customer-support chat backend.
#[derive(Parser, Debug)]
#[command(name = "helpline")]
#[command(version)]
#[command(
    about = "Customer-support chat backend: knowledge-base answers with an AI fallback.",
    long_about = None
)]
pub struct Cli {
    /// Config file (default: ~/.helpline/config.toml, created on first run)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP + realtime gateway
    Serve {
        /// Port to listen on (use 0 for random available port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Inspect the knowledge base
    Kb {
        #[command(subcommand)]
        kb_command: KbCommands,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum KbCommands {
    /// Entry, category and keyword counts
    Stats,
    /// Show which entry (if any) answers a query
    Match {
        /// Free-form user message
        query: String,
    },
    /// Entry keys grouped by category
    Categories,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration with secrets redacted
    Show,
}
