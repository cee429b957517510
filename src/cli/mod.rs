//! CLI module: command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod config;
pub mod serve;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};

use clipchat::config::Config;

#[derive(Parser)]
#[command(name = "clipchat")]
#[command(version)]
#[command(about = "Ask questions about an uploaded video's transcript", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.clipchat/config.json
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Inspect or validate configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Check configuration for errors and warnings
    Check,
    /// Print the effective configuration with secrets masked
    Show,
}

/// Load config from `path`, or from the default location.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => Config::load_from_path(p)
            .with_context(|| format!("Failed to load configuration from {}", p.display())),
        None => Config::load().context("Failed to load configuration"),
    }
}

pub async fn run() -> Result<()> {
    // A missing .env is the normal case.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Respect the logging settings when the config is readable; fall back to
    // defaults otherwise so `config check` can still report the problem.
    let logging_cfg = load_config(cli.config.as_deref())
        .map(|c| c.logging)
        .unwrap_or_default();
    clipchat::utils::logging::init_logging(&logging_cfg)
        .context("Failed to initialise logging")?;

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Version) => {
            cmd_version();
        }
        Some(Commands::Serve { host, port }) => {
            serve::cmd_serve(cli.config.as_deref(), host, port).await?;
        }
        Some(Commands::Config { action }) => {
            config::cmd_config(cli.config.as_deref(), action)?;
        }
    }

    Ok(())
}

fn cmd_version() {
    println!("clipchat {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Video transcript Q&A backend");
}
