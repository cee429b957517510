//! Serve command handler (HTTP server).

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{error, info, warn};

use clipchat::assistant::VideoAssistant;
use clipchat::config::validate::{validate_semantics, DiagnosticLevel};

use super::load_config;

/// Start the HTTP server and block until Ctrl-C.
pub(crate) async fn cmd_serve(
    config_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let diagnostics = validate_semantics(&config);
    for diag in &diagnostics {
        match diag.level {
            DiagnosticLevel::Error => error!(path = %diag.path, "{}", diag.message),
            DiagnosticLevel::Warn => warn!(path = %diag.path, "{}", diag.message),
            DiagnosticLevel::Ok => {}
        }
    }
    if diagnostics.iter().any(|d| d.level == DiagnosticLevel::Error) {
        bail!("Configuration has errors; run `clipchat config check` for details");
    }

    let assistant = Arc::new(
        VideoAssistant::from_config(&config).context("Failed to initialise the assistant")?,
    );

    let addr = tokio::net::lookup_host((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| format!("Failed to resolve {}", config.server.host))?
        .next()
        .ok_or_else(|| anyhow!("No address found for {}", config.server.host))?;

    info!(
        model = %config.chat.model,
        max_context_tokens = config.chat.max_context_tokens,
        token_counter = assistant.budget().counter_name(),
        upload_dir = %config.server.upload_dir,
        "Starting clipchat"
    );

    clipchat::gateway::serve(assistant, addr, config.server.session_idle_secs)
        .await
        .context("Server error")?;
    Ok(())
}
