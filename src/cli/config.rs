//! Config command handlers.

use std::path::Path;

use anyhow::{Context, Result};

use clipchat::config::validate::{validate_config, validate_semantics, DiagnosticLevel};
use clipchat::config::Config;

use super::{load_config, ConfigAction};

pub(crate) fn cmd_config(path: Option<&Path>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Check => cmd_check(path),
        ConfigAction::Show => cmd_show(path),
    }
}

/// Validate the config file, then the effective configuration.
fn cmd_check(path: Option<&Path>) -> Result<()> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(Config::path);
    println!("Config file: {}", config_path.display());

    let mut diagnostics = Vec::new();
    if config_path.exists() {
        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let raw: serde_json::Value = match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                println!("[ERROR] Invalid JSON: {}", e);
                return Ok(());
            }
        };
        diagnostics.extend(validate_config(&raw));
    } else {
        println!("[OK] No config file found (using defaults)");
    }

    let config = load_config(path)?;
    diagnostics.extend(validate_semantics(&config));

    for diag in &diagnostics {
        println!("{}", diag);
    }

    let errors = diagnostics
        .iter()
        .filter(|d| d.level == DiagnosticLevel::Error)
        .count();
    let warnings = diagnostics
        .iter()
        .filter(|d| d.level == DiagnosticLevel::Warn)
        .count();

    if errors == 0 && warnings == 0 {
        println!("\nConfiguration looks good!");
    } else {
        println!("\nFound {} error(s), {} warning(s)", errors, warnings);
    }
    Ok(())
}

fn cmd_show(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;
    let rendered = serde_json::to_string_pretty(&masked(config))?;
    println!("{}", rendered);
    Ok(())
}

/// Replace every configured secret with a fixed mask.
fn masked(mut config: Config) -> Config {
    for key in [
        &mut config.provider.api_key,
        &mut config.tokens.api_key,
        &mut config.transcription.api_key,
    ] {
        if key.is_some() {
            *key = Some("****".to_string());
        }
    }
    config
}
