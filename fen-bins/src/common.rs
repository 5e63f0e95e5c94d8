//! Common utilities for all binaries
//!
//! Shared initialization and CLI parsing.

use anyhow::{Context, Result};
use clap::Parser;
use fen_core::config::EngineConfig;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Common CLI arguments for all binaries
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CommonArgs {
    /// Engine configuration file (JSON); defaults apply when omitted
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}

impl CommonArgs {
    /// Load the engine configuration, falling back to defaults
    pub fn engine_config(&self) -> Result<EngineConfig> {
        match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("parsing config {}", path.display()))
            }
            None => Ok(EngineConfig::default()),
        }
    }
}

/// Initialize tracing/logging
pub fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false))
            .with(filter)
            .init();
    }
    Ok(())
}
