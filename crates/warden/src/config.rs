// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

use crate::oracle::OracleConfig;

/// Supervisory orchestrator for coding-assistant terminal sessions.
///
/// The crate ships no binary; the outer shell flattens this into its own
/// parser with `#[command(flatten)]`.
#[derive(Debug, Clone, Parser)]
#[command(name = "warden", version, about)]
pub struct Config {
    /// Hook ingress port (loopback only).
    #[arg(long, env = "WARDEN_PORT", default_value = "4170")]
    pub port: u16,

    /// Agents file override (default: `$XDG_CONFIG_HOME/warden/agents.json`).
    #[arg(long, env = "WARDEN_AGENTS_FILE")]
    pub agents_file: Option<PathBuf>,

    /// Chat-completions endpoint for the decision oracle.
    #[arg(
        long,
        env = "WARDEN_ORACLE_URL",
        default_value = "https://openrouter.ai/api/v1/chat/completions"
    )]
    pub oracle_url: String,

    /// Model requested from the oracle endpoint.
    #[arg(long, env = "WARDEN_ORACLE_MODEL", default_value = "anthropic/claude-sonnet-4.5")]
    pub oracle_model: String,

    /// Name of the environment variable holding the oracle API key.
    #[arg(long, env = "WARDEN_ORACLE_KEY_ENV", default_value = "OPENROUTER_API_KEY")]
    pub oracle_key_env: String,

    /// Log format (json or text).
    #[arg(long, env = "WARDEN_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "WARDEN_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        // Parse from an empty argv so clap defaults and env vars apply.
        Self::parse_from(["warden"])
    }
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.port == 0 {
            anyhow::bail!("--port must be a fixed port, not 0");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        Ok(())
    }

    /// Resolved agents-file path.
    pub fn agents_path(&self) -> PathBuf {
        self.agents_file.clone().unwrap_or_else(crate::store::default_store_path)
    }

    /// Oracle client settings, with the API key read from the configured
    /// environment variable (empty when unset; requests will then fail soft).
    pub fn oracle_config(&self) -> OracleConfig {
        OracleConfig {
            endpoint: self.oracle_url.clone(),
            api_key: std::env::var(&self.oracle_key_env).unwrap_or_default(),
            model: self.oracle_model.clone(),
        }
    }
}

/// Install the global tracing subscriber. Called once by the outer shell.
pub fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone()));
    if config.log_format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
