//! dynaproxy daemon.
//!
//! A local proxy for a DynamoDB-compatible HTTP API.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                    DYNAPROXY                      │
//!                        │                                                   │
//!   Client Request       │  ┌──────────┐   ┌──────────┐   ┌──────────────┐   │
//!   ─────────────────────┼─▶│ listener │──▶│  accept  │──▶│   dispatch   │   │
//!                        │  │ (binder) │   │   gate   │   │ path/compat  │   │
//!                        │  └──────────┘   └──────────┘   └──────┬───────┘   │
//!                        │                                       ▼           │
//!   Client Response      │  ┌──────────┐   ┌──────────┐   ┌──────────────┐   │
//!   ◀────────────────────┼──│  stats   │◀──│ envelope │◀──│  translator  │◀──┼── Backend API
//!                        │  └──────────┘   └──────────┘   └──────────────┘   │
//!                        └──────────────────────────────────────────────────┘
//! ```
//!
//! Exit codes: 0 after a graceful stop or when every port is taken, 1 on
//! startup failure or a hard stop.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use dynaproxy::config::{load_config, validation::validate_config, ConfigError, ProxyConfig};
use dynaproxy::lifecycle::startup;
use dynaproxy::observability::logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "dynaproxy")]
#[command(about = "Local proxy daemon for a DynamoDB-compatible HTTP API", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Candidate listen port, tried in the order given. Repeatable.
    #[arg(short, long = "port")]
    ports: Vec<u16>,

    /// Backend endpoint URL.
    #[arg(short, long)]
    backend: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<ProxyConfig, String> {
        let mut config = match &self.config {
            Some(path) => load_config(path).map_err(|e| e.to_string())?,
            None => ProxyConfig::default(),
        };

        if !self.ports.is_empty() {
            config.listener.ports = self.ports;
        }
        if let Some(backend) = self.backend {
            config.backend.endpoint = backend;
        }

        validate_config(&config).map_err(|errors| ConfigError::Validation(errors).to_string())?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("dynaproxy: invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dynaproxy starting");
    tracing::info!(
        host = %config.listener.host,
        ports = ?config.listener.ports,
        backend = %config.backend.endpoint,
        request_timeout_secs = config.listener.request_timeout_secs,
        drain_timeout_ms = config.listener.drain_timeout_ms,
        "Configuration loaded"
    );

    let outcome = startup::run(config).await;
    tracing::info!(?outcome, "dynaproxy exiting");
    outcome.exit_code()
}
