//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order (metrics, backend, server)
//! - Bind a listen port and begin accepting traffic
//! - Wait for a stop signal and run the matching shutdown
//! - Map every outcome to a process exit code
//!
//! # Design Decisions
//! - Startup errors are fatal and exit non-zero so a supervisor retries
//! - No free port exits zero so a supervisor does not respawn
//! - Listeners start last (traffic only when ready)

use std::future::Future;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use crate::config::ProxyConfig;
use crate::http::ProxyServer;
use crate::lifecycle::signals::wait_for_signal;
use crate::lifecycle::{Shutdown, ShutdownKind};
use crate::observability::metrics::init_metrics;
use crate::translate::{HttpTranslator, Translator};

/// How a daemon run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Served until a graceful stop.
    Stopped,
    /// Every candidate port was taken; another instance is assumed to be serving.
    AlreadyRunning,
    /// Startup or serving failed.
    Failed,
    /// Hard stop without draining.
    Aborted,
}

impl Outcome {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Outcome::Stopped | Outcome::AlreadyRunning => ExitCode::SUCCESS,
            Outcome::Failed | Outcome::Aborted => ExitCode::FAILURE,
        }
    }
}

/// Run the daemon against the configured backend until a signal arrives.
pub async fn run(config: ProxyConfig) -> Outcome {
    if config.observability.metrics_enabled {
        let started = config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .map_err(|e| e.to_string())
            .and_then(|addr| init_metrics(addr).map_err(|e| e.to_string()));
        if let Err(e) = started {
            tracing::error!(error = %e, "Cannot start metrics endpoint");
            return Outcome::Failed;
        }
    }

    let translator = match HttpTranslator::new(&config.backend, &config.compat) {
        Ok(translator) => translator,
        Err(e) => {
            tracing::error!(error = %e, "Cannot create backend client");
            return Outcome::Failed;
        }
    };
    tracing::info!(endpoint = %translator.endpoint(), "Backend configured");

    run_until(config, Arc::new(translator), wait_for_signal()).await
}

/// Run the daemon until `stop` resolves.
pub async fn run_until<F>(config: ProxyConfig, translator: Arc<dyn Translator>, stop: F) -> Outcome
where
    F: Future<Output = std::io::Result<ShutdownKind>>,
{
    let server = ProxyServer::new(config, translator);
    let gate = server.gate();

    let bound = match server.bind().await {
        Ok(Some(bound)) => bound,
        Ok(None) => {
            tracing::info!("No listen port available, assuming another instance is serving");
            return Outcome::AlreadyRunning;
        }
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return Outcome::Failed;
        }
    };
    tracing::info!(port = bound.port, "Routing initialized");

    let shutdown = Shutdown::new();
    let mut serving = tokio::spawn(server.run(bound.listener, shutdown.subscribe()));

    let kind = tokio::select! {
        signal = stop => match signal {
            Ok(kind) => kind,
            Err(e) => {
                tracing::error!(error = %e, "Cannot install signal handlers");
                return Outcome::Failed;
            }
        },
        result = &mut serving => {
            tracing::error!(result = ?result, "Server stopped unexpectedly");
            return Outcome::Failed;
        }
    };

    if kind == ShutdownKind::Immediate {
        tracing::warn!("Immediate stop requested, skipping drain");
        serving.abort();
        return Outcome::Aborted;
    }

    match gate.close().await {
        Ok(()) => tracing::info!("Drain complete"),
        Err(e) => tracing::warn!(error = %e, "Drain incomplete, stopping anyway"),
    }
    shutdown.trigger();

    match serving.await {
        Ok(Ok(())) => Outcome::Stopped,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Server error during shutdown");
            Outcome::Failed
        }
        Err(e) => {
            tracing::error!(error = %e, "Server task failed");
            Outcome::Failed
        }
    }
}
