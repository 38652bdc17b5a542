//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGQUIT, SIGHUP, SIGUSR1)
//! - Translate signals to a shutdown kind
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGUSR1 is the "hard" signal: exit without draining

/// How the process should stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownKind {
    /// Close the accept gate, drain, exit 0.
    Graceful,
    /// Exit immediately with a failure code.
    Immediate,
}

/// Wait for the first shutdown signal.
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<ShutdownKind> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    let mut quit = signal(SignalKind::quit())?;
    let mut hup = signal(SignalKind::hangup())?;
    let mut usr1 = signal(SignalKind::user_defined1())?;

    let (name, kind) = tokio::select! {
        _ = term.recv() => ("SIGTERM", ShutdownKind::Graceful),
        _ = int.recv() => ("SIGINT", ShutdownKind::Graceful),
        _ = quit.recv() => ("SIGQUIT", ShutdownKind::Graceful),
        _ = hup.recv() => ("SIGHUP", ShutdownKind::Graceful),
        _ = usr1.recv() => ("SIGUSR1", ShutdownKind::Immediate),
    };

    tracing::info!(signal = name, ?kind, "Caught signal, stopping");
    Ok(kind)
}

/// Wait for the first shutdown signal.
#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<ShutdownKind> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = "ctrl-c", "Caught signal, stopping");
    Ok(ShutdownKind::Graceful)
}
