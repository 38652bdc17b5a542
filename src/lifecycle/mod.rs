//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → PortBinder (binder.rs) → install routes → AcceptGate::open → serve
//!
//! Shutdown (shutdown.rs, gate.rs):
//!     Signal received → AcceptGate::close (stop admitting, drain) → stop listener → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT/SIGQUIT/SIGHUP → graceful shutdown
//!     SIGUSR1 → immediate exit, no drain
//! ```
//!
//! # Design Decisions
//! - All ports taken is not a failure: another instance is assumed healthy
//! - Drain is bounded; a timeout is reported but never blocks exit
//! - The gate never reopens after close

pub mod binder;
pub mod gate;
pub mod shutdown;
pub mod signals;
pub mod startup;

use std::time::Duration;

use thiserror::Error;

pub use binder::{BoundListener, PortBinder};
pub use gate::AcceptGate;
pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::ShutdownKind;
pub use startup::Outcome;

/// Errors surfaced only to the process entry point.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Connections were still open when the drain timeout expired.
    #[error("shutdown timed out after {timeout:?} with {remaining} connection(s) open")]
    DrainTimeout { timeout: Duration, remaining: u64 },

    /// Binding a candidate port failed for a reason other than "in use".
    #[error("cannot bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The bound port was already recorded.
    #[error("listen port already bound to {0}")]
    PortAlreadyBound(u16),

    /// The listener failed while serving.
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}
