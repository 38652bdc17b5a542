//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Every completed request:
//!     → stats.rs (running totals rendered by /Status)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON optional) for machine parsing
//! - Request ID flows through every request span
//! - Stats live for the process lifetime and are never persisted

pub mod logging;
pub mod metrics;
pub mod stats;

pub use stats::{StatsAggregator, StatsSnapshot, StatsSummary};
