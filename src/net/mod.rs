//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → http/server.rs (accept loop)
//!     → connection.rs (ID + open-connection accounting)
//!     → hyper serves the connection through the Axum router
//! ```
//!
//! # Design Decisions
//! - Each connection is tracked so a shutdown can drain it
//! - Accounting is RAII: the count drops with the connection task

pub mod connection;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
