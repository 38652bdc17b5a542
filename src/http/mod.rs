//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, hyper auto HTTP/1.1 + HTTP/2, connection guard)
//!     → request.rs (request ID)
//!     → routing::dispatch (admission, route, backend call)
//!     → envelope.rs (wrap, compact, indent, error shaping)
//!     → Send to client
//! ```

pub mod envelope;
pub mod request;
pub mod server;

pub use envelope::{Envelope, EnvelopeError, RequestContext, RunInfo, Started};
pub use request::X_REQUEST_ID;
pub use server::{AppState, ProxyServer};
