//! Backend translation subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher (route resolved, body read)
//!     → codec.rs (validate / expand request body)
//!     → Translator::issue (one backend call, no retries)
//!     → codec.rs (flatten reply body when simplified)
//!     → Dispatcher (envelope or error)
//! ```
//!
//! # Design Decisions
//! - The backend is behind a trait so routing is testable without a network
//! - Non-2xx backend replies are data, not errors; only transport failures are errors
//! - Operation names are a closed enum shared by routes and the compat path

pub mod attribute;
pub mod codec;
pub mod http;
pub mod operation;
pub mod shape;

use async_trait::async_trait;
use axum::http::StatusCode;
use bytes::Bytes;
use thiserror::Error;

pub use codec::{Codec, DecodeError};
pub use http::HttpTranslator;
pub use operation::{Operation, UnknownOperation};

/// Raw reply from the backend.
#[derive(Debug, Clone)]
pub struct BackendReply {
    pub body: Bytes,
    pub status: StatusCode,
}

impl BackendReply {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            status,
        }
    }
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Issues one operation against the remote database.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Send `request` as `operation` and return the backend's reply unchanged.
    async fn issue(&self, request: Bytes, operation: &str) -> Result<BackendReply, TranslateError>;
}
