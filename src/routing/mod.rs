//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path, headers, body)
//!     → AcceptGate::admit (503 when closed)
//!     → table.rs (path lookup, or compat header → operation table)
//!     → dispatcher.rs (method/arity checks, body read, Translator call)
//!     → http::envelope (success envelope or error shaping)
//!     → StatsAggregator::add_response
//!
//! Route Compilation (at startup):
//!     RoutesConfig
//!     → register fixed patterns (+ optional DeleteTable routes)
//!     → index exact patterns and operation names
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Method is checked before the body is read
//! - One parameterized forward path instead of a handler per operation
//! - Every error is answered where it is detected; nothing is retried

pub mod dispatcher;
pub mod table;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::envelope::{text_response, EnvelopeError};
use crate::translate::{DecodeError, TranslateError};

pub use dispatcher::dispatch;
pub use table::{MethodRule, Route, RouteKind, RouteTable};

/// Request-level failures, each mapped to a fixed status.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("{pattern}: method only supports {allowed}")]
    Method { pattern: String, allowed: MethodRule },

    #[error("cannot parse path {0}")]
    Path(String),

    #[error("cannot unescape {segment}: {reason}")]
    Unescape { segment: String, reason: String },

    #[error("missing {0}")]
    MissingHeader(String),

    #[error("missing name, try {0}<name>")]
    MissingName(String),

    #[error("unsupported API version '{0}'")]
    UnsupportedVersion(String),

    #[error("must call named endpoint")]
    NamedEndpoint,

    #[error("unknown endpoint '{0}'")]
    UnknownEndpoint(String),

    #[error("err reading req body: {0}")]
    Body(#[source] axum::Error),

    #[error("{operation}: {source}")]
    Decode {
        operation: String,
        #[source]
        source: DecodeError,
    },

    #[error("{operation}: backend request failed")]
    Translate {
        operation: String,
        #[source]
        source: TranslateError,
    },

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

impl RouteError {
    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::Body(_) | RouteError::Translate { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            RouteError::Envelope(EnvelopeError::Encode(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            RouteError::Translate { source, .. } => {
                tracing::error!(error = %self, cause = %source, "Backend call failed");
            }
            _ if status.is_server_error() => tracing::error!(error = %self, "Request failed"),
            _ => tracing::warn!(error = %self, "Request rejected"),
        }
        if let RouteError::Envelope(err) = self {
            return err.into_response();
        }
        text_response(status, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_bad_requests() {
        let method = RouteError::Method {
            pattern: "/PutItem".into(),
            allowed: MethodRule::Post,
        };
        assert_eq!(method.status(), StatusCode::BAD_REQUEST);
        assert_eq!(method.to_string(), "/PutItem: method only supports POST");
        assert_eq!(RouteError::NamedEndpoint.status(), StatusCode::BAD_REQUEST);

        let missing = RouteError::MissingName("/StatusTable/".into());
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(missing.to_string(), "missing name, try /StatusTable/<name>");
    }

    #[test]
    fn server_side_failures_are_500() {
        let err = RouteError::Translate {
            operation: "Scan".into(),
            source: TranslateError::Unavailable("down".into()),
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Scan: backend request failed");
    }
}
