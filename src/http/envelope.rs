//! Response envelope.
//!
//! # Responsibilities
//! - Wrap a successful backend body as `{Name, StatusCode, Body, Run}`
//! - Honour `?compact` (raw body) and `?indent` / the indent header (tab pretty-print)
//! - Shape backend failures into client-safe error responses
//!
//! # Design Decisions
//! - `Body` is carried as a JSON string, never re-parsed into the envelope
//! - Pretty-print failure degrades to the unindented bytes; the response is always sent
//! - Content-Length is set from the bytes actually written

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use thiserror::Error;

/// Query flag: send the backend body without the envelope.
pub const COMPACT: &str = "compact";

/// Query flag: pretty-print the response.
pub const INDENT: &str = "indent";

/// Request header that logs request and response bodies.
pub const VERBOSE_HEADER: &str = "X-Dynaproxy-Verbose";

/// Request header with the same effect as `?indent`.
pub const INDENT_HEADER: &str = "X-Dynaproxy-Indent";

/// Timing information attached to every envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunInfo {
    pub method: String,
    pub host: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration: String,
}

/// The wrapper placed around a successful backend response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Envelope {
    pub name: String,
    pub status_code: u16,
    pub body: String,
    pub run: RunInfo,
}

/// When a request started, on both clocks.
#[derive(Debug, Clone, Copy)]
pub struct Started {
    pub at: DateTime<Utc>,
    pub instant: Instant,
}

impl Started {
    pub fn now() -> Self {
        Self {
            at: Utc::now(),
            instant: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.instant.elapsed()
    }
}

/// Per-request inputs the envelope needs from the incoming request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub host: String,
    pub compact: bool,
    pub indent: bool,
    pub verbose: bool,
}

impl RequestContext {
    pub fn new(method: &Method, uri: &Uri, headers: &HeaderMap, host: &str) -> Self {
        let query = uri.query().unwrap_or_default();
        Self {
            method: method.clone(),
            host: host.to_string(),
            compact: has_query_flag(query, COMPACT),
            indent: has_query_flag(query, INDENT) || header_flag(headers, INDENT_HEADER),
            verbose: header_flag(headers, VERBOSE_HEADER),
        }
    }
}

/// True when `name` appears as a query key, with or without a value.
pub fn has_query_flag(query: &str, name: &str) -> bool {
    url::form_urlencoded::parse(query.as_bytes()).any(|(key, _)| key == name)
}

fn header_flag(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The envelope itself could not be serialized.
    #[error("cannot encode response envelope: {0}")]
    Encode(#[from] serde_json::Error),

    /// Non-200 or empty backend reply reached the success path.
    #[error("{name}:({status}) {body}")]
    Backend {
        name: String,
        status: u16,
        body: String,
    },
}

impl IntoResponse for EnvelopeError {
    fn into_response(self) -> Response {
        let status = match self {
            EnvelopeError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EnvelopeError::Backend { .. } => StatusCode::BAD_REQUEST,
        };
        text_response(status, self.to_string())
    }
}

/// Build the client response for a backend reply.
pub fn make(
    ctx: &RequestContext,
    body: &[u8],
    status: StatusCode,
    started: Started,
    name: &str,
) -> Result<Response, EnvelopeError> {
    if status != StatusCode::OK || body.is_empty() {
        return Err(EnvelopeError::Backend {
            name: name.to_string(),
            status: status.as_u16(),
            body: String::from_utf8_lossy(body).into_owned(),
        });
    }

    let bytes = render(ctx, body, status, started, name)?;
    Ok(json_response(bytes))
}

/// Render the success body. Split from `make` for direct byte comparison.
pub fn render(
    ctx: &RequestContext,
    body: &[u8],
    status: StatusCode,
    started: Started,
    name: &str,
) -> Result<Bytes, EnvelopeError> {
    let bytes = if ctx.compact {
        Bytes::copy_from_slice(body)
    } else {
        let duration = started.elapsed();
        let envelope = Envelope {
            name: name.to_string(),
            status_code: status.as_u16(),
            body: String::from_utf8_lossy(body).into_owned(),
            run: RunInfo {
                method: ctx.method.to_string(),
                host: ctx.host.clone(),
                start: started.at,
                end: Utc::now(),
                duration: format!("{duration:?}"),
            },
        };
        Bytes::from(serde_json::to_vec(&envelope)?)
    };

    if !ctx.indent {
        return Ok(bytes);
    }
    match indent(&bytes) {
        Ok(pretty) => Ok(Bytes::from(pretty)),
        Err(err) => {
            tracing::error!(error = %err, name = %name, "Cannot indent response, sending it unindented");
            Ok(bytes)
        }
    }
}

/// Re-emit JSON with tab indentation.
pub fn indent(bytes: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    let mut out = Vec::with_capacity(bytes.len() + bytes.len() / 4);
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"\t"));
    value.serialize(&mut serializer)?;
    Ok(out)
}

/// Error response for a backend failure reported by `origin`.
///
/// Client errors pass the backend text through; server errors never do.
pub fn write_error(status: StatusCode, origin: &str, body: &[u8]) -> Response {
    let code = status.as_u16();
    if status.is_client_error() {
        let message = format!("{origin}:({code}) {}", String::from_utf8_lossy(body));
        tracing::warn!(origin = %origin, status = code, "Backend rejected request");
        text_response(StatusCode::BAD_REQUEST, message)
    } else {
        let message = format!("{origin}:({code}) Server Error");
        tracing::error!(
            origin = %origin,
            status = code,
            body = %String::from_utf8_lossy(body),
            "Backend server error"
        );
        text_response(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

/// Plain-text error response with a trailing newline.
pub fn text_response(status: StatusCode, message: impl Into<String>) -> Response {
    let mut message = message.into();
    message.push('\n');
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        message,
    )
        .into_response()
}

fn json_response(bytes: Bytes) -> Response {
    let length = HeaderValue::from(bytes.len());
    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::CONTENT_LENGTH, length);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    fn ctx(uri: &str) -> RequestContext {
        let uri: Uri = uri.parse().unwrap();
        RequestContext::new(&Method::POST, &uri, &HeaderMap::new(), "testhost")
    }

    #[tokio::test]
    async fn wraps_body_with_name() {
        let body = br#"{"TableNames":["a"]}"#;
        let response = make(&ctx("/ListTables"), body, StatusCode::OK, Started::now(), "ListTables")
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let length: usize = response.headers()[header::CONTENT_LENGTH]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.len(), length);

        let envelope: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(envelope.name, "ListTables");
        assert_eq!(envelope.status_code, 200);
        assert_eq!(envelope.body.as_bytes(), body);
        assert_eq!(envelope.run.method, "POST");
        assert_eq!(envelope.run.host, "testhost");
    }

    #[tokio::test]
    async fn compact_is_verbatim() {
        let body = br#"{"Table":{"TableStatus":"ACTIVE"}}"#;
        let response = make(
            &ctx("/DescribeTable?compact"),
            body,
            StatusCode::OK,
            Started::now(),
            "DescribeTable",
        )
        .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], body);
    }

    #[test]
    fn indent_uses_tabs_and_falls_back() {
        let out = render(&ctx("/x?compact&indent=1"), br#"{"a":1}"#, StatusCode::OK, Started::now(), "X")
            .unwrap();
        assert_eq!(&out[..], b"{\n\t\"a\": 1\n}");

        let out = render(&ctx("/x?compact&indent"), b"not json", StatusCode::OK, Started::now(), "X")
            .unwrap();
        assert_eq!(&out[..], b"not json");
    }

    #[test]
    fn indent_header_counts_as_flag() {
        let mut headers = HeaderMap::new();
        headers.insert("x-dynaproxy-indent", HeaderValue::from_static("True"));
        headers.insert("x-dynaproxy-verbose", HeaderValue::from_static("no"));
        let ctx = RequestContext::new(&Method::GET, &"/Status".parse().unwrap(), &headers, "h");
        assert!(ctx.indent);
        assert!(!ctx.verbose);
        assert!(!ctx.compact);
    }

    #[test]
    fn identical_inputs_differ_only_in_timing() {
        let started = Started::now();
        let context = ctx("/GetItem");
        let first = render(&context, br#"{"Item":{}}"#, StatusCode::OK, started, "GetItem").unwrap();
        let second = render(&context, br#"{"Item":{}}"#, StatusCode::OK, started, "GetItem").unwrap();

        let mut first: Envelope = serde_json::from_slice(&first).unwrap();
        let mut second: Envelope = serde_json::from_slice(&second).unwrap();
        for envelope in [&mut first, &mut second] {
            envelope.run.end = started.at;
            envelope.run.duration.clear();
        }
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn failures_are_backend_errors() {
        let err = make(&ctx("/GetItem"), b"", StatusCode::OK, Started::now(), "GetItem").unwrap_err();
        assert!(matches!(err, EnvelopeError::Backend { status: 200, .. }));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let err = make(&ctx("/GetItem"), b"nope", StatusCode::ACCEPTED, Started::now(), "GetItem")
            .unwrap_err();
        assert_eq!(err.to_string(), "GetItem:(202) nope");
    }

    #[tokio::test]
    async fn write_error_hides_server_internals() {
        let response = write_error(StatusCode::BAD_REQUEST, "PutItem", b"ValidationException");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let text = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&text[..], b"PutItem:(400) ValidationException\n");

        let response = write_error(StatusCode::SERVICE_UNAVAILABLE, "PutItem", b"stack trace");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&text[..], b"PutItem:(503) Server Error\n");
    }
}
