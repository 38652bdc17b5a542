//! Request entry point.
//!
//! Every request passes through `dispatch` in a fixed order: admission, route
//! lookup, method and path checks, body read, backend call, envelope, stats.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::http::envelope::{self, text_response, RequestContext, Started, INDENT_HEADER, VERBOSE_HEADER};
use crate::http::server::AppState;
use crate::http::X_REQUEST_ID;
use crate::observability::metrics;
use crate::observability::StatsSummary;
use crate::routing::table::{path_elements, Route, RouteKind};
use crate::routing::RouteError;
use crate::translate::{BackendReply, Codec, Operation};

/// Largest `Limit` honoured by `GET /ListTables`.
pub const LIST_TABLES_LIMIT_CAP: u64 = 99;

/// Table status `/StatusTable` waits for when none is given.
pub const DEFAULT_TABLE_STATUS: &str = "ACTIVE";

/// Time kept free before the request timeout for the final status reply.
const POLL_REPLY_MARGIN: Duration = Duration::from_secs(1);

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StatusReport {
    status: &'static str,
    available_handlers: Vec<String>,
    args: BTreeMap<&'static str, String>,
    summary: StatsSummary,
}

/// Single handler behind every path.
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    if let Some(rejected) = state.gate.admit() {
        return rejected;
    }

    let started = Started::now();
    let path = request.uri().path().to_string();
    let ctx = RequestContext::new(
        request.method(),
        request.uri(),
        request.headers(),
        &state.config.host_name,
    );
    tracing::debug!(
        request_id = %request_id(request.headers()),
        method = %ctx.method,
        path = %path,
        "Dispatching request"
    );

    let (label, response) = match state.routes.lookup(&path) {
        Some(route) => {
            let response = handle(&state, route, &path, &ctx, request, started)
                .await
                .unwrap_or_else(IntoResponse::into_response);
            (route.pattern.as_str(), response)
        }
        None => (
            "none",
            text_response(StatusCode::NOT_FOUND, format!("no route for {path}")),
        ),
    };

    state.stats.add_response(started.instant);
    metrics::record_request(label, response.status().as_u16(), started.instant);
    response
}

fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

async fn handle(
    state: &AppState,
    route: &Route,
    path: &str,
    ctx: &RequestContext,
    request: Request,
    started: Started,
) -> Result<Response, RouteError> {
    check_method(route, &ctx.method)?;

    let route = if route.kind == RouteKind::Compat {
        if let Some(subtree) = state.routes.subtree_of(path) {
            return Err(RouteError::MissingName(subtree.pattern.clone()));
        }
        let target = compat_target(state, request.headers())?;
        check_method(target, &ctx.method)?;
        target
    } else {
        check_arity(route, path)?;
        route
    };

    match route.kind {
        RouteKind::Status => status(state, ctx, started),
        RouteKind::Compat => Err(RouteError::NamedEndpoint),
        RouteKind::Forward { operation, codec } => {
            let body = read_body(state, request).await?;
            forward(state, ctx, operation, codec, body, started).await
        }
        RouteKind::ListTables if ctx.method == Method::GET => {
            let body = list_tables_request(request.uri().query().unwrap_or_default());
            forward(state, ctx, Operation::ListTables, Codec::Raw, body, started).await
        }
        RouteKind::ListTables => {
            let body = read_body(state, request).await?;
            forward(state, ctx, Operation::ListTables, Codec::Validated, body, started).await
        }
        RouteKind::TableByName(operation) => {
            let table = last_segment(path)?;
            let body = Bytes::from(json!({ "TableName": table }).to_string());
            forward(state, ctx, operation, Codec::Validated, body, started).await
        }
        RouteKind::RawPost => {
            let operation = last_segment(path)?;
            let body = read_body(state, request).await?;
            let reply = call(state, ctx, &operation, body).await?;
            respond(ctx, reply, started, &operation)
        }
        RouteKind::StatusTable => {
            let table = last_segment(path)?;
            let query = request.uri().query().unwrap_or_default().to_string();
            status_table(state, ctx, &table, &query, started).await
        }
    }
}

fn check_method(route: &Route, method: &Method) -> Result<(), RouteError> {
    if route.method.allows(method) {
        Ok(())
    } else {
        Err(RouteError::Method {
            pattern: route.pattern.clone(),
            allowed: route.method,
        })
    }
}

fn check_arity(route: &Route, path: &str) -> Result<(), RouteError> {
    match route.arity {
        Some(arity) if path_elements(path).len() != arity => Err(RouteError::Path(path.to_string())),
        _ => Ok(()),
    }
}

/// Resolve the compat header to the route of the operation it names.
fn compat_target<'a>(state: &'a AppState, headers: &HeaderMap) -> Result<&'a Route, RouteError> {
    let compat = &state.config.compat;
    let target = headers
        .get(compat.target_header.as_str())
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| RouteError::MissingHeader(compat.target_header.clone()))?;

    let name = match target.split_once('.') {
        Some((version, name)) if version == compat.api_version => name,
        Some((version, _)) => return Err(RouteError::UnsupportedVersion(version.to_string())),
        None => target,
    };
    if name.is_empty() {
        return Err(RouteError::NamedEndpoint);
    }

    name.parse::<Operation>()
        .ok()
        .and_then(|operation| state.routes.for_operation(operation))
        .ok_or_else(|| RouteError::UnknownEndpoint(format!("/{name}")))
}

/// Unescaped last path element; empty names are rejected.
fn last_segment(path: &str) -> Result<String, RouteError> {
    let segment = path_elements(path).last().copied().unwrap_or_default();
    let decoded = percent_decode_str(&segment.replace('+', " "))
        .decode_utf8()
        .map_err(|err| RouteError::Unescape {
            segment: segment.to_string(),
            reason: err.to_string(),
        })?
        .into_owned();
    if decoded.is_empty() {
        return Err(RouteError::Path(path.to_string()));
    }
    Ok(decoded)
}

async fn read_body(state: &AppState, request: Request) -> Result<Bytes, RouteError> {
    let body = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(RouteError::Body)?;
    let threshold = state.config.limits.large_payload_bytes;
    if body.len() > threshold {
        tracing::warn!(
            bytes = body.len(),
            threshold = threshold,
            "Large request payload, forwarding anyway"
        );
    }
    Ok(body)
}

async fn forward(
    state: &AppState,
    ctx: &RequestContext,
    operation: Operation,
    codec: Codec,
    body: Bytes,
    started: Started,
) -> Result<Response, RouteError> {
    let request = codec
        .decode_request(operation, body)
        .map_err(|source| RouteError::Decode {
            operation: operation.to_string(),
            source,
        })?;
    let mut reply = call(state, ctx, operation.as_str(), request).await?;
    if reply.status == StatusCode::OK {
        reply.body = codec.encode_reply(operation, reply.body);
    }
    respond(ctx, reply, started, operation.as_str())
}

async fn call(
    state: &AppState,
    ctx: &RequestContext,
    operation: &str,
    request: Bytes,
) -> Result<BackendReply, RouteError> {
    if ctx.verbose {
        tracing::info!(
            operation = %operation,
            body = %String::from_utf8_lossy(&request),
            "Backend request"
        );
    }

    let reply = state
        .translator
        .issue(request, operation)
        .await
        .map_err(|source| RouteError::Translate {
            operation: operation.to_string(),
            source,
        })?;

    if ctx.verbose {
        tracing::info!(
            operation = %operation,
            status = reply.status.as_u16(),
            body = %String::from_utf8_lossy(&reply.body),
            "Backend reply"
        );
    }
    Ok(reply)
}

fn respond(
    ctx: &RequestContext,
    reply: BackendReply,
    started: Started,
    name: &str,
) -> Result<Response, RouteError> {
    if reply.status.is_client_error() || reply.status.is_server_error() {
        return Ok(envelope::write_error(reply.status, name, &reply.body));
    }
    Ok(envelope::make(ctx, &reply.body, reply.status, started, name)?)
}

fn status(state: &AppState, ctx: &RequestContext, started: Started) -> Result<Response, RouteError> {
    let args = BTreeMap::from([
        (
            VERBOSE_HEADER,
            format!("set '-H \"{VERBOSE_HEADER}: True\"' to get verbose output"),
        ),
        (
            INDENT_HEADER,
            format!("set '-H \"{INDENT_HEADER}: True\"' to indent the top-level json"),
        ),
    ]);
    let report = StatusReport {
        status: "ready",
        available_handlers: state.routes.available_handlers(),
        args,
        summary: state.stats.summary(),
    };
    let body = serde_json::to_vec(&report).map_err(envelope::EnvelopeError::from)?;
    Ok(envelope::make(ctx, &body, StatusCode::OK, started, "Status")?)
}

/// `ListTables` request from `ExclusiveStartTableName` and `Limit`, matched
/// case-insensitively. The first occurrence of a key wins.
pub fn list_tables_request(query: &str) -> Bytes {
    let mut params: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        params.entry(key.to_lowercase()).or_insert_with(|| value.into_owned());
    }

    let mut request = Map::new();
    if let Some(start) = params.get("exclusivestarttablename").filter(|s| !s.is_empty()) {
        request.insert("ExclusiveStartTableName".into(), Value::String(start.clone()));
    }
    if let Some(raw) = params.get("limit") {
        match raw.parse::<u64>() {
            Ok(0) => {}
            Ok(limit) if limit > LIST_TABLES_LIMIT_CAP => {
                tracing::warn!(limit = limit, cap = LIST_TABLES_LIMIT_CAP, "ListTables limit capped");
                request.insert("Limit".into(), Value::from(LIST_TABLES_LIMIT_CAP));
            }
            Ok(limit) => {
                request.insert("Limit".into(), Value::from(limit));
            }
            Err(_) => tracing::warn!(limit = %raw, "Ignoring bad ListTables limit"),
        }
    }
    Bytes::from(Value::Object(request).to_string())
}

async fn status_table(
    state: &AppState,
    ctx: &RequestContext,
    table: &str,
    query: &str,
    started: Started,
) -> Result<Response, RouteError> {
    let mut desired = DEFAULT_TABLE_STATUS.to_string();
    let mut poll = false;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match &*key {
            "status" => desired = value.into_owned(),
            "poll" => poll = value == "1" || value == "yes",
            _ => {}
        }
    }

    let routes = &state.config.routes;
    let attempts = if poll { routes.status_poll_attempts.max(1) } else { 1 };
    let interval = Duration::from_millis(routes.status_poll_interval_ms);
    let budget = Duration::from_secs(state.config.listener.request_timeout_secs)
        .saturating_sub(POLL_REPLY_MARGIN);
    let name = Operation::DescribeTable.as_str();
    let describe = Bytes::from(json!({ "TableName": table }).to_string());

    let mut matched = false;
    for attempt in 1..=attempts {
        let reply = call(state, ctx, name, describe.clone()).await?;
        if reply.status != StatusCode::OK {
            return respond(ctx, reply, started, name);
        }
        let current = serde_json::from_slice::<Value>(&reply.body)
            .ok()
            .and_then(|v| v["Table"]["TableStatus"].as_str().map(str::to_string));
        tracing::debug!(table = %table, attempt, current = ?current, desired = %desired, "Table status");
        if current.as_deref() == Some(desired.as_str()) {
            matched = true;
            break;
        }
        if attempt == attempts {
            break;
        }
        if started.elapsed() + interval >= budget {
            tracing::warn!(
                table = %table,
                attempt,
                budget_ms = budget.as_millis() as u64,
                "Status poll stopped before the request timeout"
            );
            break;
        }
        tokio::time::sleep(interval).await;
    }

    let body = json!({ "StatusResult": matched }).to_string();
    Ok(envelope::make(ctx, body.as_bytes(), StatusCode::OK, started, name)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_tables_query_is_case_insensitive_and_capped() {
        let body = list_tables_request("exclusivestarttablename=users&LIMIT=500");
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({"ExclusiveStartTableName": "users", "Limit": 99}));

        let body = list_tables_request("Limit=abc");
        assert_eq!(&body[..], b"{}");

        let body = list_tables_request("limit=5&Limit=7");
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({"Limit": 5}));
    }

    #[test]
    fn last_segment_unescapes() {
        assert_eq!(last_segment("/DescribeTable/my%20table").unwrap(), "my table");
        assert_eq!(last_segment("/RawPost/Scan").unwrap(), "Scan");
        assert!(matches!(last_segment("/RawPost/"), Err(RouteError::Path(_))));
        assert!(matches!(
            last_segment("/RawPost/%FF"),
            Err(RouteError::Unescape { .. })
        ));
    }
}
