//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use tower::ServiceExt;

use dynaproxy::lifecycle::{AcceptGate, Shutdown};
use dynaproxy::translate::{BackendReply, TranslateError, Translator};
use dynaproxy::{ProxyConfig, ProxyServer};

type Reply = dyn Fn(&str, &[u8]) -> Result<BackendReply, TranslateError> + Send + Sync;

/// One backend call seen by the mock.
#[derive(Debug, Clone)]
pub struct Call {
    pub operation: String,
    pub body: Bytes,
}

impl Call {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Translator that records every call and answers from a closure.
pub struct MockTranslator {
    calls: Mutex<Vec<Call>>,
    reply: Box<Reply>,
}

impl MockTranslator {
    pub fn new<F>(reply: F) -> Arc<Self>
    where
        F: Fn(&str, &[u8]) -> Result<BackendReply, TranslateError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            reply: Box::new(reply),
        })
    }

    /// Always answer 200 with `body`.
    pub fn ok(body: &'static str) -> Arc<Self> {
        Self::new(move |_, _| Ok(BackendReply::new(StatusCode::OK, body)))
    }

    /// Always answer `status` with `body`.
    pub fn status(status: StatusCode, body: &'static str) -> Arc<Self> {
        Self::new(move |_, _| Ok(BackendReply::new(status, body)))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn issue(&self, request: Bytes, operation: &str) -> Result<BackendReply, TranslateError> {
        let reply = (self.reply)(operation, &request);
        self.calls.lock().push(Call {
            operation: operation.to_string(),
            body: request,
        });
        reply
    }
}

/// Config for tests: loopback, ephemeral port, fast status polling.
pub fn test_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.ports = vec![0];
    config.listener.drain_timeout_ms = 2000;
    config.routes.status_poll_interval_ms = 5;
    config.host_name = "test-host".into();
    config
}

/// A server whose gate is already open, for in-process requests.
pub fn open_server(config: ProxyConfig, translator: Arc<MockTranslator>) -> ProxyServer {
    let server = ProxyServer::new(config, translator);
    server.gate().open();
    server
}

/// Response status and body text.
pub struct TestResponse {
    pub status: StatusCode,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }

    /// The backend body carried inside an envelope, parsed.
    pub fn envelope_body(&self) -> Value {
        let envelope = self.json();
        serde_json::from_str(envelope["Body"].as_str().unwrap()).unwrap()
    }
}

/// Send one request through the router.
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    TestResponse {
        status,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

/// A server serving on a real loopback socket.
pub struct LiveServer {
    pub addr: SocketAddr,
    pub gate: Arc<AcceptGate>,
    pub shutdown: Shutdown,
    pub task: tokio::task::JoinHandle<()>,
}

impl LiveServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Bind an ephemeral port and serve until `shutdown` fires.
pub async fn start_live(config: ProxyConfig, translator: Arc<dyn Translator>) -> LiveServer {
    let server = ProxyServer::new(config, translator);
    let bound = server.bind().await.unwrap().unwrap();
    let addr = bound.listener.local_addr().unwrap();
    let gate = server.gate();
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();

    let task = tokio::spawn(async move {
        let _ = server.run(bound.listener, receiver).await;
    });
    while !gate.is_open() {
        tokio::task::yield_now().await;
    }

    LiveServer {
        addr,
        gate,
        shutdown,
        task,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
