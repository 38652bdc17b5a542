//! HTTP server setup and connection serving.
//!
//! # Responsibilities
//! - Build the Axum router: one dispatch handler behind every path
//! - Wire up middleware (timeout, request ID, tracing)
//! - Bind through `PortBinder` and open the accept gate
//! - Serve each connection with HTTP/1.1 and HTTP/2 auto-detection
//! - Count connections and stop them gracefully once the gate closes
//! - Answer connections accepted during the drain with a 503, then close them

use std::sync::Arc;
use std::time::Duration;

use axum::routing::any;
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::{AcceptGate, BoundListener, LifecycleError, PortBinder, ShutdownSignal};
use crate::observability::StatsAggregator;
use crate::routing::{dispatch, RouteTable};
use crate::translate::Translator;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AcceptGate>,
    pub routes: Arc<RouteTable>,
    pub stats: Arc<StatsAggregator>,
    pub translator: Arc<dyn Translator>,
    pub config: Arc<ProxyConfig>,
}

impl AppState {
    pub fn new(config: ProxyConfig, translator: Arc<dyn Translator>) -> Self {
        let drain_timeout = Duration::from_millis(config.listener.drain_timeout_ms);
        Self {
            gate: Arc::new(AcceptGate::new(drain_timeout)),
            routes: Arc::new(RouteTable::from_config(&config.routes)),
            stats: Arc::new(StatsAggregator::new()),
            translator,
            config: Arc::new(config),
        }
    }
}

/// HTTP front end of the daemon.
pub struct ProxyServer {
    router: Router,
    state: AppState,
}

impl ProxyServer {
    /// Create a server with the given configuration and backend.
    pub fn new(config: ProxyConfig, translator: Arc<dyn Translator>) -> Self {
        let state = AppState::new(config, translator);
        let router = Self::build_router(&state);
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The first layer listed is the outermost: the request id is assigned
    /// before tracing sees the request.
    #[allow(deprecated)]
    fn build_router(state: &AppState) -> Router {
        let request_timeout = Duration::from_secs(state.config.listener.request_timeout_secs);
        Router::new()
            .route("/", any(dispatch))
            .route("/{*path}", any(dispatch))
            .with_state(state.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(propagate_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(request_timeout)),
            )
    }

    /// The router, for serving or for in-process requests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn gate(&self) -> Arc<AcceptGate> {
        self.state.gate.clone()
    }

    /// Bind the first free configured port.
    pub async fn bind(&self) -> Result<Option<BoundListener>, LifecycleError> {
        let listener = &self.state.config.listener;
        PortBinder::new(listener.host.clone(), self.gate())
            .select_port(&listener.ports)
            .await
    }

    /// Open the gate and serve connections until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), LifecycleError> {
        let addr = listener.local_addr()?;
        let gate = self.gate();
        gate.open();
        tracing::info!(address = %addr, "HTTP server starting");

        loop {
            let (stream, remote) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        continue;
                    }
                },
                _ = shutdown.wait() => break,
            };

            // Accepted during the drain: serve one request so it gets the 503.
            let late = !gate.is_open();
            let guard = gate.track_connection();
            let closed = gate.closed();
            let service = TowerToHyperService::new(self.router.clone());

            tokio::spawn(async move {
                let connection = guard.id();
                tracing::debug!(connection = %connection, remote = %remote, late, "Serving connection");

                let mut builder = Builder::new(TokioExecutor::new());
                if late {
                    builder.http1().keep_alive(false);
                }
                let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
                tokio::pin!(conn);
                tokio::pin!(closed);

                let mut draining = late;
                loop {
                    tokio::select! {
                        result = conn.as_mut() => {
                            if let Err(e) = result {
                                tracing::debug!(connection = %connection, error = %e, "Connection error");
                            }
                            break;
                        }
                        _ = &mut closed, if !draining => {
                            draining = true;
                            conn.as_mut().graceful_shutdown();
                        }
                    }
                }

                drop(guard);
            });
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
