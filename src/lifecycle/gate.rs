//! Admission control and graceful drain.
//!
//! The gate owns the server's run state: whether new requests are admitted,
//! how many connections are open, and which port was bound. It opens once at
//! startup and closes once at shutdown; a closed gate never reopens.

use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parking_lot::RwLock;
use tokio::sync::watch;

use crate::lifecycle::LifecycleError;
use crate::net::{ConnectionGuard, ConnectionTracker};

/// Body of the 503 sent to requests arriving after `close`.
pub const CLOSED_MESSAGE: &str =
    "server is in a closed state and is no longer accepting connections";

/// Default drain bound used by `close`.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Constructed, listener not yet serving.
    Starting,
    /// Admitting requests.
    Open,
    /// Shutdown initiated. Terminal.
    Closed,
}

/// Tracks whether the server is accepting requests and coordinates drain.
#[derive(Debug)]
pub struct AcceptGate {
    phase: RwLock<Phase>,
    closing: watch::Sender<bool>,
    connections: ConnectionTracker,
    bound_port: OnceLock<u16>,
    drain_timeout: Duration,
}

impl AcceptGate {
    /// Create a gate in the not-yet-accepting state.
    pub fn new(drain_timeout: Duration) -> Self {
        let (closing, _) = watch::channel(false);
        Self {
            phase: RwLock::new(Phase::Starting),
            closing,
            connections: ConnectionTracker::new(),
            bound_port: OnceLock::new(),
            drain_timeout,
        }
    }

    /// Start admitting requests. Has no effect once the gate has been closed.
    pub fn open(&self) {
        let mut phase = self.phase.write();
        if *phase == Phase::Starting {
            *phase = Phase::Open;
            tracing::info!("Accept gate open");
        } else if *phase == Phase::Closed {
            tracing::warn!("Ignoring open on a closed accept gate");
        }
    }

    /// Thread-safe read of the accepting flag.
    pub fn is_open(&self) -> bool {
        *self.phase.read() == Phase::Open
    }

    /// Reject the request when the gate is closed.
    ///
    /// Returns the ready-made 503 response the caller must send, or `None`
    /// when the request may proceed.
    pub fn admit(&self) -> Option<Response> {
        if self.is_open() {
            return None;
        }
        Some((StatusCode::SERVICE_UNAVAILABLE, CLOSED_MESSAGE).into_response())
    }

    /// Stop admitting requests and wait for open connections to finish.
    ///
    /// Returns `DrainTimeout` if connections are still open after the drain
    /// timeout. Either way the caller may proceed with termination.
    pub async fn close(&self) -> Result<(), LifecycleError> {
        {
            let mut phase = self.phase.write();
            *phase = Phase::Closed;
        }
        self.closing.send_replace(true);

        tracing::info!(
            open_connections = self.connections.active_count(),
            drain_timeout_ms = self.drain_timeout.as_millis() as u64,
            "Accept gate closed, draining connections"
        );

        match tokio::time::timeout(self.drain_timeout, self.connections.wait_idle()).await {
            Ok(()) => {
                tracing::info!("Connections completed, graceful exit possible");
                Ok(())
            }
            Err(_) => Err(LifecycleError::DrainTimeout {
                timeout: self.drain_timeout,
                remaining: self.connections.active_count(),
            }),
        }
    }

    /// Count a newly accepted connection until the returned guard drops.
    pub fn track_connection(&self) -> ConnectionGuard {
        self.connections.track()
    }

    /// Number of currently open connections.
    pub fn open_connections(&self) -> u64 {
        self.connections.active_count()
    }

    /// A future that resolves once `close` has been called.
    ///
    /// Connection tasks select on this to finish their current request and
    /// stop reading new ones.
    pub fn closed(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.closing.subscribe();
        async move {
            let _ = rx.wait_for(|closing| *closing).await;
        }
    }

    /// Record the bound listen port. Write-once.
    pub fn set_bound_port(&self, port: u16) -> Result<(), LifecycleError> {
        self.bound_port
            .set(port)
            .map_err(|_| LifecycleError::PortAlreadyBound(self.bound_port().unwrap_or(port)))
    }

    /// The bound listen port, if startup got that far.
    pub fn bound_port(&self) -> Option<u16> {
        self.bound_port.get().copied()
    }
}

impl Default for AcceptGate {
    fn default() -> Self {
        Self::new(DEFAULT_DRAIN_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed_and_opens_once() {
        let gate = AcceptGate::default();
        assert!(!gate.is_open());
        assert!(gate.admit().is_some());

        gate.open();
        assert!(gate.is_open());
        assert!(gate.admit().is_none());
    }

    #[tokio::test]
    async fn close_rejects_and_never_reopens() {
        let gate = AcceptGate::default();
        gate.open();
        gate.close().await.unwrap();

        assert!(!gate.is_open());
        let rejected = gate.admit().expect("closed gate must reject");
        assert_eq!(rejected.status(), StatusCode::SERVICE_UNAVAILABLE);

        gate.open();
        assert!(!gate.is_open());
    }

    #[tokio::test]
    async fn close_waits_for_open_connections() {
        let gate = std::sync::Arc::new(AcceptGate::new(Duration::from_secs(2)));
        gate.open();
        let guard = gate.track_connection();
        assert_eq!(gate.open_connections(), 1);

        let closer = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.close().await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!closer.is_finished());
        assert!(gate.admit().is_some());

        drop(guard);
        closer.await.unwrap().unwrap();
        assert_eq!(gate.open_connections(), 0);
    }

    #[tokio::test]
    async fn close_times_out_with_stuck_connection() {
        let gate = AcceptGate::new(Duration::from_millis(50));
        gate.open();
        let _guard = gate.track_connection();

        match gate.close().await {
            Err(LifecycleError::DrainTimeout { remaining, .. }) => assert_eq!(remaining, 1),
            other => panic!("expected drain timeout, got {other:?}"),
        }
        assert!(!gate.is_open());
    }

    #[tokio::test]
    async fn closed_future_resolves_on_close() {
        let gate = AcceptGate::default();
        gate.open();
        let closed = gate.closed();
        let waiter = tokio::spawn(closed);

        gate.close().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("closed() never resolved")
            .unwrap();
    }

    #[test]
    fn bound_port_is_write_once() {
        let gate = AcceptGate::default();
        assert_eq!(gate.bound_port(), None);

        gate.set_bound_port(12333).unwrap();
        assert!(matches!(
            gate.set_bound_port(12334),
            Err(LifecycleError::PortAlreadyBound(12333))
        ));
        assert_eq!(gate.bound_port(), Some(12333));
    }
}
