//! Listen port selection with fallback.
//!
//! Candidates are tried in order with an exclusive bind. A port that is
//! already taken is skipped; running out of candidates is not an error, it
//! means another instance is already serving.

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

use crate::lifecycle::{AcceptGate, LifecycleError};

/// How long the diagnostic probe waits for a connect.
const PROBE_TIMEOUT: Duration = Duration::from_millis(250);

/// A listener bound to the selected port.
#[derive(Debug)]
pub struct BoundListener {
    pub port: u16,
    pub listener: TcpListener,
}

/// Selects a listen port from an ordered candidate list.
#[derive(Debug, Clone)]
pub struct PortBinder {
    host: String,
    gate: Arc<AcceptGate>,
}

impl PortBinder {
    pub fn new(host: impl Into<String>, gate: Arc<AcceptGate>) -> Self {
        Self {
            host: host.into(),
            gate,
        }
    }

    /// Bind the first free candidate.
    ///
    /// Returns `Ok(None)` when every candidate is in use. Bind failures other
    /// than "address in use" abort the search.
    pub async fn select_port(
        &self,
        candidates: &[u16],
    ) -> Result<Option<BoundListener>, LifecycleError> {
        for &port in candidates {
            tracing::info!(host = %self.host, port, "Trying to bind");

            match TcpListener::bind((self.host.as_str(), port)).await {
                Ok(listener) => {
                    let port = listener
                        .local_addr()
                        .map_err(|source| LifecycleError::Bind { port, source })?
                        .port();
                    self.gate.set_bound_port(port)?;
                    tracing::info!(port, "Listen port selected");
                    return Ok(Some(BoundListener { port, listener }));
                }
                Err(e) if e.kind() == ErrorKind::AddrInUse => {
                    let answering = probe_port(&self.host, port).await;
                    tracing::warn!(port, answering, "Port already in use");
                }
                Err(source) => return Err(LifecycleError::Bind { port, source }),
            }
        }

        tracing::warn!(?candidates, "No listen port available");
        Ok(None)
    }
}

/// Report whether something accepts connections on `host:port`.
///
/// Time-of-check only: the answer may be stale by the time it is used.
pub async fn probe_port(host: &str, port: u16) -> bool {
    let host = match host {
        "0.0.0.0" | "::" | "" => "127.0.0.1",
        other => other,
    };
    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn occupied_port() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    async fn free_port() -> u16 {
        let (listener, port) = occupied_port().await;
        drop(listener);
        port
    }

    fn binder() -> (PortBinder, Arc<AcceptGate>) {
        let gate = Arc::new(AcceptGate::default());
        (PortBinder::new("127.0.0.1", gate.clone()), gate)
    }

    #[tokio::test]
    async fn first_free_candidate_wins() {
        let p1 = free_port().await;
        let (_held, p2) = occupied_port().await;
        let (binder, gate) = binder();

        let bound = binder.select_port(&[p1, p2]).await.unwrap().unwrap();
        assert_eq!(bound.port, p1);
        assert_eq!(gate.bound_port(), Some(p1));
    }

    #[tokio::test]
    async fn falls_back_when_primary_taken() {
        let (_held, p1) = occupied_port().await;
        let p2 = free_port().await;
        let (binder, gate) = binder();

        let bound = binder.select_port(&[p1, p2]).await.unwrap().unwrap();
        assert_eq!(bound.port, p2);
        assert_eq!(gate.bound_port(), Some(p2));
    }

    #[tokio::test]
    async fn none_when_all_taken() {
        let (_held1, p1) = occupied_port().await;
        let (_held2, p2) = occupied_port().await;
        let (binder, gate) = binder();

        assert!(binder.select_port(&[p1, p2]).await.unwrap().is_none());
        assert_eq!(gate.bound_port(), None);
    }

    #[tokio::test]
    async fn unassigned_address_is_an_error() {
        let gate = Arc::new(AcceptGate::default());
        // TEST-NET-1, never assigned to a local interface.
        let binder = PortBinder::new("192.0.2.1", gate);
        let port = free_port().await;

        assert!(matches!(
            binder.select_port(&[port]).await,
            Err(LifecycleError::Bind { .. })
        ));
    }

    #[tokio::test]
    async fn probe_sees_listener() {
        let (_held, port) = occupied_port().await;
        assert!(probe_port("127.0.0.1", port).await);
        assert!(probe_port("0.0.0.0", port).await);

        let port = free_port().await;
        assert!(!probe_port("127.0.0.1", port).await);
    }
}
