//! Stop signal for the accept loop.
//!
//! The accept gate is closed before this fires, so triggering it only stops
//! new connections from being accepted. The signal is sticky: a subscriber
//! created after `trigger` still observes it.

use tokio::sync::watch;

/// Owner side of the stop signal.
#[derive(Debug)]
pub struct Shutdown {
    stop: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self { stop }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal(self.stop.subscribe())
    }

    /// Tell every subscriber to stop. Idempotent.
    pub fn trigger(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.stop.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side, held by the accept loop.
#[derive(Debug, Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    /// Resolve once stop was triggered or the owner is gone.
    pub async fn wait(&mut self) {
        let _ = self.0.wait_for(|stop| *stop).await;
    }
}
