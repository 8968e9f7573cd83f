//! Shutdown coordination for the relay.

use std::time::Duration;

use tokio::sync::broadcast;

/// How long in-flight transfers get to finish once shutdown starts.
pub const DEFAULT_DRAIN_DEADLINE: Duration = Duration::from_secs(30);

/// Coordinator for graceful shutdown.
///
/// The HTTP server and any background task subscribe; one `trigger` reaches
/// them all. Triggering twice is harmless.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    drain_deadline: Duration,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::with_drain_deadline(DEFAULT_DRAIN_DEADLINE)
    }

    pub fn with_drain_deadline(drain_deadline: Duration) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx, drain_deadline }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    pub fn drain_deadline(&self) -> Duration {
        self.drain_deadline
    }

    /// Await `task` for at most the drain deadline after shutdown began.
    /// Returns `false` if the deadline passed first.
    pub async fn drain<F: std::future::Future>(&self, task: F) -> bool {
        match tokio::time::timeout(self.drain_deadline, task).await {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!(
                    deadline_secs = self.drain_deadline.as_secs(),
                    "Drain deadline passed, abandoning in-flight requests"
                );
                false
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.subscribe();

        shutdown.trigger();

        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_trigger_without_subscribers_is_harmless() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.trigger();
    }

    #[tokio::test]
    async fn test_drain_gives_up_after_deadline() {
        let shutdown = Shutdown::with_drain_deadline(Duration::from_millis(20));
        assert!(shutdown.drain(async {}).await);
        assert!(!shutdown.drain(std::future::pending::<()>()).await);
    }
}
