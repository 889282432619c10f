//! Shutdown coordination.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// Coordinator for graceful shutdown.
///
/// Clones share one watch channel; any clone can trigger, every
/// subscriber observes it. The flag is sticky, so a trigger that lands
/// before anyone subscribes is still seen.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Future that completes once shutdown is triggered.
    pub fn signalled(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            // Closed also means nobody can trigger any more; treat as shutdown.
            let _ = rx.wait_for(|&triggered| triggered).await;
        }
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
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
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_reaches_all_clones() {
        let shutdown = Shutdown::new();
        let a = shutdown.signalled();
        let b = shutdown.clone().signalled();

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), async {
            a.await;
            b.await;
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn trigger_before_first_poll_is_seen() {
        let shutdown = Shutdown::new();
        let waiting = shutdown.signalled();
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiting).await.unwrap();
    }

    #[tokio::test]
    async fn trigger_before_subscribe_is_seen() {
        let shutdown = Shutdown::new();
        shutdown.clone().trigger();
        tokio::time::timeout(Duration::from_secs(1), shutdown.signalled())
            .await
            .unwrap();
    }
}
