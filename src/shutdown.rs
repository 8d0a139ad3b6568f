//! Cooperative shutdown flag shared by the scheduler and the retry loops.

use std::sync::Arc;
use tokio::sync::watch;

/// A one-way flag: once raised it stays raised.
///
/// Raising it never interrupts a sensor read or a retry backoff in progress.
/// Loops check it before starting their next attempt or tick.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn raise(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_raised(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the flag has been raised.
    pub async fn raised(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|raised| *raised).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
