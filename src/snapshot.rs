//! The process-wide "current readings" value.

use crate::sensors::Reading;
use std::sync::Arc;
use tokio::sync::watch;

/// Single-writer, many-reader holder of the latest [`Reading`].
///
/// The writer publishes a whole new reading; readers get an `Arc` to a
/// complete one and can never observe a partially updated value.
#[derive(Debug)]
pub struct ReadingSnapshot {
    tx: watch::Sender<Arc<Reading>>,
}

impl ReadingSnapshot {
    pub fn new(initial: Reading) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx }
    }

    /// The current reading.
    pub fn get(&self) -> Arc<Reading> {
        Arc::clone(&self.tx.borrow())
    }

    /// Atomically publish a new reading, returning the one it replaced.
    pub fn set(&self, reading: Reading) -> Arc<Reading> {
        self.tx.send_replace(Arc::new(reading))
    }

    /// Receiver notified on every publish.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Reading>> {
        self.tx.subscribe()
    }
}
