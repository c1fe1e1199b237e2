//! Dynamic fan-in of any number of producers into one receiver.
//!
//! Producers ("feeders") may join at any time while the [`FanIn`] is alive.
//! The merged receiver only yields `None` once the `FanIn` has been sealed
//! (no more feeders will join) and every feeder has been dropped; items that
//! were already buffered are always delivered first.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

/// The merged receiver went away; nothing will read this item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputClosed;

pub fn fan_in<T>(capacity: usize) -> (FanIn<T>, mpsc::Receiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let fan = FanIn {
        tx,
        active: Arc::new(AtomicUsize::new(0)),
    };
    (fan, rx)
}

/// Registry handing out feeders. Dropping it (or calling [`FanIn::seal`]) is
/// the "no more feeders" signal.
pub struct FanIn<T> {
    tx: mpsc::Sender<T>,
    active: Arc<AtomicUsize>,
}

impl<T> FanIn<T> {
    pub fn register(&self) -> Feeder<T> {
        self.active.fetch_add(1, Ordering::SeqCst);
        Feeder {
            tx: self.tx.clone(),
            active: Arc::clone(&self.active),
        }
    }

    /// Feeders that have not finished yet.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// No more feeders will join. Consuming `self` drops the registry's own
    /// sender, so the receiver closes once the last feeder is gone.
    pub fn seal(self) {}
}

pub struct Feeder<T> {
    tx: mpsc::Sender<T>,
    active: Arc<AtomicUsize>,
}

impl<T> Feeder<T> {
    /// Waits for buffer space; per-feeder order is preserved.
    pub async fn send(&self, item: T) -> Result<(), OutputClosed> {
        self.tx.send(item).await.map_err(|_| OutputClosed)
    }
}

impl<T> Drop for Feeder<T> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
