//! Bulk add - large additions off the caller's thread
//!
//! The container itself is single-threaded. Shared containers sit behind a
//! `parking_lot::Mutex`; a worker holds the lock for the whole add so every
//! mutation still has exactly one writer.

use crate::config::DEFAULT_BULK_ADD_THRESHOLD;
use crate::container::{Container, ItemContainer};
use crate::error::{InventoryError, Result};
use crate::item::ItemRef;
use crate::result::AddOutcome;
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Container shared between threads
pub type SharedContainer<C = Container> = Arc<Mutex<C>>;

/// Wrap a container for sharing
pub fn shared<C>(container: C) -> SharedContainer<C> {
    Arc::new(Mutex::new(container))
}

/// Result of a bulk add, possibly still running
#[derive(Debug)]
pub enum BulkAddHandle {
    /// Completed on the calling thread
    Ready(AddOutcome),
    /// Running on a worker thread
    Pending {
        receiver: Receiver<AddOutcome>,
        worker: JoinHandle<()>,
    },
}

impl BulkAddHandle {
    /// Whether the outcome is available without blocking
    pub fn is_ready(&self) -> bool {
        match self {
            Self::Ready(_) => true,
            Self::Pending { receiver, .. } => !receiver.is_empty(),
        }
    }

    /// Whether the add ran on a worker thread
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// Block until the outcome is available
    pub fn wait(self) -> Result<AddOutcome> {
        match self {
            Self::Ready(outcome) => Ok(outcome),
            Self::Pending { receiver, worker } => {
                let outcome = receiver.recv();
                if worker.join().is_err() {
                    return Err(InventoryError::BulkWorker("worker thread panicked".into()));
                }
                outcome.map_err(|e| InventoryError::BulkWorker(e.to_string()))
            }
        }
    }
}

/// Runs adds inline below a threshold and on a worker thread above it
#[derive(Debug, Clone, Copy)]
pub struct BulkAdder {
    threshold: u32,
}

impl Default for BulkAdder {
    fn default() -> Self {
        Self::new(DEFAULT_BULK_ADD_THRESHOLD)
    }
}

impl BulkAdder {
    /// Create with an explicit unit threshold
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    /// Create using the container's configured threshold
    pub fn for_container(container: &Container) -> Self {
        Self::new(container.bulk_add_threshold())
    }

    /// Unit count above which adds move to a worker
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Add `count` units of `item` to a shared container
    pub fn add<C>(&self, container: &SharedContainer<C>, item: &ItemRef, count: u32) -> BulkAddHandle
    where
        C: ItemContainer + Send + 'static,
    {
        if count <= self.threshold {
            return BulkAddHandle::Ready(container.lock().add_items(item, count, None));
        }

        let (sender, receiver) = crossbeam_channel::bounded(1);
        let worker_container = container.clone();
        let worker_item = item.clone();
        let spawned = thread::Builder::new()
            .name(format!("bulk-add-{}", item.id))
            .spawn(move || {
                let outcome = worker_container.lock().add_items(&worker_item, count, None);
                // The handle may have been dropped
                let _ = sender.send(outcome);
            });

        match spawned {
            Ok(worker) => {
                log::debug!("Bulk add of {} x '{}' moved to a worker thread", count, item.id);
                BulkAddHandle::Pending { receiver, worker }
            }
            Err(e) => {
                log::warn!("Failed to spawn bulk add worker ({}), adding inline", e);
                BulkAddHandle::Ready(container.lock().add_items(item, count, None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Capacity;
    use crate::item::Item;

    #[test]
    fn test_small_add_runs_inline() {
        let bag = shared(Container::new("bag", "Bag", Capacity::Unbounded));
        let gold = Item::new("gold", "Gold").with_stack(100).into_ref();

        let handle = BulkAdder::new(50).add(&bag, &gold, 40);
        assert!(!handle.is_async());
        assert_eq!(handle.wait().unwrap().added, 40);
    }

    #[test]
    fn test_large_add_uses_worker() {
        let bag = shared(Container::new("bag", "Bag", Capacity::Fixed(10)));
        let gold = Item::new("gold", "Gold").with_stack(100).into_ref();

        let handle = BulkAdder::new(50).add(&bag, &gold, 1_200);
        assert!(handle.is_async());

        let outcome = handle.wait().unwrap();
        assert_eq!(outcome.added, 1_000);
        assert_eq!(outcome.exceeded, 200);
        assert_eq!(bag.lock().item_total_count("gold"), 1_000);
        assert!(bag.lock().validate_caches());
    }
}
