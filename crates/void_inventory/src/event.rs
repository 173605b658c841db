//! Container notifications and listeners

use crate::grid::Rotation;
use crate::item::{ItemId, ItemRef};
use crate::result::{AddItemResult, RemoveItemResult};
use crossbeam_channel::{Receiver, Sender};

/// Events emitted by a container
#[derive(Debug, Clone)]
pub enum ContainerEvent {
    /// An add operation finished (success or failure)
    ItemsAdded {
        item_id: Option<ItemId>,
        requested: u32,
        added: u32,
        result: AddItemResult,
        slots: Vec<usize>,
    },
    /// A remove operation finished (success or failure)
    ItemsRemoved {
        item_id: Option<ItemId>,
        requested: u32,
        removed: u32,
        result: RemoveItemResult,
        slots: Vec<usize>,
    },
    /// A slot's count changed. Never deferred by batching.
    SlotCountChanged {
        slot: usize,
        item: Option<ItemRef>,
        old_count: u32,
        new_count: u32,
    },
    /// The total of an item across the container changed
    ItemTotalCountChanged {
        item_id: ItemId,
        old_total: u64,
        new_total: u64,
    },
    /// A grid item was rotated in place
    ItemRotated {
        anchor: usize,
        rotation: Rotation,
    },
    /// Caches were rebuilt from the slots
    CachesRebuilt,
}

impl ContainerEvent {
    /// Check if this is a slot count event
    pub fn is_slot_count_changed(&self) -> bool {
        matches!(self, Self::SlotCountChanged { .. })
    }

    /// Check if this is a total count event
    pub fn is_total_count_changed(&self) -> bool {
        matches!(self, Self::ItemTotalCountChanged { .. })
    }
}

/// Receiver of container events
pub trait ContainerListener: Send + Sync {
    /// Handle an event
    fn on_event(&self, event: &ContainerEvent);
}

impl<F> ContainerListener for F
where
    F: Fn(&ContainerEvent) + Send + Sync,
{
    fn on_event(&self, event: &ContainerEvent) {
        self(event)
    }
}

/// Listener ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Registered listeners of one container
#[derive(Default)]
pub struct Listeners {
    entries: Vec<(ListenerId, Box<dyn ContainerListener>)>,
    next_id: u64,
}

impl Listeners {
    /// Create an empty listener set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    pub fn subscribe<L>(&mut self, listener: L) -> ListenerId
    where
        L: ContainerListener + 'static,
    {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.entries.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener, returning whether it was registered
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Deliver an event to every listener in registration order
    pub fn emit(&self, event: &ContainerEvent) {
        for (_, listener) in &self.entries {
            listener.on_event(event);
        }
    }

    /// Number of listeners
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners").field("count", &self.entries.len()).finish()
    }
}

/// Channel-backed listener that queues events for later draining
pub struct EventQueue {
    sender: Sender<ContainerEvent>,
    receiver: Receiver<ContainerEvent>,
}

impl EventQueue {
    /// Create a new unbounded queue
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    /// Listener that pushes into this queue
    pub fn listener(&self) -> impl ContainerListener + 'static {
        let sender = self.sender.clone();
        move |event: &ContainerEvent| {
            // Receiver lives as long as the queue; a closed channel just drops events
            let _ = sender.send(event.clone());
        }
    }

    /// Receive the next event, if any
    pub fn try_recv(&self) -> Option<ContainerEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drain all queued events
    pub fn drain(&self) -> Vec<ContainerEvent> {
        self.receiver.try_iter().collect()
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_listeners() {
        let mut listeners = Listeners::new();
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();

        let id = listeners.subscribe(move |_: &ContainerEvent| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        listeners.emit(&ContainerEvent::CachesRebuilt);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(listeners.unsubscribe(id));
        assert!(!listeners.unsubscribe(id));
        listeners.emit(&ContainerEvent::CachesRebuilt);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_queue() {
        let queue = EventQueue::new();
        let mut listeners = Listeners::new();
        listeners.subscribe(queue.listener());

        listeners.emit(&ContainerEvent::CachesRebuilt);
        listeners.emit(&ContainerEvent::ItemTotalCountChanged {
            item_id: "gold".to_string(),
            old_total: 0,
            new_total: 5,
        });

        assert_eq!(queue.len(), 2);
        let events = queue.drain();
        assert!(events[1].is_total_count_changed());
        assert!(queue.is_empty());
    }
}
