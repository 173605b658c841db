//! Void Inventory - Slot-based item storage
//!
//! This crate provides the item storage engine used by Void Engine
//! inventories, stashes and loot containers.
//!
//! # Features
//!
//! - Linear containers with fixed or unbounded capacity
//! - Stacking with per-item max stack sizes
//! - Container and per-slot item conditions
//! - Grid containers with multi-cell, rotatable items
//! - Incrementally maintained lookup caches with validation and rebuild
//! - Batched notifications through listeners or an event queue
//! - All-or-nothing removal with result codes
//! - Snapshot/restore for save systems
//! - Bulk adds on a worker thread for shared containers
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                GridContainer                 │
//! │   footprints · markers · rotation            │
//! │  ┌────────────────────────────────────────┐  │
//! │  │               Container                │  │
//! │  │  ┌────────┐ ┌────────────┐ ┌────────┐  │  │
//! │  │  │ Slots  │ │ CacheIndex │ │Listener│  │  │
//! │  │  └────────┘ └────────────┘ └────────┘  │  │
//! │  └────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use void_inventory::prelude::*;
//!
//! let potion = Item::new("potion", "Health Potion")
//!     .with_type("consumable")
//!     .with_stack(10)
//!     .into_ref();
//!
//! let mut bag = Container::new("bag", "Backpack", Capacity::Fixed(20));
//! let outcome = bag.add_items(&potion, 25, None);
//! assert_eq!(outcome.added, 25);
//!
//! let removed = bag.remove_item("potion", 5);
//! assert!(removed.is_success());
//! assert_eq!(bag.item_total_count("potion"), 20);
//! ```

pub mod bulk;
pub mod cache;
pub mod condition;
pub mod config;
pub mod container;
pub mod error;
pub mod event;
pub mod grid;
pub mod item;
pub mod result;
pub mod slot;
pub mod snapshot;

pub mod prelude {
    //! Common imports for item containers
    pub use crate::bulk::{shared, BulkAddHandle, BulkAdder, SharedContainer};
    pub use crate::cache::{CacheIndex, CacheMismatch};
    pub use crate::condition::{ItemCondition, ItemFilter};
    pub use crate::config::{Capacity, ContainerConfig, ContainerKind};
    pub use crate::container::{Container, ItemContainer};
    pub use crate::error::{InventoryError, Result};
    pub use crate::event::{ContainerEvent, ContainerListener, EventQueue, ListenerId};
    pub use crate::grid::{GridContainer, Placement, Rotation};
    pub use crate::item::{Item, ItemId, ItemRef, ItemRegistry};
    pub use crate::result::{AddItemResult, AddOutcome, RemoveItemResult, RemoveOutcome};
    pub use crate::slot::{Slot, SlotContent};
    pub use crate::snapshot::{ContainerSnapshot, SlotSnapshot};
}

pub use prelude::*;
