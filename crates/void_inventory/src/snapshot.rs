//! Snapshot and restore of container contents
//!
//! A snapshot records the container identity, its shape and every slot that
//! holds an item or carries a condition. Grid marker cells are not stored;
//! restore re-derives them from each anchor's size and rotation. Encoding the
//! snapshot is left to the caller; JSON and bincode both round-trip, attributes
//! included.

use crate::condition::ItemFilter;
use crate::config::{Capacity, ContainerKind};
use crate::container::Container;
use crate::error::{InventoryError, Result};
use crate::grid::{GridContainer, Placement, Rotation};
use crate::item::Item;
use crate::slot::Slot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Stored state of one slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    /// Slot index
    pub index: usize,
    /// Stored item (`None` for a condition-only entry)
    pub item: Option<Item>,
    /// Units stored
    pub count: u32,
    /// Slot-level condition
    pub condition: Option<ItemFilter>,
    /// Grid rotation of the item anchored here
    pub rotation: Option<Rotation>,
}

/// Stored state of a container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    /// Container id
    pub id: String,
    /// Display name
    pub name: String,
    /// Linear or grid
    pub kind: ContainerKind,
    /// Slot capacity (-1 = unbounded)
    pub capacity: i64,
    /// Grid dimensions
    pub grid: Option<(usize, usize)>,
    /// Allocated slot count
    pub slot_count: usize,
    /// Slots holding an item or a condition, ascending by index
    pub slots: Vec<SlotSnapshot>,
}

impl ContainerSnapshot {
    /// Total units per item id recorded in this snapshot
    pub fn item_counts(&self) -> BTreeMap<String, u64> {
        let mut counts = BTreeMap::new();
        for slot in &self.slots {
            if let Some(item) = &slot.item {
                *counts.entry(item.id.clone()).or_insert(0) += slot.count as u64;
            }
        }
        counts
    }
}

fn snapshot_slots(slots: &[Slot], rotation_of: impl Fn(usize) -> Option<Rotation>) -> Vec<SlotSnapshot> {
    slots
        .iter()
        .filter(|slot| slot.item().is_some() || slot.condition().is_some())
        .map(|slot| SlotSnapshot {
            index: slot.index(),
            item: slot.item().map(|item| item.as_ref().clone()),
            count: slot.count(),
            condition: slot.condition().cloned(),
            rotation: slot.item().and_then(|_| rotation_of(slot.index())),
        })
        .collect()
}

fn mismatch(message: impl Into<String>) -> InventoryError {
    InventoryError::SnapshotMismatch(message.into())
}

impl Container {
    /// Capture the current contents
    pub fn snapshot(&self) -> ContainerSnapshot {
        ContainerSnapshot {
            id: self.id().to_string(),
            name: self.name().to_string(),
            kind: self.kind(),
            capacity: self.capacity().to_raw(),
            grid: None,
            slot_count: self.slot_count(),
            slots: snapshot_slots(self.slots(), |_| None),
        }
    }

    /// Replace every slot with the snapshot contents and rebuild the caches.
    ///
    /// Nothing changes when the snapshot does not fit this container.
    pub fn restore(&mut self, snapshot: &ContainerSnapshot) -> Result<()> {
        if snapshot.kind != self.kind() || snapshot.grid.is_some() {
            return Err(mismatch(format!("expected a {:?} snapshot", self.kind())));
        }
        if Capacity::from_raw(snapshot.capacity)? != self.capacity() {
            return Err(mismatch(format!(
                "capacity {} does not match {}",
                snapshot.capacity,
                self.capacity().to_raw()
            )));
        }
        if let Some(limit) = self.capacity().limit() {
            if snapshot.slot_count > limit {
                return Err(mismatch(format!("{} slots exceed capacity {}", snapshot.slot_count, limit)));
            }
        }

        let mut slots: Vec<Slot> = (0..snapshot.slot_count).map(Slot::new).collect();
        for entry in &snapshot.slots {
            let slot = slots
                .get_mut(entry.index)
                .ok_or_else(|| mismatch(format!("slot {} outside {} slots", entry.index, snapshot.slot_count)))?;
            slot.set_condition(entry.condition.clone());
            if let Some(item) = &entry.item {
                if entry.count == 0 {
                    return Err(mismatch(format!("slot {} stores '{}' with count 0", entry.index, item.id)));
                }
                slot.set_item(Arc::new(item.clone()), entry.count);
            }
        }

        log::debug!(
            "Container '{}': restoring {} slots from snapshot '{}'",
            self.id(),
            slots.len(),
            snapshot.id
        );
        *self.slots_mut() = slots;
        self.with_batch(Container::rebuild_caches);
        Ok(())
    }
}

impl GridContainer {
    /// Capture the current contents, including rotations
    pub fn snapshot(&self) -> ContainerSnapshot {
        let base = self.base();
        ContainerSnapshot {
            id: base.id().to_string(),
            name: base.name().to_string(),
            kind: ContainerKind::Grid,
            capacity: base.capacity().to_raw(),
            grid: Some((self.width(), self.height())),
            slot_count: base.slot_count(),
            slots: snapshot_slots(base.slots(), |index| self.placement(index).map(|p| p.rotation)),
        }
    }

    /// Replace every cell with the snapshot contents, re-deriving footprints.
    ///
    /// Nothing changes when the snapshot does not fit this grid or two
    /// footprints overlap.
    pub fn restore(&mut self, snapshot: &ContainerSnapshot) -> Result<()> {
        let (width, height) = (self.width(), self.height());
        if snapshot.kind != ContainerKind::Grid || snapshot.grid != Some((width, height)) {
            return Err(mismatch(format!(
                "expected a {}x{} grid snapshot, got {:?} {:?}",
                width, height, snapshot.kind, snapshot.grid
            )));
        }

        let cells = width * height;
        let mut slots: Vec<Slot> = (0..cells).map(Slot::new).collect();
        let mut placements = BTreeMap::new();

        for entry in &snapshot.slots {
            if entry.index >= cells {
                return Err(mismatch(format!("cell {} outside {}x{} grid", entry.index, width, height)));
            }
            slots[entry.index].set_condition(entry.condition.clone());
            let Some(item) = &entry.item else {
                continue;
            };
            if entry.count == 0 {
                return Err(mismatch(format!("cell {} stores '{}' with count 0", entry.index, item.id)));
            }

            let rotation = entry.rotation.unwrap_or_default();
            let (x, y) = (entry.index % width, entry.index / width);
            let (w, h) = rotation.apply(item.size);
            let placement = Placement {
                anchor: entry.index,
                x,
                y,
                width: w,
                height: h,
                rotation,
            };
            let blocked = InventoryError::FootprintBlocked { x, y, width: w, height: h };
            if x + w > width || y + h > height {
                return Err(blocked);
            }
            if placement.cells(width).any(|cell| !slots[cell].is_empty()) {
                return Err(blocked);
            }

            slots[entry.index].set_item(Arc::new(item.clone()), entry.count);
            for cell in placement.cells(width).filter(|&cell| cell != entry.index) {
                slots[cell].set_marker(entry.index);
            }
            placements.insert(entry.index, placement);
        }

        *self.base_mut().slots_mut() = slots;
        *self.placements_mut() = placements;
        self.with_batch(GridContainer::rebuild_caches);
        Ok(())
    }
}
