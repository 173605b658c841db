//! GridContainer - two-dimensional inventory with multi-cell, rotatable items
//!
//! Cells map to slots row-major (`index = y * width + x`). A multi-cell item
//! stores the real stack in its anchor (top-left) cell; every other cell of
//! its footprint holds an occupancy marker pointing back at the anchor. Only
//! the anchor is registered in the item id/type/count indices.

use crate::condition::{ItemCondition, ItemFilter};
use crate::config::{ContainerConfig, ContainerKind};
use crate::container::{Container, ItemContainer};
use crate::error::{InventoryError, Result};
use crate::event::{ContainerEvent, ContainerListener, ListenerId};
use crate::item::{ItemId, ItemRef};
use crate::result::{AddItemResult, AddOutcome, RemoveItemResult, RemoveOutcome};
use crate::slot::Slot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Quarter-turn rotation of a grid item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Next clockwise quarter turn
    pub fn next(self) -> Self {
        match self {
            Self::Deg0 => Self::Deg90,
            Self::Deg90 => Self::Deg180,
            Self::Deg180 => Self::Deg270,
            Self::Deg270 => Self::Deg0,
        }
    }

    /// Whether width and height are swapped
    pub fn is_sideways(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }

    /// Footprint of an item of `size` under this rotation
    pub fn apply(self, size: (u32, u32)) -> (usize, usize) {
        let (w, h) = (size.0 as usize, size.1 as usize);
        if self.is_sideways() {
            (h, w)
        } else {
            (w, h)
        }
    }
}

/// Where and how a grid item is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Anchor slot index
    pub anchor: usize,
    /// Anchor column
    pub x: usize,
    /// Anchor row
    pub y: usize,
    /// Footprint width after rotation
    pub width: usize,
    /// Footprint height after rotation
    pub height: usize,
    /// Rotation
    pub rotation: Rotation,
}

impl Placement {
    /// Slot indices covered by this footprint
    pub fn cells(&self, grid_width: usize) -> impl Iterator<Item = usize> {
        let Placement { x, y, width, height, .. } = *self;
        (y..y + height).flat_map(move |row| (x..x + width).map(move |col| row * grid_width + col))
    }

    /// Whether the footprint covers a cell
    pub fn covers(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Grid inventory built on a fixed-size container
#[derive(Debug)]
pub struct GridContainer {
    base: Container,
    width: usize,
    height: usize,
    placements: BTreeMap<usize, Placement>,
}

impl GridContainer {
    /// Create a grid with every cell allocated
    pub fn new(id: impl Into<String>, name: impl Into<String>, width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(InventoryError::InvalidGridSize { width, height });
        }
        Ok(Self {
            base: Container::with_eager_slots(id, name, ContainerKind::Grid, width * height),
            width,
            height,
            placements: BTreeMap::new(),
        })
    }

    /// Create a grid from configuration
    pub fn from_config(config: &ContainerConfig) -> Result<Self> {
        if config.kind != ContainerKind::Grid {
            return Err(InventoryError::Config(format!(
                "container '{}' is configured as {:?}, expected Grid",
                config.id, config.kind
            )));
        }
        config.capacity()?;
        let mut grid = Self::new(config.id.clone(), config.name.clone(), config.grid_width, config.grid_height)?;
        grid.base.apply_config_tuning(config);
        Ok(grid)
    }

    /// Add a container-level condition
    pub fn with_condition<C: ItemCondition + 'static>(mut self, condition: C) -> Self {
        self.base.add_condition(Arc::new(condition));
        self
    }

    /// Set or clear the condition of one cell
    pub fn set_cell_condition(&mut self, x: usize, y: usize, condition: Option<ItemFilter>) -> Result<()> {
        let index = self.coord_to_index(x, y).ok_or(InventoryError::SlotOutOfRange {
            index: y.saturating_mul(self.width).saturating_add(x),
            len: self.base.slot_count(),
        })?;
        self.base.set_slot_condition(index, condition)
    }

    /// Grid width in cells
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height in cells
    pub fn height(&self) -> usize {
        self.height
    }

    /// Underlying slot container
    pub fn base(&self) -> &Container {
        &self.base
    }

    pub(crate) fn base_mut(&mut self) -> &mut Container {
        &mut self.base
    }

    pub(crate) fn placements_mut(&mut self) -> &mut BTreeMap<usize, Placement> {
        &mut self.placements
    }

    /// Slot index of a cell, `None` outside the grid
    pub fn coord_to_index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    /// Cell of a slot index, `None` outside the grid
    pub fn index_to_coord(&self, index: usize) -> Option<(usize, usize)> {
        (index < self.width * self.height).then(|| (index % self.width, index / self.width))
    }

    /// Whether a `w x h` footprint at (x, y) lies inside the grid on free cells.
    ///
    /// Cells belonging to the item anchored at `exclude` count as free.
    pub fn can_place_at(&self, x: usize, y: usize, w: usize, h: usize, exclude: Option<usize>) -> bool {
        if w == 0 || h == 0 || x + w > self.width || y + h > self.height {
            return false;
        }
        (y..y + h).all(|row| {
            (x..x + w).all(|col| {
                let index = row * self.width + col;
                let slot = &self.base.slots()[index];
                slot.is_empty()
                    || (exclude.is_some() && (Some(index) == exclude || slot.marker_anchor() == exclude))
            })
        })
    }

    /// Anchor of the item covering a slot (the slot itself for anchors)
    pub fn anchor_of(&self, index: usize) -> Option<usize> {
        let slot = self.base.slot(index)?;
        if slot.item().is_some() {
            Some(index)
        } else {
            slot.marker_anchor()
        }
    }

    /// Item covering a cell
    pub fn item_at(&self, x: usize, y: usize) -> Option<&ItemRef> {
        let anchor = self.anchor_of(self.coord_to_index(x, y)?)?;
        self.base.slot(anchor)?.item()
    }

    /// Placement of the item covering a slot
    pub fn placement(&self, index: usize) -> Option<Placement> {
        let anchor = self.anchor_of(index)?;
        if let Some(placement) = self.placements.get(&anchor) {
            return Some(*placement);
        }
        let item = self.base.slot(anchor)?.item()?;
        let (x, y) = self.index_to_coord(anchor)?;
        let (width, height) = Rotation::Deg0.apply(item.size);
        Some(Placement {
            anchor,
            x,
            y,
            width,
            height,
            rotation: Rotation::Deg0,
        })
    }

    /// All recorded placements, keyed by anchor
    pub fn placements(&self) -> impl Iterator<Item = &Placement> {
        self.placements.values()
    }

    // ------------------------------------------------------------------
    // Adding
    // ------------------------------------------------------------------

    /// Add units of an item. Single-cell items use the linear placement
    /// rules; multi-cell items are auto-placed at the first free anchor in
    /// row-major order, or at `slot_hint` when it fits.
    pub fn add_items(&mut self, item: &ItemRef, count: u32, slot_hint: Option<usize>) -> AddOutcome {
        if !item.is_multi_cell() {
            return self.base.add_items(item, count, slot_hint);
        }
        self.base.begin_batch();
        let outcome = self.place_multi_cell(item, count, slot_hint);
        self.base.end_batch();
        self.base.notify_added(Some(&item.id), &outcome);
        outcome
    }

    /// Place one stack of an item with its anchor at (x, y)
    pub fn add_item_at(&mut self, item: &ItemRef, count: u32, x: usize, y: usize, rotation: Rotation) -> AddOutcome {
        self.base.begin_batch();
        let outcome = self.place_explicit(item, count, x, y, rotation);
        self.base.end_batch();
        self.base.notify_added(Some(&item.id), &outcome);
        outcome
    }

    fn place_multi_cell(&mut self, item: &ItemRef, count: u32, slot_hint: Option<usize>) -> AddOutcome {
        if let Some(result) = self.base.check_add(item, count) {
            return AddOutcome::rejected(result, count);
        }
        if slot_hint.map_or(false, |hint| self.index_to_coord(hint).is_none()) {
            return AddOutcome::rejected(AddItemResult::SlotNotFound, count);
        }

        let mut remaining = count;
        let mut placed = Vec::new();
        let mut blocked_by_condition = false;
        let mut hint_stack_full = false;
        let (w, h) = Rotation::Deg0.apply(item.size);

        if item.stackable && slot_hint.is_none() {
            self.base.fill_existing_stacks(item, &mut remaining, &mut placed);
        }

        // A hint inside a stack of the same item tops up its anchor
        let hinted_stack = slot_hint
            .and_then(|hint| self.anchor_of(hint))
            .filter(|&anchor| self.base.slots()[anchor].holds(&item.id));
        if let Some(anchor) = hinted_stack.filter(|_| item.stackable) {
            let current = self.base.slots()[anchor].count();
            let take = self.base.slots()[anchor].spare_capacity().min(remaining);
            if take > 0 {
                self.base.write_slot(anchor, |slot| slot.set_count(current + take));
                remaining -= take;
                placed.push(anchor);
            } else {
                hint_stack_full = true;
            }
        }

        if let Some((x, y)) = slot_hint.and_then(|hint| self.index_to_coord(hint)) {
            if remaining > 0 && hinted_stack.is_none() && self.can_place_at(x, y, w, h, None) {
                let anchor = y * self.width + x;
                if self.base.slots()[anchor].check_condition(item) {
                    self.place_footprint(anchor, item, &mut remaining, Rotation::Deg0);
                    placed.push(anchor);
                } else {
                    blocked_by_condition = true;
                }
            }
        }

        while remaining > 0 {
            let (anchor, blocked) = self.find_free_anchor(item, w, h);
            blocked_by_condition |= blocked;
            let Some(anchor) = anchor else {
                break;
            };
            self.place_footprint(anchor, item, &mut remaining, Rotation::Deg0);
            placed.push(anchor);
        }

        let added = count - remaining;
        let result = if added > 0 {
            AddItemResult::Success
        } else if hint_stack_full {
            AddItemResult::StackLimitReached
        } else if blocked_by_condition {
            AddItemResult::NoSuitableSlotFound
        } else {
            AddItemResult::ContainerIsFull
        };

        log::debug!(
            "Grid '{}': placed {}/{} of {}x{} item '{}' at {:?}",
            self.base.id(),
            added,
            count,
            w,
            h,
            item.id,
            placed
        );

        AddOutcome {
            result,
            requested: count,
            added,
            exceeded: remaining,
            slots: placed,
        }
    }

    fn place_explicit(&mut self, item: &ItemRef, count: u32, x: usize, y: usize, rotation: Rotation) -> AddOutcome {
        if let Some(result) = self.base.check_add(item, count) {
            return AddOutcome::rejected(result, count);
        }
        let Some(anchor) = self.coord_to_index(x, y) else {
            return AddOutcome::rejected(AddItemResult::SlotNotFound, count);
        };

        let slot = &self.base.slots()[anchor];
        if slot.holds(&item.id) {
            let take = match slot.spare_capacity() {
                _ if !item.stackable => return AddOutcome::rejected(AddItemResult::NoSuitableSlotFound, count),
                0 => return AddOutcome::rejected(AddItemResult::StackLimitReached, count),
                spare => spare.min(count),
            };
            let current = slot.count();
            self.base.write_slot(anchor, |slot| slot.set_count(current + take));
            return AddOutcome {
                result: AddItemResult::Success,
                requested: count,
                added: take,
                exceeded: count - take,
                slots: vec![anchor],
            };
        }

        let (w, h) = rotation.apply(item.size);
        if x + w > self.width || y + h > self.height {
            return AddOutcome::rejected(AddItemResult::SlotNotFound, count);
        }
        if !self.can_place_at(x, y, w, h, None) || !slot.check_condition(item) {
            return AddOutcome::rejected(AddItemResult::NoSuitableSlotFound, count);
        }

        let mut remaining = count;
        self.place_footprint(anchor, item, &mut remaining, rotation);
        AddOutcome {
            result: AddItemResult::Success,
            requested: count,
            added: count - remaining,
            exceeded: remaining,
            slots: vec![anchor],
        }
    }

    /// First row-major anchor with a free `w x h` footprint; also reports
    /// whether a fitting anchor was skipped because of its cell condition
    fn find_free_anchor(&self, item: &ItemRef, w: usize, h: usize) -> (Option<usize>, bool) {
        let mut blocked = false;
        for y in 0..self.height {
            for x in 0..self.width {
                if !self.can_place_at(x, y, w, h, None) {
                    continue;
                }
                let anchor = y * self.width + x;
                if self.base.slots()[anchor].check_condition(item) {
                    return (Some(anchor), blocked);
                }
                blocked = true;
            }
        }
        (None, blocked)
    }

    /// Write the anchor stack and the markers of its footprint
    fn place_footprint(&mut self, anchor: usize, item: &ItemRef, remaining: &mut u32, rotation: Rotation) {
        let take = item.stack_limit().map_or(*remaining, |limit| limit.min(*remaining));
        let Some((x, y)) = self.index_to_coord(anchor) else {
            return;
        };
        let (width, height) = rotation.apply(item.size);
        let placement = Placement {
            anchor,
            x,
            y,
            width,
            height,
            rotation,
        };

        let stored = item.clone();
        self.base.write_slot(anchor, |slot| slot.set_item(stored, take));
        self.write_markers(&placement);
        self.placements.insert(anchor, placement);
        *remaining -= take;
    }

    fn write_markers(&mut self, placement: &Placement) {
        let anchor = placement.anchor;
        for cell in placement.cells(self.width) {
            if cell != anchor {
                self.base.write_slot(cell, |slot| slot.set_marker(anchor));
            }
        }
    }

    /// Clear the markers of an anchor's footprint and forget its placement
    fn clear_footprint(&mut self, anchor: usize) {
        let Some(placement) = self.placements.remove(&anchor) else {
            return;
        };
        for cell in placement.cells(self.width) {
            if cell != anchor && self.base.slots()[cell].marker_anchor() == Some(anchor) {
                self.base.write_slot(cell, Slot::clear_slot);
            }
        }
    }

    // ------------------------------------------------------------------
    // Removing
    // ------------------------------------------------------------------

    /// Remove units of an item; emptied anchors release their footprint
    pub fn remove_item(&mut self, item_id: &str, count: u32) -> RemoveOutcome {
        self.base.begin_batch();
        let outcome = match self.base.plan_removal(item_id, count) {
            Ok(plan) => self.apply_plan(plan, count),
            Err(result) => RemoveOutcome::rejected(result, count),
        };
        self.base.end_batch();
        self.base.notify_removed(Some(item_id), &outcome);
        outcome
    }

    /// Remove units from the item covering a slot (anchor or marker cell)
    pub fn remove_item_at_index(&mut self, index: usize, count: u32, expected_id: Option<&str>) -> RemoveOutcome {
        let anchor = self.anchor_of(index).unwrap_or(index);
        let item_id = self.base.slot(anchor).and_then(|slot| slot.item_id().map(str::to_string));

        self.base.begin_batch();
        let outcome = match self.base.plan_removal_at(anchor, count, expected_id) {
            Ok(plan) => self.apply_plan(plan, count),
            Err(result) => RemoveOutcome::rejected(result, count),
        };
        self.base.end_batch();
        self.base.notify_removed(item_id.as_deref().or(expected_id), &outcome);
        outcome
    }

    fn apply_plan(&mut self, plan: Vec<(usize, u32)>, count: u32) -> RemoveOutcome {
        let slots = plan.iter().map(|&(index, _)| index).collect();
        for anchor in self.base.apply_removal(&plan) {
            self.clear_footprint(anchor);
        }
        RemoveOutcome {
            result: RemoveItemResult::Success,
            requested: count,
            removed: count,
            slots,
        }
    }

    /// Empty every cell
    pub fn clear(&mut self) {
        self.base.clear();
        self.placements.clear();
    }

    // ------------------------------------------------------------------
    // Rotation
    // ------------------------------------------------------------------

    /// Rotate the item covering `index` a quarter turn clockwise in place.
    ///
    /// The anchor stays put; if the rotated footprint leaves the grid or hits
    /// another item, nothing changes.
    pub fn rotate_item(&mut self, index: usize) -> Result<Rotation> {
        let anchor = self.anchor_of(index).ok_or(InventoryError::NotAnAnchor(index))?;
        let item = self
            .base
            .slot(anchor)
            .and_then(|slot| slot.item().cloned())
            .ok_or(InventoryError::NotAnAnchor(index))?;
        let current = self.placement(anchor).ok_or(InventoryError::NotAnAnchor(index))?;

        let rotation = current.rotation.next();
        let (width, height) = rotation.apply(item.size);
        if !self.can_place_at(current.x, current.y, width, height, Some(anchor)) {
            log::debug!(
                "Grid '{}': rotating '{}' at ({}, {}) to {}x{} is blocked",
                self.base.id(),
                item.id,
                current.x,
                current.y,
                width,
                height
            );
            return Err(InventoryError::RotationBlocked(anchor));
        }

        let rotated = Placement {
            width,
            height,
            rotation,
            ..current
        };
        self.base.begin_batch();
        self.clear_footprint(anchor);
        self.write_markers(&rotated);
        self.placements.insert(anchor, rotated);
        self.base.end_batch();

        self.base.emit(ContainerEvent::ItemRotated { anchor, rotation });
        Ok(rotation)
    }

    // ------------------------------------------------------------------
    // Forwarded container surface
    // ------------------------------------------------------------------

    /// Whether any unit of the item is stored
    pub fn has_item(&self, item_id: &str) -> bool {
        self.base.has_item(item_id)
    }

    /// Total units of an item
    pub fn item_total_count(&self, item_id: &str) -> u64 {
        self.base.item_total_count(item_id)
    }

    /// Totals of every stored item
    pub fn get_all_item_counts(&self) -> BTreeMap<ItemId, u64> {
        self.base.get_all_item_counts()
    }

    /// Anchor slots holding an item
    pub fn find_slot_indices(&self, item_id: &str) -> Vec<usize> {
        self.base.find_slot_indices(item_id)
    }

    /// Slot by index
    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.base.slot(index)
    }

    /// All cells in row-major order
    pub fn slots(&self) -> &[Slot] {
        self.base.slots()
    }

    /// Whether every cell is taken and no stack has room
    pub fn is_full(&self) -> bool {
        self.base.is_full()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// Register a listener
    pub fn subscribe<L: ContainerListener + 'static>(&mut self, listener: L) -> ListenerId {
        self.base.subscribe(listener)
    }

    /// Remove a listener
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.base.unsubscribe(id)
    }

    /// Open a batch scope
    pub fn begin_batch(&mut self) {
        self.base.begin_batch();
    }

    /// Close a batch scope
    pub fn end_batch(&mut self) {
        self.base.end_batch();
    }

    /// Run `f` inside a batch scope
    pub fn with_batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.base.begin_batch();
        let result = f(self);
        self.base.end_batch();
        result
    }

    /// Recompute every cache from the cells
    pub fn rebuild_caches(&mut self) {
        self.base.rebuild_caches();
    }

    /// Check caches and footprints against the cells
    pub fn validate_caches(&self) -> bool {
        let caches_ok = self.base.validate_caches();
        caches_ok && self.validate_footprints()
    }

    /// Check that every footprint is intact and no marker is orphaned
    pub fn validate_footprints(&self) -> bool {
        let mut ok = true;
        for (&anchor, placement) in &self.placements {
            if self.base.slot(anchor).and_then(Slot::item).is_none() {
                log::warn!("Grid '{}': placement at {} has no item", self.base.id(), anchor);
                ok = false;
            }
            if placement.x + placement.width > self.width || placement.y + placement.height > self.height {
                log::warn!("Grid '{}': placement at {} leaves the grid", self.base.id(), anchor);
                ok = false;
                continue;
            }
            for cell in placement.cells(self.width) {
                if cell != anchor && self.base.slots()[cell].marker_anchor() != Some(anchor) {
                    log::warn!("Grid '{}': cell {} is not marked for anchor {}", self.base.id(), cell, anchor);
                    ok = false;
                }
            }
        }

        for slot in self.base.slots() {
            if let Some(anchor) = slot.marker_anchor() {
                let (x, y) = (slot.index() % self.width, slot.index() / self.width);
                let owned = self.placements.get(&anchor).map_or(false, |p| p.covers(x, y));
                if !owned {
                    log::warn!("Grid '{}': orphaned marker at {} -> {}", self.base.id(), slot.index(), anchor);
                    ok = false;
                }
            }
        }
        ok
    }
}

impl ItemContainer for GridContainer {
    fn add_items(&mut self, item: &ItemRef, count: u32, slot_hint: Option<usize>) -> AddOutcome {
        GridContainer::add_items(self, item, count, slot_hint)
    }

    fn remove_item(&mut self, item_id: &str, count: u32) -> RemoveOutcome {
        GridContainer::remove_item(self, item_id, count)
    }

    fn remove_item_at_index(&mut self, index: usize, count: u32, expected_id: Option<&str>) -> RemoveOutcome {
        GridContainer::remove_item_at_index(self, index, count, expected_id)
    }

    fn has_item(&self, item_id: &str) -> bool {
        GridContainer::has_item(self, item_id)
    }

    fn item_total_count(&self, item_id: &str) -> u64 {
        GridContainer::item_total_count(self, item_id)
    }

    fn find_slot_indices(&self, item_id: &str) -> Vec<usize> {
        GridContainer::find_slot_indices(self, item_id)
    }

    fn slot(&self, index: usize) -> Option<&Slot> {
        GridContainer::slot(self, index)
    }

    fn slots(&self) -> &[Slot] {
        GridContainer::slots(self)
    }

    fn is_full(&self) -> bool {
        GridContainer::is_full(self)
    }

    fn rebuild_caches(&mut self) {
        GridContainer::rebuild_caches(self)
    }

    fn validate_caches(&self) -> bool {
        GridContainer::validate_caches(self)
    }
}
