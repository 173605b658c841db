//! Container - slot storage with placement, removal and batched notifications

use crate::cache::{CacheIndex, SlotSummary};
use crate::condition::{ItemCondition, ItemFilter};
use crate::config::{Capacity, ContainerConfig, ContainerKind, DEFAULT_BULK_ADD_THRESHOLD, DEFAULT_STACK_SORT_THRESHOLD};
use crate::error::{InventoryError, Result};
use crate::event::{ContainerEvent, ContainerListener, ListenerId, Listeners};
use crate::item::{ItemId, ItemRef, ItemRegistry};
use crate::result::{AddItemResult, AddOutcome, RemoveItemResult, RemoveOutcome};
use crate::slot::Slot;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Operations shared by every container flavor.
///
/// This is the surface used by code that moves items between containers.
pub trait ItemContainer {
    /// Add units of an item, optionally into a preferred slot
    fn add_items(&mut self, item: &ItemRef, count: u32, slot_hint: Option<usize>) -> AddOutcome;
    /// Remove units of an item from wherever they are stored
    fn remove_item(&mut self, item_id: &str, count: u32) -> RemoveOutcome;
    /// Remove units from one slot
    fn remove_item_at_index(&mut self, index: usize, count: u32, expected_id: Option<&str>) -> RemoveOutcome;
    /// Whether any unit of the item is stored
    fn has_item(&self, item_id: &str) -> bool;
    /// Total units of the item
    fn item_total_count(&self, item_id: &str) -> u64;
    /// Slots holding the item, ascending
    fn find_slot_indices(&self, item_id: &str) -> Vec<usize>;
    /// Slot by index
    fn slot(&self, index: usize) -> Option<&Slot>;
    /// All slots
    fn slots(&self) -> &[Slot];
    /// Whether nothing more can be accepted
    fn is_full(&self) -> bool;
    /// Recompute every cache from the slots
    fn rebuild_caches(&mut self);
    /// Check caches against the slots without repairing
    fn validate_caches(&self) -> bool;
}

/// Removal plan: (slot index, units to take)
pub(crate) type RemovalPlan = Vec<(usize, u32)>;

/// Slot-based item container
#[derive(Debug)]
pub struct Container {
    id: String,
    name: String,
    kind: ContainerKind,
    capacity: Capacity,
    slots: Vec<Slot>,
    conditions: Vec<Arc<dyn ItemCondition>>,
    cache: CacheIndex,
    listeners: Listeners,
    batch_depth: u32,
    pending_totals: BTreeSet<ItemId>,
    observed_totals: HashMap<ItemId, u64>,
    stack_sort_threshold: usize,
    bulk_add_threshold: u32,
}

impl Container {
    /// Create a linear container. Slots are allocated as items arrive.
    pub fn new(id: impl Into<String>, name: impl Into<String>, capacity: Capacity) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ContainerKind::Linear,
            capacity,
            slots: Vec::new(),
            conditions: Vec::new(),
            cache: CacheIndex::new(),
            listeners: Listeners::new(),
            batch_depth: 0,
            pending_totals: BTreeSet::new(),
            observed_totals: HashMap::new(),
            stack_sort_threshold: DEFAULT_STACK_SORT_THRESHOLD,
            bulk_add_threshold: DEFAULT_BULK_ADD_THRESHOLD,
        }
    }

    /// Create a linear container from configuration
    pub fn from_config(config: &ContainerConfig) -> Result<Self> {
        if config.kind != ContainerKind::Linear {
            return Err(InventoryError::Config(format!(
                "container '{}' is configured as {:?}, expected Linear",
                config.id, config.kind
            )));
        }
        let mut container = Self::new(config.id.clone(), config.name.clone(), config.capacity()?);
        container.apply_config_tuning(config);
        Ok(container)
    }

    /// Create a container with all `slot_count` slots allocated up front
    pub(crate) fn with_eager_slots(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: ContainerKind,
        slot_count: usize,
    ) -> Self {
        let mut container = Self::new(id, name, Capacity::Fixed(slot_count));
        container.kind = kind;
        container.slots = (0..slot_count).map(Slot::new).collect();
        container.cache.rebuild(&container.slots);
        container
    }

    pub(crate) fn apply_config_tuning(&mut self, config: &ContainerConfig) {
        self.stack_sort_threshold = config.stack_sort_threshold;
        self.bulk_add_threshold = config.bulk_add_threshold;
    }

    /// Add a container-level condition every incoming item must satisfy
    pub fn with_condition<C: ItemCondition + 'static>(mut self, condition: C) -> Self {
        self.conditions.push(Arc::new(condition));
        self
    }

    /// Add a shared container-level condition
    pub fn add_condition(&mut self, condition: Arc<dyn ItemCondition>) {
        self.conditions.push(condition);
    }

    /// Remove all container-level conditions
    pub fn clear_conditions(&mut self) {
        self.conditions.clear();
    }

    /// Set or clear the condition of one slot, allocating slots up to it if needed
    pub fn set_slot_condition(&mut self, index: usize, condition: Option<ItemFilter>) -> Result<()> {
        if index >= self.slots.len() {
            match self.capacity.limit() {
                Some(limit) if index < limit => self.ensure_slots(index + 1),
                _ => {
                    return Err(InventoryError::SlotOutOfRange {
                        index,
                        len: self.slots.len(),
                    })
                }
            }
        }
        self.slots[index].set_condition(condition);
        Ok(())
    }

    /// Override the stacking sort threshold
    pub fn set_stack_sort_threshold(&mut self, threshold: usize) {
        self.stack_sort_threshold = threshold;
    }

    // ------------------------------------------------------------------
    // Identity and queries
    // ------------------------------------------------------------------

    /// Container id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Container kind
    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// Slot capacity
    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Bulk add threshold from configuration
    pub fn bulk_add_threshold(&self) -> u32 {
        self.bulk_add_threshold
    }

    /// Slot by index
    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// All allocated slots
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Number of allocated slots
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Read access to the cache
    pub fn cache(&self) -> &CacheIndex {
        &self.cache
    }

    /// Whether any unit of the item is stored
    pub fn has_item(&self, item_id: &str) -> bool {
        self.cache.contains_item(item_id)
    }

    /// Whether at least `count` units are stored
    pub fn has_items(&self, item_id: &str, count: u32) -> bool {
        self.cache.total_count(item_id) >= count as u64
    }

    /// Total units of an item
    pub fn item_total_count(&self, item_id: &str) -> u64 {
        self.cache.total_count(item_id)
    }

    /// Totals of every stored item
    pub fn get_all_item_counts(&self) -> BTreeMap<ItemId, u64> {
        self.cache.counts().map(|(id, count)| (id.clone(), count)).collect()
    }

    /// Slots holding an item
    pub fn find_slot_indices(&self, item_id: &str) -> Vec<usize> {
        self.cache.item_slots(item_id).collect()
    }

    /// Slots holding items of a type
    pub fn find_slot_indices_by_type(&self, item_type: &str) -> Vec<usize> {
        self.cache.type_slots(item_type).collect()
    }

    /// Number of free slots (allocated and not yet allocated)
    pub fn empty_slot_count(&self) -> usize {
        let unallocated = self
            .capacity
            .limit()
            .map_or(0, |limit| limit.saturating_sub(self.slots.len()));
        self.cache.empty_count() + unallocated
    }

    /// Number of occupied slots, markers included
    pub fn occupied_slot_count(&self) -> usize {
        self.slots.len() - self.cache.empty_count()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.occupied_slot_count() == 0
    }

    /// Sum of unit weights over all stored items
    pub fn total_weight(&self) -> f32 {
        self.slots
            .iter()
            .filter_map(|slot| slot.item().map(|item| item.weight * slot.count() as f32))
            .sum()
    }

    /// Whether nothing more can be accepted.
    ///
    /// Unbounded containers are never full; fixed ones are full once every
    /// slot exists and is occupied and no stack has room left.
    pub fn is_full(&self) -> bool {
        match self.capacity.limit() {
            None => false,
            Some(limit) => {
                self.slots.len() == limit
                    && self.cache.empty_count() == 0
                    && self.cache.not_full_stacks() == 0
            }
        }
    }

    /// Whether an item passes every container-level condition
    pub fn conditions_met(&self, item: &crate::item::Item) -> bool {
        self.conditions.iter().all(|condition| condition.check(item))
    }

    /// How many of `count` units could be absorbed right now, without mutating
    pub fn can_accept(&self, item: &ItemRef, count: u32) -> u32 {
        if count == 0 || !self.conditions_met(item) {
            return 0;
        }
        let per_slot = item.stack_limit();
        let mut room: u64 = 0;

        if item.stackable {
            for index in self.cache.item_slots(&item.id) {
                room += self.slots.get(index).map_or(0, Slot::spare_capacity) as u64;
            }
        }

        let open_slots = self
            .slots
            .iter()
            .filter(|slot| slot.is_empty() && slot.check_condition(item))
            .count() as u64
            + match self.capacity.limit() {
                Some(limit) => limit.saturating_sub(self.slots.len()) as u64,
                None => return count,
            };

        match per_slot {
            None if open_slots > 0 => return count,
            None => {}
            Some(limit) => room += open_slots * limit as u64,
        }

        room.min(count as u64) as u32
    }

    // ------------------------------------------------------------------
    // Listeners and batching
    // ------------------------------------------------------------------

    /// Register a listener
    pub fn subscribe<L: ContainerListener + 'static>(&mut self, listener: L) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    /// Remove a listener
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Open a batch scope. Total-count notifications are held until the
    /// outermost scope closes; slot notifications still fire immediately.
    pub fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Close a batch scope, flushing deferred totals when it was the outermost
    pub fn end_batch(&mut self) {
        if self.batch_depth == 0 {
            log::warn!("Container '{}': end_batch without matching begin_batch", self.id);
            return;
        }
        self.batch_depth -= 1;
        if self.batch_depth == 0 {
            let pending = std::mem::take(&mut self.pending_totals);
            for item_id in pending {
                self.flush_total(&item_id);
            }
        }
    }

    /// Whether a batch scope is open
    pub fn is_batching(&self) -> bool {
        self.batch_depth > 0
    }

    /// Run `f` inside a batch scope
    pub fn with_batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_batch();
        let result = f(self);
        self.end_batch();
        result
    }

    pub(crate) fn emit(&self, event: ContainerEvent) {
        self.listeners.emit(&event);
    }

    fn touch_total(&mut self, item_id: &str) {
        if self.batch_depth > 0 {
            self.pending_totals.insert(item_id.to_string());
        } else {
            self.flush_total(item_id);
        }
    }

    fn flush_total(&mut self, item_id: &str) {
        let new_total = self.cache.total_count(item_id);
        let old_total = self.observed_totals.get(item_id).copied().unwrap_or(0);
        if new_total == old_total {
            return;
        }
        if new_total == 0 {
            self.observed_totals.remove(item_id);
        } else {
            self.observed_totals.insert(item_id.to_string(), new_total);
        }
        self.emit(ContainerEvent::ItemTotalCountChanged {
            item_id: item_id.to_string(),
            old_total,
            new_total,
        });
    }

    // ------------------------------------------------------------------
    // Slot mutation
    // ------------------------------------------------------------------

    /// Mutate one slot and apply the matching cache updates and notifications
    pub(crate) fn write_slot(&mut self, index: usize, mutate: impl FnOnce(&mut Slot)) {
        let Some(slot) = self.slots.get_mut(index) else {
            log::error!("Container '{}': write to missing slot {}", self.id, index);
            return;
        };
        let before = SlotSummary::of(slot);
        let before_item = slot.item().cloned();
        mutate(slot);
        let after = SlotSummary::of(slot);
        let after_item = slot.item().cloned();

        self.cache.track_slot_change(index, &before, &after);

        if before.count != after.count {
            self.emit(ContainerEvent::SlotCountChanged {
                slot: index,
                item: after_item.or(before_item),
                old_count: before.count,
                new_count: after.count,
            });
        }

        if let Some(id) = &before.item_id {
            self.touch_total(id);
        }
        if after.item_id != before.item_id {
            if let Some(id) = &after.item_id {
                self.touch_total(id);
            }
        }
    }

    fn ensure_slots(&mut self, len: usize) {
        while self.slots.len() < len {
            let index = self.slots.len();
            self.slots.push(Slot::new(index));
            self.cache.update_empty_slot(index, true);
        }
    }

    pub(crate) fn slots_mut(&mut self) -> &mut Vec<Slot> {
        &mut self.slots
    }

    // ------------------------------------------------------------------
    // Adding
    // ------------------------------------------------------------------

    /// Add `count` units of `item`.
    ///
    /// Stacks onto existing slots first (unless a hint is given), then the
    /// hinted slot, then empty slots, then newly allocated slots. Whatever
    /// does not fit is reported in `exceeded`.
    pub fn add_items(&mut self, item: &ItemRef, count: u32, slot_hint: Option<usize>) -> AddOutcome {
        self.begin_batch();
        let outcome = self.place_items(item, count, slot_hint);
        self.end_batch();
        self.notify_added(Some(&item.id), &outcome);
        outcome
    }

    /// Resolve an item id through the registry and add it
    pub fn add_items_by_id(&mut self, registry: &ItemRegistry, item_id: &str, count: u32) -> AddOutcome {
        match registry.get(item_id) {
            Some(item) => self.add_items(&item, count, None),
            None => {
                let outcome = AddOutcome::rejected(AddItemResult::ItemIsNull, count);
                self.notify_added(Some(item_id), &outcome);
                outcome
            }
        }
    }

    pub(crate) fn notify_added(&self, item_id: Option<&str>, outcome: &AddOutcome) {
        self.emit(ContainerEvent::ItemsAdded {
            item_id: item_id.map(str::to_string),
            requested: outcome.requested,
            added: outcome.added,
            result: outcome.result,
            slots: outcome.slots.clone(),
        });
    }

    /// Check the add preconditions shared by every placement path
    pub(crate) fn check_add(&self, item: &ItemRef, count: u32) -> Option<AddItemResult> {
        if count == 0 {
            return Some(AddItemResult::AddNothing);
        }
        if !self.conditions_met(item) {
            return Some(AddItemResult::ItemConditionNotMet);
        }
        None
    }

    pub(crate) fn place_items(&mut self, item: &ItemRef, count: u32, slot_hint: Option<usize>) -> AddOutcome {
        if let Some(result) = self.check_add(item, count) {
            return AddOutcome::rejected(result, count);
        }
        if let Some(hint) = slot_hint {
            // Unbounded containers can address the next slot to grow into
            let addressable = match self.capacity.limit() {
                Some(limit) => hint < limit,
                None => hint <= self.slots.len(),
            };
            if !addressable {
                return AddOutcome::rejected(AddItemResult::SlotNotFound, count);
            }
        }

        let mut remaining = count;
        let mut placed = Vec::new();
        let mut blocked_by_condition = false;
        let mut hint_failure = None;

        if item.stackable && slot_hint.is_none() {
            self.fill_existing_stacks(item, &mut remaining, &mut placed);
        }

        if let Some(hint) = slot_hint {
            if remaining > 0 {
                hint_failure = self.place_in_hint(hint, item, &mut remaining, &mut placed);
                if hint_failure == Some(AddItemResult::NoSuitableSlotFound) {
                    blocked_by_condition = true;
                }
            }
        }

        if remaining > 0 {
            blocked_by_condition |= self.fill_empty_slots(item, &mut remaining, &mut placed);
        }

        while remaining > 0 && self.capacity.allows_growth(self.slots.len()) {
            let index = self.slots.len();
            self.ensure_slots(index + 1);
            self.put_new_stack(index, item, &mut remaining);
            placed.push(index);
        }

        let added = count - remaining;
        let result = if added > 0 {
            AddItemResult::Success
        } else if hint_failure == Some(AddItemResult::StackLimitReached) {
            AddItemResult::StackLimitReached
        } else if blocked_by_condition {
            AddItemResult::NoSuitableSlotFound
        } else {
            AddItemResult::ContainerIsFull
        };

        log::debug!(
            "Container '{}': added {}/{} of '{}' into {:?} ({})",
            self.id,
            added,
            count,
            item.id,
            placed,
            result
        );

        AddOutcome {
            result,
            requested: count,
            added,
            exceeded: remaining,
            slots: placed,
        }
    }

    /// Top up slots already holding the item
    pub(crate) fn fill_existing_stacks(&mut self, item: &ItemRef, remaining: &mut u32, placed: &mut Vec<usize>) {
        let mut candidates: Vec<(usize, u32)> = self
            .cache
            .item_slots(&item.id)
            .filter_map(|index| {
                let slot = self.slots.get(index)?;
                let spare = slot.spare_capacity();
                (slot.holds(&item.id) && spare > 0).then_some((index, spare))
            })
            .collect();

        if candidates.len() > self.stack_sort_threshold {
            // Fullest stacks first, so unlimited stacks come last
            candidates.sort_by_key(|&(index, spare)| (spare, index));
        }

        for (index, spare) in candidates {
            if *remaining == 0 {
                break;
            }
            let take = spare.min(*remaining);
            let current = self.slots[index].count();
            self.write_slot(index, |slot| slot.set_count(current + take));
            *remaining -= take;
            placed.push(index);
        }
    }

    /// Try the hinted slot; returns the failure reason if nothing went in
    fn place_in_hint(
        &mut self,
        hint: usize,
        item: &ItemRef,
        remaining: &mut u32,
        placed: &mut Vec<usize>,
    ) -> Option<AddItemResult> {
        self.ensure_slots(hint + 1);
        let slot = &self.slots[hint];

        if slot.holds(&item.id) {
            if !item.stackable {
                return Some(AddItemResult::ContainerIsFull);
            }
            let take = match slot.spare_capacity() {
                0 => return Some(AddItemResult::StackLimitReached),
                spare => spare.min(*remaining),
            };
            let current = slot.count();
            self.write_slot(hint, |slot| slot.set_count(current + take));
            *remaining -= take;
            placed.push(hint);
            return None;
        }

        if !slot.is_empty() {
            return Some(AddItemResult::ContainerIsFull);
        }
        if !slot.check_condition(item) {
            return Some(AddItemResult::NoSuitableSlotFound);
        }
        self.put_new_stack(hint, item, remaining);
        placed.push(hint);
        None
    }

    /// Fill free slots; returns whether a slot condition rejected the item
    fn fill_empty_slots(&mut self, item: &ItemRef, remaining: &mut u32, placed: &mut Vec<usize>) -> bool {
        let mut blocked = false;

        let cached: Vec<usize> = self.cache.empty_slots().collect();
        for index in cached {
            if *remaining == 0 {
                return blocked;
            }
            if !self.slots[index].is_empty() {
                log::warn!("Container '{}': slot {} cached as empty but occupied", self.id, index);
                self.cache.update_empty_slot(index, false);
                continue;
            }
            if !self.slots[index].check_condition(item) {
                blocked = true;
                continue;
            }
            self.put_new_stack(index, item, remaining);
            placed.push(index);
        }

        // Free slots the cache missed
        for index in 0..self.slots.len() {
            if *remaining == 0 {
                break;
            }
            if !self.slots[index].is_empty() || self.cache.is_empty_slot(index) {
                continue;
            }
            log::warn!("Container '{}': slot {} empty but missing from cache", self.id, index);
            self.cache.update_empty_slot(index, true);
            if !self.slots[index].check_condition(item) {
                blocked = true;
                continue;
            }
            self.put_new_stack(index, item, remaining);
            placed.push(index);
        }

        blocked
    }

    fn put_new_stack(&mut self, index: usize, item: &ItemRef, remaining: &mut u32) {
        let take = item.stack_limit().map_or(*remaining, |limit| limit.min(*remaining));
        let item = item.clone();
        self.write_slot(index, |slot| slot.set_item(item, take));
        *remaining -= take;
    }

    // ------------------------------------------------------------------
    // Removing
    // ------------------------------------------------------------------

    /// Remove `count` units of an item across all slots.
    ///
    /// Either every requested unit is removed or nothing changes.
    pub fn remove_item(&mut self, item_id: &str, count: u32) -> RemoveOutcome {
        self.begin_batch();
        let outcome = match self.plan_removal(item_id, count) {
            Ok(plan) => {
                let slots = plan.iter().map(|&(index, _)| index).collect();
                self.apply_removal(&plan);
                RemoveOutcome {
                    result: RemoveItemResult::Success,
                    requested: count,
                    removed: count,
                    slots,
                }
            }
            Err(result) => RemoveOutcome::rejected(result, count),
        };
        self.end_batch();
        self.notify_removed(Some(item_id), &outcome);
        outcome
    }

    /// Remove `count` units from one slot, optionally checking its item id
    pub fn remove_item_at_index(&mut self, index: usize, count: u32, expected_id: Option<&str>) -> RemoveOutcome {
        let item_id = self.slots.get(index).and_then(|slot| slot.item_id().map(str::to_string));
        self.begin_batch();
        let outcome = match self.plan_removal_at(index, count, expected_id) {
            Ok(plan) => {
                let slots = plan.iter().map(|&(index, _)| index).collect();
                self.apply_removal(&plan);
                RemoveOutcome {
                    result: RemoveItemResult::Success,
                    requested: count,
                    removed: count,
                    slots,
                }
            }
            Err(result) => RemoveOutcome::rejected(result, count),
        };
        self.end_batch();
        self.notify_removed(item_id.as_deref().or(expected_id), &outcome);
        outcome
    }

    pub(crate) fn notify_removed(&self, item_id: Option<&str>, outcome: &RemoveOutcome) {
        self.emit(ContainerEvent::ItemsRemoved {
            item_id: item_id.map(str::to_string),
            requested: outcome.requested,
            removed: outcome.removed,
            result: outcome.result,
            slots: outcome.slots.clone(),
        });
    }

    /// Work out which slots give up how many units, touching nothing
    pub(crate) fn plan_removal(&mut self, item_id: &str, count: u32) -> std::result::Result<RemovalPlan, RemoveItemResult> {
        if item_id.is_empty() {
            return Err(RemoveItemResult::InvalidItemId);
        }
        let indices: Vec<usize> = self.cache.item_slots(item_id).collect();
        if indices.is_empty() {
            return Err(RemoveItemResult::ItemNotFound);
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut plan = Vec::new();
        let mut remaining = count;
        let mut available: u64 = 0;
        for index in indices {
            let held = match self.slots.get(index) {
                Some(slot) if slot.holds(item_id) => slot.count(),
                _ => {
                    log::error!(
                        "Container '{}': cache lists slot {} for '{}' but the slot disagrees; rebuilding",
                        self.id,
                        index,
                        item_id
                    );
                    self.rebuild_caches();
                    return Err(RemoveItemResult::Failed);
                }
            };
            available += held as u64;
            if remaining > 0 {
                let take = held.min(remaining);
                plan.push((index, take));
                remaining -= take;
            }
        }

        if remaining > 0 {
            log::debug!(
                "Container '{}': cannot remove {} of '{}', only {} stored",
                self.id,
                count,
                item_id,
                available
            );
            return Err(RemoveItemResult::InsufficientQuantity);
        }
        Ok(plan)
    }

    pub(crate) fn plan_removal_at(
        &self,
        index: usize,
        count: u32,
        expected_id: Option<&str>,
    ) -> std::result::Result<RemovalPlan, RemoveItemResult> {
        let slot = self.slots.get(index).ok_or(RemoveItemResult::SlotNotFound)?;
        let item_id = slot.item_id().ok_or(RemoveItemResult::ItemNotFound)?;
        if let Some(expected) = expected_id {
            if expected != item_id {
                return Err(RemoveItemResult::InvalidItemId);
            }
        }
        if count == 0 {
            return Ok(Vec::new());
        }
        if slot.count() < count {
            return Err(RemoveItemResult::InsufficientQuantity);
        }
        Ok(vec![(index, count)])
    }

    /// Apply a plan; returns the slots that became empty
    pub(crate) fn apply_removal(&mut self, plan: &RemovalPlan) -> Vec<usize> {
        let mut emptied = Vec::new();
        for &(index, take) in plan {
            let current = self.slots[index].count();
            let left = current - take;
            self.write_slot(index, |slot| slot.set_count(left));
            if left == 0 {
                emptied.push(index);
            }
        }
        emptied
    }

    /// Empty every slot
    pub fn clear(&mut self) {
        self.with_batch(|container| {
            for index in 0..container.slots.len() {
                if container.slots[index].is_occupied() {
                    container.write_slot(index, Slot::clear_slot);
                }
            }
        });
    }

    // ------------------------------------------------------------------
    // Rearranging
    // ------------------------------------------------------------------

    /// Move the stack at `from` into `to`, merging when `to` holds the same
    /// stackable item. Returns false when nothing moved.
    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        if from == to || !self.reach_slot(to) {
            return false;
        }
        let Some((item, count)) = self.stack_at(from) else {
            return false;
        };
        let target = &self.slots[to];
        if !target.check_condition(&item) {
            return false;
        }

        if target.is_empty() {
            self.with_batch(|container| {
                container.write_slot(to, |slot| slot.set_item(item, count));
                container.write_slot(from, Slot::clear_slot);
            });
            return true;
        }

        if !target.holds(&item.id) || !item.stackable {
            return false;
        }
        let current = target.count();
        let take = target.spare_capacity().min(count);
        if take == 0 {
            return false;
        }
        self.with_batch(|container| {
            container.write_slot(to, |slot| slot.set_count(current + take));
            container.write_slot(from, |slot| slot.set_count(count - take));
        });
        true
    }

    /// Exchange the contents of two slots. Slot conditions still apply.
    pub fn swap_slots(&mut self, a: usize, b: usize) -> bool {
        if a == b || a >= self.slots.len() || b >= self.slots.len() {
            return false;
        }
        if self.slots[a].marker_anchor().is_some() || self.slots[b].marker_anchor().is_some() {
            return false;
        }
        let first = self.stack_at(a);
        let second = self.stack_at(b);
        let fits = |slot: &Slot, stack: &Option<(ItemRef, u32)>| {
            stack.as_ref().map_or(true, |(item, _)| slot.check_condition(item))
        };
        if !fits(&self.slots[a], &second) || !fits(&self.slots[b], &first) {
            return false;
        }

        self.with_batch(|container| {
            container.write_slot(a, |slot| match second {
                Some((item, count)) => {
                    slot.clear_slot();
                    slot.set_item(item, count);
                }
                None => slot.clear_slot(),
            });
            container.write_slot(b, |slot| match first {
                Some((item, count)) => {
                    slot.clear_slot();
                    slot.set_item(item, count);
                }
                None => slot.clear_slot(),
            });
        });
        true
    }

    /// Split `amount` units off the stack at `from` into the empty slot `to`
    pub fn split_stack(&mut self, from: usize, amount: u32, to: usize) -> bool {
        if from == to || amount == 0 || !self.reach_slot(to) {
            return false;
        }
        let Some((item, count)) = self.stack_at(from) else {
            return false;
        };
        if amount >= count || !self.slots[to].is_empty() || !self.slots[to].check_condition(&item) {
            return false;
        }

        self.with_batch(|container| {
            container.write_slot(from, |slot| slot.set_count(count - amount));
            container.write_slot(to, |slot| slot.set_item(item, amount));
        });
        true
    }

    /// Allocate slots up to `index` when capacity allows; unbounded containers grow by one at most
    fn reach_slot(&mut self, index: usize) -> bool {
        if index < self.slots.len() {
            return true;
        }
        let reachable = match self.capacity.limit() {
            Some(limit) => index < limit,
            None => index == self.slots.len(),
        };
        if reachable {
            self.ensure_slots(index + 1);
        }
        reachable
    }

    fn stack_at(&self, index: usize) -> Option<(ItemRef, u32)> {
        let slot = self.slots.get(index)?;
        Some((slot.item()?.clone(), slot.count()))
    }

    // ------------------------------------------------------------------
    // Cache maintenance
    // ------------------------------------------------------------------

    /// Recompute every cache from the slots and resync observed totals
    pub fn rebuild_caches(&mut self) {
        self.cache.rebuild(&self.slots);
        self.emit(ContainerEvent::CachesRebuilt);

        let mut ids: BTreeSet<ItemId> = self.observed_totals.keys().cloned().collect();
        ids.extend(self.cache.counts().map(|(id, _)| id.clone()));
        for id in ids {
            self.touch_total(&id);
        }
    }

    /// Check caches against the slots; logs every mismatch, repairs nothing
    pub fn validate_caches(&self) -> bool {
        let mismatches = self.cache.validate(&self.slots);
        for mismatch in &mismatches {
            log::warn!("Container '{}': cache mismatch: {}", self.id, mismatch);
        }
        mismatches.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn cache_mut(&mut self) -> &mut CacheIndex {
        &mut self.cache
    }
}

impl ItemContainer for Container {
    fn add_items(&mut self, item: &ItemRef, count: u32, slot_hint: Option<usize>) -> AddOutcome {
        Container::add_items(self, item, count, slot_hint)
    }

    fn remove_item(&mut self, item_id: &str, count: u32) -> RemoveOutcome {
        Container::remove_item(self, item_id, count)
    }

    fn remove_item_at_index(&mut self, index: usize, count: u32, expected_id: Option<&str>) -> RemoveOutcome {
        Container::remove_item_at_index(self, index, count, expected_id)
    }

    fn has_item(&self, item_id: &str) -> bool {
        Container::has_item(self, item_id)
    }

    fn item_total_count(&self, item_id: &str) -> u64 {
        Container::item_total_count(self, item_id)
    }

    fn find_slot_indices(&self, item_id: &str) -> Vec<usize> {
        Container::find_slot_indices(self, item_id)
    }

    fn slot(&self, index: usize) -> Option<&Slot> {
        Container::slot(self, index)
    }

    fn slots(&self) -> &[Slot] {
        Container::slots(self)
    }

    fn is_full(&self) -> bool {
        Container::is_full(self)
    }

    fn rebuild_caches(&mut self) {
        Container::rebuild_caches(self)
    }

    fn validate_caches(&self) -> bool {
        Container::validate_caches(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Item;
    use parking_lot::Mutex;

    fn recorder(container: &mut Container) -> Arc<Mutex<Vec<ContainerEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        container.subscribe(move |event: &ContainerEvent| sink.lock().push(event.clone()));
        events
    }

    fn potion() -> ItemRef {
        Item::new("potion", "Potion").with_type("consumable").with_stack(10).into_ref()
    }

    #[test]
    fn test_add_grows_slots() {
        let mut container = Container::new("bag", "Bag", Capacity::Fixed(4));
        let outcome = container.add_items(&potion(), 25, None);

        assert!(outcome.is_complete());
        assert_eq!(outcome.slots, vec![0, 1, 2]);
        assert_eq!(container.slot_count(), 3);
        assert_eq!(container.item_total_count("potion"), 25);
        assert!(container.validate_caches());
    }

    #[test]
    fn test_partial_add_reports_exceeded() {
        let mut container = Container::new("bag", "Bag", Capacity::Fixed(2));
        let outcome = container.add_items(&potion(), 25, None);

        assert_eq!(outcome.result, AddItemResult::Success);
        assert_eq!(outcome.added, 20);
        assert_eq!(outcome.exceeded, 5);
        assert!(container.is_full());

        let again = container.add_items(&potion(), 1, None);
        assert_eq!(again.result, AddItemResult::ContainerIsFull);
        assert_eq!(again.exceeded, 1);
    }

    #[test]
    fn test_rejections() {
        let mut container =
            Container::new("quiver", "Quiver", Capacity::Fixed(2)).with_condition(crate::condition::ItemFilter::new().with_type("ammo"));

        assert_eq!(container.add_items(&potion(), 0, None).result, AddItemResult::AddNothing);
        assert_eq!(container.add_items(&potion(), 1, None).result, AddItemResult::ItemConditionNotMet);

        let arrow = Item::new("arrow", "Arrow").with_type("ammo").with_stack(50).into_ref();
        assert_eq!(container.add_items(&arrow, 1, Some(7)).result, AddItemResult::SlotNotFound);
        assert!(container.is_empty());

        let registry = ItemRegistry::new();
        assert_eq!(container.add_items_by_id(&registry, "arrow", 3).result, AddItemResult::ItemIsNull);
    }

    #[test]
    fn test_slot_hint() {
        let mut container = Container::new("belt", "Belt", Capacity::Fixed(5));
        let outcome = container.add_items(&potion(), 3, Some(3));
        assert_eq!(outcome.slots, vec![3]);
        assert_eq!(container.slot(3).map(Slot::count), Some(3));

        // Hinted slot at max stack
        container.add_items(&potion(), 7, Some(3));
        let sword = Item::new("sword", "Sword").into_ref();
        container.set_slot_condition(0, Some(ItemFilter::new().with_type("consumable"))).unwrap();

        let outcome = container.add_items(&sword, 1, Some(3));
        // Falls through to the first free slot accepting swords
        assert_eq!(outcome.slots, vec![1]);
    }

    #[test]
    fn test_hint_stack_limit() {
        let mut container = Container::new("belt", "Belt", Capacity::Fixed(1));
        container.add_items(&potion(), 10, None);
        let outcome = container.add_items(&potion(), 1, Some(0));
        assert_eq!(outcome.result, AddItemResult::StackLimitReached);
    }

    #[test]
    fn test_slot_condition_blocks() {
        let mut container = Container::new("armor", "Armor", Capacity::Fixed(1));
        container.set_slot_condition(0, Some(ItemFilter::new().with_type("armor"))).unwrap();

        let outcome = container.add_items(&potion(), 1, None);
        assert_eq!(outcome.result, AddItemResult::NoSuitableSlotFound);
        assert!(container.is_empty());
    }

    #[test]
    fn test_sorted_stacking() {
        let mut container = Container::new("pouch", "Pouch", Capacity::Unbounded);
        container.set_stack_sort_threshold(0);
        let potion = potion();
        container.add_items(&potion, 3, Some(0));
        container.add_items(&potion, 7, Some(1));

        let outcome = container.add_items(&potion, 5, None);
        assert_eq!(outcome.slots, vec![1, 0]);
        assert_eq!(container.slot(1).map(Slot::count), Some(10));
        assert_eq!(container.slot(0).map(Slot::count), Some(5));
        assert_eq!(container.slot_count(), 2);
    }

    #[test]
    fn test_remove_spans_slots() {
        let mut container = Container::new("bag", "Bag", Capacity::Unbounded);
        container.add_items(&potion(), 25, None);

        let outcome = container.remove_item("potion", 15);
        assert!(outcome.is_success());
        assert_eq!(outcome.slots, vec![0, 1]);
        assert_eq!(container.item_total_count("potion"), 10);
        assert!(container.slot(0).unwrap().is_empty());
        assert!(container.validate_caches());
    }

    #[test]
    fn test_remove_is_atomic() {
        let mut container = Container::new("bag", "Bag", Capacity::Unbounded);
        container.add_items(&potion(), 12, None);

        let outcome = container.remove_item("potion", 13);
        assert_eq!(outcome.result, RemoveItemResult::InsufficientQuantity);
        assert_eq!(container.item_total_count("potion"), 12);
        assert_eq!(container.remove_item("elixir", 1).result, RemoveItemResult::ItemNotFound);
        assert_eq!(container.remove_item("", 1).result, RemoveItemResult::InvalidItemId);

        assert_eq!(container.remove_item("elixir", 0).result, RemoveItemResult::ItemNotFound);
        let nothing = container.remove_item("potion", 0);
        assert!(nothing.is_success());
        assert!(nothing.slots.is_empty());
    }

    #[test]
    fn test_unlimited_stack_saturates() {
        let mut container = Container::new("vault", "Vault", Capacity::Fixed(2));
        let gold = Item::new("gold", "Gold").with_stack(0).into_ref();

        assert!(container.add_items(&gold, u32::MAX, None).is_complete());
        let outcome = container.add_items(&gold, 5, None);
        assert_eq!(outcome.slots, vec![1]);
        assert_eq!(container.slot(0).map(Slot::count), Some(u32::MAX));
        assert_eq!(container.slot(1).map(Slot::count), Some(5));
        assert_eq!(container.item_total_count("gold"), u32::MAX as u64 + 5);

        // A saturated slot behaves like a full stack
        assert_eq!(container.add_items(&gold, 1, Some(0)).result, AddItemResult::StackLimitReached);
        assert!(!container.move_item(1, 0));
        assert_eq!(container.can_accept(&gold, 10), 10);
        assert!(container.validate_caches());
    }

    #[test]
    fn test_add_repairs_empty_slot_drift() {
        let mut container = Container::new("bag", "Bag", Capacity::Fixed(3));
        container.add_items(&potion(), 30, None);
        container.remove_item_at_index(2, 10, None);

        // Slot 0 holds potions but is cached as empty; slot 2 is empty but uncached
        container.cache_mut().update_empty_slot(0, true);
        container.cache_mut().update_empty_slot(2, false);
        assert!(!container.validate_caches());

        let sword = Item::new("sword", "Sword").into_ref();
        let outcome = container.add_items(&sword, 1, None);
        assert!(outcome.is_complete());
        assert_eq!(outcome.slots, vec![2]);
        assert_eq!(container.slot(0).and_then(Slot::item_id), Some("potion"));
        assert_eq!(container.slot(0).map(Slot::count), Some(10));
        assert!(container.validate_caches());
    }

    #[test]
    fn test_remove_at_index() {
        let mut container = Container::new("bag", "Bag", Capacity::Unbounded);
        container.add_items(&potion(), 15, None);

        assert_eq!(container.remove_item_at_index(9, 1, None).result, RemoveItemResult::SlotNotFound);
        assert_eq!(container.remove_item_at_index(1, 1, Some("sword")).result, RemoveItemResult::InvalidItemId);
        assert_eq!(container.remove_item_at_index(1, 6, None).result, RemoveItemResult::InsufficientQuantity);

        let outcome = container.remove_item_at_index(1, 5, Some("potion"));
        assert!(outcome.is_success());
        assert!(container.slot(1).unwrap().is_empty());
        assert_eq!(container.remove_item_at_index(1, 1, None).result, RemoveItemResult::ItemNotFound);
    }

    #[test]
    fn test_desync_reports_failed_and_rebuilds() {
        let mut container = Container::new("bag", "Bag", Capacity::Unbounded);
        container.add_items(&potion(), 5, None);
        container.cache_mut().update_slot_index("potion", 4, true);

        let outcome = container.remove_item("potion", 1);
        assert_eq!(outcome.result, RemoveItemResult::Failed);
        assert_eq!(container.item_total_count("potion"), 5);
        assert!(container.validate_caches());
    }

    #[test]
    fn test_notifications() {
        let mut container = Container::new("bag", "Bag", Capacity::Fixed(3));
        let events = recorder(&mut container);

        container.add_items(&potion(), 12, None);
        container.remove_item("potion", 100);

        let events = events.lock();
        let slot_events = events.iter().filter(|e| e.is_slot_count_changed()).count();
        let total_events = events.iter().filter(|e| e.is_total_count_changed()).count();
        assert_eq!(slot_events, 2);
        assert_eq!(total_events, 1);

        match events.last() {
            Some(ContainerEvent::ItemsRemoved { result, slots, .. }) => {
                assert_eq!(*result, RemoveItemResult::InsufficientQuantity);
                assert!(slots.is_empty());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_move_and_merge() {
        let mut container = Container::new("bag", "Bag", Capacity::Fixed(3));
        let potion = potion();
        container.add_items(&potion, 4, Some(0));
        container.add_items(&potion, 8, Some(2));

        // Only 2 fit on top of the 8-stack
        assert!(container.move_item(0, 2));
        assert_eq!(container.slot(2).map(Slot::count), Some(10));
        assert_eq!(container.slot(0).map(Slot::count), Some(2));

        assert!(container.move_item(0, 1));
        assert!(container.slot(0).unwrap().is_empty());
        assert!(!container.move_item(0, 1));
        assert_eq!(container.item_total_count("potion"), 12);
        assert!(container.validate_caches());
    }

    #[test]
    fn test_swap_and_split() {
        let mut container = Container::new("bag", "Bag", Capacity::Fixed(3));
        let sword = Item::new("sword", "Sword").with_type("weapon").into_ref();
        container.add_items(&sword, 1, None);
        container.add_items(&potion(), 10, None);

        assert!(container.swap_slots(0, 1));
        assert_eq!(container.slot(0).and_then(Slot::item_id), Some("potion"));
        assert_eq!(container.find_slot_indices("sword"), vec![1]);

        assert!(container.split_stack(0, 4, 2));
        assert_eq!(container.slot(0).map(Slot::count), Some(6));
        assert_eq!(container.slot(2).map(Slot::count), Some(4));
        assert!(!container.split_stack(0, 6, 2));
        assert!(container.validate_caches());
    }

    #[test]
    fn test_can_accept() {
        let mut container = Container::new("bag", "Bag", Capacity::Fixed(2));
        container.add_items(&potion(), 4, None);

        assert_eq!(container.can_accept(&potion(), 100), 16);
        assert_eq!(container.item_total_count("potion"), 4);

        let unbounded = Container::new("void", "Void", Capacity::Unbounded);
        assert_eq!(unbounded.can_accept(&potion(), 100), 100);
    }
}
