//! CacheIndex - derived lookup structures kept in sync with a slot array
//!
//! Every index here can be recomputed from the slots alone. Containers keep
//! it current with the incremental `update_*` calls, pairing each slot
//! mutation with the matching update; `rebuild` recomputes from scratch and
//! `validate` reports any drift without repairing it.

use crate::item::ItemId;
use crate::slot::Slot;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Cache-relevant view of a slot, captured before and after a mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSummary {
    /// Item id of a real stack
    pub item_id: Option<ItemId>,
    /// Type tag of a real stack
    pub item_type: Option<String>,
    /// Units stored
    pub count: u32,
    /// Free for placement
    pub empty: bool,
    /// Stackable with spare room
    pub not_full: bool,
}

impl SlotSummary {
    /// Summarize a slot
    pub fn of(slot: &Slot) -> Self {
        let item = slot.item();
        Self {
            item_id: item.map(|i| i.id.clone()),
            item_type: item.map(|i| i.item_type.clone()),
            count: slot.count(),
            empty: slot.is_empty(),
            not_full: slot.is_not_full_stack(),
        }
    }
}

/// A disagreement between the cache and a full scan of the slots
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheMismatch {
    #[error("slot index for item '{item_id}': cached {cached:?}, actual {actual:?}")]
    ItemSlots {
        item_id: ItemId,
        cached: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("slot index for type '{item_type}': cached {cached:?}, actual {actual:?}")]
    TypeSlots {
        item_type: String,
        cached: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("empty slots: cached {cached:?}, actual {actual:?}")]
    EmptySlots { cached: Vec<usize>, actual: Vec<usize> },
    #[error("not-full stack counter: cached {cached}, actual {actual}")]
    NotFullStacks { cached: usize, actual: usize },
    #[error("total count for item '{item_id}': cached {cached}, actual {actual}")]
    ItemCount {
        item_id: ItemId,
        cached: u64,
        actual: u64,
    },
}

/// Per-container derived index set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheIndex {
    /// item id -> slots holding it
    item_slots: HashMap<ItemId, BTreeSet<usize>>,
    /// item type -> slots holding it
    type_slots: HashMap<String, BTreeSet<usize>>,
    /// Slots free for placement
    empty_slots: BTreeSet<usize>,
    /// Slots holding a stackable item below its max
    not_full_stacks: usize,
    /// item id -> total units across all slots
    item_counts: HashMap<ItemId, u64>,
}

impl CacheIndex {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from scratch
    pub fn from_slots(slots: &[Slot]) -> Self {
        let mut cache = Self::new();
        cache.rebuild(slots);
        cache
    }

    /// Recompute every index from the slot array
    pub fn rebuild(&mut self, slots: &[Slot]) {
        self.item_slots.clear();
        self.type_slots.clear();
        self.empty_slots.clear();
        self.not_full_stacks = 0;
        self.item_counts.clear();

        for slot in slots {
            let summary = SlotSummary::of(slot);
            self.apply_summary(slot.index(), &summary, true);
        }
    }

    /// Compare against a full scan, returning every mismatch found
    pub fn validate(&self, slots: &[Slot]) -> Vec<CacheMismatch> {
        let expected = Self::from_slots(slots);
        let mut mismatches = Vec::new();

        let ids: BTreeSet<&ItemId> = self.item_slots.keys().chain(expected.item_slots.keys()).collect();
        for id in ids {
            let cached = sorted(self.item_slots.get(id));
            let actual = sorted(expected.item_slots.get(id));
            if cached != actual {
                mismatches.push(CacheMismatch::ItemSlots {
                    item_id: id.clone(),
                    cached,
                    actual,
                });
            }
        }

        let types: BTreeSet<&String> = self.type_slots.keys().chain(expected.type_slots.keys()).collect();
        for item_type in types {
            let cached = sorted(self.type_slots.get(item_type));
            let actual = sorted(expected.type_slots.get(item_type));
            if cached != actual {
                mismatches.push(CacheMismatch::TypeSlots {
                    item_type: item_type.clone(),
                    cached,
                    actual,
                });
            }
        }

        if self.empty_slots != expected.empty_slots {
            mismatches.push(CacheMismatch::EmptySlots {
                cached: self.empty_slots.iter().copied().collect(),
                actual: expected.empty_slots.iter().copied().collect(),
            });
        }

        if self.not_full_stacks != expected.not_full_stacks {
            mismatches.push(CacheMismatch::NotFullStacks {
                cached: self.not_full_stacks,
                actual: expected.not_full_stacks,
            });
        }

        let counted: BTreeSet<&ItemId> = self.item_counts.keys().chain(expected.item_counts.keys()).collect();
        for id in counted {
            let cached = self.total_count(id);
            let actual = expected.total_count(id);
            if cached != actual {
                mismatches.push(CacheMismatch::ItemCount {
                    item_id: id.clone(),
                    cached,
                    actual,
                });
            }
        }

        mismatches
    }

    /// Adjust the cached total for an item
    pub fn update_count(&mut self, item_id: &str, delta: i64) {
        let current = self.item_counts.get(item_id).copied().unwrap_or(0) as i64;
        let updated = current + delta;
        if updated > 0 {
            self.item_counts.insert(item_id.to_string(), updated as u64);
        } else {
            if updated < 0 {
                log::warn!("Cached count for '{}' went negative ({})", item_id, updated);
            }
            self.item_counts.remove(item_id);
        }
    }

    /// Add or remove a slot from the item id index
    pub fn update_slot_index(&mut self, item_id: &str, slot_index: usize, added: bool) {
        update_set(&mut self.item_slots, item_id, slot_index, added);
    }

    /// Add or remove a slot from the item type index
    pub fn update_type_index(&mut self, item_type: &str, slot_index: usize, added: bool) {
        update_set(&mut self.type_slots, item_type, slot_index, added);
    }

    /// Mark a slot empty or non-empty
    pub fn update_empty_slot(&mut self, slot_index: usize, is_empty: bool) {
        if is_empty {
            self.empty_slots.insert(slot_index);
        } else {
            self.empty_slots.remove(&slot_index);
        }
    }

    /// Track a slot entering or leaving the not-full-stack state
    pub fn update_not_full_stack(&mut self, was_not_full: bool, is_not_full: bool) {
        match (was_not_full, is_not_full) {
            (false, true) => self.not_full_stacks += 1,
            (true, false) => self.not_full_stacks = self.not_full_stacks.saturating_sub(1),
            _ => {}
        }
    }

    /// Apply every index update implied by one slot going from `before` to `after`
    pub fn track_slot_change(&mut self, slot_index: usize, before: &SlotSummary, after: &SlotSummary) {
        if before.item_id != after.item_id {
            self.apply_summary(slot_index, before, false);
            self.apply_summary(slot_index, after, true);
            return;
        }

        if let Some(id) = &after.item_id {
            let delta = after.count as i64 - before.count as i64;
            if delta != 0 {
                self.update_count(id, delta);
            }
        }
        if before.empty != after.empty {
            self.update_empty_slot(slot_index, after.empty);
        }
        self.update_not_full_stack(before.not_full, after.not_full);
    }

    fn apply_summary(&mut self, slot_index: usize, summary: &SlotSummary, added: bool) {
        if let Some(id) = &summary.item_id {
            self.update_slot_index(id, slot_index, added);
            let delta = summary.count as i64;
            self.update_count(id, if added { delta } else { -delta });
        }
        if let Some(item_type) = &summary.item_type {
            self.update_type_index(item_type, slot_index, added);
        }
        if summary.empty {
            self.update_empty_slot(slot_index, added);
        }
        if summary.not_full {
            self.update_not_full_stack(!added, added);
        }
    }

    /// Slots holding an item id, in ascending order
    pub fn item_slots(&self, item_id: &str) -> impl Iterator<Item = usize> + '_ {
        self.item_slots.get(item_id).into_iter().flatten().copied()
    }

    /// Slots holding an item type, in ascending order
    pub fn type_slots(&self, item_type: &str) -> impl Iterator<Item = usize> + '_ {
        self.type_slots.get(item_type).into_iter().flatten().copied()
    }

    /// Empty slots, in ascending order
    pub fn empty_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.empty_slots.iter().copied()
    }

    /// Whether a slot is cached as empty
    pub fn is_empty_slot(&self, slot_index: usize) -> bool {
        self.empty_slots.contains(&slot_index)
    }

    /// Number of cached empty slots
    pub fn empty_count(&self) -> usize {
        self.empty_slots.len()
    }

    /// Number of not-full stacks
    pub fn not_full_stacks(&self) -> usize {
        self.not_full_stacks
    }

    /// Cached total for an item
    pub fn total_count(&self, item_id: &str) -> u64 {
        self.item_counts.get(item_id).copied().unwrap_or(0)
    }

    /// All cached totals
    pub fn counts(&self) -> impl Iterator<Item = (&ItemId, u64)> {
        self.item_counts.iter().map(|(id, count)| (id, *count))
    }

    /// Whether any slot holds the item
    pub fn contains_item(&self, item_id: &str) -> bool {
        self.item_slots.get(item_id).map_or(false, |set| !set.is_empty())
    }
}

fn update_set(map: &mut HashMap<String, BTreeSet<usize>>, key: &str, slot_index: usize, added: bool) {
    if added {
        map.entry(key.to_string()).or_default().insert(slot_index);
    } else if let Some(set) = map.get_mut(key) {
        set.remove(&slot_index);
        if set.is_empty() {
            map.remove(key);
        }
    }
}

fn sorted(set: Option<&BTreeSet<usize>>) -> Vec<usize> {
    set.map(|s| s.iter().copied().collect()).unwrap_or_default()
}
