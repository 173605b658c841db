//! Slot - one storage cell of a container

use crate::condition::ItemFilter;
use crate::item::{Item, ItemRef};

/// What a slot currently holds
#[derive(Debug, Clone, Default)]
pub enum SlotContent {
    /// Nothing stored
    #[default]
    Empty,
    /// A stack of one item identity
    Stack {
        /// Stored item
        item: ItemRef,
        /// Units in the stack (always > 0)
        count: u32,
    },
    /// Secondary cell of a multi-cell grid item
    Marker {
        /// Index of the slot holding the real item
        anchor: usize,
    },
}

/// A single storage cell
#[derive(Debug, Clone)]
pub struct Slot {
    index: usize,
    content: SlotContent,
    condition: Option<ItemFilter>,
}

impl Slot {
    /// Create an empty slot at the given position
    pub fn new(index: usize) -> Self {
        Self {
            index,
            content: SlotContent::Empty,
            condition: None,
        }
    }

    /// Set a slot-level condition
    pub fn with_condition(mut self, condition: ItemFilter) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Position of this slot in its container
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current content
    pub fn content(&self) -> &SlotContent {
        &self.content
    }

    /// Stored item, if this slot holds a real stack
    pub fn item(&self) -> Option<&ItemRef> {
        match &self.content {
            SlotContent::Stack { item, .. } => Some(item),
            _ => None,
        }
    }

    /// Id of the stored item
    pub fn item_id(&self) -> Option<&str> {
        self.item().map(|item| item.id.as_str())
    }

    /// Units stored (0 for empty and marker slots)
    pub fn count(&self) -> u32 {
        match &self.content {
            SlotContent::Stack { count, .. } => *count,
            _ => 0,
        }
    }

    /// Whether anything, real item or marker, occupies this slot
    pub fn is_occupied(&self) -> bool {
        !matches!(self.content, SlotContent::Empty)
    }

    /// Whether this slot is free for placement
    pub fn is_empty(&self) -> bool {
        matches!(self.content, SlotContent::Empty)
    }

    /// Anchor index if this slot is an occupancy marker
    pub fn marker_anchor(&self) -> Option<usize> {
        match self.content {
            SlotContent::Marker { anchor } => Some(anchor),
            _ => None,
        }
    }

    /// Whether this slot holds `item_id`
    pub fn holds(&self, item_id: &str) -> bool {
        self.item_id() == Some(item_id)
    }

    /// Whether this slot holds a stackable item with spare room
    pub fn is_not_full_stack(&self) -> bool {
        match &self.content {
            SlotContent::Stack { item, count } => item.has_room(*count),
            _ => false,
        }
    }

    /// Spare units this slot can take of its current item
    pub fn spare_capacity(&self) -> u32 {
        match &self.content {
            SlotContent::Stack { item, count } if item.stackable => item.spare_capacity(*count),
            _ => 0,
        }
    }

    /// Store `count` units of `item`.
    ///
    /// When the slot already holds the same item id only the count changes.
    /// A zero count clears the slot.
    pub fn set_item(&mut self, item: ItemRef, count: u32) {
        if count == 0 {
            self.clear_slot();
            return;
        }
        match &mut self.content {
            SlotContent::Stack { item: current, count: current_count } if current.id == item.id => {
                *current_count = count;
            }
            _ => self.content = SlotContent::Stack { item, count },
        }
    }

    /// Update the count of the stored stack, clearing the slot at zero
    pub fn set_count(&mut self, count: u32) {
        if count == 0 {
            self.clear_slot();
        } else if let SlotContent::Stack { count: current, .. } = &mut self.content {
            *current = count;
        }
    }

    /// Turn this slot into an occupancy marker for `anchor`
    pub fn set_marker(&mut self, anchor: usize) {
        self.content = SlotContent::Marker { anchor };
    }

    /// Reset to empty
    pub fn clear_slot(&mut self) {
        self.content = SlotContent::Empty;
    }

    /// Slot-level condition
    pub fn condition(&self) -> Option<&ItemFilter> {
        self.condition.as_ref()
    }

    /// Replace the slot-level condition
    pub fn set_condition(&mut self, condition: Option<ItemFilter>) {
        self.condition = condition;
    }

    /// Check the slot-level condition against an item
    pub fn check_condition(&self, item: &Item) -> bool {
        self.condition.as_ref().map_or(true, |filter| filter.passes(item))
    }
}
