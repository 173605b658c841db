//! Operation result codes and outcomes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result code of an add operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddItemResult {
    /// Some or all units were placed
    Success,
    /// The item could not be resolved
    ItemIsNull,
    /// No capacity or stack room left
    ContainerIsFull,
    /// The hinted slot's stack is already at its max
    StackLimitReached,
    /// The hinted slot does not exist
    SlotNotFound,
    /// A container condition rejected the item
    ItemConditionNotMet,
    /// Slot conditions blocked every candidate slot
    NoSuitableSlotFound,
    /// Zero units requested
    AddNothing,
}

impl AddItemResult {
    /// Check for success
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for AddItemResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Success => "success",
            Self::ItemIsNull => "item is null",
            Self::ContainerIsFull => "container is full",
            Self::StackLimitReached => "stack limit reached",
            Self::SlotNotFound => "slot not found",
            Self::ItemConditionNotMet => "item condition not met",
            Self::NoSuitableSlotFound => "no suitable slot found",
            Self::AddNothing => "nothing to add",
        };
        f.write_str(text)
    }
}

/// Result code of a remove operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemoveItemResult {
    /// The requested units were removed
    Success,
    /// Empty id, or the slot holds a different item than expected
    InvalidItemId,
    /// The item is not stored
    ItemNotFound,
    /// The slot index does not exist
    SlotNotFound,
    /// Fewer units stored than requested
    InsufficientQuantity,
    /// Cache and slots disagreed; nothing was changed
    Failed,
}

impl RemoveItemResult {
    /// Check for success
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for RemoveItemResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Success => "success",
            Self::InvalidItemId => "invalid item id",
            Self::ItemNotFound => "item not found",
            Self::SlotNotFound => "slot not found",
            Self::InsufficientQuantity => "insufficient quantity",
            Self::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// Outcome of an add operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOutcome {
    /// Result code
    pub result: AddItemResult,
    /// Units requested
    pub requested: u32,
    /// Units actually placed
    pub added: u32,
    /// Units that did not fit
    pub exceeded: u32,
    /// Slots that received units
    pub slots: Vec<usize>,
}

impl AddOutcome {
    pub(crate) fn rejected(result: AddItemResult, requested: u32) -> Self {
        Self {
            result,
            requested,
            added: 0,
            exceeded: requested,
            slots: Vec::new(),
        }
    }

    /// Check for success
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }

    /// Whether every requested unit was placed
    pub fn is_complete(&self) -> bool {
        self.is_success() && self.exceeded == 0
    }
}

/// Outcome of a remove operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveOutcome {
    /// Result code
    pub result: RemoveItemResult,
    /// Units requested
    pub requested: u32,
    /// Units actually removed
    pub removed: u32,
    /// Slots that lost units
    pub slots: Vec<usize>,
}

impl RemoveOutcome {
    pub(crate) fn rejected(result: RemoveItemResult, requested: u32) -> Self {
        Self {
            result,
            requested,
            removed: 0,
            slots: Vec::new(),
        }
    }

    /// Check for success
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}
