//! Item conditions gating what a container or slot accepts

use crate::item::Item;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Predicate evaluated against an incoming item
pub trait ItemCondition: Send + Sync {
    /// Check whether the item satisfies this condition
    fn check(&self, item: &Item) -> bool;

    /// Short human-readable description
    fn describe(&self) -> String {
        "custom condition".to_string()
    }
}

impl<F> ItemCondition for F
where
    F: Fn(&Item) -> bool + Send + Sync,
{
    fn check(&self, item: &Item) -> bool {
        self(item)
    }
}

impl fmt::Debug for dyn ItemCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemCondition({})", self.describe())
    }
}

/// Data-driven item filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemFilter {
    /// Allowed type tags (empty = any)
    pub allowed_types: HashSet<String>,
    /// Rejected type tags
    pub excluded_types: HashSet<String>,
    /// Allowed item ids (empty = any)
    pub allowed_items: HashSet<String>,
    /// Rejected item ids
    pub blocked_items: HashSet<String>,
    /// Attributes that must be present with the given value
    #[serde(default, with = "crate::item::attribute_map")]
    pub required_attributes: HashMap<String, serde_json::Value>,
    /// Maximum unit weight
    pub max_weight: Option<f32>,
    /// Whether stackable items are rejected
    pub reject_stackable: bool,
}

impl ItemFilter {
    /// Create a filter that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow a type tag
    pub fn with_type(mut self, item_type: impl Into<String>) -> Self {
        self.allowed_types.insert(item_type.into());
        self
    }

    /// Allow multiple type tags
    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for item_type in types {
            self.allowed_types.insert(item_type.into());
        }
        self
    }

    /// Reject a type tag
    pub fn without_type(mut self, item_type: impl Into<String>) -> Self {
        self.excluded_types.insert(item_type.into());
        self
    }

    /// Allow only specific item ids
    pub fn only_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_items = items.into_iter().map(Into::into).collect();
        self
    }

    /// Block specific item ids
    pub fn block_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for item in items {
            self.blocked_items.insert(item.into());
        }
        self
    }

    /// Require an attribute value
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.required_attributes.insert(key.into(), value);
        self
    }

    /// Limit unit weight
    pub fn with_max_weight(mut self, weight: f32) -> Self {
        self.max_weight = Some(weight);
        self
    }

    /// Reject stackable items
    pub fn non_stackable_only(mut self) -> Self {
        self.reject_stackable = true;
        self
    }

    /// Check if an item passes this filter
    pub fn passes(&self, item: &Item) -> bool {
        if self.blocked_items.contains(&item.id) {
            return false;
        }
        if !self.allowed_items.is_empty() && !self.allowed_items.contains(&item.id) {
            return false;
        }

        if self.excluded_types.contains(&item.item_type) {
            return false;
        }
        if !self.allowed_types.is_empty() && !self.allowed_types.contains(&item.item_type) {
            return false;
        }

        if self.reject_stackable && item.stackable {
            return false;
        }

        if let Some(max) = self.max_weight {
            if item.weight > max {
                return false;
            }
        }

        self.required_attributes
            .iter()
            .all(|(key, value)| item.attribute(key) == Some(value))
    }
}

impl ItemCondition for ItemFilter {
    fn check(&self, item: &Item) -> bool {
        self.passes(item)
    }

    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.allowed_types.is_empty() {
            let mut types: Vec<_> = self.allowed_types.iter().cloned().collect();
            types.sort();
            parts.push(format!("types [{}]", types.join(", ")));
        }
        if !self.allowed_items.is_empty() {
            parts.push(format!("{} allowed items", self.allowed_items.len()));
        }
        if let Some(max) = self.max_weight {
            parts.push(format!("weight <= {}", max));
        }
        if parts.is_empty() {
            "any item".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Common filter presets
impl ItemFilter {
    /// Equipment slots: weapons and armor only
    pub fn equipment() -> Self {
        Self::new().with_types(["weapon", "armor"]).non_stackable_only()
    }

    /// Consumables only
    pub fn consumables() -> Self {
        Self::new().with_type("consumable")
    }
}
