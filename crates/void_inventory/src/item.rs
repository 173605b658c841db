//! Item definitions and the item registry

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Stable identifier for an item definition
pub type ItemId = String;

/// Shared reference to an item held by one or more slots
pub type ItemRef = Arc<Item>;

/// An item value.
///
/// Items are never mutated while stored; a container only keeps a shared
/// reference plus a count per slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Stable identifier
    pub id: ItemId,
    /// Display name
    pub name: String,
    /// Type tag (e.g. "weapon", "consumable")
    pub item_type: String,
    /// Whether multiple units can share a slot
    pub stackable: bool,
    /// Maximum units per slot (<= 0 means unlimited)
    pub max_stack: i32,
    /// Weight of a single unit
    pub weight: f32,
    /// Grid footprint (width, height) in cells
    pub size: (u32, u32),
    /// Free-form attributes
    #[serde(default, with = "attribute_map")]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl Item {
    /// Create a new non-stackable 1x1 item
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            item_type: String::new(),
            stackable: false,
            max_stack: 1,
            weight: 0.0,
            size: (1, 1),
            attributes: HashMap::new(),
        }
    }

    /// Set the type tag
    pub fn with_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = item_type.into();
        self
    }

    /// Make the item stackable up to `max_stack` units (<= 0 for unlimited)
    pub fn with_stack(mut self, max_stack: i32) -> Self {
        self.stackable = true;
        self.max_stack = max_stack;
        self
    }

    /// Set the unit weight
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    /// Set the grid footprint
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width.max(1), height.max(1));
        self
    }

    /// Set an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Wrap into a shared reference
    pub fn into_ref(self) -> ItemRef {
        Arc::new(self)
    }

    /// Maximum units a single slot can hold, `None` when unlimited
    pub fn stack_limit(&self) -> Option<u32> {
        if !self.stackable {
            Some(1)
        } else if self.max_stack <= 0 {
            None
        } else {
            Some(self.max_stack as u32)
        }
    }

    /// Spare units a slot holding `count` of this item can still take.
    ///
    /// Unlimited stacks are still bounded by the `u32` count range.
    pub fn spare_capacity(&self, count: u32) -> u32 {
        self.stack_limit().unwrap_or(u32::MAX).saturating_sub(count)
    }

    /// Whether a slot holding `count` units can take more
    pub fn has_room(&self, count: u32) -> bool {
        self.stackable && self.spare_capacity(count) > 0
    }

    /// Whether the item covers more than one grid cell
    pub fn is_multi_cell(&self) -> bool {
        self.size.0 > 1 || self.size.1 > 1
    }

    /// Get an attribute
    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }
}

/// Serde adapter for attribute maps.
///
/// Human-readable formats store the values as they are. Binary formats such
/// as bincode cannot decode a `serde_json::Value`, so each value is written
/// as its JSON text instead.
pub(crate) mod attribute_map {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;

    type Attributes = HashMap<String, serde_json::Value>;

    pub fn serialize<S: Serializer>(attributes: &Attributes, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            return attributes.serialize(serializer);
        }
        let encoded: HashMap<&str, String> = attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.to_string()))
            .collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Attributes, D::Error> {
        if deserializer.is_human_readable() {
            return Attributes::deserialize(deserializer);
        }
        HashMap::<String, String>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, text)| {
                serde_json::from_str(&text)
                    .map(|value| (key, value))
                    .map_err(D::Error::custom)
            })
            .collect()
    }
}

/// Registry of item prototypes, standing in for the item factory.
#[derive(Debug, Default, Clone)]
pub struct ItemRegistry {
    prototypes: HashMap<ItemId, ItemRef>,
}

impl ItemRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prototype, replacing any previous one with the same id
    pub fn register(&mut self, item: Item) -> ItemRef {
        let item = item.into_ref();
        self.prototypes.insert(item.id.clone(), item.clone());
        item
    }

    /// Resolve an item id
    pub fn get(&self, id: &str) -> Option<ItemRef> {
        self.prototypes.get(id).cloned()
    }

    /// Check if an id is registered
    pub fn contains(&self, id: &str) -> bool {
        self.prototypes.contains_key(id)
    }

    /// Number of registered prototypes
    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}
