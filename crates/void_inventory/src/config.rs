//! Container configuration

use crate::error::{InventoryError, Result};
use serde::{Deserialize, Serialize};

/// Candidate stack count above which stacking sorts by spare capacity
pub const DEFAULT_STACK_SORT_THRESHOLD: usize = 20;

/// Unit count above which the bulk adder moves work to a worker thread
pub const DEFAULT_BULK_ADD_THRESHOLD: u32 = 1000;

/// Slot capacity of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capacity {
    /// Grows without limit
    Unbounded,
    /// Fixed number of slots
    Fixed(usize),
}

impl Capacity {
    /// Convert from the `-1 = unbounded` integer form
    pub fn from_raw(raw: i64) -> Result<Self> {
        match raw {
            -1 => Ok(Self::Unbounded),
            n if n >= 0 => Ok(Self::Fixed(n as usize)),
            n => Err(InventoryError::InvalidCapacity(n)),
        }
    }

    /// Integer form (`-1` for unbounded)
    pub fn to_raw(self) -> i64 {
        match self {
            Self::Unbounded => -1,
            Self::Fixed(n) => n as i64,
        }
    }

    /// Fixed slot count, if any
    pub fn limit(self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Fixed(n) => Some(n),
        }
    }

    /// Whether `len` slots leave room to grow
    pub fn allows_growth(self, len: usize) -> bool {
        self.limit().map_or(true, |limit| len < limit)
    }
}

/// Kind of container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ContainerKind {
    /// Linear list of slots
    #[default]
    Linear,
    /// Two-dimensional grid of cells
    Grid,
}

/// Container configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Container identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Linear or grid
    pub kind: ContainerKind,
    /// Slot capacity (-1 = unbounded); ignored for grids
    pub capacity: i64,
    /// Grid width in cells
    pub grid_width: usize,
    /// Grid height in cells
    pub grid_height: usize,
    /// Sort stacking candidates by spare room above this many candidates
    pub stack_sort_threshold: usize,
    /// Unit count above which bulk adds run on a worker thread
    pub bulk_add_threshold: u32,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            kind: ContainerKind::Linear,
            capacity: -1,
            grid_width: 0,
            grid_height: 0,
            stack_sort_threshold: DEFAULT_STACK_SORT_THRESHOLD,
            bulk_add_threshold: DEFAULT_BULK_ADD_THRESHOLD,
        }
    }
}

impl ContainerConfig {
    /// Linear container with a fixed capacity (-1 = unbounded)
    pub fn linear(id: impl Into<String>, capacity: i64) -> Self {
        Self {
            id: id.into(),
            capacity,
            ..Default::default()
        }
    }

    /// Grid container
    pub fn grid(id: impl Into<String>, width: usize, height: usize) -> Self {
        Self {
            id: id.into(),
            kind: ContainerKind::Grid,
            capacity: (width * height) as i64,
            grid_width: width,
            grid_height: height,
            ..Default::default()
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the stacking sort threshold
    pub fn with_stack_sort_threshold(mut self, threshold: usize) -> Self {
        self.stack_sort_threshold = threshold;
        self
    }

    /// Set the bulk add threshold
    pub fn with_bulk_add_threshold(mut self, threshold: u32) -> Self {
        self.bulk_add_threshold = threshold;
        self
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| InventoryError::Config(e.to_string()))
    }

    /// Validate and resolve the capacity
    pub fn capacity(&self) -> Result<Capacity> {
        match self.kind {
            ContainerKind::Linear => Capacity::from_raw(self.capacity),
            ContainerKind::Grid => {
                if self.grid_width == 0 || self.grid_height == 0 {
                    return Err(InventoryError::InvalidGridSize {
                        width: self.grid_width,
                        height: self.grid_height,
                    });
                }
                Ok(Capacity::Fixed(self.grid_width * self.grid_height))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_from_raw() {
        assert_eq!(Capacity::from_raw(-1).unwrap(), Capacity::Unbounded);
        assert_eq!(Capacity::from_raw(12).unwrap(), Capacity::Fixed(12));
        assert!(matches!(Capacity::from_raw(-5), Err(InventoryError::InvalidCapacity(-5))));
        assert!(Capacity::Unbounded.allows_growth(usize::MAX - 1));
        assert!(!Capacity::Fixed(2).allows_growth(2));
    }

    #[test]
    fn test_config_from_json() {
        let config = ContainerConfig::from_json(
            r#"{ "id": "backpack", "name": "Backpack", "capacity": 24 }"#,
        )
        .unwrap();

        assert_eq!(config.kind, ContainerKind::Linear);
        assert_eq!(config.capacity().unwrap(), Capacity::Fixed(24));
        assert_eq!(config.stack_sort_threshold, DEFAULT_STACK_SORT_THRESHOLD);
    }

    #[test]
    fn test_grid_config() {
        let config = ContainerConfig::grid("stash", 10, 6);
        assert_eq!(config.capacity().unwrap(), Capacity::Fixed(60));

        let broken = ContainerConfig::grid("broken", 0, 6);
        assert!(matches!(broken.capacity(), Err(InventoryError::InvalidGridSize { .. })));
        assert!(ContainerConfig::from_json("{ not json").is_err());
    }
}
