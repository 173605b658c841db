//! Error types for container construction and structure changes

use thiserror::Error;

/// Inventory errors.
///
/// Ordinary add/remove failures are reported through result codes; these
/// cover configuration faults, snapshot restore and grid structure changes.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Capacity below -1
    #[error("Invalid capacity: {0} (use -1 for unbounded)")]
    InvalidCapacity(i64),

    /// Grid with a zero dimension
    #[error("Invalid grid size: {width}x{height}")]
    InvalidGridSize { width: usize, height: usize },

    /// Snapshot does not fit this container
    #[error("Snapshot mismatch: {0}")]
    SnapshotMismatch(String),

    /// Slot index outside the container
    #[error("Slot {index} out of range (slot count {len})")]
    SlotOutOfRange { index: usize, len: usize },

    /// Footprint overlaps another item or leaves the grid
    #[error("Footprint {width}x{height} at ({x}, {y}) is blocked")]
    FootprintBlocked {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    /// Slot does not hold a placed item
    #[error("Slot {0} does not hold a placed item")]
    NotAnAnchor(usize),

    /// Rotated footprint does not fit
    #[error("Rotation of item at slot {0} is blocked")]
    RotationBlocked(usize),

    /// Invalid configuration
    #[error("Invalid container configuration: {0}")]
    Config(String),

    /// Bulk add worker did not deliver an outcome
    #[error("Bulk add worker failed: {0}")]
    BulkWorker(String),
}

/// Result type for inventory operations
pub type Result<T> = std::result::Result<T, InventoryError>;
