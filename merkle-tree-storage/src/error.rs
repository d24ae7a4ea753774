use thiserror::Error;

/// Errors from tree layout and tree state machine operations.
///
/// Every variant is raised before the record is touched, so a failed
/// operation leaves the stored bytes unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Requested depth is 0 or above the supported bound.
    #[error("invalid depth {depth}: must be between 1 and {max}")]
    InvalidDepth {
        /// Depth requested.
        depth: u8,
        /// Deepest allowed.
        max: u8,
    },
    /// Stored bytes do not match the layout for their declared depth.
    #[error("corrupt layout: {0}")]
    CorruptLayout(String),
    /// Insertion at capacity.
    #[error("tree is full (capacity {capacity}, leaf count {leaf_count})")]
    TreeFull {
        /// `2^max_depth`.
        capacity: u64,
        /// Leaves already inserted.
        leaf_count: u64,
    },
    /// Heap index outside `1..=node_count`.
    #[error("node index {index} out of range (node count {node_count})")]
    NodeIndexOutOfRange {
        /// Index requested.
        index: u64,
        /// Slots in the table.
        node_count: u64,
    },
}
