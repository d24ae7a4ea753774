#![deny(missing_docs)]
//! Cost accounting shared by the tree engine and its dispatcher.
//!
//! Every operation that touches a tree record reports how many node
//! combinations it performed and how much of the record it read and wrote.
//! The numbers are exact, not estimates: an insertion into a tree of depth
//! `d` always reports `d` hash calls and `d + 1` slot writes.

pub mod context;

use std::ops::{Add, AddAssign};

pub use context::{CostContext, CostResult, CostsExt};

/// Resources consumed by a single operation against a tree record.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct OperationCost {
    /// Node slots read from the node table.
    pub slots_loaded: u32,
    /// Node slots written to the node table.
    pub slots_written: u32,
    /// Bytes read from the record, header fields included.
    pub storage_loaded_bytes: u64,
    /// Bytes written to the record, header fields included.
    pub storage_written_bytes: u64,
    /// Two-to-one node combinations.
    pub hash_node_calls: u32,
}

impl OperationCost {
    /// `true` when nothing was read, written or hashed.
    pub fn is_nothing(&self) -> bool {
        *self == Self::default()
    }

    /// Cost of `calls` node combinations and nothing else.
    pub fn with_hash_node_calls(calls: u32) -> Self {
        OperationCost {
            hash_node_calls: calls,
            ..Default::default()
        }
    }

    /// Cost of reading one slot of `bytes` bytes.
    pub fn slot_read(bytes: u64) -> Self {
        OperationCost {
            slots_loaded: 1,
            storage_loaded_bytes: bytes,
            ..Default::default()
        }
    }

    /// Cost of writing one slot of `bytes` bytes.
    pub fn slot_write(bytes: u64) -> Self {
        OperationCost {
            slots_written: 1,
            storage_written_bytes: bytes,
            ..Default::default()
        }
    }

    /// Cost of writing `bytes` header bytes. Header fields are not slots.
    pub fn header_write(bytes: u64) -> Self {
        OperationCost {
            storage_written_bytes: bytes,
            ..Default::default()
        }
    }
}

impl Add for OperationCost {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign for OperationCost {
    fn add_assign(&mut self, rhs: Self) {
        self.slots_loaded += rhs.slots_loaded;
        self.slots_written += rhs.slots_written;
        self.storage_loaded_bytes += rhs.storage_loaded_bytes;
        self.storage_written_bytes += rhs.storage_written_bytes;
        self.hash_node_calls += rhs.hash_node_calls;
    }
}

/// Early-return helper for functions producing a [`CostResult`].
///
/// Unwraps a `CostResult`, adds its cost to the accumulator and returns the
/// `Ok` value. On `Err` the function returns immediately with everything
/// accumulated so far, so partial work is still accounted for.
#[macro_export]
macro_rules! cost_return_on_error {
    ( &mut $cost:ident, $($body:tt)+ ) => {
        {
            use $crate::CostsExt;
            let result_with_cost = { $($body)+ };
            let result = result_with_cost.unwrap_add_cost(&mut $cost);
            match result {
                Ok(x) => x,
                Err(e) => return Err(e.into()).wrap_with_cost($cost),
            }
        }
    };
}

/// Like [`cost_return_on_error!`] but for a plain `Result`: nothing is added
/// to the accumulator, which is returned as-is on error.
#[macro_export]
macro_rules! cost_return_on_error_no_add {
    ( $cost:ident, $($body:tt)+ ) => {
        {
            use $crate::CostsExt;
            let result = { $($body)+ };
            match result {
                Ok(x) => x,
                Err(e) => return Err(e.into()).wrap_with_cost($cost),
            }
        }
    };
}
