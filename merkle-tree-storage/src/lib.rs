//! Fixed-capacity, append-only Merkle tree stored in one contiguous record.
//!
//! A tree of depth `d` is a complete binary tree with `2^d` leaf slots and
//! `2^(d+1) - 1` nodes kept in 1-based heap order: node 1 is the root and
//! node `i` has children `2i` and `2i + 1`. Every node is materialized, so an
//! insertion rewrites exactly the `d + 1` slots on the new leaf's path:
//!
//! `nodes[i] = combine(nodes[2i], nodes[2i + 1])`
//!
//! Unfilled leaf slots hold [`EMPTY_LEAF`], which makes every ancestor
//! deterministic from the moment the tree is created.
//!
//! The record layout (see [`layout`]) is a fixed header followed by the node
//! table. [`TreeRecord`] is the owned, decoded form; [`TreeAccountMut`]
//! mutates an encoded record in place.

#![warn(missing_docs)]

mod account_view;
mod error;
pub mod hash;
pub mod layout;
mod pubkey;
mod record;
mod reference;
mod store;
mod tree;


pub use account_view::TreeAccountMut;
pub use error::TreeError;
pub use hash::{EMPTY_LEAF, Hash, HashScheme, MAX_DEPTH, empty_subtree_roots};
pub use layout::{AccountKey, TreeHeader, record_size};
pub use merkle_tree_storage_costs::{CostContext, CostResult, CostsExt, OperationCost};
pub use pubkey::Pubkey;
pub use record::TreeRecord;
pub use reference::compute_root;
pub use store::{AccountNodes, NodeStore, NodeTable};
pub use tree::{LeafInsertion, MerkleTree};
