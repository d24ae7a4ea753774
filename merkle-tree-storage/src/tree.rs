use merkle_tree_storage_costs::{cost_return_on_error, cost_return_on_error_no_add};

use crate::{
    CostResult, CostsExt, EMPTY_LEAF, Hash, HashScheme, NodeStore, OperationCost, Pubkey,
    TreeError,
    hash::{MAX_DEPTH, empty_subtree_roots, validate_depth},
    layout::{TreeHeader, capacity, first_leaf_index, leaf_node_index, node_count},
};

/// Outcome of a successful insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafInsertion {
    /// 0-based position of the inserted leaf.
    pub index: u64,
    /// Root after the insertion.
    pub root: Hash,
}

/// The tree state machine.
///
/// Holds the header state (authority, depth, scheme, leaf count, root) and
/// applies operations against a [`NodeStore`] holding the node table. The
/// header is the caller's to persist; every operation either fully applies
/// or returns an error before touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MerkleTree {
    header: TreeHeader,
}

fn check_store_size<S: NodeStore>(store: &S, depth: u8) -> Result<(), TreeError> {
    let expected = node_count(depth);
    if store.node_count() != expected {
        return Err(TreeError::CorruptLayout(format!(
            "node table has {} slots, depth {} needs {}",
            store.node_count(),
            depth,
            expected
        )));
    }
    Ok(())
}

impl MerkleTree {
    /// Initialize an empty tree of `max_depth` in `store`.
    ///
    /// Every leaf slot gets [`EMPTY_LEAF`] and every internal node the root
    /// of an all-sentinel subtree of its height, so this costs `max_depth`
    /// hash calls regardless of capacity.
    pub fn create<S: NodeStore>(
        authority: Pubkey,
        max_depth: u8,
        hash_scheme: HashScheme,
        store: &mut S,
    ) -> CostResult<Self, TreeError> {
        let mut cost = OperationCost::default();
        cost_return_on_error_no_add!(cost, validate_depth(max_depth, MAX_DEPTH));
        cost_return_on_error_no_add!(cost, check_store_size(store, max_depth));

        let empty_roots = empty_subtree_roots(hash_scheme, max_depth);
        cost.hash_node_calls += max_depth as u32;

        // Heap level `level` (root at 0) holds subtrees of height
        // `max_depth - level`.
        for level in 0..=max_depth {
            let node = empty_roots[(max_depth - level) as usize];
            let start = 1u64 << level;
            for index in start..start << 1 {
                cost_return_on_error!(&mut cost, store.put_node(index, &node));
            }
        }

        let header = TreeHeader {
            authority,
            max_depth,
            hash_scheme,
            leaf_count: 0,
            root: empty_roots[max_depth as usize],
        };
        Ok(MerkleTree { header }).wrap_with_cost(cost)
    }

    /// Reconstitute a tree from a stored header.
    pub fn from_header(header: TreeHeader) -> Result<Self, TreeError> {
        validate_depth(header.max_depth, MAX_DEPTH)?;
        if header.leaf_count as u64 > header.capacity() {
            return Err(TreeError::CorruptLayout(format!(
                "leaf count {} exceeds capacity {} for depth {}",
                header.leaf_count,
                header.capacity(),
                header.max_depth
            )));
        }
        Ok(MerkleTree { header })
    }

    /// Current header state.
    pub fn header(&self) -> &TreeHeader {
        &self.header
    }

    /// Identity allowed to insert leaves.
    pub fn authority(&self) -> Pubkey {
        self.header.authority
    }

    /// Depth of the tree.
    pub fn max_depth(&self) -> u8 {
        self.header.max_depth
    }

    /// Combine function of the internal nodes.
    pub fn hash_scheme(&self) -> HashScheme {
        self.header.hash_scheme
    }

    /// `2^max_depth`.
    pub fn capacity(&self) -> u64 {
        capacity(self.header.max_depth)
    }

    /// Number of inserted leaves.
    pub fn leaf_count(&self) -> u64 {
        self.header.leaf_count as u64
    }

    /// Root hash; always equal to node 1 of the store.
    pub fn current_root(&self) -> Hash {
        self.header.root
    }

    /// `true` once every leaf slot is filled.
    pub fn is_full(&self) -> bool {
        self.leaf_count() == self.capacity()
    }

    /// Append `leaf` at the next free slot and rehash its path to the root.
    ///
    /// Costs exactly `max_depth` hash calls, `max_depth` slot reads (the
    /// siblings) and `max_depth + 1` slot writes.
    pub fn insert_leaf<S: NodeStore>(
        &mut self,
        leaf: Hash,
        store: &mut S,
    ) -> CostResult<LeafInsertion, TreeError> {
        let mut cost = OperationCost::default();
        if self.is_full() {
            return Err(TreeError::TreeFull {
                capacity: self.capacity(),
                leaf_count: self.leaf_count(),
            })
            .wrap_with_cost(cost);
        }
        cost_return_on_error_no_add!(cost, check_store_size(store, self.header.max_depth));

        let position = self.leaf_count();
        let mut index = leaf_node_index(self.header.max_depth, position);
        cost_return_on_error!(&mut cost, store.put_node(index, &leaf));

        let mut node = leaf;
        while index > 1 {
            let sibling = cost_return_on_error!(&mut cost, store.get_node(index ^ 1));
            let parent = if index & 1 == 0 {
                self.header.hash_scheme.combine(&node, &sibling)
            } else {
                self.header.hash_scheme.combine(&sibling, &node)
            };
            cost.hash_node_calls += 1;
            index >>= 1;
            cost_return_on_error!(&mut cost, store.put_node(index, &parent));
            node = parent;
        }

        self.header.leaf_count += 1;
        self.header.root = node;
        Ok(LeafInsertion {
            index: position,
            root: node,
        })
        .wrap_with_cost(cost)
    }

    /// The `k`-th inserted leaf, or `None` if fewer than `k + 1` leaves exist.
    pub fn get_leaf<S: NodeStore>(&self, k: u64, store: &S) -> CostResult<Option<Hash>, TreeError> {
        if k >= self.leaf_count() {
            return Ok(None).wrap_with_cost(OperationCost::default());
        }
        store
            .get_node(leaf_node_index(self.header.max_depth, k))
            .map_ok(Some)
    }

    /// Recheck every invariant against `store`.
    ///
    /// Unfilled leaf slots must hold [`EMPTY_LEAF`], every internal node must
    /// be the combination of its children and node 1 must equal the cached
    /// root. Reads the whole node table.
    pub fn audit<S: NodeStore>(&self, store: &S) -> CostResult<(), TreeError> {
        let mut cost = OperationCost::default();
        let depth = self.header.max_depth;
        cost_return_on_error_no_add!(cost, check_store_size(store, depth));

        let first_leaf = first_leaf_index(depth);
        for index in leaf_node_index(depth, self.leaf_count())..first_leaf << 1 {
            let node = cost_return_on_error!(&mut cost, store.get_node(index));
            if node != EMPTY_LEAF {
                return Err(TreeError::CorruptLayout(format!(
                    "unfilled leaf slot {} is not empty",
                    index
                )))
                .wrap_with_cost(cost);
            }
        }

        for index in (1..first_leaf).rev() {
            let left = cost_return_on_error!(&mut cost, store.get_node(index << 1));
            let right = cost_return_on_error!(&mut cost, store.get_node((index << 1) | 1));
            let node = cost_return_on_error!(&mut cost, store.get_node(index));
            cost.hash_node_calls += 1;
            if self.header.hash_scheme.combine(&left, &right) != node {
                return Err(TreeError::CorruptLayout(format!(
                    "node {} does not match its children",
                    index
                )))
                .wrap_with_cost(cost);
            }
        }

        let stored_root = cost_return_on_error!(&mut cost, store.get_node(1));
        if stored_root != self.header.root {
            return Err(TreeError::CorruptLayout(
                "cached root differs from node 1".to_string(),
            ))
            .wrap_with_cost(cost);
        }
        Ok(()).wrap_with_cost(cost)
    }
}
