use merkle_tree_storage_costs::cost_return_on_error;

use crate::{
    CostResult, CostsExt, Hash, HashScheme, LeafInsertion, MerkleTree, NodeStore, NodeTable,
    OperationCost, Pubkey, TreeError,
    layout::{HEADER_SIZE, NODE_SIZE, TreeHeader, check_record_size, leaf_node_index, record_size},
};

/// A decoded tree record: header state plus an owned node table.
///
/// [`TreeRecord::encode`] and [`TreeRecord::decode`] are inverse; the encoded
/// form is the persisted account layout described in [`crate::layout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRecord {
    tree: MerkleTree,
    nodes: NodeTable,
}

impl TreeRecord {
    /// Create an empty record using the default hash scheme.
    pub fn initialize(authority: Pubkey, max_depth: u8) -> CostResult<Self, TreeError> {
        Self::initialize_with_scheme(authority, max_depth, HashScheme::default())
    }

    /// Create an empty record with an explicit hash scheme.
    pub fn initialize_with_scheme(
        authority: Pubkey,
        max_depth: u8,
        hash_scheme: HashScheme,
    ) -> CostResult<Self, TreeError> {
        let mut cost = OperationCost::default();
        if let Err(e) = crate::hash::validate_depth(max_depth, crate::MAX_DEPTH) {
            return Err(e).wrap_with_cost(cost);
        }
        let mut nodes = NodeTable::new(max_depth);
        let tree = cost_return_on_error!(
            &mut cost,
            MerkleTree::create(authority, max_depth, hash_scheme, &mut nodes)
        );
        Ok(TreeRecord { tree, nodes }).wrap_with_cost(cost)
    }

    /// Append a leaf. Fails with [`TreeError::TreeFull`] at capacity, leaving
    /// the record unchanged.
    pub fn insert_leaf(&mut self, leaf: Hash) -> CostResult<LeafInsertion, TreeError> {
        self.tree.insert_leaf(leaf, &mut self.nodes)
    }

    /// Root hash.
    pub fn current_root(&self) -> Hash {
        self.tree.current_root()
    }

    /// `true` once every leaf slot is filled.
    pub fn is_full(&self) -> bool {
        self.tree.is_full()
    }

    /// Number of inserted leaves.
    pub fn leaf_count(&self) -> u64 {
        self.tree.leaf_count()
    }

    /// `2^max_depth`.
    pub fn capacity(&self) -> u64 {
        self.tree.capacity()
    }

    /// Identity allowed to insert leaves.
    pub fn authority(&self) -> Pubkey {
        self.tree.authority()
    }

    /// Depth of the tree.
    pub fn max_depth(&self) -> u8 {
        self.tree.max_depth()
    }

    /// Header state.
    pub fn header(&self) -> &TreeHeader {
        self.tree.header()
    }

    /// The state machine view of this record.
    pub fn tree(&self) -> &MerkleTree {
        &self.tree
    }

    /// All nodes in heap order (slot 0 is node 1).
    pub fn nodes(&self) -> &[Hash] {
        self.nodes.as_slice()
    }

    /// Node at 1-based heap index `index`.
    pub fn node(&self, index: u64) -> Option<Hash> {
        self.nodes.get_node(index).value.ok()
    }

    /// The `k`-th inserted leaf.
    pub fn leaf(&self, k: u64) -> Option<Hash> {
        if k >= self.leaf_count() {
            return None;
        }
        self.node(leaf_node_index(self.max_depth(), k))
    }

    /// Recheck every tree invariant. See [`MerkleTree::audit`].
    pub fn audit(&self) -> CostResult<(), TreeError> {
        self.tree.audit(&self.nodes)
    }

    /// Encode into a freshly allocated buffer of `record_size(max_depth)`
    /// bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(record_size(self.max_depth()));
        buf.extend_from_slice(&self.header().encode());
        for node in self.nodes.as_slice() {
            buf.extend_from_slice(node);
        }
        buf
    }

    /// Encode into an existing buffer, which must be exactly
    /// `record_size(max_depth)` bytes.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<(), TreeError> {
        check_record_size(buf, self.max_depth())?;
        let (header, nodes) = buf.split_at_mut(HEADER_SIZE);
        header.copy_from_slice(&self.header().encode());
        for (slot, node) in nodes
            .chunks_exact_mut(NODE_SIZE)
            .zip(self.nodes.as_slice())
        {
            slot.copy_from_slice(node);
        }
        Ok(())
    }

    /// Decode a record declared to have `max_depth`.
    ///
    /// Fails with [`TreeError::CorruptLayout`] if the length does not match
    /// the declared depth, the header disagrees with it, or the cached root
    /// differs from node 1.
    pub fn decode(bytes: &[u8], max_depth: u8) -> Result<Self, TreeError> {
        crate::hash::validate_depth(max_depth, crate::MAX_DEPTH)?;
        check_record_size(bytes, max_depth)?;
        let header = TreeHeader::decode(bytes)?;
        if header.max_depth != max_depth {
            return Err(TreeError::CorruptLayout(format!(
                "header declares depth {}, expected {}",
                header.max_depth, max_depth
            )));
        }
        let nodes: Vec<Hash> = bytes[HEADER_SIZE..]
            .chunks_exact(NODE_SIZE)
            .map(|chunk| {
                let mut node = [0u8; NODE_SIZE];
                node.copy_from_slice(chunk);
                node
            })
            .collect();
        if nodes[0] != header.root {
            return Err(TreeError::CorruptLayout(
                "cached root differs from node 1".to_string(),
            ));
        }
        Ok(TreeRecord {
            tree: MerkleTree::from_header(header)?,
            nodes: NodeTable::from_nodes(nodes),
        })
    }
}
