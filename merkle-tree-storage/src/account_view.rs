use merkle_tree_storage_costs::{cost_return_on_error, cost_return_on_error_no_add};

use crate::{
    AccountNodes, CostResult, CostsExt, Hash, HashScheme, LeafInsertion, MerkleTree, NodeStore,
    OperationCost, Pubkey, TreeError,
    hash::{MAX_DEPTH, validate_depth},
    layout::{
        HEADER_SIZE, PROGRESS_BYTES, TreeHeader, check_record_size, is_uninitialized,
        read_max_depth,
    },
};

/// A tree record mutated in place inside an account's data buffer.
///
/// Only the slots an operation touches are read or written, plus the header
/// fields it changes.
pub struct TreeAccountMut<'a> {
    tree: MerkleTree,
    header: &'a mut [u8],
    nodes: AccountNodes<'a>,
}

impl<'a> TreeAccountMut<'a> {
    /// Open an encoded record declared to have `max_depth`.
    pub fn load(data: &'a mut [u8], max_depth: u8) -> Result<Self, TreeError> {
        validate_depth(max_depth, MAX_DEPTH)?;
        check_record_size(data, max_depth)?;
        let header = TreeHeader::decode(data)?;
        if header.max_depth != max_depth {
            return Err(TreeError::CorruptLayout(format!(
                "header declares depth {}, expected {}",
                header.max_depth, max_depth
            )));
        }
        let tree = MerkleTree::from_header(header)?;

        let (header_bytes, node_bytes) = data.split_at_mut(HEADER_SIZE);
        let nodes = AccountNodes::new(node_bytes)?;
        if nodes.get_node(1).value? != header.root {
            return Err(TreeError::CorruptLayout(
                "cached root differs from node 1".to_string(),
            ));
        }
        Ok(TreeAccountMut {
            tree,
            header: header_bytes,
            nodes,
        })
    }

    /// Open an encoded record at the depth its own header declares.
    pub fn load_declared(data: &'a mut [u8]) -> Result<Self, TreeError> {
        let max_depth = read_max_depth(data)?;
        Self::load(data, max_depth)
    }

    /// Write a fresh empty tree into zeroed storage of exactly
    /// `record_size(max_depth)` bytes.
    pub fn initialize(
        data: &'a mut [u8],
        authority: Pubkey,
        max_depth: u8,
        hash_scheme: HashScheme,
    ) -> CostResult<Self, TreeError> {
        let mut cost = OperationCost::default();
        cost_return_on_error_no_add!(cost, validate_depth(max_depth, MAX_DEPTH));
        cost_return_on_error_no_add!(cost, check_record_size(data, max_depth));
        if !is_uninitialized(data) {
            return Err(TreeError::CorruptLayout(
                "record is already initialized".to_string(),
            ))
            .wrap_with_cost(cost);
        }

        let (header_bytes, node_bytes) = data.split_at_mut(HEADER_SIZE);
        let mut nodes = cost_return_on_error_no_add!(cost, AccountNodes::new(node_bytes));
        let tree = cost_return_on_error!(
            &mut cost,
            MerkleTree::create(authority, max_depth, hash_scheme, &mut nodes)
        );
        header_bytes.copy_from_slice(&tree.header().encode());
        cost += OperationCost::header_write(HEADER_SIZE as u64);

        Ok(TreeAccountMut {
            tree,
            header: header_bytes,
            nodes,
        })
        .wrap_with_cost(cost)
    }

    /// Append a leaf in place. On error no byte of the record changes.
    pub fn insert_leaf(&mut self, leaf: Hash) -> CostResult<LeafInsertion, TreeError> {
        let mut cost = OperationCost::default();
        let insertion = cost_return_on_error!(
            &mut cost,
            self.tree.insert_leaf(leaf, &mut self.nodes)
        );
        self.tree.header().write_progress(self.header);
        cost += OperationCost::header_write(PROGRESS_BYTES);
        Ok(insertion).wrap_with_cost(cost)
    }

    /// The state machine view of this record.
    pub fn tree(&self) -> &MerkleTree {
        &self.tree
    }

    /// Root hash.
    pub fn current_root(&self) -> Hash {
        self.tree.current_root()
    }

    /// `true` once every leaf slot is filled.
    pub fn is_full(&self) -> bool {
        self.tree.is_full()
    }

    /// The `k`-th inserted leaf.
    pub fn leaf(&self, k: u64) -> CostResult<Option<Hash>, TreeError> {
        self.tree.get_leaf(k, &self.nodes)
    }

    /// Recheck every tree invariant. See [`MerkleTree::audit`].
    pub fn audit(&self) -> CostResult<(), TreeError> {
        self.tree.audit(&self.nodes)
    }
}
