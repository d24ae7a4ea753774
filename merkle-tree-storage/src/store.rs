use crate::{
    CostResult, CostsExt, EMPTY_LEAF, Hash, OperationCost, TreeError,
    layout::{NODE_SIZE, node_count},
};

/// Random-access storage for the node table of one tree.
///
/// Indices are 1-based heap indices. Implementations only check bounds;
/// the tree invariants are maintained by [`MerkleTree`](crate::MerkleTree).
pub trait NodeStore {
    /// Number of node slots.
    fn node_count(&self) -> u64;
    /// Read the node at heap index `index`.
    fn get_node(&self, index: u64) -> CostResult<Hash, TreeError>;
    /// Overwrite the node at heap index `index`.
    fn put_node(&mut self, index: u64, node: &Hash) -> CostResult<(), TreeError>;
}

fn check_index(index: u64, node_count: u64) -> Result<usize, TreeError> {
    if index == 0 || index > node_count {
        return Err(TreeError::NodeIndexOutOfRange { index, node_count });
    }
    Ok((index - 1) as usize)
}

/// Owned node table, slot `i - 1` holding heap node `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTable(Vec<Hash>);

impl NodeTable {
    /// A table for a tree of `depth` with every slot set to [`EMPTY_LEAF`].
    pub fn new(depth: u8) -> Self {
        NodeTable(vec![EMPTY_LEAF; node_count(depth) as usize])
    }

    /// Wrap decoded nodes.
    pub fn from_nodes(nodes: Vec<Hash>) -> Self {
        NodeTable(nodes)
    }

    /// All nodes in heap order.
    pub fn as_slice(&self) -> &[Hash] {
        &self.0
    }
}

impl NodeStore for NodeTable {
    fn node_count(&self) -> u64 {
        self.0.len() as u64
    }

    fn get_node(&self, index: u64) -> CostResult<Hash, TreeError> {
        match check_index(index, self.node_count()) {
            Ok(slot) => Ok(self.0[slot]).wrap_with_cost(OperationCost::slot_read(NODE_SIZE as u64)),
            Err(e) => Err(e).wrap_with_cost(OperationCost::default()),
        }
    }

    fn put_node(&mut self, index: u64, node: &Hash) -> CostResult<(), TreeError> {
        match check_index(index, self.node_count()) {
            Ok(slot) => {
                self.0[slot] = *node;
                Ok(()).wrap_with_cost(OperationCost::slot_write(NODE_SIZE as u64))
            }
            Err(e) => Err(e).wrap_with_cost(OperationCost::default()),
        }
    }
}

/// Node table borrowed from an encoded record.
///
/// Reads and writes go straight to the record bytes; nothing is
/// re-serialized.
pub struct AccountNodes<'a> {
    bytes: &'a mut [u8],
}

impl<'a> AccountNodes<'a> {
    /// Wrap the node table region of a record.
    ///
    /// The region length must be a whole number of slots.
    pub fn new(bytes: &'a mut [u8]) -> Result<Self, TreeError> {
        if bytes.len() % NODE_SIZE != 0 {
            return Err(TreeError::CorruptLayout(format!(
                "node table of {} bytes is not a multiple of {}",
                bytes.len(),
                NODE_SIZE
            )));
        }
        Ok(AccountNodes { bytes })
    }
}

impl NodeStore for AccountNodes<'_> {
    fn node_count(&self) -> u64 {
        (self.bytes.len() / NODE_SIZE) as u64
    }

    fn get_node(&self, index: u64) -> CostResult<Hash, TreeError> {
        match check_index(index, self.node_count()) {
            Ok(slot) => {
                let start = slot * NODE_SIZE;
                let mut node = [0u8; NODE_SIZE];
                node.copy_from_slice(&self.bytes[start..start + NODE_SIZE]);
                Ok(node).wrap_with_cost(OperationCost::slot_read(NODE_SIZE as u64))
            }
            Err(e) => Err(e).wrap_with_cost(OperationCost::default()),
        }
    }

    fn put_node(&mut self, index: u64, node: &Hash) -> CostResult<(), TreeError> {
        match check_index(index, self.node_count()) {
            Ok(slot) => {
                let start = slot * NODE_SIZE;
                self.bytes[start..start + NODE_SIZE].copy_from_slice(node);
                Ok(()).wrap_with_cost(OperationCost::slot_write(NODE_SIZE as u64))
            }
            Err(e) => Err(e).wrap_with_cost(OperationCost::default()),
        }
    }
}
