//! Byte layout of a persisted tree record.
//!
//! ```text
//! offset  size  field
//!      0     1  account key (0 = uninitialized, 1 = MerkleTreeV1)
//!      1    32  authority
//!     33     1  max depth
//!     34     1  hash scheme
//!     35     4  leaf count (u32, big-endian)
//!     39    32  root (cached copy of node 1)
//!     71   ...  node table, (2^(depth+1) - 1) slots of 32 bytes
//! ```
//!
//! Heap node `i` (1-based) lives at `HEADER_SIZE + (i - 1) * NODE_SIZE`.

use crate::{
    Hash, HashScheme, Pubkey, TreeError,
    hash::{MAX_DEPTH, validate_depth},
};

/// Offset of the account key byte.
pub const ACCOUNT_KEY_OFFSET: usize = 0;
/// Offset of the 32-byte authority.
pub const AUTHORITY_OFFSET: usize = 1;
/// Offset of the depth byte.
pub const MAX_DEPTH_OFFSET: usize = 33;
/// Offset of the hash scheme byte.
pub const HASH_SCHEME_OFFSET: usize = 34;
/// Offset of the big-endian `u32` leaf count.
pub const LEAF_COUNT_OFFSET: usize = 35;
/// Offset of the cached root.
pub const ROOT_OFFSET: usize = 39;
/// Size of the header preceding the node table.
pub const HEADER_SIZE: usize = 71;
/// Size of one node slot.
pub const NODE_SIZE: usize = 32;

/// First byte of every record, identifying what the account holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AccountKey {
    /// Zeroed or freshly allocated storage.
    Uninitialized = 0,
    /// A tree record in this layout.
    MerkleTreeV1 = 1,
}

impl AccountKey {
    /// Decode the key byte. Unknown bytes yield `None`.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(AccountKey::Uninitialized),
            1 => Some(AccountKey::MerkleTreeV1),
            _ => None,
        }
    }
}

/// Number of leaf slots in a tree of `depth`.
pub fn capacity(depth: u8) -> u64 {
    1u64 << depth
}

/// Number of nodes, leaves included, in a tree of `depth`.
pub fn node_count(depth: u8) -> u64 {
    (1u64 << (depth as u32 + 1)) - 1
}

/// Heap index of the first leaf slot.
pub fn first_leaf_index(depth: u8) -> u64 {
    1u64 << depth
}

/// Heap index of the `k`-th leaf (0-based).
pub fn leaf_node_index(depth: u8, k: u64) -> u64 {
    first_leaf_index(depth) + k
}

/// Total record size for a tree of `depth`.
pub fn record_size(depth: u8) -> usize {
    HEADER_SIZE + node_count(depth) as usize * NODE_SIZE
}

/// `true` if `bytes` holds no record yet: empty or with a zero key byte.
pub fn is_uninitialized(bytes: &[u8]) -> bool {
    bytes
        .get(ACCOUNT_KEY_OFFSET)
        .is_none_or(|key| *key == AccountKey::Uninitialized as u8)
}

/// Read the declared depth from a record header without decoding the rest.
pub fn read_max_depth(bytes: &[u8]) -> Result<u8, TreeError> {
    let depth = *bytes.get(MAX_DEPTH_OFFSET).ok_or_else(|| {
        TreeError::CorruptLayout(format!(
            "record of {} bytes is shorter than the {} byte header",
            bytes.len(),
            HEADER_SIZE
        ))
    })?;
    validate_depth(depth, MAX_DEPTH)
        .map_err(|_| TreeError::CorruptLayout(format!("stored depth {} is invalid", depth)))?;
    Ok(depth)
}

/// Decoded record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeHeader {
    /// Identity allowed to insert leaves.
    pub authority: Pubkey,
    /// Depth of the tree; capacity is `2^max_depth`.
    pub max_depth: u8,
    /// Combine function of the internal nodes.
    pub hash_scheme: HashScheme,
    /// Number of inserted leaves.
    pub leaf_count: u32,
    /// Cached root, always equal to node 1.
    pub root: Hash,
}

impl TreeHeader {
    /// Number of leaf slots.
    pub fn capacity(&self) -> u64 {
        capacity(self.max_depth)
    }

    /// Encode the header, account key included.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[ACCOUNT_KEY_OFFSET] = AccountKey::MerkleTreeV1 as u8;
        buf[AUTHORITY_OFFSET..MAX_DEPTH_OFFSET].copy_from_slice(self.authority.as_ref());
        buf[MAX_DEPTH_OFFSET] = self.max_depth;
        buf[HASH_SCHEME_OFFSET] = self.hash_scheme.as_byte();
        buf[LEAF_COUNT_OFFSET..ROOT_OFFSET].copy_from_slice(&self.leaf_count.to_be_bytes());
        buf[ROOT_OFFSET..HEADER_SIZE].copy_from_slice(&self.root);
        buf
    }

    /// Decode a header from the start of `bytes`.
    ///
    /// Only the header is checked here; the node table length is checked by
    /// the record decoders.
    pub fn decode(bytes: &[u8]) -> Result<Self, TreeError> {
        if bytes.len() < HEADER_SIZE {
            return Err(TreeError::CorruptLayout(format!(
                "record of {} bytes is shorter than the {} byte header",
                bytes.len(),
                HEADER_SIZE
            )));
        }
        match AccountKey::from_byte(bytes[ACCOUNT_KEY_OFFSET]) {
            Some(AccountKey::MerkleTreeV1) => {}
            Some(AccountKey::Uninitialized) => {
                return Err(TreeError::CorruptLayout(
                    "record is not initialized".to_string(),
                ));
            }
            None => {
                return Err(TreeError::CorruptLayout(format!(
                    "unknown account key {}",
                    bytes[ACCOUNT_KEY_OFFSET]
                )));
            }
        }
        let max_depth = read_max_depth(bytes)?;
        let hash_scheme = HashScheme::from_byte(bytes[HASH_SCHEME_OFFSET]).ok_or_else(|| {
            TreeError::CorruptLayout(format!(
                "unknown hash scheme {}",
                bytes[HASH_SCHEME_OFFSET]
            ))
        })?;

        let mut authority = [0u8; 32];
        authority.copy_from_slice(&bytes[AUTHORITY_OFFSET..MAX_DEPTH_OFFSET]);
        let mut count = [0u8; 4];
        count.copy_from_slice(&bytes[LEAF_COUNT_OFFSET..ROOT_OFFSET]);
        let leaf_count = u32::from_be_bytes(count);
        let mut root = [0u8; 32];
        root.copy_from_slice(&bytes[ROOT_OFFSET..HEADER_SIZE]);

        let header = TreeHeader {
            authority: Pubkey::new_from_array(authority),
            max_depth,
            hash_scheme,
            leaf_count,
            root,
        };
        if leaf_count as u64 > header.capacity() {
            return Err(TreeError::CorruptLayout(format!(
                "leaf count {} exceeds capacity {} for depth {}",
                leaf_count,
                header.capacity(),
                max_depth
            )));
        }
        Ok(header)
    }

    /// Rewrite the fields an insertion changes: leaf count and root.
    ///
    /// `header_bytes` must be at least [`HEADER_SIZE`] long.
    pub(crate) fn write_progress(&self, header_bytes: &mut [u8]) {
        header_bytes[LEAF_COUNT_OFFSET..ROOT_OFFSET].copy_from_slice(&self.leaf_count.to_be_bytes());
        header_bytes[ROOT_OFFSET..HEADER_SIZE].copy_from_slice(&self.root);
    }
}

/// Check `bytes` is exactly the size a record of `max_depth` needs.
pub(crate) fn check_record_size(bytes: &[u8], max_depth: u8) -> Result<(), TreeError> {
    let expected = record_size(max_depth);
    if bytes.len() != expected {
        return Err(TreeError::CorruptLayout(format!(
            "record is {} bytes, depth {} needs {}",
            bytes.len(),
            max_depth,
            expected
        )));
    }
    Ok(())
}

/// Bytes an insertion rewrites in the header.
pub(crate) const PROGRESS_BYTES: u64 = (HEADER_SIZE - LEAF_COUNT_OFFSET) as u64;
