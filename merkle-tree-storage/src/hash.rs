//! The node combine function and the sentinel values derived from it.

use bincode::{Decode, Encode};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::TreeError;

/// A 32-byte digest: a leaf value or a node hash.
pub type Hash = [u8; 32];

/// The value every not-yet-inserted leaf slot holds.
pub const EMPTY_LEAF: Hash = [0u8; 32];

/// Deepest supported tree. A depth-17 record is 8 MiB and still fits the
/// 10 MiB account size limit; depth 18 does not.
pub const MAX_DEPTH: u8 = 17;

/// Hash function used to combine two sibling nodes.
///
/// The scheme is stored in the record header, so a record always names the
/// function its internal nodes were built with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum HashScheme {
    /// `sha256(left || right)`, identical to the ledger's `hashv(&[left, right])`.
    #[default]
    Sha256 = 0,
    /// `blake3(left || right)`.
    Blake3 = 1,
}

impl HashScheme {
    /// Decode the header byte. Unknown bytes yield `None`.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(HashScheme::Sha256),
            1 => Some(HashScheme::Blake3),
            _ => None,
        }
    }

    /// The header byte for this scheme.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Combine a left and right child into their parent.
    pub fn combine(self, left: &Hash, right: &Hash) -> Hash {
        match self {
            HashScheme::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(left);
                hasher.update(right);
                hasher.finalize().into()
            }
            HashScheme::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                hasher.update(left);
                hasher.update(right);
                *hasher.finalize().as_bytes()
            }
        }
    }
}

/// Roots of all-sentinel subtrees, indexed by subtree height.
///
/// Entry 0 is [`EMPTY_LEAF`] and entry `h` is `combine(entry[h-1],
/// entry[h-1])`, so the result has `depth + 1` entries and the last one is
/// the root of an empty tree of that depth.
pub fn empty_subtree_roots(scheme: HashScheme, depth: u8) -> Vec<Hash> {
    let mut roots = Vec::with_capacity(depth as usize + 1);
    roots.push(EMPTY_LEAF);
    for height in 1..=depth as usize {
        let below = roots[height - 1];
        roots.push(scheme.combine(&below, &below));
    }
    roots
}

/// Validate that `depth` is in `1..=max`, where `max` never exceeds
/// [`MAX_DEPTH`].
pub fn validate_depth(depth: u8, max: u8) -> Result<(), TreeError> {
    let max = max.min(MAX_DEPTH);
    if !(1..=max).contains(&depth) {
        return Err(TreeError::InvalidDepth { depth, max });
    }
    Ok(())
}
