use merkle_tree_storage::{HashScheme, MAX_DEPTH, Pubkey};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Program id used when none is configured.
pub const DEFAULT_PROGRAM_ID: Pubkey = Pubkey::new_from_array(*b"merkle-tree-storage-program-v1\0\0");

/// Seed mixed into every tree address when none is configured.
pub const DEFAULT_TREE_SEED: &[u8] = b"tree";

const MAX_SEED_LEN: usize = 32;

/// Errors from [`ProgramConfig::validate`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Depth bound is 0 or above [`MAX_DEPTH`].
    #[error("max depth {depth} must be between 1 and {max}")]
    InvalidMaxDepth {
        /// Configured bound.
        depth: u8,
        /// Deepest supported.
        max: u8,
    },
    /// Seed is empty or too long.
    #[error("tree seed must be 1 to {max} bytes, got {len}")]
    InvalidTreeSeed {
        /// Configured seed length.
        len: usize,
        /// Longest allowed.
        max: usize,
    },
}

/// Settings fixed for the lifetime of a [`Processor`](crate::Processor).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProgramConfig {
    /// Owner stamped on every tree account this program creates.
    pub program_id: Pubkey,
    /// Seed for [`derive_tree_address`](crate::derive_tree_address).
    pub tree_seed: Vec<u8>,
    /// Deepest tree `CreateTree` accepts. Never above [`MAX_DEPTH`].
    pub max_depth: u8,
    /// Combine function for new trees. Existing trees keep the scheme in
    /// their header.
    pub hash_scheme: HashScheme,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        ProgramConfig {
            program_id: DEFAULT_PROGRAM_ID,
            tree_seed: DEFAULT_TREE_SEED.to_vec(),
            max_depth: MAX_DEPTH,
            hash_scheme: HashScheme::default(),
        }
    }
}

impl ProgramConfig {
    /// Check the depth bound and seed length.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 || self.max_depth > MAX_DEPTH {
            return Err(ConfigError::InvalidMaxDepth {
                depth: self.max_depth,
                max: MAX_DEPTH,
            });
        }
        if self.tree_seed.is_empty() || self.tree_seed.len() > MAX_SEED_LEN {
            return Err(ConfigError::InvalidTreeSeed {
                len: self.tree_seed.len(),
                max: MAX_SEED_LEN,
            });
        }
        Ok(())
    }
}
