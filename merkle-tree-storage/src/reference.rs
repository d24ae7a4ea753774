use crate::{
    EMPTY_LEAF, Hash, HashScheme, TreeError,
    hash::{MAX_DEPTH, validate_depth},
    layout::capacity,
};

/// Compute the root of a tree of `max_depth` holding `leaves` followed by
/// sentinels, from scratch.
///
/// This is the off-chain reference: it shares nothing with the incremental
/// path update except the combine function, so an external verifier (or a
/// test) can use it to check a stored root. O(capacity).
pub fn compute_root(
    hash_scheme: HashScheme,
    max_depth: u8,
    leaves: &[Hash],
) -> Result<Hash, TreeError> {
    validate_depth(max_depth, MAX_DEPTH)?;
    let capacity = capacity(max_depth);
    if leaves.len() as u64 > capacity {
        return Err(TreeError::TreeFull {
            capacity,
            leaf_count: leaves.len() as u64,
        });
    }

    let mut level: Vec<Hash> = leaves.to_vec();
    level.resize(capacity as usize, EMPTY_LEAF);
    while level.len() > 1 {
        level = level
            .chunks_exact(2)
            .map(|pair| hash_scheme.combine(&pair[0], &pair[1]))
            .collect();
    }
    Ok(level[0])
}
