use merkle_tree_storage::Hash;

use crate::ProgramError;

const CREATE_TREE: u8 = 0;
const INSERT_LEAF: u8 = 1;

/// A decoded instruction: one discriminator byte followed by its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeInstruction {
    /// Create a tree of `max_depth` at the payer's derived address.
    CreateTree {
        /// Depth of the new tree.
        max_depth: u8,
    },
    /// Append `leaf`. The value is stored as given; callers pre-hash it.
    InsertLeaf {
        /// Value to append.
        leaf: Hash,
    },
}

impl TreeInstruction {
    /// Decode instruction bytes. Trailing or missing payload bytes are
    /// rejected.
    pub fn unpack(data: &[u8]) -> Result<Self, ProgramError> {
        let (&discriminator, payload) = data.split_first().ok_or_else(|| {
            ProgramError::InvalidInstructionData("empty instruction data".to_string())
        })?;
        match discriminator {
            CREATE_TREE => match payload {
                [max_depth] => Ok(TreeInstruction::CreateTree {
                    max_depth: *max_depth,
                }),
                _ => Err(ProgramError::InvalidInstructionData(format!(
                    "CreateTree payload must be 1 byte, got {}",
                    payload.len()
                ))),
            },
            INSERT_LEAF => {
                let leaf: Hash = payload.try_into().map_err(|_| {
                    ProgramError::InvalidInstructionData(format!(
                        "InsertLeaf payload must be 32 bytes, got {}",
                        payload.len()
                    ))
                })?;
                Ok(TreeInstruction::InsertLeaf { leaf })
            }
            other => Err(ProgramError::UnknownInstruction(other)),
        }
    }

    /// Encode to instruction bytes.
    pub fn pack(&self) -> Vec<u8> {
        match self {
            TreeInstruction::CreateTree { max_depth } => vec![CREATE_TREE, *max_depth],
            TreeInstruction::InsertLeaf { leaf } => {
                let mut data = Vec::with_capacity(33);
                data.push(INSERT_LEAF);
                data.extend_from_slice(leaf);
                data
            }
        }
    }

    /// Name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            TreeInstruction::CreateTree { .. } => "CreateTree",
            TreeInstruction::InsertLeaf { .. } => "InsertLeaf",
        }
    }
}
