use merkle_tree_storage::{Pubkey, TreeError};
use thiserror::Error;

/// Errors surfaced by the dispatcher.
///
/// Tree errors pass through unchanged. Every variant has a stable numeric
/// code (see [`ProgramError::code`]) for hosts that only carry an integer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProgramError {
    /// Raised by the tree itself.
    #[error(transparent)]
    Tree(#[from] TreeError),
    /// First byte names no instruction.
    #[error("unknown instruction discriminator {0}")]
    UnknownInstruction(u8),
    /// Empty data or a payload of the wrong length.
    #[error("invalid instruction data: {0}")]
    InvalidInstructionData(String),
    /// Signer is not the tree's authority.
    #[error("signer {signer} is not the tree authority {authority}")]
    Unauthorized {
        /// Who signed.
        signer: Pubkey,
        /// Who may insert.
        authority: Pubkey,
    },
    /// `CreateTree` on an account that already holds state.
    #[error("tree account {0} is already initialized")]
    AlreadyInitialized(Pubkey),
    /// `InsertLeaf` on an account with no tree.
    #[error("tree account {0} is not initialized")]
    UninitializedAccount(Pubkey),
    /// Tree account is not at the payer's derived address.
    #[error("tree account {actual} is not the address derived for the payer, expected {expected}")]
    InvalidTreeAddress {
        /// Derived address.
        expected: Pubkey,
        /// Address passed.
        actual: Pubkey,
    },
    /// Payer or authority did not sign.
    #[error("account {0} must sign")]
    MissingRequiredSignature(Pubkey),
    /// Tree account passed read-only.
    #[error("account {0} must be writable")]
    AccountNotWritable(Pubkey),
    /// Tree account belongs to another program.
    #[error("tree account {0} is not owned by this program")]
    IncorrectProgramOwner(Pubkey),
    /// Fewer accounts than the instruction takes.
    #[error("instruction needs {expected} accounts, got {actual}")]
    NotEnoughAccountKeys {
        /// Accounts the instruction takes.
        expected: usize,
        /// Accounts passed.
        actual: usize,
    },
}

impl ProgramError {
    /// Stable numeric code.
    pub fn code(&self) -> u32 {
        match self {
            ProgramError::Tree(TreeError::InvalidDepth { .. }) => 0,
            ProgramError::UnknownInstruction(_) => 1,
            ProgramError::Tree(TreeError::CorruptLayout(_)) => 2,
            ProgramError::Unauthorized { .. } => 3,
            ProgramError::Tree(TreeError::TreeFull { .. }) => 4,
            ProgramError::AlreadyInitialized(_) => 5,
            ProgramError::InvalidInstructionData(_) => 6,
            ProgramError::InvalidTreeAddress { .. } => 7,
            ProgramError::MissingRequiredSignature(_) => 8,
            ProgramError::AccountNotWritable(_) => 9,
            ProgramError::IncorrectProgramOwner(_) => 10,
            ProgramError::NotEnoughAccountKeys { .. } => 11,
            ProgramError::UninitializedAccount(_) => 12,
            ProgramError::Tree(TreeError::NodeIndexOutOfRange { .. }) => 13,
        }
    }
}
