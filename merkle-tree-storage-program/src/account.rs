use merkle_tree_storage::Pubkey;

/// An account as the dispatcher sees it for one instruction.
///
/// The host decides `is_signer` and `is_writable`; the dispatcher only reads
/// them. `data` and `owner` are the only fields an instruction may change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    /// Account address.
    pub key: Pubkey,
    /// Whether the transaction carries this account's signature.
    pub is_signer: bool,
    /// Whether the instruction may change the account.
    pub is_writable: bool,
    /// Program that may change `data`.
    pub owner: Pubkey,
    /// Account bytes.
    pub data: Vec<u8>,
}

impl AccountInfo {
    /// An empty account owned by nobody.
    pub fn new(key: Pubkey, is_signer: bool, is_writable: bool) -> Self {
        AccountInfo {
            key,
            is_signer,
            is_writable,
            owner: Pubkey::default(),
            data: Vec::new(),
        }
    }

    /// A signing, read-only account.
    pub fn signer(key: Pubkey) -> Self {
        Self::new(key, true, false)
    }

    /// A writable, non-signing account.
    pub fn writable(key: Pubkey) -> Self {
        Self::new(key, false, true)
    }

    pub(crate) fn require_signer(&self) -> Result<(), crate::ProgramError> {
        if self.is_signer {
            Ok(())
        } else {
            Err(crate::ProgramError::MissingRequiredSignature(self.key))
        }
    }

    pub(crate) fn require_writable(&self) -> Result<(), crate::ProgramError> {
        if self.is_writable {
            Ok(())
        } else {
            Err(crate::ProgramError::AccountNotWritable(self.key))
        }
    }
}
