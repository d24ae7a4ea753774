//! In-memory host: account storage plus atomic transaction processing.
//!
//! A transaction is an ordered list of instructions. Every instruction runs
//! against working copies of the accounts it names; the copies replace the
//! stored accounts only when the whole transaction succeeds. Each account
//! sits behind its own mutex, and a transaction holds the locks of every
//! account it touches until it commits or fails, so two transactions on the
//! same tree never interleave. An account is only stored once a committed
//! transaction leaves it holding state.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, RwLock},
};

use merkle_tree_storage::{
    Hash, OperationCost, Pubkey, TreeError, TreeHeader, TreeRecord, layout::read_max_depth,
};
use thiserror::Error;

use crate::{
    AccountInfo, EventSink, Processor, ProgramError, TracingEventSink, TreeEvent, TreeInstruction,
};

/// Persisted state of one account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredAccount {
    /// Program that may change `data`.
    pub owner: Pubkey,
    /// Account bytes; a tree record for trees.
    pub data: Vec<u8>,
}

/// An account reference inside an [`Instruction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMeta {
    /// Account key.
    pub pubkey: Pubkey,
    /// Requests a signature. The account only counts as signed if the
    /// transaction's signers include it.
    pub is_signer: bool,
    /// Whether the instruction may change the account.
    pub is_writable: bool,
}

impl AccountMeta {
    /// A writable account.
    pub fn new(pubkey: Pubkey, is_signer: bool) -> Self {
        AccountMeta {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    /// A read-only account.
    pub fn new_readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        AccountMeta {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// One instruction of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Program expected to process the instruction.
    pub program_id: Pubkey,
    /// Accounts in the order the instruction expects them.
    pub accounts: Vec<AccountMeta>,
    /// Encoded [`TreeInstruction`].
    pub data: Vec<u8>,
}

impl Instruction {
    /// `CreateTree` for `payer` at `tree`.
    pub fn create_tree(program_id: Pubkey, payer: Pubkey, tree: Pubkey, max_depth: u8) -> Self {
        Instruction {
            program_id,
            accounts: vec![AccountMeta::new(payer, true), AccountMeta::new(tree, false)],
            data: TreeInstruction::CreateTree { max_depth }.pack(),
        }
    }

    /// `InsertLeaf` of `leaf` into `tree`, signed by `authority`.
    pub fn insert_leaf(program_id: Pubkey, authority: Pubkey, tree: Pubkey, leaf: Hash) -> Self {
        Instruction {
            program_id,
            accounts: vec![
                AccountMeta::new_readonly(authority, true),
                AccountMeta::new(tree, false),
            ],
            data: TreeInstruction::InsertLeaf { leaf }.pack(),
        }
    }
}

/// Outcome of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// Events of every instruction, in execution order.
    pub events: Vec<TreeEvent>,
    /// Summed cost of every instruction.
    pub cost: OperationCost,
}

/// Errors from [`Bank`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BankError {
    /// An instruction was rejected; nothing was committed.
    #[error("instruction {index} failed: {error}")]
    Instruction {
        /// Position of the rejected instruction.
        index: usize,
        /// Why it was rejected.
        error: ProgramError,
    },
    /// An instruction names a program this bank does not run.
    #[error("instruction {index} targets unknown program {program_id}")]
    UnknownProgram {
        /// Position of the instruction.
        index: usize,
        /// Program it names.
        program_id: Pubkey,
    },
    /// No account, or an empty one, at this key.
    #[error("account {0} not found")]
    AccountNotFound(Pubkey),
    /// A stored tree failed to decode.
    #[error(transparent)]
    Tree(#[from] TreeError),
    /// A thread panicked while holding an account lock.
    #[error("account lock poisoned")]
    LockPoisoned,
}

type AccountHandle = Arc<Mutex<StoredAccount>>;

enum Attempt {
    Committed(TransactionReceipt),
    /// An account this transaction would create appeared meanwhile.
    Raced,
}

/// Account storage and transaction processor for one program.
#[derive(Debug, Default)]
pub struct Bank {
    processor: Processor,
    accounts: RwLock<BTreeMap<Pubkey, AccountHandle>>,
}

impl Bank {
    /// An empty bank running `processor`.
    pub fn new(processor: Processor) -> Self {
        Bank {
            processor,
            accounts: RwLock::new(BTreeMap::new()),
        }
    }

    /// The program this bank runs.
    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    /// Run `instructions` in order and commit them together.
    ///
    /// On the first failing instruction nothing is committed, no account is
    /// created and no event is logged.
    pub fn process_transaction(
        &self,
        signers: &[Pubkey],
        instructions: &[Instruction],
    ) -> Result<TransactionReceipt, BankError> {
        let keys: BTreeSet<Pubkey> = instructions
            .iter()
            .flat_map(|instruction| instruction.accounts.iter().map(|meta| meta.pubkey))
            .collect();
        loop {
            if let Attempt::Committed(receipt) =
                self.try_transaction(signers, instructions, &keys)?
            {
                tracing::debug!(
                    instructions = instructions.len(),
                    accounts = keys.len(),
                    root = ?receipt.events.last().map(|event| hex::encode(event.root())),
                    "transaction committed"
                );
                let mut log = TracingEventSink;
                for event in &receipt.events {
                    log.emit(event);
                }
                return Ok(receipt);
            }
            tracing::debug!("account created by a concurrent transaction, retrying");
        }
    }

    fn try_transaction(
        &self,
        signers: &[Pubkey],
        instructions: &[Instruction],
        keys: &BTreeSet<Pubkey>,
    ) -> Result<Attempt, BankError> {
        let handles: Vec<(Pubkey, AccountHandle)> = {
            let accounts = self.accounts.read().map_err(|_| BankError::LockPoisoned)?;
            keys.iter()
                .filter_map(|key| accounts.get(key).map(|handle| (*key, Arc::clone(handle))))
                .collect()
        };

        // Locks are taken in key order.
        let mut guards = Vec::with_capacity(handles.len());
        for (key, handle) in &handles {
            let guard = handle.lock().map_err(|_| BankError::LockPoisoned)?;
            guards.push((*key, guard));
        }
        let mut working: BTreeMap<Pubkey, StoredAccount> = keys
            .iter()
            .map(|key| (*key, StoredAccount::default()))
            .collect();
        for (key, guard) in &guards {
            working.insert(*key, (**guard).clone());
        }

        let mut events = Vec::new();
        let mut cost = OperationCost::default();
        for (index, instruction) in instructions.iter().enumerate() {
            if instruction.program_id != self.processor.program_id() {
                return Err(BankError::UnknownProgram {
                    index,
                    program_id: instruction.program_id,
                });
            }
            let mut infos: Vec<AccountInfo> = instruction
                .accounts
                .iter()
                .map(|meta| {
                    let stored = working.get(&meta.pubkey).cloned().unwrap_or_default();
                    AccountInfo {
                        key: meta.pubkey,
                        is_signer: meta.is_signer && signers.contains(&meta.pubkey),
                        is_writable: meta.is_writable,
                        owner: stored.owner,
                        data: stored.data,
                    }
                })
                .collect();

            self.processor
                .process_with_sink(&mut infos, &instruction.data, &mut events)
                .unwrap_add_cost(&mut cost)
                .map_err(|error| BankError::Instruction { index, error })?;

            for (meta, info) in instruction.accounts.iter().zip(infos) {
                if meta.is_writable {
                    working.insert(
                        meta.pubkey,
                        StoredAccount {
                            owner: info.owner,
                            data: info.data,
                        },
                    );
                }
            }
        }

        // Accounts that did not exist are only stored if they now hold state.
        let mut created = Vec::new();
        for (key, account) in working.iter_mut() {
            let existed = guards
                .binary_search_by_key(key, |(stored_key, _)| *stored_key)
                .is_ok();
            if !existed && *account != StoredAccount::default() {
                created.push((*key, std::mem::take(account)));
            }
        }
        let mut accounts = if created.is_empty() {
            None
        } else {
            let accounts = self.accounts.write().map_err(|_| BankError::LockPoisoned)?;
            if created.iter().any(|(key, _)| accounts.contains_key(key)) {
                return Ok(Attempt::Raced);
            }
            Some(accounts)
        };

        for (key, guard) in guards.iter_mut() {
            if let Some(account) = working.remove(key) {
                **guard = account;
            }
        }
        if let Some(accounts) = accounts.as_mut() {
            for (key, account) in created {
                accounts.insert(key, Arc::new(Mutex::new(account)));
            }
        }
        Ok(Attempt::Committed(TransactionReceipt { events, cost }))
    }

    /// A copy of the stored account, if it exists.
    pub fn get_account(&self, key: &Pubkey) -> Result<Option<StoredAccount>, BankError> {
        let handle = match self
            .accounts
            .read()
            .map_err(|_| BankError::LockPoisoned)?
            .get(key)
        {
            Some(handle) => handle.clone(),
            None => return Ok(None),
        };
        let account = handle.lock().map_err(|_| BankError::LockPoisoned)?;
        Ok(Some(account.clone()))
    }

    /// Overwrite an account directly, bypassing the program.
    pub fn store_account(&self, key: Pubkey, account: StoredAccount) -> Result<(), BankError> {
        let handle = self.account_handle(&key)?;
        let mut stored = handle.lock().map_err(|_| BankError::LockPoisoned)?;
        *stored = account;
        Ok(())
    }

    /// Current root of the tree stored at `key`.
    pub fn tree_root(&self, key: &Pubkey) -> Result<Hash, BankError> {
        let account = self.tree_account(key)?;
        Ok(TreeHeader::decode(&account.data)?.root)
    }

    /// Decode the full tree stored at `key`.
    pub fn load_tree(&self, key: &Pubkey) -> Result<TreeRecord, BankError> {
        let account = self.tree_account(key)?;
        let max_depth = read_max_depth(&account.data)?;
        Ok(TreeRecord::decode(&account.data, max_depth)?)
    }

    fn tree_account(&self, key: &Pubkey) -> Result<StoredAccount, BankError> {
        match self.get_account(key)? {
            Some(account) if !account.data.is_empty() => Ok(account),
            _ => Err(BankError::AccountNotFound(*key)),
        }
    }

    fn account_handle(&self, key: &Pubkey) -> Result<AccountHandle, BankError> {
        if let Some(handle) = self
            .accounts
            .read()
            .map_err(|_| BankError::LockPoisoned)?
            .get(key)
        {
            return Ok(handle.clone());
        }
        let mut accounts = self.accounts.write().map_err(|_| BankError::LockPoisoned)?;
        Ok(accounts.entry(*key).or_default().clone())
    }
}
