//! Instruction dispatcher for the append-only Merkle tree storage engine.
//!
//! A host hands the [`Processor`] raw instruction bytes and the accounts the
//! instruction names. The processor checks signatures, account binding and
//! authority, runs the tree operation in place on the tree account's data,
//! and reports the resulting [`TreeEvent`] to an [`EventSink`].
//!
//! | Discriminator | Instruction  | Payload         | Accounts                       |
//! |---------------|--------------|-----------------|--------------------------------|
//! | 0             | `CreateTree` | max depth (u8)  | payer (signer), tree (writable) |
//! | 1             | `InsertLeaf` | leaf (32 bytes) | authority (signer), tree (writable) |
//!
//! [`Bank`] is an in-memory host that applies whole transactions atomically
//! and serializes concurrent access to each account.

#![warn(missing_docs)]

mod account;
mod address;
pub mod bank;
mod config;
mod error;
mod event;
mod instruction;
mod processor;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod tests;

pub use account::AccountInfo;
pub use address::derive_tree_address;
pub use bank::{AccountMeta, Bank, BankError, Instruction, StoredAccount, TransactionReceipt};
pub use config::{ConfigError, DEFAULT_PROGRAM_ID, DEFAULT_TREE_SEED, ProgramConfig};
pub use error::ProgramError;
pub use event::{EVENT_TARGET, EventCodecError, EventSink, TracingEventSink, TreeEvent};
pub use instruction::TreeInstruction;
pub use processor::Processor;
