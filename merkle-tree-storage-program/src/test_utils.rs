use merkle_tree_storage::{Hash, Pubkey};
use sha2::{Digest, Sha256};

use crate::{AccountInfo, Processor, ProgramConfig};

/// `sha256(data)`, the way clients pre-hash leaf payloads.
pub fn h(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn processor_with_max_depth(max_depth: u8) -> Processor {
    Processor::new(ProgramConfig {
        max_depth,
        ..Default::default()
    })
    .expect("valid config")
}

/// `[payer (signer), tree (writable)]` with the tree at the payer's derived
/// address.
pub fn create_accounts(processor: &Processor, payer: Pubkey) -> Vec<AccountInfo> {
    vec![
        AccountInfo::signer(payer),
        AccountInfo::writable(processor.tree_address(&payer)),
    ]
}

/// A freshly created tree account owned by `payer`.
pub fn created_tree(processor: &Processor, payer: Pubkey, max_depth: u8) -> AccountInfo {
    let mut accounts = create_accounts(processor, payer);
    processor
        .process(&mut accounts, &[0, max_depth])
        .unwrap()
        .expect("create tree");
    accounts.remove(1)
}

pub fn insert_data(leaf: Hash) -> Vec<u8> {
    let mut data = vec![1u8];
    data.extend_from_slice(&leaf);
    data
}
