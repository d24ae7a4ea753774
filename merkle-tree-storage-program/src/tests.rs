use std::{collections::BTreeSet, sync::Arc, thread};

use assert_matches::assert_matches;
use merkle_tree_storage::{
    Hash, HashScheme, MAX_DEPTH, Pubkey, TreeError, TreeHeader, compute_root,
    empty_subtree_roots, layout::ROOT_OFFSET, record_size,
};
use proptest::prelude::*;

use crate::{test_utils::*, *};

fn expect_error(
    processor: &Processor,
    accounts: &mut [AccountInfo],
    data: &[u8],
) -> ProgramError {
    processor
        .process(accounts, data)
        .unwrap()
        .expect_err("instruction should fail")
}

// ── CreateTree ───────────────────────────────────────────────────────

#[test]
fn test_create_tree_initializes_record() {
    init_logging();
    let processor = Processor::default();
    let payer = Pubkey::new_unique();
    let mut accounts = create_accounts(&processor, payer);

    let events = processor
        .process(&mut accounts, &[0, 3])
        .unwrap()
        .expect("create tree");

    let tree = &accounts[1];
    let empty_root = compute_root(HashScheme::Sha256, 3, &[]).expect("root");
    assert_eq!(empty_root, empty_subtree_roots(HashScheme::Sha256, 3)[3]);
    assert_eq!(tree.owner, processor.program_id());
    assert_eq!(tree.data.len(), record_size(3));
    assert_eq!(
        events,
        vec![TreeEvent::TreeCreated {
            tree: tree.key,
            authority: payer,
            max_depth: 3,
            hash_scheme: HashScheme::Sha256,
            root: empty_root,
        }]
    );

    let header = TreeHeader::decode(&tree.data).expect("header");
    assert_eq!(header.authority, payer);
    assert_eq!(header.max_depth, 3);
    assert_eq!(header.leaf_count, 0);
    assert_eq!(header.root, empty_root);
    assert!(accounts[0].data.is_empty());
}

#[test]
fn test_create_tree_rejects_depth_outside_configured_bound() {
    let processor = processor_with_max_depth(5);
    let payer = Pubkey::new_unique();

    for depth in [0u8, 6, MAX_DEPTH + 1] {
        let mut accounts = create_accounts(&processor, payer);
        let before = accounts.clone();
        let error = expect_error(&processor, &mut accounts, &[0, depth]);
        assert_eq!(
            error,
            ProgramError::Tree(TreeError::InvalidDepth { depth, max: 5 })
        );
        assert_eq!(error.code(), 0);
        assert_eq!(accounts, before);
    }

    // The depth is checked before the accounts are.
    let mut accounts = create_accounts(&processor, payer);
    accounts[0].is_signer = false;
    assert_matches!(
        expect_error(&processor, &mut accounts, &[0, 0]),
        ProgramError::Tree(TreeError::InvalidDepth { .. })
    );

    let mut accounts = create_accounts(&processor, payer);
    processor
        .process(&mut accounts, &[0, 5])
        .unwrap()
        .expect("deepest configured depth");
}

#[test]
fn test_create_tree_account_checks() {
    let processor = Processor::default();
    let payer = Pubkey::new_unique();

    let mut accounts = create_accounts(&processor, payer);
    accounts[0].is_signer = false;
    let error = expect_error(&processor, &mut accounts, &[0, 3]);
    assert_eq!(error, ProgramError::MissingRequiredSignature(payer));
    assert_eq!(error.code(), 8);

    let mut accounts = create_accounts(&processor, payer);
    accounts[1].is_writable = false;
    let error = expect_error(&processor, &mut accounts, &[0, 3]);
    assert_eq!(
        error,
        ProgramError::AccountNotWritable(processor.tree_address(&payer))
    );
    assert_eq!(error.code(), 9);

    let other = Pubkey::new_unique();
    let mut accounts = vec![
        AccountInfo::signer(payer),
        AccountInfo::writable(processor.tree_address(&other)),
    ];
    let error = expect_error(&processor, &mut accounts, &[0, 3]);
    assert_eq!(
        error,
        ProgramError::InvalidTreeAddress {
            expected: processor.tree_address(&payer),
            actual: processor.tree_address(&other),
        }
    );
    assert_eq!(error.code(), 7);
    assert!(accounts[1].data.is_empty());

    let mut accounts = vec![AccountInfo::signer(payer)];
    let error = expect_error(&processor, &mut accounts, &[0, 3]);
    assert_eq!(
        error,
        ProgramError::NotEnoughAccountKeys {
            expected: 2,
            actual: 1
        }
    );
    assert_eq!(error.code(), 11);
}

#[test]
fn test_create_tree_twice_fails_already_initialized() {
    let processor = Processor::default();
    let payer = Pubkey::new_unique();
    let tree = created_tree(&processor, payer, 3);
    let before = tree.clone();
    let mut accounts = vec![AccountInfo::signer(payer), tree];

    for depth in [3u8, 4] {
        let error = expect_error(&processor, &mut accounts, &[0, depth]);
        assert_eq!(error, ProgramError::AlreadyInitialized(before.key));
        assert_eq!(error.code(), 5);
        assert_eq!(accounts[1], before);
    }
}

#[test]
fn test_tree_seed_binds_addresses() {
    let seeded = Processor::new(ProgramConfig {
        tree_seed: b"archive".to_vec(),
        ..Default::default()
    })
    .expect("config");
    let default = Processor::default();
    let payer = Pubkey::new_unique();
    assert_ne!(seeded.tree_address(&payer), default.tree_address(&payer));

    let mut accounts = create_accounts(&default, payer);
    assert_matches!(
        expect_error(&seeded, &mut accounts, &[0, 2]),
        ProgramError::InvalidTreeAddress { .. }
    );
    let mut accounts = create_accounts(&seeded, payer);
    seeded
        .process(&mut accounts, &[0, 2])
        .unwrap()
        .expect("create at seeded address");
}

#[test]
fn test_processor_rejects_invalid_config() {
    assert_eq!(
        Processor::new(ProgramConfig {
            max_depth: 0,
            ..Default::default()
        })
        .map(|_| ()),
        Err(ConfigError::InvalidMaxDepth {
            depth: 0,
            max: MAX_DEPTH
        })
    );
    assert_matches!(
        Processor::new(ProgramConfig {
            tree_seed: Vec::new(),
            ..Default::default()
        }),
        Err(ConfigError::InvalidTreeSeed { len: 0, .. })
    );
}

// ── Decoding ─────────────────────────────────────────────────────────

#[test]
fn test_unknown_and_malformed_instructions_change_nothing() {
    let processor = Processor::default();
    let payer = Pubkey::new_unique();
    let tree = created_tree(&processor, payer, 2);
    let mut accounts = vec![AccountInfo::signer(payer), tree.clone()];

    let error = expect_error(&processor, &mut accounts, &[7, 0]);
    assert_eq!(error, ProgramError::UnknownInstruction(7));
    assert_eq!(error.code(), 1);

    let error = expect_error(&processor, &mut accounts, &[]);
    assert_matches!(error, ProgramError::InvalidInstructionData(_));
    assert_eq!(error.code(), 6);
    assert_matches!(
        expect_error(&processor, &mut accounts, &[1, 0, 0]),
        ProgramError::InvalidInstructionData(_)
    );

    assert_eq!(accounts[1], tree);
}

// ── InsertLeaf ───────────────────────────────────────────────────────

#[test]
fn test_insert_leaf_a_then_leaf_b() {
    init_logging();
    let processor = Processor::default();
    let payer = Pubkey::new_unique();
    let tree = created_tree(&processor, payer, 3);
    let r0 = TreeHeader::decode(&tree.data).expect("header").root;
    let mut accounts = vec![AccountInfo::signer(payer), tree];

    let leaf_a = h(b"LeafA");
    let leaf_b = h(b"LeafB");

    let events = processor
        .process(&mut accounts, &insert_data(leaf_a))
        .unwrap()
        .expect("insert LeafA");
    let r1 = events[0].root();
    assert_eq!(
        events,
        vec![TreeEvent::LeafInserted {
            tree: accounts[1].key,
            leaf: leaf_a,
            index: 0,
            root: r1,
        }]
    );

    let events = processor
        .process(&mut accounts, &insert_data(leaf_b))
        .unwrap()
        .expect("insert LeafB");
    let r2 = events[0].root();
    assert_matches!(events[0], TreeEvent::LeafInserted { index: 1, .. });

    assert_ne!(r0, r1);
    assert_ne!(r1, r2);
    assert_ne!(r0, r2);
    assert_eq!(
        r2,
        compute_root(HashScheme::Sha256, 3, &[leaf_a, leaf_b]).expect("root")
    );

    let header = TreeHeader::decode(&accounts[1].data).expect("header");
    assert_eq!(header.leaf_count, 2);
    assert_eq!(header.root, r2);
}

#[test]
fn test_insert_cost_is_one_path() {
    let processor = Processor::default();
    let payer = Pubkey::new_unique();
    let mut accounts = vec![
        AccountInfo::signer(payer),
        created_tree(&processor, payer, 10),
    ];

    let result = processor.process(&mut accounts, &insert_data(h(b"leaf")));
    assert_eq!(result.cost.hash_node_calls, 10);
    assert_eq!(result.cost.slots_loaded, 10);
    assert_eq!(result.cost.slots_written, 11);
    assert!(result.value.is_ok());
}

#[test]
fn test_insert_by_other_signer_is_unauthorized() {
    let processor = Processor::default();
    let owner = Pubkey::new_unique();
    let attacker = Pubkey::new_unique();
    let tree = created_tree(&processor, owner, 3);
    let before = tree.clone();
    let mut accounts = vec![AccountInfo::signer(attacker), tree];

    let error = expect_error(&processor, &mut accounts, &insert_data(h(b"LeafA")));
    assert_eq!(
        error,
        ProgramError::Unauthorized {
            signer: attacker,
            authority: owner
        }
    );
    assert_eq!(error.code(), 3);
    assert_eq!(accounts[1], before);

    accounts[0] = AccountInfo::new(owner, false, false);
    assert_eq!(
        expect_error(&processor, &mut accounts, &insert_data(h(b"LeafA"))),
        ProgramError::MissingRequiredSignature(owner)
    );
    assert_eq!(accounts[1], before);
}

#[test]
fn test_insert_into_full_tree_leaves_bytes_unchanged() {
    let processor = Processor::default();
    let payer = Pubkey::new_unique();
    let mut accounts = vec![AccountInfo::signer(payer), created_tree(&processor, payer, 1)];
    for i in 0..2u8 {
        processor
            .process(&mut accounts, &insert_data(h(&[i])))
            .unwrap()
            .expect("insert");
    }
    let before = accounts[1].clone();

    let mut events: Vec<TreeEvent> = Vec::new();
    let error = processor
        .process_with_sink(&mut accounts, &insert_data(h(b"overflow")), &mut events)
        .unwrap()
        .expect_err("tree is full");
    assert_eq!(
        error,
        ProgramError::Tree(TreeError::TreeFull {
            capacity: 2,
            leaf_count: 2
        })
    );
    assert_eq!(error.code(), 4);
    assert!(events.is_empty());
    assert_eq!(accounts[1], before);
}

#[test]
fn test_insert_requires_program_owned_initialized_record() {
    let processor = Processor::default();
    let payer = Pubkey::new_unique();
    let leaf = insert_data(h(b"leaf"));

    let mut foreign = created_tree(&processor, payer, 2);
    foreign.owner = Pubkey::new_unique();
    let mut accounts = vec![AccountInfo::signer(payer), foreign.clone()];
    let error = expect_error(&processor, &mut accounts, &leaf);
    assert_eq!(error, ProgramError::IncorrectProgramOwner(foreign.key));
    assert_eq!(error.code(), 10);

    let mut empty = AccountInfo::writable(processor.tree_address(&payer));
    empty.owner = processor.program_id();
    let mut accounts = vec![AccountInfo::signer(payer), empty.clone()];
    let error = expect_error(&processor, &mut accounts, &leaf);
    assert_eq!(error, ProgramError::UninitializedAccount(empty.key));
    assert_eq!(error.code(), 12);

    let mut truncated = created_tree(&processor, payer, 2);
    truncated.data.pop();
    let mut accounts = vec![AccountInfo::signer(payer), truncated.clone()];
    let error = expect_error(&processor, &mut accounts, &leaf);
    assert_matches!(error, ProgramError::Tree(TreeError::CorruptLayout(_)));
    assert_eq!(error.code(), 2);
    assert_eq!(accounts[1], truncated);

    let mut tampered = created_tree(&processor, payer, 2);
    tampered.data[ROOT_OFFSET] ^= 1;
    let mut accounts = vec![AccountInfo::signer(payer), tampered.clone()];
    assert_matches!(
        expect_error(&processor, &mut accounts, &leaf),
        ProgramError::Tree(TreeError::CorruptLayout(_))
    );
    assert_eq!(accounts[1], tampered);
}

#[test]
fn test_configured_hash_scheme_is_persisted() {
    let blake = Processor::new(ProgramConfig {
        hash_scheme: HashScheme::Blake3,
        ..Default::default()
    })
    .expect("config");
    let payer = Pubkey::new_unique();
    let mut accounts = create_accounts(&blake, payer);
    let events = blake
        .process(&mut accounts, &[0, 4])
        .unwrap()
        .expect("create");
    assert_matches!(
        events[0],
        TreeEvent::TreeCreated {
            hash_scheme: HashScheme::Blake3,
            ..
        }
    );

    let first = h(b"first");
    let second = h(b"second");
    blake
        .process(&mut accounts, &insert_data(first))
        .unwrap()
        .expect("insert");

    // A processor configured for another scheme still uses the stored one.
    let sha = Processor::default();
    let events = sha
        .process(&mut accounts, &insert_data(second))
        .unwrap()
        .expect("insert");
    assert_eq!(
        events[0].root(),
        compute_root(HashScheme::Blake3, 4, &[first, second]).expect("root")
    );
    assert_ne!(
        events[0].root(),
        compute_root(HashScheme::Sha256, 4, &[first, second]).expect("root")
    );
}

// ── Bank ─────────────────────────────────────────────────────────────

fn bank_with_tree(depth: u8) -> (Bank, Pubkey, Pubkey) {
    let bank = Bank::default();
    let payer = Pubkey::new_unique();
    let tree = bank.processor().tree_address(&payer);
    bank.process_transaction(
        &[payer],
        &[Instruction::create_tree(
            bank.processor().program_id(),
            payer,
            tree,
            depth,
        )],
    )
    .expect("create tree");
    (bank, payer, tree)
}

fn inserts(bank: &Bank, authority: Pubkey, tree: Pubkey, leaves: &[Hash]) -> Vec<Instruction> {
    let program_id = bank.processor().program_id();
    leaves
        .iter()
        .map(|leaf| Instruction::insert_leaf(program_id, authority, tree, *leaf))
        .collect()
}

#[test]
fn test_bank_insert_leaf() {
    init_logging();
    let (bank, payer, tree) = bank_with_tree(3);
    let leaf = h(b"LeafA");

    let receipt = bank
        .process_transaction(&[payer], &inserts(&bank, payer, tree, &[leaf]))
        .expect("insert");

    let expected = compute_root(HashScheme::Sha256, 3, &[leaf]).expect("root");
    assert_eq!(receipt.events.len(), 1);
    assert_eq!(receipt.events[0].root(), expected);
    assert_eq!(receipt.cost.hash_node_calls, 3);
    assert_eq!(bank.tree_root(&tree), Ok(expected));
}

#[test]
fn test_bank_insert_maximum_leaves() {
    let (bank, payer, tree) = bank_with_tree(3);
    let leaves: Vec<Hash> = (0..8u8).map(|i| h(&[i])).collect();

    let receipt = bank
        .process_transaction(&[payer], &inserts(&bank, payer, tree, &leaves))
        .expect("insert eight leaves");

    let indexes: Vec<u64> = receipt
        .events
        .iter()
        .map(|event| match event {
            TreeEvent::LeafInserted { index, .. } => *index,
            other => panic!("unexpected event {}", other),
        })
        .collect();
    assert_eq!(indexes, (0..8).collect::<Vec<u64>>());

    let record = bank.load_tree(&tree).expect("load");
    assert!(record.is_full());
    assert_eq!(
        record.current_root(),
        compute_root(HashScheme::Sha256, 3, &leaves).expect("root")
    );
    assert_eq!(
        receipt.events.last().map(TreeEvent::root),
        Some(record.current_root())
    );
}

#[test]
fn test_bank_overflowing_batch_commits_nothing() {
    let (bank, payer, tree) = bank_with_tree(3);
    let before = bank.get_account(&tree).expect("read");
    let leaves: Vec<Hash> = (0..9u8).map(|i| h(&[i])).collect();

    let error = bank
        .process_transaction(&[payer], &inserts(&bank, payer, tree, &leaves))
        .expect_err("ninth leaf overflows");

    assert_eq!(
        error,
        BankError::Instruction {
            index: 8,
            error: ProgramError::Tree(TreeError::TreeFull {
                capacity: 8,
                leaf_count: 8
            }),
        }
    );
    assert_eq!(bank.get_account(&tree).expect("read"), before);
    assert_eq!(bank.load_tree(&tree).expect("load").leaf_count(), 0);
}

#[test]
fn test_bank_rejects_insert_from_non_authority() {
    let (bank, owner, tree) = bank_with_tree(3);
    let attacker = Pubkey::new_unique();
    let before = bank.get_account(&tree).expect("read");

    let error = bank
        .process_transaction(&[attacker], &inserts(&bank, attacker, tree, &[h(b"x")]))
        .expect_err("attacker is not the authority");
    assert_eq!(
        error,
        BankError::Instruction {
            index: 0,
            error: ProgramError::Unauthorized {
                signer: attacker,
                authority: owner
            },
        }
    );

    // Naming the owner does not help without the owner's signature.
    let error = bank
        .process_transaction(&[attacker], &inserts(&bank, owner, tree, &[h(b"x")]))
        .expect_err("owner did not sign");
    assert_eq!(
        error,
        BankError::Instruction {
            index: 0,
            error: ProgramError::MissingRequiredSignature(owner),
        }
    );

    assert_eq!(bank.get_account(&tree).expect("read"), before);
}

#[test]
fn test_bank_create_and_insert_in_one_transaction() {
    let bank = Bank::default();
    let payer = Pubkey::new_unique();
    let tree = bank.processor().tree_address(&payer);
    let program_id = bank.processor().program_id();

    let receipt = bank
        .process_transaction(
            &[payer],
            &[
                Instruction::create_tree(program_id, payer, tree, 2),
                Instruction::insert_leaf(program_id, payer, tree, h(b"first")),
            ],
        )
        .expect("create and insert");

    assert_matches!(
        receipt.events.as_slice(),
        [
            TreeEvent::TreeCreated { .. },
            TreeEvent::LeafInserted { index: 0, .. }
        ]
    );
    let account = bank
        .get_account(&tree)
        .expect("read")
        .expect("tree exists");
    assert_eq!(account.owner, program_id);
    assert_eq!(bank.load_tree(&tree).expect("load").leaf_count(), 1);
}

#[test]
fn test_bank_rejects_unknown_program() {
    let bank = Bank::default();
    let payer = Pubkey::new_unique();
    let tree = bank.processor().tree_address(&payer);
    let other = Pubkey::new_unique();

    let error = bank
        .process_transaction(
            &[payer],
            &[Instruction::create_tree(other, payer, tree, 2)],
        )
        .expect_err("unknown program");
    assert_eq!(
        error,
        BankError::UnknownProgram {
            index: 0,
            program_id: other
        }
    );
    assert_eq!(bank.tree_root(&tree), Err(BankError::AccountNotFound(tree)));
}

#[test]
fn test_bank_rejected_transactions_store_no_accounts() {
    let bank = Bank::default();
    let payer = Pubkey::new_unique();
    let tree = bank.processor().tree_address(&payer);
    let program_id = bank.processor().program_id();

    let error = bank
        .process_transaction(
            &[payer],
            &[Instruction::create_tree(program_id, payer, tree, 0)],
        )
        .expect_err("depth 0");
    assert_matches!(
        error,
        BankError::Instruction {
            index: 0,
            error: ProgramError::Tree(TreeError::InvalidDepth { .. }),
        }
    );
    assert_eq!(bank.get_account(&tree), Ok(None));
    assert_eq!(bank.get_account(&payer), Ok(None));

    let strangers: Vec<(Pubkey, Pubkey)> = (0..100)
        .map(|_| (Pubkey::new_unique(), Pubkey::new_unique()))
        .collect();
    for (authority, account) in &strangers {
        assert_matches!(
            bank.process_transaction(
                &[*authority],
                &inserts(&bank, *authority, *account, &[h(b"x")])
            ),
            Err(BankError::Instruction {
                error: ProgramError::IncorrectProgramOwner(_),
                ..
            })
        );
    }
    for (authority, account) in &strangers {
        assert_eq!(bank.get_account(authority), Ok(None));
        assert_eq!(bank.get_account(account), Ok(None));
    }
}

#[test]
fn test_bank_stores_only_accounts_left_with_state() {
    let (bank, payer, tree) = bank_with_tree(2);
    assert_matches!(bank.get_account(&tree), Ok(Some(_)));
    assert_eq!(bank.get_account(&payer), Ok(None));

    bank.process_transaction(&[payer], &inserts(&bank, payer, tree, &[h(b"x")]))
        .expect("insert");
    assert_eq!(bank.get_account(&payer), Ok(None));
}

#[test]
fn test_bank_reports_corrupt_stored_tree() {
    let (bank, payer, tree) = bank_with_tree(2);
    let mut account = bank.get_account(&tree).expect("read").expect("exists");
    account.data.truncate(10);
    bank.store_account(tree, account).expect("store");

    assert_matches!(
        bank.load_tree(&tree),
        Err(BankError::Tree(TreeError::CorruptLayout(_)))
    );
    assert_matches!(
        bank.process_transaction(&[payer], &inserts(&bank, payer, tree, &[h(b"x")])),
        Err(BankError::Instruction {
            error: ProgramError::Tree(TreeError::CorruptLayout(_)),
            ..
        })
    );
}

#[test]
fn test_bank_serializes_concurrent_inserts() {
    let (bank, payer, tree) = bank_with_tree(6);
    let bank = Arc::new(bank);
    let program_id = bank.processor().program_id();

    let handles: Vec<_> = (0..4u8)
        .map(|t| {
            let bank = Arc::clone(&bank);
            thread::spawn(move || {
                for i in 0..16u8 {
                    bank.process_transaction(
                        &[payer],
                        &[Instruction::insert_leaf(program_id, payer, tree, h(&[t, i]))],
                    )
                    .expect("insert");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread");
    }

    let record = bank.load_tree(&tree).expect("load");
    assert!(record.is_full());
    assert_eq!(record.audit().unwrap(), Ok(()));

    let stored: Vec<Hash> = (0..64)
        .map(|k| record.leaf(k).expect("leaf present"))
        .collect();
    let expected: BTreeSet<Hash> = (0..4u8)
        .flat_map(|t| (0..16u8).map(move |i| h(&[t, i])))
        .collect();
    assert_eq!(stored.iter().copied().collect::<BTreeSet<_>>(), expected);
    assert_eq!(
        record.current_root(),
        compute_root(HashScheme::Sha256, 6, &stored).expect("root")
    );
}

proptest! {
    #[test]
    fn prop_bank_root_matches_reference(
        leaves in prop::collection::vec(any::<[u8; 32]>(), 0..=16),
        split in 0usize..=16,
    ) {
        let (bank, payer, tree) = bank_with_tree(4);
        let split = split.min(leaves.len());
        for chunk in [&leaves[..split], &leaves[split..]] {
            if chunk.is_empty() {
                continue;
            }
            bank.process_transaction(&[payer], &inserts(&bank, payer, tree, chunk))
                .expect("insert");
        }
        prop_assert_eq!(
            bank.tree_root(&tree).expect("root"),
            compute_root(HashScheme::Sha256, 4, &leaves).expect("reference")
        );
    }
}
