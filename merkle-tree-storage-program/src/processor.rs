use merkle_tree_storage::{
    Hash, OperationCost, Pubkey, TreeAccountMut, TreeHeader, hash::validate_depth,
    layout::is_uninitialized, record_size,
};
use merkle_tree_storage_costs::{
    CostResult, CostsExt, cost_return_on_error, cost_return_on_error_no_add,
};

use crate::{
    AccountInfo, ConfigError, EventSink, ProgramConfig, ProgramError, TracingEventSink, TreeEvent,
    TreeInstruction, derive_tree_address,
};

/// Accounts every instruction takes: `[payer | authority, tree]`.
const ACCOUNT_COUNT: usize = 2;

/// Decodes instructions and applies them to tree accounts.
///
/// Every check runs before the tree account is touched, so a failed
/// instruction leaves every account byte-for-byte unchanged.
#[derive(Debug, Clone, Default)]
pub struct Processor {
    config: ProgramConfig,
}

impl Processor {
    /// A processor for a validated `config`.
    pub fn new(config: ProgramConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Processor { config })
    }

    /// Owner stamped on the tree accounts this processor creates.
    pub fn program_id(&self) -> Pubkey {
        self.config.program_id
    }

    /// The only address `payer` may create a tree at.
    pub fn tree_address(&self, payer: &Pubkey) -> Pubkey {
        derive_tree_address(&self.config.program_id, &self.config.tree_seed, payer)
    }

    /// Apply one instruction and return the events it produced, also logged
    /// through [`TracingEventSink`].
    pub fn process(
        &self,
        accounts: &mut [AccountInfo],
        data: &[u8],
    ) -> CostResult<Vec<TreeEvent>, ProgramError> {
        let mut events = Vec::new();
        self.process_with_sink(accounts, data, &mut events)
            .map_ok(|()| {
                let mut log = TracingEventSink;
                for event in &events {
                    log.emit(event);
                }
                events
            })
    }

    /// Apply one instruction, reporting its event to `sink` on success.
    pub fn process_with_sink<E: EventSink + ?Sized>(
        &self,
        accounts: &mut [AccountInfo],
        data: &[u8],
        sink: &mut E,
    ) -> CostResult<(), ProgramError> {
        let cost = OperationCost::default();
        let instruction = cost_return_on_error_no_add!(cost, TreeInstruction::unpack(data));
        tracing::debug!(instruction = instruction.name(), "processing instruction");

        let result = match instruction {
            TreeInstruction::CreateTree { max_depth } => self.create_tree(accounts, max_depth),
            TreeInstruction::InsertLeaf { leaf } => self.insert_leaf(accounts, leaf),
        };
        match &result.value {
            Ok(event) => sink.emit(event),
            Err(error) => tracing::warn!(
                instruction = instruction.name(),
                code = error.code(),
                %error,
                "instruction rejected"
            ),
        }
        result.map_ok(|_| ())
    }

    fn create_tree(
        &self,
        accounts: &mut [AccountInfo],
        max_depth: u8,
    ) -> CostResult<TreeEvent, ProgramError> {
        let mut cost = OperationCost::default();
        let (payer, tree) = cost_return_on_error_no_add!(cost, split_accounts(accounts));
        cost_return_on_error_no_add!(cost, validate_depth(max_depth, self.config.max_depth));
        cost_return_on_error_no_add!(cost, payer.require_signer());
        cost_return_on_error_no_add!(cost, tree.require_writable());

        let expected = self.tree_address(&payer.key);
        if tree.key != expected {
            return Err(ProgramError::InvalidTreeAddress {
                expected,
                actual: tree.key,
            })
            .wrap_with_cost(cost);
        }
        if !tree.data.is_empty() || tree.owner == self.config.program_id {
            return Err(ProgramError::AlreadyInitialized(tree.key)).wrap_with_cost(cost);
        }
        tracing::debug!(tree = %tree.key, payer = %payer.key, max_depth, "account checks passed");

        let mut data = vec![0u8; record_size(max_depth)];
        let root = {
            let view = cost_return_on_error!(
                &mut cost,
                TreeAccountMut::initialize(
                    &mut data,
                    payer.key,
                    max_depth,
                    self.config.hash_scheme
                )
            );
            view.current_root()
        };
        tree.data = data;
        tree.owner = self.config.program_id;

        Ok(TreeEvent::TreeCreated {
            tree: tree.key,
            authority: payer.key,
            max_depth,
            hash_scheme: self.config.hash_scheme,
            root,
        })
        .wrap_with_cost(cost)
    }

    fn insert_leaf(
        &self,
        accounts: &mut [AccountInfo],
        leaf: Hash,
    ) -> CostResult<TreeEvent, ProgramError> {
        let mut cost = OperationCost::default();
        let (authority, tree) = cost_return_on_error_no_add!(cost, split_accounts(accounts));
        cost_return_on_error_no_add!(cost, authority.require_signer());
        cost_return_on_error_no_add!(cost, tree.require_writable());
        if tree.owner != self.config.program_id {
            return Err(ProgramError::IncorrectProgramOwner(tree.key)).wrap_with_cost(cost);
        }
        if is_uninitialized(&tree.data) {
            return Err(ProgramError::UninitializedAccount(tree.key)).wrap_with_cost(cost);
        }

        let header = cost_return_on_error_no_add!(cost, TreeHeader::decode(&tree.data));
        if header.authority != authority.key {
            return Err(ProgramError::Unauthorized {
                signer: authority.key,
                authority: header.authority,
            })
            .wrap_with_cost(cost);
        }
        tracing::debug!(tree = %tree.key, leaf_count = header.leaf_count, "account checks passed");

        let mut view =
            cost_return_on_error_no_add!(cost, TreeAccountMut::load_declared(&mut tree.data));
        let insertion = cost_return_on_error!(&mut cost, view.insert_leaf(leaf));

        Ok(TreeEvent::LeafInserted {
            tree: tree.key,
            leaf,
            index: insertion.index,
            root: insertion.root,
        })
        .wrap_with_cost(cost)
    }
}

fn split_accounts(
    accounts: &mut [AccountInfo],
) -> Result<(&mut AccountInfo, &mut AccountInfo), ProgramError> {
    let actual = accounts.len();
    match accounts {
        [first, second, ..] => Ok((first, second)),
        _ => Err(ProgramError::NotEnoughAccountKeys {
            expected: ACCOUNT_COUNT,
            actual,
        }),
    }
}
