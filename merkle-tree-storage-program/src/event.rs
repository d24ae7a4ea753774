use std::fmt;

use bincode::{Decode, Encode};
use merkle_tree_storage::{Hash, HashScheme, Pubkey};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `tracing` target of [`TracingEventSink`].
pub const EVENT_TARGET: &str = "merkle_tree_storage::event";

/// Notification of one successful state change.
///
/// Exactly one event follows each successful instruction, after its state
/// change is applied. Failed instructions emit nothing.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TreeEvent {
    /// A tree was created.
    TreeCreated {
        /// Tree account.
        tree: Pubkey,
        /// Identity allowed to insert.
        authority: Pubkey,
        /// Depth of the tree.
        max_depth: u8,
        /// Combine function of the tree.
        hash_scheme: HashScheme,
        /// Root of the empty tree.
        root: Hash,
    },
    /// A leaf was appended.
    LeafInserted {
        /// Tree account.
        tree: Pubkey,
        /// Inserted value.
        leaf: Hash,
        /// 0-based position of the leaf.
        index: u64,
        /// Root after the insertion.
        root: Hash,
    },
}

/// Errors from the binary event form.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventCodecError {
    /// bincode failed to encode.
    #[error("encode error: {0}")]
    Encode(String),
    /// Bytes are not exactly one event.
    #[error("decode error: {0}")]
    Decode(String),
}

impl TreeEvent {
    /// Short tag naming the event kind.
    pub fn tag(&self) -> &'static str {
        match self {
            TreeEvent::TreeCreated { .. } => "TreeCreated",
            TreeEvent::LeafInserted { .. } => "LeafInserted",
        }
    }

    /// The tree the event is about.
    pub fn tree(&self) -> Pubkey {
        match self {
            TreeEvent::TreeCreated { tree, .. } | TreeEvent::LeafInserted { tree, .. } => *tree,
        }
    }

    /// The tree's root after the change.
    pub fn root(&self) -> Hash {
        match self {
            TreeEvent::TreeCreated { root, .. } | TreeEvent::LeafInserted { root, .. } => *root,
        }
    }

    /// Encode to bytes using bincode.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>, EventCodecError> {
        let config = bincode::config::standard().with_big_endian();
        bincode::encode_to_vec(self, config).map_err(|e| EventCodecError::Encode(e.to_string()))
    }

    /// Decode from bytes using bincode. Trailing bytes are rejected.
    pub fn decode_from_slice(bytes: &[u8]) -> Result<Self, EventCodecError> {
        let config = bincode::config::standard()
            .with_big_endian()
            .with_limit::<1024>();
        let (event, read): (Self, usize) = bincode::decode_from_slice(bytes, config)
            .map_err(|e| EventCodecError::Decode(e.to_string()))?;
        if read != bytes.len() {
            return Err(EventCodecError::Decode(format!(
                "{} trailing bytes",
                bytes.len() - read
            )));
        }
        Ok(event)
    }
}

impl fmt::Display for TreeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeEvent::TreeCreated {
                tree,
                authority,
                max_depth,
                hash_scheme,
                root,
            } => write!(
                f,
                "TreeCreated tree={} authority={} max_depth={} hash_scheme={:?} root={}",
                tree,
                authority,
                max_depth,
                hash_scheme,
                hex::encode(root)
            ),
            TreeEvent::LeafInserted {
                tree,
                leaf,
                index,
                root,
            } => write!(
                f,
                "LeafInserted tree={} leaf={} index={} root={}",
                tree,
                hex::encode(leaf),
                index,
                hex::encode(root)
            ),
        }
    }
}

/// Receiver of [`TreeEvent`]s.
pub trait EventSink {
    /// Receive one event.
    fn emit(&mut self, event: &TreeEvent);
}

impl EventSink for Vec<TreeEvent> {
    fn emit(&mut self, event: &TreeEvent) {
        self.push(event.clone());
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: &TreeEvent) {
        (**self).emit(event);
    }
}

/// Logs every event at `info` level under [`EVENT_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&mut self, event: &TreeEvent) {
        match event {
            TreeEvent::TreeCreated {
                tree,
                authority,
                max_depth,
                hash_scheme,
                root,
            } => tracing::info!(
                target: EVENT_TARGET,
                tag = event.tag(),
                %tree,
                %authority,
                max_depth,
                ?hash_scheme,
                root = %hex::encode(root),
                "{}",
                event
            ),
            TreeEvent::LeafInserted {
                tree,
                leaf,
                index,
                root,
            } => tracing::info!(
                target: EVENT_TARGET,
                tag = event.tag(),
                %tree,
                leaf = %hex::encode(leaf),
                index,
                root = %hex::encode(root),
                "{}",
                event
            ),
        }
    }
}
