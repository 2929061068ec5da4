#![forbid(unsafe_code)]

//! Errors returned by part-tree operations.
//!
//! Propagation itself never fails: it only walks the registry. Errors come
//! from structural calls that name a node or directive the tree does not
//! hold, or that target the wrong kind of node.

use thiserror::Error;

use crate::tree::{DirectiveId, NodeId};

pub type Result<T> = std::result::Result<T, LifecycleError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("unknown node: {0:?}")]
    UnknownNode(NodeId),

    #[error("unknown directive: {0:?}")]
    UnknownDirective(DirectiveId),

    #[error("node {0:?} is not a content slot")]
    NotAContentSlot(NodeId),

    #[error("node {0:?} is not an attribute slot")]
    NotAnAttributeSlot(NodeId),

    #[error("node {0:?} is not a template instance")]
    NotAnInstance(NodeId),

    #[error("node {0:?} does not hold a list")]
    NotASequence(NodeId),

    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("cannot move {item:?} into {container:?}, which it contains")]
    CyclicMove { item: NodeId, container: NodeId },

    #[error("ancestor chain above {start:?} exceeds depth limit {limit}")]
    AncestorDepthExceeded { start: NodeId, limit: usize },
}

impl LifecycleError {
    /// Whether the error names a key that the tree never held or already freed.
    #[must_use]
    pub fn is_stale_key(&self) -> bool {
        matches!(self, Self::UnknownNode(_) | Self::UnknownDirective(_))
    }
}
