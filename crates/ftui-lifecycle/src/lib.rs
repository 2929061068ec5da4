#![forbid(unsafe_code)]

//! Disconnect-aware directive lifecycle for FrankenTUI part trees.
//!
//! Directives rendered deep inside a part tree sometimes need to know when
//! the region embedding them leaves live output (a hidden tab, a closed
//! panel, a cleared list) and when it comes back. Tracking that flag on every
//! node would cost every render; instead this crate keeps a sparse
//! [`OwnershipRegistry`] recording only the ancestor chains that lead to a
//! [`DisconnectableDirective`], and propagates connection changes down that
//! shadow tree.
//!
//! - [`PartTree`]: arena of content slots, attribute slots and template
//!   instances, with the commit/clear operations a renderer drives.
//! - [`OwnershipRegistry`]: node → interesting members, insertion ordered.
//! - [`Capabilities`]: propagation entry points, installed only on tracked
//!   nodes.
//! - [`ConnectionState`]: the per-directive two-state machine.
//! - [`LifecycleConfig`]: pruning and depth-limit knobs.
//!
//! # Architecture
//!
//! All state lives in one `PartTree` driven from a single thread; there are
//! no locks and no suspension points. Propagation runs to completion inside
//! the call that triggered it.

pub mod capability;
pub mod config;
pub mod directive;
pub mod error;
mod propagate;
pub mod registry;
pub mod tree;

pub use capability::Capabilities;
pub use config::LifecycleConfig;
pub use directive::{
    ConnectionState, Directive, DirectiveEntry, DirectiveKind, DisconnectableDirective, Transition,
};
pub use error::{LifecycleError, Result};
pub use registry::{Member, MemberSet, OwnershipRegistry};
pub use tree::{
    AttributeBinding, AttributeSlot, CommittedValue, ContentSlot, DirectiveId, Node, NodeId,
    NodeKind, PartTree, TemplateInstance,
};
