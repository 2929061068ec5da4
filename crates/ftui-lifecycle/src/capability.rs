#![forbid(unsafe_code)]

//! Per-node propagation entry points.
//!
//! A node only carries [`Capabilities`] once a disconnect-aware directive has
//! registered at or below it. The renderer calls
//! [`PartTree::set_value_connected`] and [`PartTree::set_directive_connected`]
//! unconditionally; for untouched nodes both are a single `Option` check.

use crate::tree::{DirectiveId, NodeId, NodeKind, PartTree};

/// Connect or disconnect a content slot's committed value.
pub type SetValueConnectedFn = fn(&mut PartTree, NodeId, bool, bool);

/// Connect or disconnect one directive held by a slot.
pub type SetDirectiveConnectedFn = fn(&mut PartTree, NodeId, DirectiveId, bool);

/// Entry points installed on a tracked node.
#[derive(Clone, Copy)]
pub struct Capabilities {
    pub set_value_connected: Option<SetValueConnectedFn>,
    pub set_directive_connected: Option<SetDirectiveConnectedFn>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("set_value_connected", &self.set_value_connected.is_some())
            .field(
                "set_directive_connected",
                &self.set_directive_connected.is_some(),
            )
            .finish()
    }
}

impl Capabilities {
    /// The entry points a node of `kind` needs. Instances have none: they are
    /// reached through their slot, never addressed by the renderer directly.
    #[must_use]
    pub fn for_kind(kind: &NodeKind) -> Option<Self> {
        match kind {
            NodeKind::Content(_) => Some(Self {
                set_value_connected: Some(value_connected),
                set_directive_connected: Some(directive_connected),
            }),
            NodeKind::Attribute(_) => Some(Self {
                set_value_connected: None,
                set_directive_connected: Some(directive_connected),
            }),
            NodeKind::Instance(_) => None,
        }
    }
}

fn value_connected(tree: &mut PartTree, slot: NodeId, is_connected: bool, remove: bool) {
    tree.apply_to_value(slot, is_connected, remove);
}

fn directive_connected(
    tree: &mut PartTree,
    _slot: NodeId,
    directive: DirectiveId,
    is_connected: bool,
) {
    tree.set_directive_state(directive, is_connected);
}

impl PartTree {
    /// Attach entry points to `node` if it has none yet.
    pub(crate) fn install_capabilities(&mut self, node: NodeId) {
        if let Some(entry) = self.nodes.get_mut(node) {
            if entry.capabilities.is_none() {
                entry.capabilities = Capabilities::for_kind(&entry.kind);
            }
        }
    }

    /// Renderer entry point: a content slot's value is being connected,
    /// disconnected, or (with `remove`) detached.
    ///
    /// No-op for slots that never had a disconnect-aware directive below them.
    pub fn set_value_connected(&mut self, slot: NodeId, is_connected: bool, remove: bool) {
        let hook = self
            .nodes
            .get(slot)
            .and_then(|node| node.capabilities)
            .and_then(|caps| caps.set_value_connected);
        if let Some(hook) = hook {
            hook(self, slot, is_connected, remove);
        }
    }

    /// Renderer entry point: one of the slot's directives changed connection.
    pub fn set_directive_connected(
        &mut self,
        slot: NodeId,
        directive: DirectiveId,
        is_connected: bool,
    ) {
        let hook = self
            .nodes
            .get(slot)
            .and_then(|node| node.capabilities)
            .and_then(|caps| caps.set_directive_connected);
        if let Some(hook) = hook {
            hook(self, slot, directive, is_connected);
        }
    }

    /// Whether entry points were installed on `node`.
    #[must_use]
    pub fn has_capabilities(&self, node: NodeId) -> bool {
        self.nodes
            .get(node)
            .is_some_and(|entry| entry.capabilities.is_some())
    }
}
