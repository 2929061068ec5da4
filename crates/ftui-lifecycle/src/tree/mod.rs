#![forbid(unsafe_code)]

//! Minimal host part tree.
//!
//! [`PartTree`] is the arena a renderer drives: it owns every node and
//! directive, the [`OwnershipRegistry`], and the config. It exposes only the
//! structure the lifecycle core needs (parents, committed values, current
//! directives) and the commit/clear operations that trigger propagation.
//!
//! # Invariants
//!
//! 1. Parent links are arena keys; dropping a subtree never leaks through
//!    them.
//! 2. Every structural replacement (new value, new directive, clear,
//!    truncate) detaches the old content before freeing it, so
//!    disconnect-aware directives hear `on_disconnected` exactly once.
//! 3. Freeing a node also frees its registry entry.
//!
//! # Example
//!
//! ```ignore
//! let mut tree = PartTree::new();
//! let root = tree.create_root();
//! let instance = tree.commit_instance(root)?;
//! let slot = tree.add_content_slot(instance)?;
//! let directive = tree.commit_directive(slot, DirectiveKind::disconnectable(ticker))?;
//!
//! tree.set_connected(root, false)?; // ticker.on_disconnected()
//! tree.set_connected(root, true)?;  // ticker.on_reconnected()
//! ```

mod node;

use slotmap::SlotMap;
use tracing::{debug, trace};

pub use node::{
    AttributeBinding, AttributeSlot, CommittedValue, ContentSlot, DirectiveId, Node, NodeId,
    NodeKind, TemplateInstance,
};

use crate::config::LifecycleConfig;
use crate::directive::{ConnectionState, DirectiveEntry, DirectiveKind};
use crate::error::{LifecycleError, Result};
use crate::registry::OwnershipRegistry;

/// Arena-backed part tree with lifecycle bookkeeping.
#[derive(Debug, Default)]
pub struct PartTree {
    pub(crate) nodes: SlotMap<NodeId, Node>,
    pub(crate) directives: SlotMap<DirectiveId, DirectiveEntry>,
    pub(crate) registry: OwnershipRegistry,
    pub(crate) config: LifecycleConfig,
}

impl PartTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: LifecycleConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// A tree configured from `FTUI_LIFECYCLE_*` environment overrides.
    #[must_use]
    pub fn from_env() -> Self {
        Self::with_config(LifecycleConfig::from_env())
    }

    #[must_use]
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &OwnershipRegistry {
        &self.registry
    }

    // --- Queries ---

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(Node::parent)
    }

    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn directive(&self, id: DirectiveId) -> Option<&DirectiveEntry> {
        self.directives.get(id)
    }

    #[must_use]
    pub fn directive_count(&self) -> usize {
        self.directives.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    pub fn directives(&self) -> impl Iterator<Item = (DirectiveId, &DirectiveEntry)> {
        self.directives.iter()
    }

    /// Connection state of a directive, if it exists.
    #[must_use]
    pub fn directive_state(&self, id: DirectiveId) -> Option<ConnectionState> {
        self.directives.get(id).map(DirectiveEntry::state)
    }

    /// Whether a directive is currently connected. Unknown ids report `false`.
    #[must_use]
    pub fn is_connected(&self, id: DirectiveId) -> bool {
        self.directive_state(id)
            .is_some_and(ConnectionState::is_connected)
    }

    #[must_use]
    pub fn committed_value(&self, slot: NodeId) -> Option<&CommittedValue> {
        self.nodes
            .get(slot)
            .and_then(Node::as_content)
            .map(|content| &content.value)
    }

    /// The directive currently committed into a content slot.
    #[must_use]
    pub fn current_directive(&self, slot: NodeId) -> Option<DirectiveId> {
        self.nodes
            .get(slot)
            .and_then(Node::as_content)
            .and_then(|content| content.directive)
    }

    // --- Construction ---

    /// Create a parentless content slot, the root of a render.
    pub fn create_root(&mut self) -> NodeId {
        self.nodes
            .insert(Node::new(None, NodeKind::Content(ContentSlot::default())))
    }

    /// Replace `slot`'s value with a fresh template instance.
    pub fn commit_instance(&mut self, slot: NodeId) -> Result<NodeId> {
        self.expect_content(slot)?;
        self.detach_current_directive(slot);
        self.clear_value(slot);
        let instance = self.nodes.insert(Node::new(
            Some(slot),
            NodeKind::Instance(TemplateInstance::default()),
        ));
        self.content_mut(slot)?.value = CommittedValue::Instance(instance);
        Ok(instance)
    }

    /// Add a content slot to a template instance.
    pub fn add_content_slot(&mut self, instance: NodeId) -> Result<NodeId> {
        self.expect_instance(instance)?;
        let slot = self.nodes.insert(Node::new(
            Some(instance),
            NodeKind::Content(ContentSlot::default()),
        ));
        self.instance_mut(instance)?.slots.push(slot);
        Ok(slot)
    }

    /// Add an attribute slot to a template instance.
    pub fn add_attribute_slot(
        &mut self,
        instance: NodeId,
        name: impl Into<String>,
    ) -> Result<NodeId> {
        self.expect_instance(instance)?;
        let slot = self.nodes.insert(Node::new(
            Some(instance),
            NodeKind::Attribute(AttributeSlot {
                name: name.into(),
                bindings: Vec::new(),
            }),
        ));
        self.instance_mut(instance)?.slots.push(slot);
        Ok(slot)
    }

    /// Replace `slot`'s value with opaque leaf output.
    pub fn commit_leaf(&mut self, slot: NodeId, text: impl Into<String>) -> Result<()> {
        self.expect_content(slot)?;
        self.detach_current_directive(slot);
        self.replace_value(slot, CommittedValue::Leaf(text.into()))
    }

    /// Replace `slot`'s value with a list of `len` empty item slots.
    pub fn commit_sequence(&mut self, slot: NodeId, len: usize) -> Result<Vec<NodeId>> {
        self.expect_content(slot)?;
        self.detach_current_directive(slot);
        self.clear_value(slot);
        let items: Vec<NodeId> = (0..len)
            .map(|_| {
                self.nodes.insert(Node::new(
                    Some(slot),
                    NodeKind::Content(ContentSlot::default()),
                ))
            })
            .collect();
        self.content_mut(slot)?.value = CommittedValue::Sequence(items.clone());
        Ok(items)
    }

    /// Append one item slot to `slot`'s list, starting a list if needed.
    pub fn push_sequence_item(&mut self, slot: NodeId) -> Result<NodeId> {
        self.expect_content(slot)?;
        if !matches!(self.content(slot)?.value, CommittedValue::Sequence(_)) {
            self.commit_sequence(slot, 0)?;
        }
        let item = self.nodes.insert(Node::new(
            Some(slot),
            NodeKind::Content(ContentSlot::default()),
        ));
        if let CommittedValue::Sequence(items) = &mut self.content_mut(slot)?.value {
            items.push(item);
        }
        Ok(item)
    }

    /// Shrink `slot`'s list to `len` items, detaching the rest.
    pub fn truncate_sequence(&mut self, slot: NodeId, len: usize) -> Result<()> {
        let current = match &self.content(slot)?.value {
            CommittedValue::Sequence(items) => items.len(),
            _ => 0,
        };
        if len > current {
            return Err(LifecycleError::IndexOutOfRange {
                index: len,
                len: current,
            });
        }
        if len == current {
            return Ok(());
        }
        if self.has_capabilities(slot) {
            self.apply_to_value_from(slot, false, len);
        }
        let removed = match &mut self.content_mut(slot)?.value {
            CommittedValue::Sequence(items) => items.split_off(len),
            _ => Vec::new(),
        };
        for item in removed {
            self.teardown(item);
        }
        Ok(())
    }

    // --- Directives ---

    /// Commit a directive into a content slot, replacing any current one,
    /// and render it.
    ///
    /// The new directive registers before the old one detaches, so a
    /// rejected registration leaves the current directive in place and the
    /// old one's chain is reused rather than pruned and rebuilt.
    pub fn commit_directive(&mut self, slot: NodeId, kind: DirectiveKind) -> Result<DirectiveId> {
        self.expect_content(slot)?;
        let disconnectable = kind.is_disconnectable();
        let directive = self.directives.insert(DirectiveEntry::new(slot, kind));
        if disconnectable {
            if let Err(err) = self.register_directive(directive, slot) {
                self.directives.remove(directive);
                return Err(err);
            }
        }
        self.detach_current_directive(slot);
        self.content_mut(slot)?.directive = Some(directive);
        self.resolve(directive)?;
        Ok(directive)
    }

    /// Bind a directive to a new binding of an attribute slot and render it.
    pub fn add_attribute_directive(
        &mut self,
        slot: NodeId,
        kind: DirectiveKind,
    ) -> Result<DirectiveId> {
        self.expect_attribute(slot)?;
        let disconnectable = kind.is_disconnectable();
        let directive = self.directives.insert(DirectiveEntry::new(slot, kind));
        if disconnectable {
            if let Err(err) = self.register_directive(directive, slot) {
                self.directives.remove(directive);
                return Err(err);
            }
        }
        self.attribute_mut(slot)?.bindings.push(AttributeBinding {
            directive,
            value: String::new(),
        });
        self.resolve(directive)?;
        Ok(directive)
    }

    /// Re-render a directive into its slot. Forces it connected first.
    pub fn resolve(&mut self, directive: DirectiveId) -> Result<String> {
        let output = self
            .render_directive(directive)
            .ok_or(LifecycleError::UnknownDirective(directive))?;
        self.write_directive_value(directive, output.clone())?;
        Ok(output)
    }

    /// Commit a value on a directive's behalf, outside a render pass.
    pub fn set_value(&mut self, directive: DirectiveId, text: impl Into<String>) -> Result<()> {
        self.write_directive_value(directive, text.into())
    }

    // --- Connection & detachment ---

    /// External connection change for a content slot, typically a render
    /// root being hidden or shown.
    pub fn set_connected(&mut self, slot: NodeId, is_connected: bool) -> Result<()> {
        self.expect_content(slot)?;
        debug!(?slot, is_connected, "set_connected");
        if let Some(directive) = self.current_directive(slot) {
            self.set_directive_connected(slot, directive, is_connected);
        }
        self.set_value_connected(slot, is_connected, false);
        Ok(())
    }

    /// Clear a content slot: detach and free its directive and value.
    pub fn clear(&mut self, slot: NodeId) -> Result<()> {
        self.expect_content(slot)?;
        self.detach_current_directive(slot);
        self.clear_value(slot);
        Ok(())
    }

    /// Move a list item into another list at `index`, carrying its registry
    /// interest to the new ancestor chain.
    pub fn move_sequence_item(
        &mut self,
        item: NodeId,
        container: NodeId,
        index: usize,
    ) -> Result<()> {
        self.expect_content(item)?;
        let old_container = self
            .parent(item)
            .ok_or(LifecycleError::NotASequence(item))?;
        let in_old = matches!(
            self.content(old_container).map(|content| &content.value),
            Ok(CommittedValue::Sequence(items)) if items.contains(&item)
        );
        if !in_old {
            return Err(LifecycleError::NotASequence(old_container));
        }
        let target_len = match &self.content(container)?.value {
            CommittedValue::Sequence(items) => items.iter().filter(|&&i| i != item).count(),
            _ => return Err(LifecycleError::NotASequence(container)),
        };
        if index > target_len {
            return Err(LifecycleError::IndexOutOfRange {
                index,
                len: target_len,
            });
        }
        if self.is_ancestor_or_self(item, container) {
            return Err(LifecycleError::CyclicMove { item, container });
        }
        if let CommittedValue::Sequence(items) = &mut self.content_mut(old_container)?.value {
            items.retain(|&i| i != item);
        }
        if let CommittedValue::Sequence(items) = &mut self.content_mut(container)?.value {
            items.insert(index, item);
        }
        if old_container != container {
            self.reparent(item, container)?;
        }
        Ok(())
    }

    // --- Internals ---

    /// Detach and free the slot's current directive, if any.
    fn detach_current_directive(&mut self, slot: NodeId) {
        let Some(directive) = self.current_directive(slot) else {
            return;
        };
        self.set_directive_connected(slot, directive, false);
        if self.config.prune_on_detach && self.registry.remove_member(slot, directive) {
            self.prune(slot);
        }
        if let Ok(content) = self.content_mut(slot) {
            content.directive = None;
        }
        self.directives.remove(directive);
    }

    /// Detach and free the slot's committed value.
    fn clear_value(&mut self, slot: NodeId) {
        self.set_value_connected(slot, false, true);
        let old = match self.content_mut(slot) {
            Ok(content) => std::mem::take(&mut content.value),
            Err(_) => return,
        };
        for child in old.child_nodes() {
            self.teardown(*child);
        }
    }

    /// Swap in a new value, detaching whatever was there.
    fn replace_value(&mut self, slot: NodeId, value: CommittedValue) -> Result<()> {
        self.clear_value(slot);
        self.content_mut(slot)?.value = value;
        Ok(())
    }

    fn write_directive_value(&mut self, directive: DirectiveId, value: String) -> Result<()> {
        let slot = self
            .directives
            .get(directive)
            .map(DirectiveEntry::slot)
            .ok_or(LifecycleError::UnknownDirective(directive))?;
        let is_content = match &self.node_ref(slot)?.kind {
            NodeKind::Content(_) => true,
            NodeKind::Attribute(_) => false,
            NodeKind::Instance(_) => return Err(LifecycleError::NotAContentSlot(slot)),
        };
        if is_content {
            return self.replace_value(slot, CommittedValue::Leaf(value));
        }
        let binding = self
            .attribute_mut(slot)?
            .bindings
            .iter_mut()
            .find(|binding| binding.directive == directive)
            .ok_or(LifecycleError::UnknownDirective(directive))?;
        binding.value = value;
        Ok(())
    }

    /// Free `node` and everything below it, with their registry entries.
    fn teardown(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Some(removed) = self.nodes.remove(id) else {
                continue;
            };
            trace!(node = ?id, kind = removed.kind.label(), "node freed");
            self.registry.delete(id);
            match removed.kind {
                NodeKind::Content(content) => {
                    if let Some(directive) = content.directive {
                        self.directives.remove(directive);
                    }
                    stack.extend_from_slice(content.value.child_nodes());
                }
                NodeKind::Attribute(attribute) => {
                    for binding in attribute.bindings {
                        self.directives.remove(binding.directive);
                    }
                }
                NodeKind::Instance(instance) => stack.extend(instance.slots),
            }
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn node_ref(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id).ok_or(LifecycleError::UnknownNode(id))
    }

    fn content(&self, id: NodeId) -> Result<&ContentSlot> {
        self.node_ref(id)?
            .as_content()
            .ok_or(LifecycleError::NotAContentSlot(id))
    }

    fn content_mut(&mut self, id: NodeId) -> Result<&mut ContentSlot> {
        match &mut self.nodes.get_mut(id).ok_or(LifecycleError::UnknownNode(id))?.kind {
            NodeKind::Content(content) => Ok(content),
            _ => Err(LifecycleError::NotAContentSlot(id)),
        }
    }

    fn attribute_mut(&mut self, id: NodeId) -> Result<&mut AttributeSlot> {
        match &mut self.nodes.get_mut(id).ok_or(LifecycleError::UnknownNode(id))?.kind {
            NodeKind::Attribute(attribute) => Ok(attribute),
            _ => Err(LifecycleError::NotAnAttributeSlot(id)),
        }
    }

    fn instance_mut(&mut self, id: NodeId) -> Result<&mut TemplateInstance> {
        match &mut self.nodes.get_mut(id).ok_or(LifecycleError::UnknownNode(id))?.kind {
            NodeKind::Instance(instance) => Ok(instance),
            _ => Err(LifecycleError::NotAnInstance(id)),
        }
    }

    fn expect_content(&self, id: NodeId) -> Result<()> {
        self.content(id).map(|_| ())
    }

    fn expect_attribute(&self, id: NodeId) -> Result<()> {
        self.node_ref(id)?
            .as_attribute()
            .map(|_| ())
            .ok_or(LifecycleError::NotAnAttributeSlot(id))
    }

    fn expect_instance(&self, id: NodeId) -> Result<()> {
        self.node_ref(id)?
            .as_instance()
            .map(|_| ())
            .ok_or(LifecycleError::NotAnInstance(id))
    }
}
