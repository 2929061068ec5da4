#![forbid(unsafe_code)]

//! Connection propagation, detachment pruning, and registration.
//!
//! Propagation walks the [`OwnershipRegistry`](crate::OwnershipRegistry)
//! rather than the part tree, so its cost is bounded by the number of
//! interesting nodes below the starting point. A node without an entry is
//! the frontier: one lookup, no work.
//!
//! # Invariants
//!
//! 1. Members are visited in registration order.
//! 2. Pruning runs only on explicit detachment, never on a plain toggle.
//! 3. Pruning climbs until the first ancestor whose set stays non-empty;
//!    everything above it is still needed by another directive.
//! 4. Registration stops at the first ancestor that already holds the
//!    current member, so shared prefixes are built once.

use tracing::{debug, debug_span};

use crate::error::{LifecycleError, Result};
use crate::registry::Member;
use crate::tree::{CommittedValue, DirectiveId, NodeId, NodeKind, PartTree};

impl PartTree {
    /// Apply `is_connected` to every member registered under `node`.
    ///
    /// With `detach_from`, `node` is removed from that owner's set once the
    /// walk completes.
    pub(crate) fn propagate(
        &mut self,
        node: NodeId,
        is_connected: bool,
        detach_from: Option<NodeId>,
    ) {
        let Some(members) = self.registry.snapshot(node) else {
            return;
        };
        let _span = debug_span!(
            "propagate",
            ?node,
            is_connected,
            members = members.len()
        )
        .entered();

        for member in members {
            self.visit_member(member, is_connected);
        }
        if let Some(owner) = detach_from {
            self.registry.remove_member(owner, node);
        }
    }

    fn visit_member(&mut self, member: Member, is_connected: bool) {
        let child = match member {
            Member::Directive(directive) => {
                self.set_directive_state(directive, is_connected);
                return;
            }
            Member::Node(child) => child,
        };
        match self.nodes.get(child).map(|node| Visit::of(&node.kind)) {
            Some(Visit::Content(directive)) => {
                if let Some(directive) = directive {
                    self.set_directive_connected(child, directive, is_connected);
                }
                self.set_value_connected(child, is_connected, false);
            }
            Some(Visit::Attribute(directives)) => {
                for directive in directives {
                    self.set_directive_connected(child, directive, is_connected);
                }
            }
            Some(Visit::Instance) => self.propagate(child, is_connected, None),
            None => {}
        }
    }

    /// Connect or disconnect the value committed into `slot`.
    ///
    /// With `remove_from_parent`, the value is being torn down: each value
    /// node is detached from `slot`'s set and the registry is pruned upward.
    pub(crate) fn apply_to_value(&mut self, slot: NodeId, is_connected: bool, remove: bool) {
        let value = match self.committed_value(slot) {
            Some(value) => value.clone(),
            None => return,
        };
        let detach = remove && self.config.prune_on_detach;
        let owner = detach.then_some(slot);
        match value {
            CommittedValue::Instance(instance) => {
                self.propagate(instance, is_connected, owner);
            }
            CommittedValue::Sequence(items) => {
                for item in items {
                    self.visit_item(item, is_connected, owner);
                }
            }
            CommittedValue::Empty | CommittedValue::Leaf(_) => {}
        }
        if detach {
            self.prune(slot);
        }
    }

    /// Disconnect and detach list items from `from` onward; earlier items
    /// are untouched. Used when a list rendering shrinks.
    pub(crate) fn apply_to_value_from(&mut self, slot: NodeId, is_connected: bool, from: usize) {
        let items = match self.committed_value(slot) {
            Some(CommittedValue::Sequence(items)) => items.get(from..).unwrap_or_default().to_vec(),
            _ => return,
        };
        let owner = self.config.prune_on_detach.then_some(slot);
        for item in items {
            self.visit_item(item, is_connected, owner);
        }
        if owner.is_some() {
            self.prune(slot);
        }
    }

    /// A list item's own entry holds its directive and value interest.
    fn visit_item(&mut self, item: NodeId, is_connected: bool, detach_from: Option<NodeId>) {
        self.propagate(item, is_connected, detach_from);
    }

    /// Delete `node`'s entry if it went empty, then climb, removing each
    /// childless node from its parent until a set stays non-empty.
    pub(crate) fn prune(&mut self, node: NodeId) {
        if !self.registry.get(node).is_some_and(|set| set.is_empty()) {
            return;
        }
        let _span = debug_span!("prune", ?node).entered();
        self.untrack(node);

        let mut current = node;
        while let Some(parent) = self.parent(current) {
            self.registry.remove_member(parent, current);
            if !self.registry.get(parent).is_some_and(|set| set.is_empty()) {
                break;
            }
            self.untrack(parent);
            current = parent;
        }
    }

    /// Drop `node`'s entry and the entry points that came with it.
    fn untrack(&mut self, node: NodeId) {
        self.registry.delete(node);
        if let Some(entry) = self.nodes.get_mut(node) {
            entry.capabilities = None;
        }
        debug!(?node, "registry entry deleted");
    }

    /// Insert `directive` and its ancestors into the registry.
    ///
    /// The depth limit is checked before anything is inserted, so a rejected
    /// registration leaves the registry as it was.
    pub(crate) fn register_directive(&mut self, directive: DirectiveId, slot: NodeId) -> Result<()> {
        let start = Member::Directive(directive);
        self.check_chain(start, slot)?;
        self.register_chain(start, slot);
        self.install_capabilities(slot);
        Ok(())
    }

    /// Dry run of [`Self::register_chain`]: fails if the climb would pass
    /// through a freed node or add links to more ancestors than the
    /// configured limit allows.
    fn check_chain(&self, start: Member, first_ancestor: NodeId) -> Result<()> {
        let limit = self.config.ancestor_depth_limit;
        let mut current = start;
        let mut ancestor = Some(first_ancestor);
        let mut depth = 0usize;

        while let Some(node) = ancestor {
            if !self.nodes.contains_key(node) {
                return Err(LifecycleError::UnknownNode(node));
            }
            if self.registry.contains_member(node, current) {
                break;
            }
            if let Some(limit) = limit {
                if depth >= limit {
                    return Err(LifecycleError::AncestorDepthExceeded {
                        start: first_ancestor,
                        limit,
                    });
                }
            }
            current = Member::Node(node);
            ancestor = self.parent(node);
            depth += 1;
        }
        Ok(())
    }

    fn register_chain(&mut self, start: Member, first_ancestor: NodeId) {
        let mut current = start;
        let mut ancestor = Some(first_ancestor);

        while let Some(node) = ancestor {
            let members = self.registry.entry_or_default(node);
            if !members.insert(current) {
                break;
            }
            self.install_capabilities(node);
            current = Member::Node(node);
            ancestor = self.parent(node);
        }
    }

    /// Move `node` under `new_parent`, carrying its registry interest along.
    ///
    /// The old parent always loses `node` as a member; its emptied chain is
    /// pruned only when pruning is enabled. The depth limit guards
    /// registration only, so an already tracked node is not re-checked when
    /// it moves.
    pub(crate) fn reparent(&mut self, node: NodeId, new_parent: NodeId) -> Result<()> {
        if !self.nodes.contains_key(new_parent) {
            return Err(LifecycleError::UnknownNode(new_parent));
        }
        let tracked = self.registry.contains_key(node);
        let old_parent = self.parent(node);

        if tracked {
            if let Some(old_parent) = old_parent {
                let removed = self.registry.remove_member(old_parent, node);
                if removed && self.config.prune_on_detach {
                    self.prune(old_parent);
                }
            }
        }
        if let Some(entry) = self.nodes.get_mut(node) {
            entry.parent = Some(new_parent);
        }
        if tracked {
            self.register_chain(Member::Node(node), new_parent);
        }
        Ok(())
    }
}

/// What propagation does with a node member, captured before mutating.
enum Visit {
    Content(Option<DirectiveId>),
    Attribute(Vec<DirectiveId>),
    Instance,
}

impl Visit {
    fn of(kind: &NodeKind) -> Self {
        match kind {
            NodeKind::Content(content) => Self::Content(content.directive),
            NodeKind::Attribute(attribute) => Self::Attribute(attribute.directives().collect()),
            NodeKind::Instance(_) => Self::Instance,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::config::LifecycleConfig;
    use crate::directive::{Directive, DirectiveKind, DisconnectableDirective};

    type Log = Rc<RefCell<Vec<(&'static str, &'static str)>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
    }

    impl Directive for Recorder {
        fn render(&mut self) -> String {
            self.name.to_string()
        }
    }

    impl DisconnectableDirective for Recorder {
        fn on_disconnected(&mut self) {
            self.log.borrow_mut().push((self.name, "disconnected"));
        }

        fn on_reconnected(&mut self) {
            self.log.borrow_mut().push((self.name, "reconnected"));
        }
    }

    struct Static;

    impl Directive for Static {
        fn render(&mut self) -> String {
            "static".to_string()
        }
    }

    fn recorder(name: &'static str, log: &Log) -> DirectiveKind {
        DirectiveKind::disconnectable(Recorder {
            name,
            log: Rc::clone(log),
        })
    }

    /// root -> instance -> slot
    fn one_slot(tree: &mut PartTree) -> (NodeId, NodeId, NodeId) {
        let root = tree.create_root();
        let instance = tree.commit_instance(root).unwrap();
        let slot = tree.add_content_slot(instance).unwrap();
        (root, instance, slot)
    }

    #[test]
    fn registration_builds_chain_to_root() {
        let log = Log::default();
        let mut tree = PartTree::new();
        let (root, instance, slot) = one_slot(&mut tree);
        let d = tree.commit_directive(slot, recorder("d", &log)).unwrap();

        assert!(tree.registry().contains_member(slot, d));
        assert!(tree.registry().contains_member(instance, slot));
        assert!(tree.registry().contains_member(root, instance));
        assert_eq!(tree.registry().len(), 3);
        assert!(tree.has_capabilities(slot));
        assert!(tree.has_capabilities(root));
        assert!(!tree.has_capabilities(instance), "instances need no entry points");
    }

    #[test]
    fn plain_directives_are_not_tracked() {
        let mut tree = PartTree::new();
        let (root, _, slot) = one_slot(&mut tree);
        tree.commit_directive(slot, DirectiveKind::plain(Static))
            .unwrap();
        assert!(tree.registry().is_empty());
        assert!(!tree.has_capabilities(root));
        assert_eq!(
            tree.committed_value(slot),
            Some(&CommittedValue::Leaf("static".into()))
        );
    }

    #[test]
    fn toggle_root_fires_each_callback_once() {
        let log = Log::default();
        let mut tree = PartTree::new();
        let (root, _, slot) = one_slot(&mut tree);
        let d = tree.commit_directive(slot, recorder("d", &log)).unwrap();

        tree.set_connected(root, false).unwrap();
        tree.set_connected(root, false).unwrap();
        assert!(!tree.is_connected(d));
        tree.set_connected(root, true).unwrap();
        tree.set_connected(root, true).unwrap();
        assert!(tree.is_connected(d));

        assert_eq!(
            *log.borrow(),
            vec![("d", "disconnected"), ("d", "reconnected")]
        );
    }

    #[test]
    fn untracked_sibling_is_skipped() {
        let log = Log::default();
        let mut tree = PartTree::new();
        let (root, instance, slot) = one_slot(&mut tree);
        let quiet = tree.add_content_slot(instance).unwrap();
        tree.commit_directive(quiet, DirectiveKind::plain(Static))
            .unwrap();
        tree.commit_directive(slot, recorder("d", &log)).unwrap();

        assert!(!tree.has_capabilities(quiet));
        assert!(tree.registry().get(quiet).is_none());
        tree.set_connected(root, false).unwrap();
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn clearing_only_interest_prunes_whole_chain() {
        let log = Log::default();
        let mut tree = PartTree::new();
        let (root, _, slot) = one_slot(&mut tree);
        tree.commit_directive(slot, recorder("d", &log)).unwrap();

        tree.clear(slot).unwrap();
        assert!(tree.registry().is_empty());
        assert_eq!(*log.borrow(), vec![("d", "disconnected")]);
        assert_eq!(tree.directive_count(), 0);

        tree.set_connected(root, false).unwrap();
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn pruning_stops_at_shared_ancestor() {
        let log = Log::default();
        let mut tree = PartTree::new();
        let (root, instance, a) = one_slot(&mut tree);
        let b = tree.add_content_slot(instance).unwrap();
        tree.commit_directive(a, recorder("a", &log)).unwrap();
        let db = tree.commit_directive(b, recorder("b", &log)).unwrap();

        tree.clear(a).unwrap();
        assert!(tree.registry().get(a).is_none());
        assert!(!tree.registry().contains_member(instance, a));
        assert!(tree.registry().contains_member(instance, b));
        assert!(tree.registry().contains_member(root, instance));
        assert!(tree.registry().contains_member(b, db));
        assert_eq!(tree.registry().empty_entries().count(), 0);
    }

    #[test]
    fn replacing_instance_disconnects_old_content() {
        let log = Log::default();
        let mut tree = PartTree::new();
        let (root, old_instance, slot) = one_slot(&mut tree);
        tree.commit_directive(slot, recorder("old", &log)).unwrap();

        let fresh = tree.commit_instance(root).unwrap();
        assert_eq!(*log.borrow(), vec![("old", "disconnected")]);
        assert!(!tree.contains_node(old_instance));
        assert!(!tree.contains_node(slot));
        assert!(tree.registry().is_empty());

        let slot = tree.add_content_slot(fresh).unwrap();
        tree.commit_directive(slot, recorder("new", &log)).unwrap();
        assert!(tree.registry().contains_member(root, fresh));
    }

    #[test]
    fn attribute_slot_directives_share_entry() {
        let log = Log::default();
        let mut tree = PartTree::new();
        let root = tree.create_root();
        let instance = tree.commit_instance(root).unwrap();
        let attr = tree.add_attribute_slot(instance, "class").unwrap();
        let x = tree.add_attribute_directive(attr, recorder("x", &log)).unwrap();
        let y = tree.add_attribute_directive(attr, recorder("y", &log)).unwrap();

        let members = tree.registry().snapshot(attr).unwrap();
        assert_eq!(members, vec![Member::Directive(x), Member::Directive(y)]);
        assert_eq!(tree.registry().snapshot(instance).unwrap(), vec![Member::Node(attr)]);

        tree.set_connected(root, false).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![("x", "disconnected"), ("y", "disconnected")]
        );
    }

    #[test]
    fn sequence_truncation_detaches_tail_only() {
        let log = Log::default();
        let mut tree = PartTree::new();
        let root = tree.create_root();
        let items = tree.commit_sequence(root, 3).unwrap();
        let names = ["i0", "i1", "i2"];
        let ids: Vec<DirectiveId> = items
            .iter()
            .zip(names)
            .map(|(&item, name)| tree.commit_directive(item, recorder(name, &log)).unwrap())
            .collect();

        tree.truncate_sequence(root, 1).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![("i1", "disconnected"), ("i2", "disconnected")]
        );
        assert_eq!(tree.registry().snapshot(root).unwrap(), vec![Member::Node(items[0])]);
        assert!(tree.is_connected(ids[0]));
        assert!(!tree.contains_node(items[2]));
    }

    #[test]
    fn truncate_beyond_length_is_an_error() {
        let mut tree = PartTree::new();
        let root = tree.create_root();
        tree.commit_sequence(root, 2).unwrap();
        assert_eq!(
            tree.truncate_sequence(root, 5),
            Err(LifecycleError::IndexOutOfRange { index: 5, len: 2 })
        );
    }

    #[test]
    fn moving_item_rehomes_interest() {
        let log = Log::default();
        let mut tree = PartTree::new();
        let root = tree.create_root();
        let instance = tree.commit_instance(root).unwrap();
        let left = tree.add_content_slot(instance).unwrap();
        let right = tree.add_content_slot(instance).unwrap();
        let left_items = tree.commit_sequence(left, 2).unwrap();
        tree.commit_sequence(right, 0).unwrap();
        tree.commit_directive(left_items[1], recorder("moved", &log))
            .unwrap();

        tree.move_sequence_item(left_items[1], right, 0).unwrap();
        assert_eq!(tree.parent(left_items[1]), Some(right));
        assert!(tree.registry().get(left).is_none(), "old container pruned");
        assert!(tree.registry().contains_member(right, left_items[1]));
        assert!(tree.registry().contains_member(instance, right));

        tree.clear(right).unwrap();
        assert_eq!(*log.borrow(), vec![("moved", "disconnected")]);
        assert!(tree.registry().is_empty());
    }

    #[test]
    fn depth_limit_rejects_without_side_effects() {
        let log = Log::default();
        let mut tree = PartTree::with_config(LifecycleConfig::default().ancestor_depth_limit(2));
        let (_, _, slot) = one_slot(&mut tree);

        let err = tree.commit_directive(slot, recorder("deep", &log)).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::AncestorDepthExceeded { start: slot, limit: 2 }
        );
        assert!(tree.registry().is_empty());
        assert_eq!(tree.directive_count(), 0);
        assert_eq!(tree.current_directive(slot), None);
    }

    #[test]
    fn rejected_replacement_keeps_current_directive() {
        let log = Log::default();
        let mut tree = PartTree::with_config(LifecycleConfig::default().ancestor_depth_limit(2));
        let (_, _, slot) = one_slot(&mut tree);
        let keep = tree.commit_directive(slot, DirectiveKind::plain(Static)).unwrap();

        let err = tree.commit_directive(slot, recorder("deep", &log)).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::AncestorDepthExceeded { start: slot, limit: 2 }
        );
        assert!(tree.directive(keep).is_some());
        assert_eq!(tree.current_directive(slot), Some(keep));
        assert_eq!(tree.directive_count(), 1);
        assert_eq!(
            tree.committed_value(slot),
            Some(&CommittedValue::Leaf("static".into()))
        );
        assert!(tree.registry().is_empty());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn replacing_aware_directive_reuses_chain() {
        let log = Log::default();
        let mut tree = PartTree::with_config(LifecycleConfig::default().ancestor_depth_limit(3));
        let (root, instance, slot) = one_slot(&mut tree);
        tree.commit_directive(slot, recorder("old", &log)).unwrap();

        let new = tree.commit_directive(slot, recorder("new", &log)).unwrap();
        assert_eq!(*log.borrow(), vec![("old", "disconnected")]);
        assert_eq!(tree.registry().snapshot(slot).unwrap(), vec![Member::Directive(new)]);
        assert!(tree.registry().contains_member(instance, slot));
        assert!(tree.registry().contains_member(root, instance));
        assert_eq!(tree.directive_count(), 1);
    }

    #[test]
    fn pruning_drops_entry_points() {
        let log = Log::default();
        let mut tree = PartTree::new();
        let (root, _, slot) = one_slot(&mut tree);
        tree.commit_directive(slot, recorder("d", &log)).unwrap();
        assert!(tree.has_capabilities(slot));

        tree.clear(slot).unwrap();
        assert!(!tree.has_capabilities(slot));
        assert!(!tree.has_capabilities(root));

        tree.commit_directive(slot, recorder("again", &log)).unwrap();
        assert!(tree.has_capabilities(slot));
        assert!(tree.has_capabilities(root));
    }

    #[test]
    fn disabled_pruning_still_moves_membership() {
        let log = Log::default();
        let mut tree = PartTree::with_config(LifecycleConfig::default().prune_on_detach(false));
        let root = tree.create_root();
        let instance = tree.commit_instance(root).unwrap();
        let left = tree.add_content_slot(instance).unwrap();
        let right = tree.add_content_slot(instance).unwrap();
        let left_items = tree.commit_sequence(left, 1).unwrap();
        tree.commit_sequence(right, 0).unwrap();
        tree.commit_directive(left_items[0], recorder("moved", &log))
            .unwrap();

        tree.move_sequence_item(left_items[0], right, 0).unwrap();
        assert!(!tree.registry().contains_member(left, left_items[0]));
        assert!(tree.registry().get(left).is_some(), "old chain kept");
        assert!(tree.registry().contains_member(instance, left));
        assert!(tree.registry().contains_member(right, left_items[0]));

        tree.clear(left).unwrap();
        assert!(log.borrow().is_empty());
        tree.clear(right).unwrap();
        assert_eq!(*log.borrow(), vec![("moved", "disconnected")]);
    }

    #[test]
    fn disabled_pruning_keeps_entries() {
        let log = Log::default();
        let mut tree = PartTree::with_config(LifecycleConfig::default().prune_on_detach(false));
        let (root, instance, slot) = one_slot(&mut tree);
        tree.commit_directive(slot, recorder("d", &log)).unwrap();

        tree.clear(slot).unwrap();
        assert_eq!(*log.borrow(), vec![("d", "disconnected")]);
        assert!(tree.registry().contains_member(instance, slot));
        assert!(tree.registry().contains_member(root, instance));
    }

    #[test]
    fn resolve_reconnects_before_render() {
        let log = Log::default();
        let mut tree = PartTree::new();
        let (root, _, slot) = one_slot(&mut tree);
        let d = tree.commit_directive(slot, recorder("d", &log)).unwrap();
        tree.set_connected(root, false).unwrap();

        let output = tree.resolve(d).unwrap();
        assert_eq!(output, "d");
        assert!(tree.is_connected(d));
        assert_eq!(
            *log.borrow(),
            vec![("d", "disconnected"), ("d", "reconnected")]
        );
    }

    #[test]
    fn set_value_keeps_directive_registered() {
        let log = Log::default();
        let mut tree = PartTree::new();
        let (_, instance, slot) = one_slot(&mut tree);
        let d = tree.commit_directive(slot, recorder("d", &log)).unwrap();

        tree.set_value(d, "tick").unwrap();
        assert_eq!(
            tree.committed_value(slot),
            Some(&CommittedValue::Leaf("tick".into()))
        );
        assert!(tree.registry().contains_member(slot, d));
        assert!(tree.registry().contains_member(instance, slot));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn wrong_node_kind_is_rejected() {
        let mut tree = PartTree::new();
        let (root, instance, _) = one_slot(&mut tree);
        assert_eq!(
            tree.set_connected(instance, false),
            Err(LifecycleError::NotAContentSlot(instance))
        );
        assert_eq!(
            tree.add_content_slot(root),
            Err(LifecycleError::NotAnInstance(root))
        );
        let attr = tree.add_attribute_slot(instance, "id").unwrap();
        assert_eq!(
            tree.commit_leaf(attr, "x"),
            Err(LifecycleError::NotAContentSlot(attr))
        );
    }

    #[test]
    #[tracing_test::traced_test]
    fn pruning_is_logged() {
        let log = Log::default();
        let mut tree = PartTree::new();
        let (_, _, slot) = one_slot(&mut tree);
        tree.commit_directive(slot, recorder("d", &log)).unwrap();
        tree.clear(slot).unwrap();
        assert!(logs_contain("registry entry deleted"));
    }
}
