#![forbid(unsafe_code)]

//! Ownership registry: the sparse shadow tree of disconnect interest.
//!
//! Maps a node to the set of its direct members (child nodes or
//! directives) that lead to at least one disconnect-aware directive. Nodes
//! with no such descendants have no entry, which is what lets propagation
//! stop at the frontier of interest.
//!
//! # Invariants
//!
//! 1. A member is in its parent's set iff its subtree still holds an
//!    unpruned disconnect-aware directive.
//! 2. Every key is reachable from some registered directive by walking
//!    parent links.
//! 3. Sets iterate in registration order.
//!
//! # Failure Modes
//!
//! - Lookups with a key whose node was freed return `None`; the
//!   `SecondaryMap` checks key versions, so a stale entry can never be
//!   observed through a recycled slot.

use ahash::RandomState;
use indexmap::IndexSet;
use slotmap::SecondaryMap;

use crate::tree::{DirectiveId, NodeId};

/// Insertion-ordered member set.
pub type MemberSet = IndexSet<Member, RandomState>;

/// Something a registry set can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Member {
    Node(NodeId),
    Directive(DirectiveId),
}

impl From<NodeId> for Member {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl From<DirectiveId> for Member {
    fn from(id: DirectiveId) -> Self {
        Self::Directive(id)
    }
}

/// Sparse map from node to interesting members.
#[derive(Debug, Default)]
pub struct OwnershipRegistry {
    entries: SecondaryMap<NodeId, MemberSet>,
}

impl OwnershipRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, node: NodeId) -> Option<&MemberSet> {
        self.entries.get(node)
    }

    pub fn set(&mut self, node: NodeId, members: MemberSet) {
        self.entries.insert(node, members);
    }

    pub fn delete(&mut self, node: NodeId) -> Option<MemberSet> {
        self.entries.remove(node)
    }

    /// Fetch `node`'s set, creating an empty one if absent.
    pub fn entry_or_default(&mut self, node: NodeId) -> &mut MemberSet {
        if !self.entries.contains_key(node) {
            self.entries.insert(node, MemberSet::default());
        }
        &mut self.entries[node]
    }

    #[must_use]
    pub fn contains_key(&self, node: NodeId) -> bool {
        self.entries.contains_key(node)
    }

    #[must_use]
    pub fn contains_member(&self, node: NodeId, member: impl Into<Member>) -> bool {
        self.entries
            .get(node)
            .is_some_and(|set| set.contains(&member.into()))
    }

    /// Remove `member` from `node`'s set. Returns whether it was present.
    ///
    /// Uses `shift_remove` so the surviving members keep their order.
    pub fn remove_member(&mut self, node: NodeId, member: impl Into<Member>) -> bool {
        self.entries
            .get_mut(node)
            .is_some_and(|set| set.shift_remove(&member.into()))
    }

    /// Copy of `node`'s members, so callers can mutate the registry while
    /// walking them.
    #[must_use]
    pub fn snapshot(&self, node: NodeId) -> Option<Vec<Member>> {
        self.entries.get(node).map(|set| set.iter().copied().collect())
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &MemberSet)> {
        self.entries.iter()
    }

    /// Keys whose sets are empty. Healthy trees report none after pruning.
    pub fn empty_entries(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries
            .iter()
            .filter(|(_, set)| set.is_empty())
            .map(|(node, _)| node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn keys(n: usize) -> Vec<NodeId> {
        let mut arena: SlotMap<NodeId, ()> = SlotMap::with_key();
        (0..n).map(|_| arena.insert(())).collect()
    }

    #[test]
    fn missing_entry_is_none() {
        let registry = OwnershipRegistry::new();
        let ids = keys(1);
        assert!(registry.get(ids[0]).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn entry_or_default_creates_once() {
        let mut registry = OwnershipRegistry::new();
        let ids = keys(2);
        registry.entry_or_default(ids[0]).insert(Member::Node(ids[1]));
        registry.entry_or_default(ids[0]);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains_member(ids[0], ids[1]));
    }

    #[test]
    fn members_iterate_in_registration_order() {
        let mut registry = OwnershipRegistry::new();
        let ids = keys(5);
        for &child in ids[1..].iter().rev() {
            registry.entry_or_default(ids[0]).insert(child.into());
        }
        let order = registry.snapshot(ids[0]).unwrap();
        let expected: Vec<Member> = ids[1..].iter().rev().map(|&id| id.into()).collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn remove_member_preserves_order_of_rest() {
        let mut registry = OwnershipRegistry::new();
        let ids = keys(4);
        for &child in &ids[1..] {
            registry.entry_or_default(ids[0]).insert(child.into());
        }
        assert!(registry.remove_member(ids[0], ids[2]));
        assert!(!registry.remove_member(ids[0], ids[2]));
        let order = registry.snapshot(ids[0]).unwrap();
        assert_eq!(order, vec![Member::Node(ids[1]), Member::Node(ids[3])]);
    }

    #[test]
    fn empty_entries_reports_hollow_sets() {
        let mut registry = OwnershipRegistry::new();
        let ids = keys(3);
        registry.entry_or_default(ids[0]);
        registry.entry_or_default(ids[1]).insert(ids[2].into());
        let empty: Vec<NodeId> = registry.empty_entries().collect();
        assert_eq!(empty, vec![ids[0]]);
    }

    #[test]
    fn stale_key_does_not_resolve() {
        let mut arena: SlotMap<NodeId, ()> = SlotMap::with_key();
        let first = arena.insert(());
        let mut registry = OwnershipRegistry::new();
        registry.entry_or_default(first);
        arena.remove(first);
        let recycled = arena.insert(());
        assert!(registry.get(recycled).is_none());
        registry.delete(first);
        assert!(registry.is_empty());
    }
}
