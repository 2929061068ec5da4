#![forbid(unsafe_code)]

//! Test harness and reference fixtures for `ftui-lifecycle`.
//!
//! - [`EventLog`] / [`RecordingDirective`]: a disconnect-aware directive that
//!   records every lifecycle callback it receives.
//! - [`fixtures`]: ready-made trees (single slot, deep chains, shared
//!   prefixes).
//! - [`check_registry`] / [`assert_registry_consistent!`]: structural audit
//!   of the ownership registry against the live part tree.
//! - [`strategies`]: proptest strategies over tree operations.

pub mod fixtures;
pub mod strategies;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use ftui_lifecycle::{
    Directive, DirectiveId, DirectiveKind, DisconnectableDirective, Member, NodeId, PartTree,
};

/// A lifecycle callback as observed by a [`RecordingDirective`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Disconnected,
    Reconnected,
    Rendered,
}

/// Shared, append-only record of callbacks, keyed by directive label.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<(String, LifecycleEvent)>>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, label: &str, event: LifecycleEvent) {
        self.events.borrow_mut().push((label.to_owned(), event));
    }

    /// Every recorded event, in order.
    #[must_use]
    pub fn events(&self) -> Vec<(String, LifecycleEvent)> {
        self.events.borrow().clone()
    }

    /// Connection callbacks for one label, in order. Renders are skipped.
    #[must_use]
    pub fn transitions(&self, label: &str) -> Vec<LifecycleEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|(l, e)| l == label && *e != LifecycleEvent::Rendered)
            .map(|(_, e)| *e)
            .collect()
    }

    #[must_use]
    pub fn count(&self, label: &str, event: LifecycleEvent) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|(l, e)| l == label && *e == event)
            .count()
    }

    /// Number of connection callbacks across all labels.
    #[must_use]
    pub fn transition_count(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|(_, e)| *e != LifecycleEvent::Rendered)
            .count()
    }

    /// Number of `event` callbacks across all labels.
    #[must_use]
    pub fn transitions_of(&self, event: LifecycleEvent) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|(_, e)| *e == event)
            .count()
    }

    /// Labels whose callbacks fail to alternate, starting from disconnected.
    #[must_use]
    pub fn non_alternating_labels(&self) -> Vec<String> {
        let events = self.events.borrow();
        let mut expected: HashMap<&str, LifecycleEvent> = HashMap::new();
        let mut bad: Vec<String> = Vec::new();
        for (label, event) in events.iter() {
            if *event == LifecycleEvent::Rendered {
                continue;
            }
            let want = expected
                .get(label.as_str())
                .copied()
                .unwrap_or(LifecycleEvent::Disconnected);
            if *event != want && !bad.contains(label) {
                bad.push(label.clone());
            }
            let next = match event {
                LifecycleEvent::Disconnected => LifecycleEvent::Reconnected,
                _ => LifecycleEvent::Disconnected,
            };
            expected.insert(label.as_str(), next);
        }
        bad
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

/// Disconnect-aware directive that records its callbacks into an [`EventLog`].
pub struct RecordingDirective {
    label: String,
    log: EventLog,
}

impl RecordingDirective {
    pub fn new(label: impl Into<String>, log: &EventLog) -> Self {
        Self {
            label: label.into(),
            log: log.clone(),
        }
    }

    #[must_use]
    pub fn into_kind(self) -> DirectiveKind {
        DirectiveKind::disconnectable(self)
    }
}

impl fmt::Debug for RecordingDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingDirective")
            .field("label", &self.label)
            .finish()
    }
}

impl Directive for RecordingDirective {
    fn render(&mut self) -> String {
        self.log.push(&self.label, LifecycleEvent::Rendered);
        self.label.clone()
    }
}

impl DisconnectableDirective for RecordingDirective {
    fn on_disconnected(&mut self) {
        tracing::trace!(label = %self.label, "on_disconnected");
        self.log.push(&self.label, LifecycleEvent::Disconnected);
    }

    fn on_reconnected(&mut self) {
        tracing::trace!(label = %self.label, "on_reconnected");
        self.log.push(&self.label, LifecycleEvent::Reconnected);
    }
}

/// Directive with no lifecycle interest; renders a fixed string.
#[derive(Debug, Clone)]
pub struct PlainDirective(pub String);

impl Directive for PlainDirective {
    fn render(&mut self) -> String {
        self.0.clone()
    }
}

impl PlainDirective {
    #[must_use]
    pub fn into_kind(self) -> DirectiveKind {
        DirectiveKind::plain(self)
    }
}

/// One inconsistency between the registry and the part tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryViolation {
    /// An entry survived with nothing in it.
    EmptyEntry(NodeId),
    /// An entry is keyed by a node the tree no longer holds.
    DeadKey(NodeId),
    /// A node member is missing, or its parent is not the entry's key.
    ForeignNode { key: NodeId, member: NodeId },
    /// A node member has no entry of its own, so nothing below it is tracked.
    HollowNode { key: NodeId, member: NodeId },
    /// A directive member is missing, or hosted by another slot.
    ForeignDirective { key: NodeId, member: DirectiveId },
    /// A keyed node is not listed in its parent's entry.
    Unlinked { key: NodeId, parent: NodeId },
    /// A live disconnect-aware directive is not in its slot's entry.
    Unregistered(DirectiveId),
    /// A node kept its entry points after its entry was deleted.
    StaleCapabilities { node: NodeId, kind: &'static str },
}

/// Audit the registry of `tree`. Assumes pruning is enabled.
#[must_use]
pub fn check_registry(tree: &PartTree) -> Vec<RegistryViolation> {
    let registry = tree.registry();
    let mut violations = Vec::new();

    for (key, members) in registry.iter() {
        if !tree.contains_node(key) {
            violations.push(RegistryViolation::DeadKey(key));
            continue;
        }
        if members.is_empty() {
            violations.push(RegistryViolation::EmptyEntry(key));
        }
        if let Some(parent) = tree.parent(key) {
            if !registry.contains_member(parent, key) {
                violations.push(RegistryViolation::Unlinked { key, parent });
            }
        }
        for member in members {
            match *member {
                Member::Node(child) => {
                    if tree.parent(child) != Some(key) {
                        violations.push(RegistryViolation::ForeignNode { key, member: child });
                    } else if !registry.contains_key(child) {
                        violations.push(RegistryViolation::HollowNode { key, member: child });
                    }
                }
                Member::Directive(directive) => {
                    let hosted_here = tree
                        .directive(directive)
                        .is_some_and(|entry| entry.slot() == key);
                    if !hosted_here {
                        violations.push(RegistryViolation::ForeignDirective {
                            key,
                            member: directive,
                        });
                    }
                }
            }
        }
    }

    for (id, node) in tree.nodes() {
        if node.capabilities().is_some() && !registry.contains_key(id) {
            violations.push(RegistryViolation::StaleCapabilities {
                node: id,
                kind: node.kind().label(),
            });
        }
    }

    for (id, entry) in tree.directives() {
        if entry.is_disconnectable() && !registry.contains_member(entry.slot(), id) {
            violations.push(RegistryViolation::Unregistered(id));
        }
    }
    violations
}

/// Panic with the full violation list if the registry is inconsistent.
#[macro_export]
macro_rules! assert_registry_consistent {
    ($tree:expr) => {{
        let violations = $crate::check_registry(&$tree);
        assert!(
            violations.is_empty(),
            "registry inconsistent: {violations:#?}"
        );
    }};
}
