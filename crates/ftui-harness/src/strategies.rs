#![forbid(unsafe_code)]

//! Random operation sequences over a [`PartTree`].
//!
//! [`TreeOp`] names nodes and directives by index into the live set at the
//! time the op runs, so any sequence is valid against any tree. [`Driver`]
//! resolves the indices and applies the op; it is shared by the proptest
//! suites and the fuzz target.

use ftui_lifecycle::{
    CommittedValue, DirectiveId, LifecycleConfig, LifecycleError, NodeId, NodeKind, PartTree,
    Result,
};
use proptest::prelude::*;

use crate::{EventLog, PlainDirective, RecordingDirective};

/// One structural or connection change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeOp {
    /// Commit an instance with `1 + slots % 3` content slots, plus an
    /// attribute slot when `attribute` is set.
    Nest { slot: usize, slots: u8, attribute: bool },
    /// Commit a list of `len % 4` items.
    List { slot: usize, len: u8 },
    /// Append one item, starting a list if needed.
    Push { slot: usize },
    /// Commit a recording disconnect-aware directive.
    Aware { slot: usize },
    /// Commit a plain directive.
    Plain { slot: usize },
    /// Commit leaf text.
    Leaf { slot: usize },
    /// Clear a content slot.
    Clear { slot: usize },
    /// Connect or disconnect the root.
    Toggle { connected: bool },
    /// Connect or disconnect an inner content slot.
    ToggleSlot { slot: usize, connected: bool },
    /// Bind a recording directive to an attribute slot.
    AttributeAware { slot: usize },
    /// Shrink a list to `len % (current + 1)` items.
    Truncate { slot: usize, len: u8 },
    /// Re-render a directive.
    Resolve { directive: usize },
    /// Commit text on a directive's behalf.
    SetValue { directive: usize },
    /// Move a list item into some list.
    Move { item: usize, container: usize, index: u8 },
}

/// Tree, root, and recording log driven by [`TreeOp`]s.
#[derive(Debug)]
pub struct Driver {
    pub tree: PartTree,
    pub log: EventLog,
    root: NodeId,
    next_label: usize,
}

impl Default for Driver {
    fn default() -> Self {
        Self::new(LifecycleConfig::default())
    }
}

impl Driver {
    #[must_use]
    pub fn new(config: LifecycleConfig) -> Self {
        let mut tree = PartTree::with_config(config);
        let root = tree.create_root();
        Self {
            tree,
            log: EventLog::new(),
            root,
            next_label: 0,
        }
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Live content slots, in arena order. Always includes the root.
    #[must_use]
    pub fn content_slots(&self) -> Vec<NodeId> {
        self.nodes_where(|kind| matches!(kind, NodeKind::Content(_)))
    }

    #[must_use]
    pub fn attribute_slots(&self) -> Vec<NodeId> {
        self.nodes_where(|kind| matches!(kind, NodeKind::Attribute(_)))
    }

    /// Content slots whose committed value is a list.
    #[must_use]
    pub fn list_slots(&self) -> Vec<NodeId> {
        self.nodes_where(|kind| {
            matches!(
                kind,
                NodeKind::Content(content) if matches!(content.value, CommittedValue::Sequence(_))
            )
        })
    }

    /// Items of every live list.
    #[must_use]
    pub fn list_items(&self) -> Vec<NodeId> {
        self.list_slots()
            .into_iter()
            .filter_map(|slot| self.tree.committed_value(slot))
            .flat_map(|value| value.child_nodes().to_vec())
            .collect()
    }

    /// Live disconnect-aware directives.
    #[must_use]
    pub fn aware_directives(&self) -> Vec<DirectiveId> {
        self.tree
            .directives()
            .filter(|(_, entry)| entry.is_disconnectable())
            .map(|(id, _)| id)
            .collect()
    }

    fn nodes_where(&self, keep: impl Fn(&NodeKind) -> bool) -> Vec<NodeId> {
        self.tree
            .nodes()
            .filter(|(_, node)| keep(node.kind()))
            .map(|(id, _)| id)
            .collect()
    }

    fn recording(&mut self) -> RecordingDirective {
        let label = format!("d{}", self.next_label);
        self.next_label += 1;
        RecordingDirective::new(label, &self.log)
    }

    /// Apply one op. Ops naming an empty set are no-ops, as is a move that
    /// would place an item inside itself.
    pub fn apply(&mut self, op: &TreeOp) -> Result<()> {
        let contents = self.content_slots();
        let content = |index: usize| contents[index % contents.len()];

        match *op {
            TreeOp::Nest {
                slot,
                slots,
                attribute,
            } => {
                let instance = self.tree.commit_instance(content(slot))?;
                for _ in 0..=(slots % 3) {
                    self.tree.add_content_slot(instance)?;
                }
                if attribute {
                    self.tree.add_attribute_slot(instance, "class")?;
                }
            }
            TreeOp::List { slot, len } => {
                self.tree
                    .commit_sequence(content(slot), usize::from(len % 4))?;
            }
            TreeOp::Push { slot } => {
                self.tree.push_sequence_item(content(slot))?;
            }
            TreeOp::Aware { slot } => {
                let directive = self.recording().into_kind();
                self.tree.commit_directive(content(slot), directive)?;
            }
            TreeOp::Plain { slot } => {
                let directive = PlainDirective("plain".to_owned()).into_kind();
                self.tree.commit_directive(content(slot), directive)?;
            }
            TreeOp::Leaf { slot } => self.tree.commit_leaf(content(slot), "leaf")?,
            TreeOp::Clear { slot } => self.tree.clear(content(slot))?,
            TreeOp::Toggle { connected } => self.tree.set_connected(self.root, connected)?,
            TreeOp::ToggleSlot { slot, connected } => {
                self.tree.set_connected(content(slot), connected)?;
            }
            TreeOp::AttributeAware { slot } => {
                let attributes = self.attribute_slots();
                if attributes.is_empty() {
                    return Ok(());
                }
                let directive = self.recording().into_kind();
                self.tree
                    .add_attribute_directive(attributes[slot % attributes.len()], directive)?;
            }
            TreeOp::Truncate { slot, len } => {
                let lists = self.list_slots();
                if lists.is_empty() {
                    return Ok(());
                }
                let target = lists[slot % lists.len()];
                let current = self
                    .tree
                    .committed_value(target)
                    .map_or(0, |value| value.child_nodes().len());
                let len = usize::from(len) % (current + 1);
                self.tree.truncate_sequence(target, len)?;
            }
            TreeOp::Resolve { directive } => {
                let live: Vec<DirectiveId> = self.tree.directives().map(|(id, _)| id).collect();
                if live.is_empty() {
                    return Ok(());
                }
                self.tree.resolve(live[directive % live.len()])?;
            }
            TreeOp::SetValue { directive } => {
                let live: Vec<DirectiveId> = self.tree.directives().map(|(id, _)| id).collect();
                if live.is_empty() {
                    return Ok(());
                }
                self.tree.set_value(live[directive % live.len()], "set")?;
            }
            TreeOp::Move {
                item,
                container,
                index,
            } => {
                let items = self.list_items();
                let lists = self.list_slots();
                if items.is_empty() || lists.is_empty() {
                    return Ok(());
                }
                let item = items[item % items.len()];
                let container = lists[container % lists.len()];
                let target_len = self
                    .tree
                    .committed_value(container)
                    .map_or(0, |value| {
                        value.child_nodes().iter().filter(|&&i| i != item).count()
                    });
                let index = usize::from(index) % (target_len + 1);
                match self.tree.move_sequence_item(item, container, index) {
                    Err(LifecycleError::CyclicMove { .. }) => {}
                    other => other?,
                }
            }
        }
        Ok(())
    }
}

// ── Strategies ──────────────────────────────────────────────────────────

fn index() -> impl Strategy<Value = usize> {
    0usize..64
}

/// Any single [`TreeOp`], weighted toward structure-building ops.
pub fn tree_op() -> impl Strategy<Value = TreeOp> {
    prop_oneof![
        3 => (index(), any::<u8>(), any::<bool>())
            .prop_map(|(slot, slots, attribute)| TreeOp::Nest { slot, slots, attribute }),
        2 => (index(), any::<u8>()).prop_map(|(slot, len)| TreeOp::List { slot, len }),
        1 => index().prop_map(|slot| TreeOp::Push { slot }),
        3 => index().prop_map(|slot| TreeOp::Aware { slot }),
        1 => index().prop_map(|slot| TreeOp::Plain { slot }),
        1 => index().prop_map(|slot| TreeOp::Leaf { slot }),
        2 => index().prop_map(|slot| TreeOp::Clear { slot }),
        2 => any::<bool>().prop_map(|connected| TreeOp::Toggle { connected }),
        1 => (index(), any::<bool>())
            .prop_map(|(slot, connected)| TreeOp::ToggleSlot { slot, connected }),
        2 => index().prop_map(|slot| TreeOp::AttributeAware { slot }),
        1 => (index(), any::<u8>()).prop_map(|(slot, len)| TreeOp::Truncate { slot, len }),
        1 => index().prop_map(|directive| TreeOp::Resolve { directive }),
        1 => index().prop_map(|directive| TreeOp::SetValue { directive }),
        1 => (index(), index(), any::<u8>())
            .prop_map(|(item, container, index)| TreeOp::Move { item, container, index }),
    ]
}

/// Up to `max` ops.
pub fn tree_ops(max: usize) -> impl Strategy<Value = Vec<TreeOp>> {
    proptest::collection::vec(tree_op(), 0..=max)
}
