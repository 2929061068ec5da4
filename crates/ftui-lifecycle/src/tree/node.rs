#![forbid(unsafe_code)]

//! Node shapes stored in the part-tree arena.
//!
//! A node is one of three kinds: a content slot bound to a single location,
//! an attribute slot holding zero or more directives, or an instantiated
//! template owning its own child slots. Parents are arena keys, never owners.

use slotmap::new_key_type;

use crate::capability::Capabilities;

new_key_type! {
    /// Arena key for a node in a [`PartTree`](super::PartTree).
    pub struct NodeId;

    /// Arena key for a directive committed into a slot.
    pub struct DirectiveId;
}

/// The last value rendered into a content slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CommittedValue {
    /// Nothing committed yet, or the slot was cleared.
    #[default]
    Empty,
    /// Opaque leaf output (text, a number, a pre-rendered fragment).
    Leaf(String),
    /// A nested template instance.
    Instance(NodeId),
    /// A list rendering: one content slot per item, in order.
    Sequence(Vec<NodeId>),
}

impl CommittedValue {
    /// Child nodes owned by this value, in order.
    #[must_use]
    pub fn child_nodes(&self) -> &[NodeId] {
        match self {
            Self::Instance(id) => std::slice::from_ref(id),
            Self::Sequence(items) => items,
            Self::Empty | Self::Leaf(_) => &[],
        }
    }
}

/// A slot bound to a single location in the output.
#[derive(Debug, Clone, Default)]
pub struct ContentSlot {
    pub value: CommittedValue,
    pub directive: Option<DirectiveId>,
}

/// One binding inside an attribute slot.
#[derive(Debug, Clone)]
pub struct AttributeBinding {
    pub directive: DirectiveId,
    pub value: String,
}

/// An attribute slot; each binding may be driven by its own directive.
#[derive(Debug, Clone)]
pub struct AttributeSlot {
    pub name: String,
    pub bindings: Vec<AttributeBinding>,
}

impl AttributeSlot {
    pub fn directives(&self) -> impl Iterator<Item = DirectiveId> + '_ {
        self.bindings.iter().map(|binding| binding.directive)
    }
}

/// An instantiated sub-template and the slots it created.
#[derive(Debug, Clone, Default)]
pub struct TemplateInstance {
    pub slots: Vec<NodeId>,
}

/// Tagged node payload.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Content(ContentSlot),
    Attribute(AttributeSlot),
    Instance(TemplateInstance),
}

impl NodeKind {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Content(_) => "content",
            Self::Attribute(_) => "attribute",
            Self::Instance(_) => "instance",
        }
    }
}

/// A node in the arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) kind: NodeKind,
    /// Populated only once a disconnect-aware directive registers at or
    /// below this node.
    pub(crate) capabilities: Option<Capabilities>,
}

impl Node {
    pub(crate) fn new(parent: Option<NodeId>, kind: NodeKind) -> Self {
        Self {
            parent,
            kind,
            capabilities: None,
        }
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[must_use]
    pub fn capabilities(&self) -> Option<&Capabilities> {
        self.capabilities.as_ref()
    }

    #[must_use]
    pub fn as_content(&self) -> Option<&ContentSlot> {
        match &self.kind {
            NodeKind::Content(slot) => Some(slot),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_attribute(&self) -> Option<&AttributeSlot> {
        match &self.kind {
            NodeKind::Attribute(slot) => Some(slot),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_instance(&self) -> Option<&TemplateInstance> {
        match &self.kind {
            NodeKind::Instance(instance) => Some(instance),
            _ => None,
        }
    }
}
