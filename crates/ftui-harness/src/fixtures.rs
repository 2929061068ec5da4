#![forbid(unsafe_code)]

//! Ready-made part trees for lifecycle tests.

use ftui_lifecycle::{NodeId, PartTree, Result};

/// `root → instance → slot`, the smallest tree that can host a directive
/// below the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleSlot {
    pub root: NodeId,
    pub instance: NodeId,
    pub slot: NodeId,
}

pub fn single_slot(tree: &mut PartTree) -> Result<SingleSlot> {
    let root = tree.create_root();
    let instance = tree.commit_instance(root)?;
    let slot = tree.add_content_slot(instance)?;
    Ok(SingleSlot {
        root,
        instance,
        slot,
    })
}

/// Content slots from the root down through `depth` nested instances.
///
/// The returned vector has `depth + 1` entries; the last one is the
/// innermost slot, with `2 * depth` ancestors above it.
pub fn nested_chain(tree: &mut PartTree, depth: usize) -> Result<Vec<NodeId>> {
    let mut slots = Vec::with_capacity(depth + 1);
    let mut slot = tree.create_root();
    slots.push(slot);
    for _ in 0..depth {
        let instance = tree.commit_instance(slot)?;
        slot = tree.add_content_slot(instance)?;
        slots.push(slot);
    }
    Ok(slots)
}

/// `root → instance S → {attribute slot T, content slot C}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeHost {
    pub root: NodeId,
    pub instance: NodeId,
    pub attribute: NodeId,
    pub content: NodeId,
}

pub fn attribute_host(tree: &mut PartTree, name: &str) -> Result<AttributeHost> {
    let root = tree.create_root();
    let instance = tree.commit_instance(root)?;
    let attribute = tree.add_attribute_slot(instance, name)?;
    let content = tree.add_content_slot(instance)?;
    Ok(AttributeHost {
        root,
        instance,
        attribute,
        content,
    })
}

/// A root instance with `width` sibling content slots.
pub fn fan_out(tree: &mut PartTree, width: usize) -> Result<(NodeId, NodeId, Vec<NodeId>)> {
    let root = tree.create_root();
    let instance = tree.commit_instance(root)?;
    let slots = (0..width)
        .map(|_| tree.add_content_slot(instance))
        .collect::<Result<Vec<_>>>()?;
    Ok((root, instance, slots))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_chain_has_expected_depth() {
        let mut tree = PartTree::new();
        let slots = nested_chain(&mut tree, 3).unwrap();
        assert_eq!(slots.len(), 4);
        let mut ancestors = 0;
        let mut current = *slots.last().unwrap();
        while let Some(parent) = tree.parent(current) {
            ancestors += 1;
            current = parent;
        }
        assert_eq!(ancestors, 6);
        assert_eq!(current, slots[0]);
    }

    #[test]
    fn fixtures_start_untracked() {
        let mut tree = PartTree::new();
        single_slot(&mut tree).unwrap();
        attribute_host(&mut tree, "class").unwrap();
        fan_out(&mut tree, 4).unwrap();
        assert!(tree.registry().is_empty());
    }
}
