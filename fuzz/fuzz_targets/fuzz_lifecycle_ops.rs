#![no_main]

use arbitrary::Arbitrary;
use ftui_harness::check_registry;
use ftui_harness::strategies::{Driver, TreeOp};
use ftui_lifecycle::LifecycleConfig;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Nest { slot: u8, slots: u8, attribute: bool },
    List { slot: u8, len: u8 },
    Push { slot: u8 },
    Aware { slot: u8 },
    Plain { slot: u8 },
    Leaf { slot: u8 },
    Clear { slot: u8 },
    Toggle { connected: bool },
    ToggleSlot { slot: u8, connected: bool },
    AttributeAware { slot: u8 },
    Truncate { slot: u8, len: u8 },
    Resolve { directive: u8 },
    SetValue { directive: u8 },
    Move { item: u8, container: u8, index: u8 },
}

impl FuzzOp {
    fn to_op(&self) -> TreeOp {
        let at = |i: &u8| usize::from(*i);
        match self {
            FuzzOp::Nest {
                slot,
                slots,
                attribute,
            } => TreeOp::Nest {
                slot: at(slot),
                slots: *slots,
                attribute: *attribute,
            },
            FuzzOp::List { slot, len } => TreeOp::List {
                slot: at(slot),
                len: *len,
            },
            FuzzOp::Push { slot } => TreeOp::Push { slot: at(slot) },
            FuzzOp::Aware { slot } => TreeOp::Aware { slot: at(slot) },
            FuzzOp::Plain { slot } => TreeOp::Plain { slot: at(slot) },
            FuzzOp::Leaf { slot } => TreeOp::Leaf { slot: at(slot) },
            FuzzOp::Clear { slot } => TreeOp::Clear { slot: at(slot) },
            FuzzOp::Toggle { connected } => TreeOp::Toggle {
                connected: *connected,
            },
            FuzzOp::ToggleSlot { slot, connected } => TreeOp::ToggleSlot {
                slot: at(slot),
                connected: *connected,
            },
            FuzzOp::AttributeAware { slot } => TreeOp::AttributeAware { slot: at(slot) },
            FuzzOp::Truncate { slot, len } => TreeOp::Truncate {
                slot: at(slot),
                len: *len,
            },
            FuzzOp::Resolve { directive } => TreeOp::Resolve {
                directive: at(directive),
            },
            FuzzOp::SetValue { directive } => TreeOp::SetValue {
                directive: at(directive),
            },
            FuzzOp::Move {
                item,
                container,
                index,
            } => TreeOp::Move {
                item: at(item),
                container: at(container),
                index: *index,
            },
        }
    }
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    prune: bool,
    depth_limit: Option<u8>,
    ops: Vec<FuzzOp>,
}

fuzz_target!(|input: FuzzInput| {
    let mut config = LifecycleConfig::default().prune_on_detach(input.prune);
    if let Some(limit) = input.depth_limit {
        config = config.ancestor_depth_limit(usize::from(limit.max(1)));
    }
    let limited = input.depth_limit.is_some();
    let mut driver = Driver::new(config);

    for op in input.ops.iter().take(512) {
        let outcome = driver.apply(&op.to_op());
        if !limited {
            assert!(outcome.is_ok(), "{op:?}: {outcome:?}");
        }
        if input.prune {
            let violations = check_registry(&driver.tree);
            assert!(violations.is_empty(), "{op:?}: {violations:#?}");
        }
    }

    let aware = driver.aware_directives().len();
    driver
        .tree
        .clear(driver.root())
        .expect("clearing the root slot cannot fail");
    assert_eq!(driver.tree.directive_count(), 0, "{aware} aware directives leaked");
    assert!(driver.log.non_alternating_labels().is_empty());
});
