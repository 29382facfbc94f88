//! Property-based tests for the tab id registry.
//!
//! Arbitrary sequences of registrations, replacements and removals must keep
//! the id-to-handle and handle-to-id maps mirror images of each other.

use proptest::prelude::*;
use tab_suspender::managers::tab_registry::TabRegistry;
use tab_suspender::types::tab::TabId;

#[derive(Debug, Clone)]
enum Op {
    Ensure(i32),
    Rekey { removed: i32, added: i32 },
    Remove(i32),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..8i32).prop_map(Op::Ensure),
        (0..8i32, 0..8i32).prop_map(|(removed, added)| Op::Rekey { removed, added }),
        (0..8i32).prop_map(Op::Remove),
    ]
}

fn assert_consistent(registry: &TabRegistry) -> Result<(), TestCaseError> {
    let mut registered = 0;
    for id in 0..8 {
        if let Some(handle) = registry.lookup(TabId(id)) {
            registered += 1;
            prop_assert_eq!(registry.current_id(handle), Some(TabId(id)));
        }
    }
    prop_assert_eq!(registry.len(), registered);
    Ok(())
}

proptest! {
    #[test]
    fn registry_maps_stay_consistent(ops in prop::collection::vec(arb_op(), 0..40)) {
        let mut registry = TabRegistry::new();
        for op in ops {
            match op {
                Op::Ensure(id) => {
                    registry.ensure(TabId(id));
                }
                Op::Rekey { removed, added } => {
                    registry.rekey(TabId(removed), TabId(added));
                }
                Op::Remove(id) => {
                    registry.remove(TabId(id));
                }
            }
            assert_consistent(&registry)?;
        }
    }

    #[test]
    fn rekey_moves_the_logical_tab(
        ops in prop::collection::vec(arb_op(), 0..20),
        removed in 0..8i32,
        added in 0..8i32,
    ) {
        let mut registry = TabRegistry::new();
        for op in ops {
            match op {
                Op::Ensure(id) => { registry.ensure(TabId(id)); }
                Op::Rekey { removed, added } => { registry.rekey(TabId(removed), TabId(added)); }
                Op::Remove(id) => { registry.remove(TabId(id)); }
            }
        }
        let handle = registry.ensure(TabId(removed));
        let previous = registry.lookup(TabId(added));

        let outcome = registry.rekey(TabId(removed), TabId(added));

        prop_assert_eq!(outcome.moved, Some(handle));
        prop_assert_eq!(registry.lookup(TabId(added)), Some(handle));
        prop_assert_eq!(registry.current_id(handle), Some(TabId(added)));
        if removed != added {
            prop_assert_eq!(registry.lookup(TabId(removed)), None);
            prop_assert_eq!(outcome.orphaned, previous);
        }
        assert_consistent(&registry)?;
    }

    #[test]
    fn ensure_is_idempotent(id in 0..1000i32) {
        let mut registry = TabRegistry::new();
        let handle = registry.ensure(TabId(id));
        prop_assert_eq!(registry.ensure(TabId(id)), handle);
        prop_assert_eq!(registry.len(), 1);
    }
}
