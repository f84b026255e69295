// tests/properties.rs

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use taskrelay::exec::ProcessRunner;
use taskrelay::registry::{RegistrySettings, TaskRegistry};
use taskrelay::types::DisplayRef;
use taskrelay_test_utils::FakeRunner;

fn registry() -> Arc<TaskRegistry> {
    let runner: Arc<dyn ProcessRunner> = Arc::new(FakeRunner::new());
    TaskRegistry::new(RegistrySettings::default(), runner).0
}

proptest! {
    /// Interleaved single and batch allocations give every user the ids
    /// 1..=n in order, whatever the other users do.
    #[test]
    fn ids_are_gapless_per_user(requests in proptest::collection::vec((0i64..4, 1usize..6), 1..40)) {
        let registry = registry();
        let mut seen: HashMap<i64, Vec<u64>> = HashMap::new();

        for (user, count) in requests {
            let ids = if count == 1 {
                vec![registry.next_id(user)]
            } else {
                registry.next_ids(user, count)
            };
            seen.entry(user).or_default().extend(ids);
        }

        for ids in seen.values() {
            let expected: Vec<u64> = (1..=ids.len() as u64).collect();
            prop_assert_eq!(ids, &expected);
        }
    }

    /// After k resolutions of an n-row unit, n-k remain; at zero the
    /// controls are gone and further resolutions are no-ops.
    #[test]
    fn pending_counts_down_to_release(rows in 1usize..20, resolved in 0usize..25) {
        let registry = registry();
        let display = DisplayRef::new(1, 7);
        let lines = (0..rows).map(|i| format!("row {i}")).collect();
        registry.init_display(display, lines, Some(taskrelay::display::Controls::cancel_batch(1)));

        for _ in 0..resolved {
            registry.decrement_pending(display);
        }

        if resolved < rows {
            prop_assert_eq!(registry.pending_count(display), Some(rows - resolved));
            prop_assert!(registry.display_controls(display).is_some());
            prop_assert!(!registry.release_display(display));
        } else {
            prop_assert_eq!(registry.pending_count(display), None);
            prop_assert!(registry.display_controls(display).is_none());
            prop_assert_eq!(registry.display_lines(display).map(|l| l.len()), Some(rows));
            prop_assert!(registry.release_display(display));
        }
    }
}
