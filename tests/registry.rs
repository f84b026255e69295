// tests/registry.rs

mod common;
use crate::common::{init_tracing, settle};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use taskrelay::display::Controls;
use taskrelay::errors::RelayError;
use taskrelay::exec::ProcessRunner;
use taskrelay::registry::{
    CancelOutcome, ItemState, ProcessIds, QueueReceiver, QueuedItem, RegistrySettings, TaskRegistry,
};
use taskrelay::types::{DisplayRef, QueueFullPolicy};
use taskrelay_test_utils::FakeRunner;

fn registry_with(settings: RegistrySettings) -> (Arc<TaskRegistry>, QueueReceiver, FakeRunner) {
    let runner = FakeRunner::new();
    let dyn_runner: Arc<dyn ProcessRunner> = Arc::new(runner.clone());
    let (registry, queue) = TaskRegistry::new(settings, dyn_runner);
    (registry, queue, runner)
}

fn registry() -> (Arc<TaskRegistry>, QueueReceiver, FakeRunner) {
    registry_with(RegistrySettings::default())
}

fn display() -> DisplayRef {
    DisplayRef::new(1, 100)
}

fn item(user: i64, id: u64) -> Arc<QueuedItem> {
    Arc::new(QueuedItem::standalone(format!("https://t.me/c/{id}"), user, id, display()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ids_are_gapless_per_user_under_concurrency() {
    init_tracing();
    let (registry, _queue, _runner) = registry();

    let mut handles = Vec::new();
    for user in 1..=4_i64 {
        for _ in 0..3 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let ids: Vec<u64> = (0..50).map(|_| registry.next_id(user)).collect();
                (user, ids)
            }));
        }
    }

    let mut per_user: HashMap<i64, Vec<u64>> = HashMap::new();
    for handle in handles {
        let (user, ids) = handle.await.unwrap();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids must increase per caller");
        per_user.entry(user).or_default().extend(ids);
    }

    for (user, mut ids) in per_user {
        ids.sort_unstable();
        assert_eq!(ids, (1..=150).collect::<Vec<_>>(), "user {user}");
    }
}

#[test]
fn batch_ids_are_contiguous() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let (registry, _queue, _runner) = registry();
        assert_eq!(registry.next_id(9), 1);
        assert_eq!(registry.next_ids(9, 3), vec![2, 3, 4]);
        assert_eq!(registry.next_id(9), 5);
        assert_eq!(registry.next_id(10), 1);
    });
}

#[tokio::test]
async fn unregistering_last_task_drops_user_table() {
    let (registry, _queue, _runner) = registry();
    let first = item(5, 1);
    let second = item(5, 2);

    assert!(registry.promote(&first, CancellationToken::new()));
    assert!(registry.promote(&second, CancellationToken::new()));
    assert_eq!(registry.count_user_tasks(5), 2);
    assert_eq!(registry.current().map(|c| c.id), Some(2));

    assert!(registry.unregister_task(5, 1));
    assert_eq!(registry.active_users(), 1);
    assert!(registry.unregister_task(5, 2));
    assert!(!registry.unregister_task(5, 2));
    assert_eq!(registry.active_users(), 0);
    assert_eq!(registry.count_user_tasks(5), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelling_a_task_twice_is_a_noop() {
    init_tracing();
    let (registry, _queue, runner) = registry();
    let task = item(1, 1);
    let token = CancellationToken::new();

    assert!(registry.promote(&task, token.clone()));
    assert!(registry.attach_process(1, 1, ProcessIds { pid: 4242, pgid: 4242 }));

    assert!(registry.cancel_task(1, 1).await);
    assert!(token.is_cancelled());
    assert!(!registry.contains_task(1, 1));
    assert_eq!(runner.kill_groups(), vec![(4242, Duration::from_millis(500))]);

    assert!(!registry.cancel_task(1, 1).await);
    assert_eq!(runner.kill_groups().len(), 1);
    assert_eq!(registry.count_user_tasks(1), 0);
}

#[tokio::test]
async fn unknown_group_falls_back_to_killing_the_pid() {
    let (registry, _queue, runner) = registry();
    let task = item(1, 1);
    assert!(registry.promote(&task, CancellationToken::new()));
    assert!(registry.attach_process(1, 1, ProcessIds { pid: 77, pgid: 0 }));

    assert!(registry.cancel_task(1, 1).await);
    assert_eq!(runner.tree_kills(), vec![77]);
    assert!(runner.kill_groups().is_empty());
}

#[tokio::test]
async fn attach_fails_once_the_task_is_gone() {
    let (registry, _queue, _runner) = registry();
    let task = item(1, 1);
    assert!(registry.promote(&task, CancellationToken::new()));
    assert!(registry.cancel_task(1, 1).await);
    assert!(!registry.attach_process(1, 1, ProcessIds { pid: 1, pgid: 2 }));
}

#[tokio::test]
async fn cancel_queued_item_marks_and_forgets_it() {
    let (registry, _queue, _runner) = registry();
    let queued = item(3, 1);
    registry.enqueue(Arc::clone(&queued)).await.unwrap();
    assert!(registry.queued_item(3, 1).is_some());

    assert!(registry.cancel_queued_item(3, 1).await);
    assert!(queued.is_cancelled());
    assert!(registry.queued_item(3, 1).is_none());

    assert!(!registry.cancel_queued_item(3, 1).await);
    assert!(!registry.promote(&queued, CancellationToken::new()));
}

#[tokio::test]
async fn cancel_queued_item_also_stops_a_promoted_task() {
    let (registry, _queue, _runner) = registry();
    let queued = item(3, 1);
    registry.enqueue(Arc::clone(&queued)).await.unwrap();
    let token = CancellationToken::new();
    assert!(registry.promote(&queued, token.clone()));

    assert!(registry.cancel_queued_item(3, 1).await);
    assert!(token.is_cancelled());
    assert!(!registry.contains_task(3, 1));
    assert_eq!(queued.state(), ItemState::Started);
}

#[tokio::test]
async fn cancel_reports_who_renders_the_row() {
    let (registry, _queue, _runner) = registry();
    let waiting = item(1, 1);
    let running = item(1, 2);
    registry.enqueue(Arc::clone(&waiting)).await.unwrap();
    registry.enqueue(Arc::clone(&running)).await.unwrap();
    assert!(registry.promote(&running, CancellationToken::new()));

    match registry.cancel(1, 1).await {
        CancelOutcome::Waiting(item) => assert_eq!(item.id, 1),
        other => panic!("expected Waiting, got {other:?}"),
    }
    assert!(matches!(registry.cancel(1, 2).await, CancelOutcome::Running));
    assert!(matches!(registry.cancel(1, 1).await, CancelOutcome::NotFound));
    assert!(matches!(registry.cancel(1, 2).await, CancelOutcome::NotFound));
    assert!(matches!(registry.cancel(2, 1).await, CancelOutcome::NotFound));
}

#[tokio::test]
async fn pending_count_counts_down_and_retires_controls() {
    let (registry, _queue, _runner) = registry();
    let unit = display();
    let lines = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    registry.init_display(unit, lines, Some(Controls::cancel_batch(1)));

    assert_eq!(registry.pending_count(unit), Some(3));
    assert_eq!(registry.decrement_pending(unit), 2);
    assert!(registry.display_controls(unit).is_some());
    assert_eq!(registry.decrement_pending(unit), 1);
    assert_eq!(registry.decrement_pending(unit), 0);
    assert_eq!(registry.pending_count(unit), None);
    assert!(registry.display_controls(unit).is_none());

    // Exhausted units stay exhausted.
    assert_eq!(registry.decrement_pending(unit), 0);
    assert!(registry.release_display(unit));
    assert_eq!(registry.cached_displays(), 0);
}

#[tokio::test]
async fn release_keeps_units_with_pending_rows() {
    let (registry, _queue, _runner) = registry();
    let unit = display();
    registry.init_display(unit, vec!["a".into(), "b".into()], None);
    registry.decrement_pending(unit);
    assert!(!registry.release_display(unit));
    assert_eq!(registry.cached_displays(), 1);
}

#[tokio::test]
async fn updating_one_row_leaves_the_others_alone() {
    let (registry, _queue, _runner) = registry();
    let unit = display();
    let controls = Controls::cancel_batch(1);
    registry.init_display(unit, vec!["r0".into(), "r1".into(), "r2".into()], Some(controls.clone()));

    let (lines, returned) = registry.update_line(unit, 1, "r1 50%".into()).unwrap();
    assert_eq!(lines, vec!["r0", "r1 50%", "r2"]);
    assert_eq!(returned, Some(controls));

    let (lines, _) = registry.update_line(unit, 7, "ignored".into()).unwrap();
    assert_eq!(lines, vec!["r0", "r1 50%", "r2"]);
    assert!(registry.update_line(DisplayRef::new(9, 9), 0, "x".into()).is_none());
}

#[tokio::test]
async fn full_queue_rejects_and_leaves_no_lookup_entry() {
    let (registry, _queue, _runner) = registry_with(RegistrySettings {
        capacity: 2,
        ..RegistrySettings::default()
    });

    registry.enqueue(item(1, 1)).await.unwrap();
    registry.enqueue(item(1, 2)).await.unwrap();
    assert_eq!(registry.queue_len(), 2);

    let err = registry.enqueue(item(1, 3)).await.unwrap_err();
    assert!(matches!(err, RelayError::QueueFull { capacity: 2 }));
    assert!(registry.queued_item(1, 3).is_none());
    assert!(registry.queued_item(1, 2).is_some());
}

#[tokio::test]
async fn full_queue_blocks_until_the_worker_takes_an_item() {
    init_tracing();
    let (registry, mut queue, _runner) = registry_with(RegistrySettings {
        capacity: 1,
        when_full: QueueFullPolicy::Block,
        ..RegistrySettings::default()
    });

    registry.enqueue(item(1, 1)).await.unwrap();
    let producer = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.enqueue(item(1, 2)).await })
    };

    settle().await;
    assert!(!producer.is_finished());
    // The lookup entry exists while the producer waits.
    assert!(registry.queued_item(1, 2).is_some());

    let first = queue.recv().await.unwrap();
    assert_eq!(first.id, 1);
    producer.await.unwrap().unwrap();
    assert_eq!(queue.recv().await.unwrap().id, 2);
}

#[tokio::test]
async fn closed_queue_is_reported() {
    let (registry, queue, _runner) = registry();
    drop(queue);
    let err = registry.enqueue(item(1, 1)).await.unwrap_err();
    assert!(matches!(err, RelayError::QueueClosed));
    assert!(registry.queued_item(1, 1).is_none());
}

#[tokio::test]
async fn queued_items_for_filters_by_user_and_display() {
    let (registry, _queue, _runner) = registry();
    let unit = display();
    let other = DisplayRef::new(1, 200);
    registry
        .enqueue(Arc::new(QueuedItem::row("a", 1, 2, unit, 1)))
        .await
        .unwrap();
    registry
        .enqueue(Arc::new(QueuedItem::row("b", 1, 1, unit, 0)))
        .await
        .unwrap();
    registry
        .enqueue(Arc::new(QueuedItem::standalone("c", 1, 3, other)))
        .await
        .unwrap();
    registry
        .enqueue(Arc::new(QueuedItem::row("d", 2, 1, unit, 2)))
        .await
        .unwrap();

    let ids: Vec<u64> = registry.queued_items_for(1, unit).iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![1, 2]);
}
