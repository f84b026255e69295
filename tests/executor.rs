// tests/executor.rs

mod common;
use crate::common::{init_tracing, wait_until};

use std::sync::Arc;
use std::time::Duration;

use taskrelay::display::{Controls, DisplaySurface};
use taskrelay::exec::TerminalStatus;
use taskrelay::registry::{CancelOutcome, QueuedItem};
use taskrelay::types::UserId;
use taskrelay_test_utils::{ConfigFileBuilder, FakeExit, FakeRunner, Harness, Script, TEST_CHAT};
use tokio_util::sync::CancellationToken;

const USER: UserId = 7;

async fn standalone(h: &Harness, target: &str) -> Arc<QueuedItem> {
    let id = h.registry.next_id(USER);
    let display = h.surface.send(TEST_CHAT, "queued".into(), None).await.unwrap();
    Arc::new(QueuedItem::standalone(target, USER, id, display))
}

async fn batch(h: &Harness, targets: &[&str]) -> Vec<Arc<QueuedItem>> {
    let ids = h.registry.next_ids(USER, targets.len());
    let display = h.surface.send(TEST_CHAT, "batch".into(), None).await.unwrap();
    let rows = targets.iter().map(|t| format!("row {t}")).collect();
    h.registry.init_display(display, rows, Some(Controls::cancel_batch(USER)));
    targets
        .iter()
        .zip(ids)
        .enumerate()
        .map(|(row, (target, id))| Arc::new(QueuedItem::row(*target, USER, id, display, row)))
        .collect()
}

async fn run(h: &Harness, item: &Arc<QueuedItem>) -> TerminalStatus {
    let cancel = CancellationToken::new();
    assert!(h.registry.promote(item, cancel.clone()));
    h.executor.run(item, cancel).await
}

#[tokio::test(start_paused = true)]
async fn last_status_wins_after_the_throttle_window() {
    init_tracing();
    let target = "https://t.me/a/1";
    let runner = FakeRunner::new().with_script(
        target,
        Script::new()
            .line(100, "[STATUS] 50% done")
            .line(1000, "[STATUS] 90% done"),
    );
    let h = Harness::default_with(runner);
    let item = standalone(&h, target).await;

    let status = run(&h, &item).await;
    assert_eq!(status, TerminalStatus::Succeeded("90% done".into()));

    let history = h.surface.history(item.display);
    assert!(history.contains(&format!("[#1] {target} — 90% done")));
    // 50% arrived inside the first window and was never pushed.
    assert!(!history.iter().any(|b| b.contains("50% done")));
    assert_eq!(h.surface.body(item.display).unwrap(), format!("[#1] {target} — 90% done"));
    assert!(h.surface.controls(item.display).is_none());

    let spawn = &h.runner.spawns()[0];
    assert_eq!(spawn.lock_token, "7_1");
    assert!(!h.registry.contains_task(USER, 1));
    assert!(h.registry.current().is_none());
}

#[tokio::test(start_paused = true)]
async fn clean_exit_without_status_reports_completed_and_sweeps_the_group() {
    let h = Harness::default_with(FakeRunner::new());
    let item = standalone(&h, "https://t.me/a/2").await;

    assert_eq!(run(&h, &item).await, TerminalStatus::Completed);
    assert_eq!(
        h.surface.body(item.display).unwrap(),
        "[#1] https://t.me/a/2 — completed"
    );

    let pgid = h.runner.spawns()[0].ids.pgid;
    assert_eq!(h.runner.kill_groups(), vec![(pgid, Duration::from_millis(800))]);
}

#[tokio::test(start_paused = true)]
async fn deadline_yields_timeout_not_failure() {
    init_tracing();
    let config = ConfigFileBuilder::new().with_timeout("2s").build();
    let runner = FakeRunner::new().with_default(Script::new().line(10, "[STATUS] waiting").exit(FakeExit::Hang));
    let h = Harness::new(config, runner);
    let item = standalone(&h, "https://t.me/slow/1").await;

    assert_eq!(run(&h, &item).await, TerminalStatus::TimedOut);

    let body = h.surface.body(item.display).unwrap();
    assert!(body.contains("timed out"), "{body}");
    assert!(!body.contains("failed"), "{body}");

    let pgid = h.runner.spawns()[0].ids.pgid;
    assert!(h.runner.kill_groups().contains(&(pgid, Duration::from_millis(800))));
    assert_eq!(h.runner.active(), 0);
}

#[tokio::test(start_paused = true)]
async fn non_zero_exit_is_a_failure() {
    let runner = FakeRunner::new().with_default(Script::new().line(10, "[STATUS] half").exit(FakeExit::Failure));
    let h = Harness::default_with(runner);
    let item = standalone(&h, "https://t.me/a/3").await;

    assert!(matches!(run(&h, &item).await, TerminalStatus::Failed(_)));
    assert!(h.surface.body(item.display).unwrap().ends_with("— execution failed"));
}

#[tokio::test(start_paused = true)]
async fn spawn_failure_resolves_the_row_exactly_once() {
    let runner = FakeRunner::new().with_spawn_failure("https://t.me/bad/1");
    let h = Harness::default_with(runner);
    let items = batch(&h, &["https://t.me/bad/1", "https://t.me/ok/2"]).await;

    assert_eq!(run(&h, &items[0]).await, TerminalStatus::StartFailed);
    assert_eq!(h.registry.pending_count(items[0].display), Some(1));
    assert!(h.registry.display_controls(items[0].display).is_some());
    assert!(h.runner.spawns().is_empty());

    let body = h.surface.body(items[0].display).unwrap();
    assert_eq!(
        body,
        "1. [#1] https://t.me/bad/1 — failed to start\n\nrow https://t.me/ok/2"
    );
    assert_eq!(h.registry.count_user_tasks(USER), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelling_a_running_task_reports_termination() {
    init_tracing();
    let runner = FakeRunner::new().with_default(Script::new().line(10, "[STATUS] working").exit(FakeExit::Hang));
    let h = Harness::default_with(runner);
    let item = standalone(&h, "https://t.me/a/4").await;

    let handle = {
        let executor = h.executor.clone();
        let registry = Arc::clone(&h.registry);
        let item = Arc::clone(&item);
        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            assert!(registry.promote(&item, cancel.clone()));
            executor.run(&item, cancel).await
        })
    };

    let runner = h.runner.clone();
    wait_until(move || runner.active() == 1).await;
    assert!(matches!(h.registry.cancel(USER, item.id).await, CancelOutcome::Running));

    assert_eq!(handle.await.unwrap(), TerminalStatus::Cancelled);
    let body = h.surface.body(item.display).unwrap();
    assert_eq!(body, "[#1] https://t.me/a/4 — terminated by user");

    let pgid = h.runner.spawns()[0].ids.pgid;
    assert_eq!(h.runner.kill_groups()[0], (pgid, Duration::from_millis(500)));
    assert_eq!(h.runner.active(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_between_promotion_and_spawn_prevents_the_spawn() {
    let h = Harness::default_with(FakeRunner::new());
    let items = batch(&h, &["https://t.me/a/5", "https://t.me/a/6"]).await;
    let cancel = CancellationToken::new();
    assert!(h.registry.promote(&items[0], cancel.clone()));

    assert!(matches!(h.registry.cancel(USER, items[0].id).await, CancelOutcome::Running));
    assert_eq!(h.executor.run(&items[0], cancel).await, TerminalStatus::Cancelled);

    assert!(h.runner.spawns().is_empty());
    assert_eq!(h.registry.pending_count(items[0].display), Some(1));
}

#[tokio::test(start_paused = true)]
async fn console_login_notice_fires_once_and_link_notice_carries_the_link() {
    let runner = FakeRunner::new().with_default(
        Script::new()
            .line(10, "Scan QR code below")
            .line(10, "█████ ██ █")
            .line(10, "[QRCODE] tg://login?token=abc")
            .line(10, "[STATUS] forwarded 3 messages"),
    );
    let h = Harness::default_with(runner);
    let item = standalone(&h, "https://t.me/a/7").await;

    assert_eq!(
        run(&h, &item).await,
        TerminalStatus::Succeeded("forwarded 3 messages".into())
    );

    let history = h.surface.history(item.display);
    let console = history.iter().filter(|b| b.contains("server console")).count();
    assert_eq!(console, 1);
    assert!(history.iter().any(|b| b.contains("tg://login?token=abc")));
}

#[tokio::test(start_paused = true)]
async fn login_notice_in_a_batch_goes_out_as_its_own_message() {
    let runner = FakeRunner::new().with_default(Script::new().line(10, "Scan QR code"));
    let h = Harness::default_with(runner);
    let items = batch(&h, &["https://t.me/a/8", "https://t.me/a/9"]).await;
    let sent_before = h.surface.sent().len();

    run(&h, &items[0]).await;

    let sent = h.surface.sent_texts();
    assert_eq!(sent.len(), sent_before + 1);
    assert!(sent.last().unwrap().contains("login required"));
    // The batch body never shows the notice.
    assert!(
        !h.surface
            .history(items[0].display)
            .iter()
            .any(|b| b.contains("login required"))
    );

    // Once the task is over the notice keeps its text but loses its button.
    let notice = h.surface.last_sent().unwrap();
    assert!(h.surface.controls(notice).is_none());
    assert!(h.surface.body(notice).unwrap().contains("login required"));
    assert_eq!(h.display.open_notices(), 0);
}

#[tokio::test(start_paused = true)]
async fn notice_button_stays_while_the_batch_row_runs() {
    let runner = FakeRunner::new().with_default(Script::new().line(10, "Scan QR code").exit(FakeExit::Hang));
    let h = Harness::default_with(runner);
    let items = batch(&h, &["https://t.me/a/11", "https://t.me/a/12"]).await;

    let handle = {
        let executor = h.executor.clone();
        let item = Arc::clone(&items[0]);
        let registry = Arc::clone(&h.registry);
        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            registry.promote(&item, cancel.clone());
            executor.run(&item, cancel).await
        })
    };

    let display = Arc::clone(&h.display);
    wait_until(move || display.open_notices() == 1).await;
    let notice = h.surface.last_sent().unwrap();
    assert_eq!(
        h.surface.controls(notice),
        Some(Controls::cancel_item(USER, items[0].id))
    );

    h.registry.cancel(USER, items[0].id).await;
    assert_eq!(handle.await.unwrap(), TerminalStatus::Cancelled);
    assert!(h.surface.controls(notice).is_none());
    assert_eq!(h.display.open_notices(), 0);
}

#[tokio::test(start_paused = true)]
async fn display_failures_do_not_affect_the_outcome() {
    let runner = FakeRunner::new().with_default(Script::new().line(1500, "[STATUS] done"));
    let h = Harness::default_with(runner);
    let item = standalone(&h, "https://t.me/a/10").await;
    h.surface.fail_edits(true);

    assert_eq!(run(&h, &item).await, TerminalStatus::Succeeded("done".into()));
    assert!(!h.registry.contains_task(USER, item.id));
}

#[tokio::test(start_paused = true)]
async fn failed_surface_edits_are_logged_and_bookkeeping_continues() {
    init_tracing();
    let h = Harness::default_with(FakeRunner::new());
    let items = batch(&h, &["https://t.me/a/13", "https://t.me/a/14"]).await;
    let unit = items[0].display;
    let before = h.surface.body(unit).unwrap();
    h.surface.fail_edits(true);

    h.display.replace(unit, "never shown".to_string(), None).await;
    assert_eq!(h.surface.body(unit).unwrap(), before);

    h.display.finish(&items[0], "❌ Task #1 cancelled from batch").await;
    assert_eq!(h.registry.pending_count(unit), Some(1));
    assert!(
        h.registry.display_lines(unit).unwrap()[0].ends_with("cancelled from batch")
    );

    h.surface.fail_edits(false);
    h.display.finish(&items[1], "❌ Task #2 cancelled from batch").await;
    assert_eq!(h.registry.pending_count(unit), None);
    assert!(h.surface.controls(unit).is_none());
}
