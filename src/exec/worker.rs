// src/exec/worker.rs

//! Queue Worker: the only place a task is ever started.
//!
//! One long-lived tokio task drains the pending FIFO in submission order and
//! runs each item to completion before taking the next, which is what makes
//! execution serial.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::registry::{QueueReceiver, QueuedItem};

use super::executor::TaskExecutor;

/// Spawn the queue worker.
///
/// The worker ends when the FIFO is closed or `shutdown` fires; an item in
/// flight at shutdown is cancelled through the registry by the caller and
/// still reaches its terminal line before the worker returns.
pub fn spawn_queue_worker(
    executor: TaskExecutor,
    mut queue: QueueReceiver,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("queue worker started");
        loop {
            let item = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                item = queue.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };
            process_item(&executor, item).await;
        }
        info!("queue worker stopped");
    })
}

/// Handle one dequeued item: skip it if cancelled, otherwise run it.
pub async fn process_item(executor: &TaskExecutor, item: Arc<QueuedItem>) {
    let registry = executor.registry();
    let cancel = CancellationToken::new();

    if item.is_cancelled() || !registry.promote(&item, cancel.clone()) {
        debug!(user = item.user, task_id = item.id, "skipping cancelled item");
        registry.remove_queued(item.user, item.id);
        return;
    }

    info!(
        user = item.user,
        task_id = item.id,
        target = %item.target,
        queue_len = registry.queue_len(),
        "processing item"
    );
    executor.display().processing(&item).await;
    executor.run(&item, cancel).await;
    registry.remove_queued(item.user, item.id);
}
