#![allow(dead_code)]

use std::time::Duration;

pub use taskrelay_test_utils::{init_tracing, with_timeout};

/// Poll `cond` (advancing paused time in small steps) until it holds.
pub async fn wait_until<F>(mut cond: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

/// Let spawned tasks run without moving the clock.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
