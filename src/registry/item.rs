// src/registry/item.rs

//! Work item types tracked by the registry.

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::types::{DisplayRef, TaskId, UserId};

/// Lifecycle of a [`QueuedItem`] as seen by cancellation and the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    /// Sitting in the pending FIFO.
    Waiting,
    /// Cancelled before the worker reached it; will be skipped.
    Cancelled,
    /// Promoted to a running [`Task`].
    Started,
}

/// A submitted unit of work awaiting its turn in the serial queue.
#[derive(Debug)]
pub struct QueuedItem {
    pub target: String,
    pub user: UserId,
    pub id: TaskId,
    /// Display unit this item renders into.
    pub display: DisplayRef,
    /// Row index when the item is part of a shared batch display.
    pub row: Option<usize>,
    state: Mutex<ItemState>,
}

impl QueuedItem {
    /// An item that owns its display unit.
    pub fn standalone(target: impl Into<String>, user: UserId, id: TaskId, display: DisplayRef) -> Self {
        Self::new(target.into(), user, id, display, None)
    }

    /// An item rendered as row `row` of a shared display unit.
    pub fn row(
        target: impl Into<String>,
        user: UserId,
        id: TaskId,
        display: DisplayRef,
        row: usize,
    ) -> Self {
        Self::new(target.into(), user, id, display, Some(row))
    }

    fn new(target: String, user: UserId, id: TaskId, display: DisplayRef, row: Option<usize>) -> Self {
        Self {
            target,
            user,
            id,
            display,
            row,
            state: Mutex::new(ItemState::Waiting),
        }
    }

    pub fn is_shared(&self) -> bool {
        self.row.is_some()
    }

    pub fn state(&self) -> ItemState {
        *self.state.lock()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == ItemState::Cancelled
    }

    /// Waiting → Cancelled. Returns whether this call made the transition.
    pub fn mark_cancelled(&self) -> bool {
        let mut state = self.state.lock();
        if *state == ItemState::Waiting {
            *state = ItemState::Cancelled;
            true
        } else {
            false
        }
    }

    /// Waiting → Started. Returns false if the item was cancelled.
    pub(crate) fn try_start(&self) -> bool {
        let mut state = self.state.lock();
        if *state == ItemState::Waiting {
            *state = ItemState::Started;
            true
        } else {
            false
        }
    }
}

/// OS identifiers of a spawned runner.
///
/// `pgid` is 0 until the process group is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessIds {
    pub pid: u32,
    pub pgid: i32,
}

/// An active, currently-executing unit of work.
#[derive(Debug)]
pub struct Task {
    pub id: TaskId,
    pub user: UserId,
    pub display: DisplayRef,
    pub(crate) cancel: CancellationToken,
    pub(crate) process: Option<ProcessIds>,
}

impl Task {
    pub fn new(item: &QueuedItem, cancel: CancellationToken) -> Self {
        Self {
            id: item.id,
            user: item.user,
            display: item.display,
            cancel,
            process: None,
        }
    }

    pub fn process(&self) -> Option<ProcessIds> {
        self.process
    }
}

/// Snapshot of the task occupying the "current" slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentTask {
    pub user: UserId,
    pub id: TaskId,
}
