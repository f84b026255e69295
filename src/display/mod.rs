// src/display/mod.rs

//! Display layer.
//!
//! - [`format`] turns a status text into the compact one-line row form.
//! - [`aggregator`] re-renders standalone and shared (batch) display units.
//! - [`templates`] holds every human-readable text.
//! - [`console`] is a [`DisplaySurface`] that prints to stdout.
//!
//! The surface itself is an external collaborator; the core only talks to it
//! through the [`DisplaySurface`] trait and never depends on its calls
//! succeeding.

pub mod aggregator;
pub mod console;
pub mod format;
pub mod templates;

use crate::engine::callback::CallbackPayload;
use crate::errors::Result;
use crate::types::{BoxFuture, ChatId, DisplayRef, TaskId, UserId};

pub use aggregator::DisplayAggregator;
pub use console::ConsoleSurface;
pub use format::{LineLabel, format_done, format_line};

/// One interactive button: a label plus the payload echoed back on press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub payload: String,
}

/// A set of interactive buttons attached to a display unit, row by row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Controls {
    pub rows: Vec<Vec<Button>>,
}

impl Controls {
    pub fn single(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            rows: vec![vec![Button {
                label: label.into(),
                payload: payload.into(),
            }]],
        }
    }

    /// "Cancel this task" control of a standalone display.
    pub fn cancel_item(user: UserId, id: TaskId) -> Self {
        Self::single(
            templates::CANCEL_ITEM_LABEL,
            CallbackPayload::CancelItem { user, id }.encode(),
        )
    }

    /// "Cancel the whole batch" control of a shared display.
    pub fn cancel_batch(user: UserId) -> Self {
        Self::single(
            templates::CANCEL_BATCH_LABEL,
            CallbackPayload::CancelBatch { user }.encode(),
        )
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }
}

/// Delivery of rendered text to wherever the user is looking.
///
/// Implementations:
/// - [`ConsoleSurface`] prints to stdout (local operation).
/// - Tests use a recording fake.
pub trait DisplaySurface: Send + Sync {
    /// Post a new message and return its reference.
    fn send(
        &self,
        chat: ChatId,
        text: String,
        controls: Option<Controls>,
    ) -> BoxFuture<'_, Result<DisplayRef>>;

    /// Replace the whole body (and control set) of an existing message.
    /// `None` controls removes any previously attached buttons.
    fn edit(
        &self,
        display: DisplayRef,
        text: String,
        controls: Option<Controls>,
    ) -> BoxFuture<'_, Result<()>>;

    fn delete(&self, display: DisplayRef) -> BoxFuture<'_, Result<()>>;

    /// Acknowledge a button press, optionally as a blocking alert.
    fn answer_press(&self, press_id: String, text: String, alert: bool) -> BoxFuture<'_, Result<()>> {
        let _ = (press_id, text, alert);
        Box::pin(async { Ok(()) })
    }
}
