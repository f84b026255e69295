// src/display/aggregator.rs

//! Display aggregation: pushes progress and terminal lines into standalone
//! and shared display units.
//!
//! A shared unit re-renders by updating one cached row and replacing the
//! whole body with every cached row joined by a blank line. Edits of one
//! unit are serialised by a per-unit async mutex so the surface always sees
//! bodies in cache order. The registry lock itself is never held while
//! talking to the surface.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::registry::{QueuedItem, TaskRegistry};
use crate::types::{ChatId, DisplayRef, TaskId, UserId};

use super::format::{LineLabel, format_done, format_line};
use super::{Controls, DisplaySurface, templates};

/// Separator between rows of a shared display unit.
pub const ROW_SEPARATOR: &str = "\n\n";

pub struct DisplayAggregator {
    registry: Arc<TaskRegistry>,
    surface: Arc<dyn DisplaySurface>,
    render_locks: Mutex<HashMap<DisplayRef, Arc<tokio::sync::Mutex<()>>>>,
    /// Separate notice messages of shared items, with their text, until the
    /// item finishes and their controls are retired.
    notices: Mutex<HashMap<(UserId, TaskId), Vec<(DisplayRef, String)>>>,
}

impl DisplayAggregator {
    pub fn new(registry: Arc<TaskRegistry>, surface: Arc<dyn DisplaySurface>) -> Self {
        Self {
            registry,
            surface,
            render_locks: Mutex::new(HashMap::new()),
            notices: Mutex::new(HashMap::new()),
        }
    }

    pub fn surface(&self) -> &Arc<dyn DisplaySurface> {
        &self.surface
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    fn render_lock(&self, unit: DisplayRef) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.render_locks.lock().entry(unit).or_default())
    }

    // ---- raw surface calls (failures are logged, never escalated) ---------

    pub async fn send(&self, chat: ChatId, text: String, controls: Option<Controls>) -> Option<DisplayRef> {
        match self.surface.send(chat, text, controls).await {
            Ok(unit) => Some(unit),
            Err(err) => {
                warn!(chat, error = %err, "display send failed");
                None
            }
        }
    }

    pub async fn replace(&self, unit: DisplayRef, text: String, controls: Option<Controls>) {
        if let Err(err) = self.surface.edit(unit, text, controls).await {
            warn!(%unit, error = %err, "display edit failed");
        }
    }

    pub async fn delete(&self, unit: DisplayRef) {
        if let Err(err) = self.surface.delete(unit).await {
            warn!(%unit, error = %err, "display delete failed");
        }
    }

    // ---- shared rows -------------------------------------------------------

    /// Replace row `row` of a shared unit and re-render the whole body.
    pub async fn update_row(&self, unit: DisplayRef, row: usize, text: String) {
        let lock = self.render_lock(unit);
        let _guard = lock.lock().await;
        self.render_row(unit, row, text).await;
    }

    async fn render_row(&self, unit: DisplayRef, row: usize, text: String) {
        match self.registry.update_line(unit, row, text.clone()) {
            Some((lines, controls)) => {
                self.replace(unit, lines.join(ROW_SEPARATOR), controls).await;
            }
            None => {
                debug!(%unit, row, "no cached rows; rendering line alone");
                self.replace(unit, text, None).await;
            }
        }
    }

    /// Terminal update of one row: exactly one pending-count decrement, and
    /// the controls disappear with the last pending row.
    pub async fn finish_row(&self, unit: DisplayRef, row: usize, text: String) {
        let lock = self.render_lock(unit);
        let remaining = {
            let _guard = lock.lock().await;
            let remaining = self.registry.decrement_pending(unit);
            self.render_row(unit, row, text).await;
            if remaining == 0 {
                self.registry.release_display(unit);
            }
            remaining
        };
        if remaining == 0 {
            self.render_locks.lock().remove(&unit);
            debug!(%unit, "all rows resolved; controls retired");
        }
    }

    // ---- item-level operations --------------------------------------------

    /// Push a non-terminal status for `item`.
    pub async fn progress(&self, item: &QueuedItem, status: &str) {
        let line = format_line(LineLabel::from(item), status);
        match item.row {
            Some(row) => self.update_row(item.display, row, line).await,
            None => {
                let controls = Controls::cancel_item(item.user, item.id);
                self.replace(item.display, line, Some(controls)).await;
            }
        }
    }

    /// "Now processing" status pushed by the worker right before execution.
    pub async fn processing(&self, item: &QueuedItem) {
        self.progress(item, &templates::processing(item.id)).await;
    }

    /// A multi-line notice (login prompts). A standalone unit is replaced
    /// with it; a shared unit keeps its rows and the notice goes out as a
    /// separate message.
    pub async fn notice(&self, item: &QueuedItem, text: String) {
        let controls = Controls::cancel_item(item.user, item.id);
        if !item.is_shared() {
            self.replace(item.display, text, Some(controls)).await;
            return;
        }
        if let Some(unit) = self.send(item.display.chat, text.clone(), Some(controls)).await {
            self.notices
                .lock()
                .entry((item.user, item.id))
                .or_default()
                .push((unit, text));
        }
    }

    /// Render the terminal line of `item` with its controls removed, here
    /// and on any notice it sent.
    pub async fn finish(&self, item: &QueuedItem, status: &str) {
        let line = format_done(LineLabel::from(item), status);
        match item.row {
            Some(row) => self.finish_row(item.display, row, line).await,
            None => self.replace(item.display, line, None).await,
        }

        let notices = self.notices.lock().remove(&(item.user, item.id));
        for (unit, text) in notices.unwrap_or_default() {
            self.replace(unit, text, None).await;
        }
    }

    /// Notices still carrying a cancel control.
    pub fn open_notices(&self) -> usize {
        self.notices.lock().values().map(Vec::len).sum()
    }
}
