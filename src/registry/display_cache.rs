// src/registry/display_cache.rs

//! Per-display-unit cache of rendered rows.
//!
//! Rows are an index-addressed arena: updating row `i` never touches the
//! other rows, so concurrent progress from different items stays independent.

use std::collections::HashMap;

use crate::display::Controls;
use crate::types::DisplayRef;

#[derive(Debug, Default)]
struct DisplayEntry {
    lines: Vec<String>,
    controls: Option<Controls>,
    /// Rows not yet terminal. `None` once exhausted.
    pending: Option<usize>,
}

#[derive(Debug, Default)]
pub struct DisplayCache {
    units: HashMap<DisplayRef, DisplayEntry>,
}

impl DisplayCache {
    /// Seed a display unit; the pending count starts at `lines.len()`.
    pub fn init(&mut self, display: DisplayRef, lines: Vec<String>, controls: Option<Controls>) {
        let pending = Some(lines.len()).filter(|n| *n > 0);
        self.units.insert(
            display,
            DisplayEntry {
                lines,
                controls,
                pending,
            },
        );
    }

    /// Replace one row and return the whole current body plus controls.
    ///
    /// Returns `None` when the unit is unknown. Out-of-range indices leave
    /// the rows untouched but still return them.
    pub fn update_line(
        &mut self,
        display: DisplayRef,
        index: usize,
        text: String,
    ) -> Option<(Vec<String>, Option<Controls>)> {
        let entry = self.units.get_mut(&display)?;
        if let Some(slot) = entry.lines.get_mut(index) {
            *slot = text;
        }
        Some((entry.lines.clone(), entry.controls.clone()))
    }

    /// Decrement the pending count; at zero the controls are retired.
    ///
    /// Returns the remaining count (0 once exhausted or when unknown).
    pub fn decrement(&mut self, display: DisplayRef) -> usize {
        let Some(entry) = self.units.get_mut(&display) else {
            return 0;
        };
        let Some(pending) = entry.pending else {
            return 0;
        };
        let remaining = pending.saturating_sub(1);
        if remaining == 0 {
            entry.pending = None;
            entry.controls = None;
            return 0;
        }
        entry.pending = Some(remaining);
        remaining
    }

    pub fn lines(&self, display: DisplayRef) -> Option<Vec<String>> {
        self.units.get(&display).map(|e| e.lines.clone())
    }

    pub fn controls(&self, display: DisplayRef) -> Option<Controls> {
        self.units.get(&display).and_then(|e| e.controls.clone())
    }

    pub fn pending(&self, display: DisplayRef) -> Option<usize> {
        self.units.get(&display).and_then(|e| e.pending)
    }

    /// Drop the cached rows of a fully resolved unit.
    pub fn release(&mut self, display: DisplayRef) -> bool {
        match self.units.get(&display) {
            Some(entry) if entry.pending.is_none() => {
                self.units.remove(&display);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
