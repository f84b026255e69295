// src/display/format.rs

//! One-line row rendering: `[#<id>] <target> — <progress excerpt>`.

use crate::registry::QueuedItem;
use crate::types::TaskId;

use super::templates;

/// Upper bound on the excerpt, in characters.
pub const MAX_EXCERPT_CHARS: usize = 200;

const SEPARATORS: &[char] = &[' ', '-', '–', '—', ':', '：'];

/// What a row is about: the item id, its target and (for batches) its
/// 0-based row index.
#[derive(Debug, Clone, Copy)]
pub struct LineLabel<'a> {
    pub id: TaskId,
    pub target: &'a str,
    pub row: Option<usize>,
}

impl<'a> From<&'a QueuedItem> for LineLabel<'a> {
    fn from(item: &'a QueuedItem) -> Self {
        Self {
            id: item.id,
            target: &item.target,
            row: item.row,
        }
    }
}

/// Render `status` as the single display line of `label`.
pub fn format_line(label: LineLabel<'_>, status: &str) -> String {
    let stripped = strip_task_prefix(status, label.id);
    let excerpt = truncate(progress_excerpt(&stripped), MAX_EXCERPT_CHARS);
    let base = format!("[#{}] {} — {}", label.id, label.target, excerpt);
    match label.row {
        Some(row) => format!("{}. {}", row + 1, base),
        None => base,
    }
}

/// Render a terminal status: collapsed to one line, never empty.
pub fn format_done(label: LineLabel<'_>, status: &str) -> String {
    let collapsed = status.replace('\n', " ");
    let stripped = strip_task_prefix(collapsed.trim(), label.id);
    if stripped.is_empty() {
        format_line(label, templates::COMPLETED)
    } else {
        format_line(label, &stripped)
    }
}

/// Remove a `Task #<id>` already present in the status (and the separators
/// after it) so the identifier is not shown twice.
///
/// `Task #1` does not match inside `Task #12`.
pub fn strip_task_prefix(status: &str, id: TaskId) -> String {
    let needle = format!("task #{id}");
    let lower = status.to_lowercase();
    // Lowercasing can change byte offsets for non-ASCII text; only trust
    // positions when lengths agree.
    if lower.len() != status.len() {
        return status.trim().to_string();
    }

    let mut from = 0;
    while let Some(found) = lower[from..].find(&needle) {
        let start = from + found;
        let end = start + needle.len();
        let next_is_digit = status[end..].chars().next().is_some_and(|c| c.is_ascii_digit());
        if !next_is_digit {
            return status[end..]
                .trim()
                .trim_start_matches(SEPARATORS)
                .trim()
                .to_string();
        }
        from = end;
    }
    status.trim().to_string()
}

fn looks_like_link(segment: &str) -> bool {
    segment.contains("http") || segment.to_lowercase().contains("t.me")
}

/// Pick the most informative line: the last non-empty, non-link line, else
/// the first such line, else the raw first line.
fn progress_excerpt(text: &str) -> &str {
    let mut segments = text.split('\n').map(str::trim).filter(|s| !s.is_empty());
    if let Some(last) = segments.clone().rev().find(|s| !looks_like_link(s)) {
        return last;
    }
    if let Some(first) = segments.find(|s| !looks_like_link(s)) {
        return first;
    }
    text.split('\n').next().unwrap_or_default()
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
