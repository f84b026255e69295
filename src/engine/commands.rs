// src/engine/commands.rs

//! Command parsing and target extraction from inbound text.

use std::collections::HashSet;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Status,
    Unknown(String),
}

/// Parse a leading `/command` (an `@botname` suffix is ignored).
///
/// Returns `None` when the text is not a command at all.
pub fn parse_command(text: &str) -> Option<Command> {
    let first = text.trim().split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or_default();
    Some(match name.to_lowercase().as_str() {
        "start" => Command::Start,
        "help" => Command::Help,
        "status" => Command::Status,
        _ => Command::Unknown(name.to_string()),
    })
}

/// Give a bare target an `https://` scheme.
pub fn normalize_target(raw: &str) -> String {
    let target = raw.trim();
    if target.to_lowercase().starts_with("http") {
        target.to_string()
    } else {
        format!("https://{target}")
    }
}

fn dedup_key(target: &str) -> String {
    target.trim_end_matches('/').to_lowercase()
}

/// All targets in `text`, normalised and de-duplicated (case-insensitive,
/// trailing slash ignored), in order of first appearance.
pub fn extract_targets(text: &str, pattern: &Regex) -> Vec<String> {
    let mut seen = HashSet::new();
    pattern
        .find_iter(text)
        .map(|m| normalize_target(m.as_str()))
        .filter(|target| seen.insert(dedup_key(target)))
        .collect()
}

/// The first link matching `pattern` in `text` that is not a work target.
pub fn find_subscription_link(text: &str, pattern: &Regex) -> Option<String> {
    pattern
        .find(text)
        .map(|m| m.as_str().to_string())
        .filter(|link| !link.to_lowercase().contains("t.me"))
}
