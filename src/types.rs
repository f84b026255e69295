// src/types.rs

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::Deserialize;

/// Identity of the person who submitted work (and may cancel it).
pub type UserId = i64;

/// Conversation a display unit lives in.
pub type ChatId = i64;

/// Identifier of a single rendered message inside a chat.
pub type MessageId = i32;

/// Per-user task number. Strictly increasing for each user, starting at 1.
pub type TaskId = u64;

/// Boxed, sendable future used at the trait seams (display surface, process
/// runner, subscription API) so implementations can be swapped in tests.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A renderable message: the display unit that one or more items report into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisplayRef {
    pub chat: ChatId,
    pub message: MessageId,
}

impl DisplayRef {
    pub fn new(chat: ChatId, message: MessageId) -> Self {
        Self { chat, message }
    }
}

impl fmt::Display for DisplayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chat, self.message)
    }
}

/// What `enqueue` does when the pending FIFO has no free slot.
///
/// - `Reject` (default): fail fast with `RelayError::QueueFull`; the caller
///   reports the item as rejected.
/// - `Block`: wait for the worker to free a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueFullPolicy {
    Reject,
    Block,
}

impl Default for QueueFullPolicy {
    fn default() -> Self {
        QueueFullPolicy::Reject
    }
}

impl FromStr for QueueFullPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(QueueFullPolicy::Reject),
            "block" => Ok(QueueFullPolicy::Block),
            other => Err(format!(
                "invalid when_full: {other} (expected \"reject\" or \"block\")"
            )),
        }
    }
}
