// src/display/templates.rs

//! Every human-readable text the service produces.
//!
//! Terminal texts start with `Task #<id>`; the row formatter strips that
//! prefix again when the text sits next to the `[#<id>]` label.

use crate::types::{TaskId, UserId};

pub const CANCEL_ITEM_LABEL: &str = "🛑 Cancel task";
pub const CANCEL_BATCH_LABEL: &str = "🛑 Cancel all";

pub const COMPLETED: &str = "completed";

// ---- queue / progress ------------------------------------------------------

/// Initial status of an item: its 1-based position in the pending FIFO.
pub fn queued(position: usize) -> String {
    if position <= 1 {
        "⚡ about to start".to_string()
    } else {
        format!("📋 queue position: {position}")
    }
}

pub fn queued_with_id(id: TaskId, position: usize) -> String {
    format!("⏳ Task #{id} queued\n{}", queued(position))
}

pub fn processing(id: TaskId) -> String {
    format!("⏳ Task #{id} - request received, processing...")
}

// ---- terminal --------------------------------------------------------------

pub fn failed_to_start(id: TaskId) -> String {
    format!("❌ Task #{id} failed to start")
}

pub fn timed_out(id: TaskId) -> String {
    format!("❌ Task #{id} timed out")
}

pub fn failed(id: TaskId) -> String {
    format!("⚠️ Task #{id} execution failed")
}

pub fn completed(id: TaskId) -> String {
    format!("✅ Task #{id} completed")
}

pub fn terminated_by_user(id: TaskId) -> String {
    format!("❌ Task #{id} terminated by user")
}

pub fn cancelled_from_queue(id: TaskId) -> String {
    format!("❌ Task #{id} cancelled from queue")
}

pub fn cancelled_from_batch(id: TaskId) -> String {
    format!("❌ Task #{id} cancelled from batch")
}

pub fn rejected_queue_full(id: TaskId, capacity: usize) -> String {
    format!("🚫 Task #{id} rejected: queue is full ({capacity} pending)")
}

pub fn rejected_shutting_down(id: TaskId) -> String {
    format!("🚫 Task #{id} rejected: service is shutting down")
}

// ---- login notices ---------------------------------------------------------

pub fn login_console(id: TaskId) -> String {
    format!(
        "🔐 Task #{id} - login required\n\n\
         📺 Check the server console for the QR code and scan it with Telegram\n\n\
         ⏰ The task continues automatically after login"
    )
}

pub fn login_link(id: TaskId, link: &str) -> String {
    format!(
        "🔐 Task #{id} - login required\n\n\
         📱 Open this link in Telegram to log in:\n{link}\n\n\
         ⏰ The task continues automatically after login"
    )
}

// ---- commands --------------------------------------------------------------

pub fn welcome(first_name: &str) -> String {
    format!(
        "👋 Hello, {first_name}!\n\n\
         Send one or more t.me links and they will be forwarded one at a time.\n\
         Send any other http(s) link to add it as a subscription.\n\n\
         Use /help for details."
    )
}

pub fn help() -> String {
    "📖 Help\n\n\
     1️⃣ Send a t.me message link to queue it\n\
     2️⃣ Several links in one message are shown as one batch\n\
     3️⃣ Press 🛑 to cancel a task or a whole batch\n\
     4️⃣ Any other http(s) link is added as a subscription\n\n\
     Commands:\n\
     /start - welcome\n\
     /help - this text\n\
     /status - service status"
        .to_string()
}

pub struct StatusReport<'a> {
    pub runner: &'a str,
    pub runner_found: bool,
    pub subscription: Option<&'a str>,
    pub user: UserId,
    pub current: Option<(TaskId, UserId)>,
    pub queue_len: usize,
    pub queue_capacity: usize,
}

pub fn status(report: &StatusReport<'_>) -> String {
    let found = if report.runner_found {
        "✅ found"
    } else {
        "❌ not found"
    };
    let subscription = report.subscription.unwrap_or("not configured");
    let processing = match report.current {
        Some((id, user)) => format!("⚡ processing: task #{id} (user {user})"),
        None => "💤 idle".to_string(),
    };
    format!(
        "✅ Service is running\n\
         📜 runner: {} ({found})\n\
         🌐 subscription endpoint: {subscription}\n\
         👤 your id: {}\n\
         🔄 mode: serial (one task at a time)\n\
         {processing}\n\
         📋 queued: {}/{}",
        report.runner, report.user, report.queue_len, report.queue_capacity
    )
}

pub const UNKNOWN_COMMAND: &str = "❓ Unknown command, use /help";
pub const UNAUTHORIZED: &str = "❌ You are not allowed to use this service";

pub const INVALID_MESSAGE: &str = "⚠️ Please send one of:\n\
    • a t.me message link, e.g. https://t.me/channel/123\n\
    • an http(s) subscription link";

// ---- button answers --------------------------------------------------------

pub const INVALID_TASK_ID: &str = "⚠️ Invalid task id";
pub const NOT_YOUR_TASK: &str = "❌ You cannot cancel this task";
pub const NOT_YOUR_BATCH: &str = "❌ You cannot cancel this batch";
pub const ALREADY_FINISHED: &str = "⚠️ Task already finished or unknown";
pub const CANCELLING: &str = "🛑 Cancelling...";

pub fn batch_cancelled(count: usize) -> String {
    format!("🛑 Cancelled {count} task(s)")
}

// ---- subscription ----------------------------------------------------------

pub const SUBSCRIPTION_ADDING: &str = "⏳ Adding subscription...";
pub const SUBSCRIPTION_ADDED: &str = "subscription added";
pub const SUBSCRIPTION_DISABLED: &str = "❌ Subscriptions are not configured";
pub const SUBSCRIPTION_TIMEOUT: &str = "❌ Request timed out, try again later";
pub const SUBSCRIPTION_UNREACHABLE: &str = "❌ Cannot reach the subscription service";
pub const SUBSCRIPTION_BAD_RESPONSE: &str = "❌ Failed to read the response";

pub fn subscription_request_failed(err: &str) -> String {
    format!("❌ Request failed: {err}")
}

pub fn subscription_status_failed(status: u16) -> String {
    format!("subscription failed (status {status})")
}
