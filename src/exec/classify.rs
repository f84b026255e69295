// src/exec/classify.rs

//! Classification of runner output lines into control events.

use std::time::Duration;

use tokio::time::Instant;

/// Text the runner prints when it renders a login QR code on the console.
pub const QR_SCAN_MARKER: &str = "Scan QR code";
/// Block-drawing character QR codes are drawn with.
pub const QR_BLOCK_CHAR: char = '█';
/// Prefix of a line carrying a login link.
pub const LOGIN_LINK_TAG: &str = "[QRCODE]";
/// Prefix of a line carrying a progress status.
pub const STATUS_TAG: &str = "[STATUS]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// The runner wants an interactive login on the server console.
    LoginViaConsole,
    /// The runner produced a login link.
    LoginViaLink(String),
    /// A progress status (tag stripped).
    Status(String),
    Noise,
}

/// Stateful per-task classifier. The console-login notice fires once.
#[derive(Debug, Default)]
pub struct LineClassifier {
    qr_seen: bool,
}

impl LineClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one raw line. Empty (after trimming) lines yield `None`.
    pub fn classify(&mut self, raw: &str) -> Option<OutputEvent> {
        let line = raw.trim();
        if line.is_empty() {
            return None;
        }

        if !self.qr_seen && (line.contains(QR_SCAN_MARKER) || line.contains(QR_BLOCK_CHAR)) {
            self.qr_seen = true;
            return Some(OutputEvent::LoginViaConsole);
        }
        if line.contains(LOGIN_LINK_TAG) {
            let link = line.replace(LOGIN_LINK_TAG, "").trim().to_string();
            return Some(OutputEvent::LoginViaLink(link));
        }
        if line.contains(STATUS_TAG) {
            let status = line.replace(STATUS_TAG, "").trim().to_string();
            return Some(OutputEvent::Status(status));
        }
        Some(OutputEvent::Noise)
    }
}

/// Lets at most one progress push through per `interval`.
///
/// The window starts when the task starts, so a status arriving in the first
/// `interval` is stored but not pushed.
#[derive(Debug)]
pub struct StatusThrottle {
    interval: Duration,
    last: Instant,
}

impl StatusThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    /// Whether a push is allowed now; if so the window restarts.
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last) >= self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}
