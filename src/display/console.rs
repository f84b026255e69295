// src/display/console.rs

//! A [`DisplaySurface`] that writes every call to stdout.
//!
//! Used when the service is driven from the local console; logs go to stderr
//! so the two streams do not interleave.

use std::io::Write;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::errors::Result;
use crate::types::{BoxFuture, ChatId, DisplayRef, MessageId};

use super::{Controls, DisplaySurface};

#[derive(Debug)]
pub struct ConsoleSurface {
    next_message: AtomicI32,
}

impl Default for ConsoleSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleSurface {
    pub fn new() -> Self {
        Self {
            next_message: AtomicI32::new(1),
        }
    }

    /// Id the next `send` will hand out. Incoming console messages draw from
    /// the same counter so ids never collide.
    pub fn next_message_id(&self) -> MessageId {
        self.next_message.fetch_add(1, Ordering::SeqCst)
    }

    fn print(&self, header: &str, text: &str, controls: Option<&Controls>) -> Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "── {header}")?;
        for line in text.lines() {
            writeln!(out, "   {line}")?;
        }
        if let Some(controls) = controls {
            for button in controls.buttons() {
                writeln!(out, "   [{}] → press {}", button.label, button.payload)?;
            }
        }
        out.flush()?;
        Ok(())
    }
}

impl DisplaySurface for ConsoleSurface {
    fn send(
        &self,
        chat: ChatId,
        text: String,
        controls: Option<Controls>,
    ) -> BoxFuture<'_, Result<DisplayRef>> {
        Box::pin(async move {
            let display = DisplayRef::new(chat, self.next_message_id());
            self.print(&format!("message {}", display.message), &text, controls.as_ref())?;
            Ok(display)
        })
    }

    fn edit(
        &self,
        display: DisplayRef,
        text: String,
        controls: Option<Controls>,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.print(&format!("message {} (edited)", display.message), &text, controls.as_ref())
        })
    }

    fn delete(&self, display: DisplayRef) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut out = std::io::stdout().lock();
            writeln!(out, "── message {} deleted", display.message)?;
            Ok(())
        })
    }

    fn answer_press(&self, _press_id: String, text: String, alert: bool) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let kind = if alert { "alert" } else { "notice" };
            let mut out = std::io::stdout().lock();
            writeln!(out, "── {kind}: {text}")?;
            Ok(())
        })
    }
}
