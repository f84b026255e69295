use std::collections::HashMap;

use parking_lot::Mutex;

use taskrelay::display::{Controls, DisplaySurface};
use taskrelay::errors::{RelayError, Result};
use taskrelay::types::{BoxFuture, ChatId, DisplayRef};

/// One call made against the surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    Send {
        display: DisplayRef,
        text: String,
        controls: Option<Controls>,
    },
    Edit {
        display: DisplayRef,
        text: String,
        controls: Option<Controls>,
    },
    Delete {
        display: DisplayRef,
    },
    Answer {
        press_id: String,
        text: String,
        alert: bool,
    },
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<SurfaceCall>,
    bodies: HashMap<DisplayRef, (String, Option<Controls>)>,
    next_message: i32,
    fail_edits: bool,
}

/// A [`DisplaySurface`] that records every call and keeps the latest body
/// and controls of each message.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    inner: Mutex<Inner>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `edit` fail.
    pub fn fail_edits(&self, fail: bool) {
        self.inner.lock().fail_edits = fail;
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.inner.lock().calls.clone()
    }

    pub fn body(&self, display: DisplayRef) -> Option<String> {
        self.inner.lock().bodies.get(&display).map(|(text, _)| text.clone())
    }

    pub fn controls(&self, display: DisplayRef) -> Option<Controls> {
        self.inner
            .lock()
            .bodies
            .get(&display)
            .and_then(|(_, controls)| controls.clone())
    }

    /// Messages created through `send`, in order.
    pub fn sent(&self) -> Vec<DisplayRef> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Send { display, .. } => Some(*display),
                _ => None,
            })
            .collect()
    }

    pub fn last_sent(&self) -> Option<DisplayRef> {
        self.sent().last().copied()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Send { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self) -> Vec<DisplayRef> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Delete { display } => Some(*display),
                _ => None,
            })
            .collect()
    }

    /// `(text, alert)` of every answered button press.
    pub fn answers(&self) -> Vec<(String, bool)> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Answer { text, alert, .. } => Some((text.clone(), *alert)),
                _ => None,
            })
            .collect()
    }

    /// Every body ever shown for `display`, oldest first.
    pub fn history(&self, display: DisplayRef) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Send { display: d, text, .. } | SurfaceCall::Edit { display: d, text, .. }
                    if *d == display =>
                {
                    Some(text.clone())
                }
                _ => None,
            })
            .collect()
    }
}

impl DisplaySurface for RecordingSurface {
    fn send(
        &self,
        chat: ChatId,
        text: String,
        controls: Option<Controls>,
    ) -> BoxFuture<'_, Result<DisplayRef>> {
        Box::pin(async move {
            let mut inner = self.inner.lock();
            inner.next_message += 1;
            let display = DisplayRef::new(chat, inner.next_message);
            inner.bodies.insert(display, (text.clone(), controls.clone()));
            inner.calls.push(SurfaceCall::Send {
                display,
                text,
                controls,
            });
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
            let mut inner = self.inner.lock();
            if inner.fail_edits {
                return Err(RelayError::Display("edit refused".into()));
            }
            inner.bodies.insert(display, (text.clone(), controls.clone()));
            inner.calls.push(SurfaceCall::Edit {
                display,
                text,
                controls,
            });
            Ok(())
        })
    }

    fn delete(&self, display: DisplayRef) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut inner = self.inner.lock();
            inner.bodies.remove(&display);
            inner.calls.push(SurfaceCall::Delete { display });
            Ok(())
        })
    }

    fn answer_press(&self, press_id: String, text: String, alert: bool) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.inner.lock().calls.push(SurfaceCall::Answer {
                press_id,
                text,
                alert,
            });
            Ok(())
        })
    }
}
