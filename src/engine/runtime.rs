// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;

use super::InboundEvent;
use super::handlers::Dispatcher;

/// Event loop of the service.
///
/// Every message and button press is handled on its own tokio task, so a
/// slow handler (a subscription request, a blocked enqueue, a process
/// teardown) never delays the next event. Execution stays serial because only
/// the queue worker ever starts a task.
pub struct Runtime {
    event_rx: mpsc::Receiver<InboundEvent>,
    dispatcher: Arc<Dispatcher>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime").finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(event_rx: mpsc::Receiver<InboundEvent>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            event_rx,
            dispatcher,
        }
    }

    /// Main event loop. Returns when shutdown is requested or every
    /// transport has gone away.
    pub async fn run(mut self) -> Result<()> {
        info!("runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("inbound event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            match event {
                InboundEvent::Message(msg) => {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    tokio::spawn(async move { dispatcher.handle_message(msg).await });
                }
                InboundEvent::Button(press) => {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    tokio::spawn(async move { dispatcher.handle_button(press).await });
                }
                InboundEvent::ShutdownRequested => {
                    info!("shutdown requested; stopping runtime");
                    break;
                }
            }
        }

        info!("runtime exiting");
        Ok(())
    }
}
