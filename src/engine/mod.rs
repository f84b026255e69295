// src/engine/mod.rs

//! Inbound side of the service.
//!
//! This module ties together:
//! - the inbound event model ([`InboundEvent`])
//! - pure routing of messages and button presses ([`core`])
//! - the async handlers that submit, cancel and answer ([`handlers`])
//! - the event loop that runs every event on its own tokio task ([`runtime`])
//! - a line-based stdin transport for local operation ([`stdin`])

use crate::types::{ChatId, DisplayRef, MessageId, UserId};

/// Who sent an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: UserId,
    pub first_name: String,
}

/// A text message from a user.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat: ChatId,
    pub message: MessageId,
    pub from: UserInfo,
    pub text: String,
}

impl IncomingMessage {
    /// The user's own message as a display reference (for deletion).
    pub fn display(&self) -> DisplayRef {
        DisplayRef::new(self.chat, self.message)
    }
}

/// A press on an interactive button.
#[derive(Debug, Clone)]
pub struct ButtonPress {
    pub id: String,
    pub from: UserInfo,
    /// The display unit the pressed button belongs to.
    pub display: DisplayRef,
    pub payload: String,
}

/// Events flowing into the engine from a transport.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Message(IncomingMessage),
    Button(ButtonPress),
    /// Graceful shutdown requested (Ctrl-C, end of input).
    ShutdownRequested,
}

pub mod callback;
pub mod commands;
pub mod core;
pub mod handlers;
pub mod runtime;
pub mod stdin;

pub use callback::CallbackPayload;
pub use core::{MessageAction, PressAction, Router};
pub use handlers::Dispatcher;
pub use runtime::Runtime;
