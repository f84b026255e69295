// src/engine/core.rs

//! Pure routing decisions for inbound events.
//!
//! [`Router`] decides *what* an event means; the async shell in
//! [`super::handlers`] carries the decision out. Keeping this side free of
//! IO makes the routing rules testable without a display or a runner.

use regex::Regex;

use crate::config::{AccessSection, ConfigFile};
use crate::types::UserId;

use super::callback::CallbackPayload;
use super::commands::{Command, extract_targets, find_subscription_link, parse_command};

/// What to do with an inbound text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageAction {
    Command(Command),
    Unauthorized,
    /// Normalised, de-duplicated targets (at least one).
    Submit(Vec<String>),
    Subscribe(String),
    /// Neither a target nor a subscription link.
    Invalid,
}

/// What to do with a button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PressAction {
    Unauthorized,
    Invalid,
    /// A well-formed payload that belongs to another user.
    Foreign(CallbackPayload),
    Cancel(CallbackPayload),
}

#[derive(Debug, Clone)]
pub struct Router {
    access: AccessSection,
    target_pattern: Regex,
    link_pattern: Regex,
}

impl Router {
    pub fn new(access: AccessSection, target_pattern: Regex, link_pattern: Regex) -> Self {
        Self {
            access,
            target_pattern,
            link_pattern,
        }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(
            cfg.access.clone(),
            cfg.target_pattern.clone(),
            cfg.link_pattern.clone(),
        )
    }

    pub fn is_allowed(&self, user: UserId) -> bool {
        self.access.is_allowed(user)
    }

    pub fn route_message(&self, user: UserId, text: &str) -> MessageAction {
        if let Some(command) = parse_command(text) {
            return MessageAction::Command(command);
        }
        if !self.is_allowed(user) {
            return MessageAction::Unauthorized;
        }

        let targets = extract_targets(text, &self.target_pattern);
        if !targets.is_empty() {
            return MessageAction::Submit(targets);
        }
        match find_subscription_link(text, &self.link_pattern) {
            Some(link) => MessageAction::Subscribe(link),
            None => MessageAction::Invalid,
        }
    }

    pub fn route_press(&self, presser: UserId, payload: &str) -> PressAction {
        if !self.is_allowed(presser) {
            return PressAction::Unauthorized;
        }
        match payload.parse::<CallbackPayload>() {
            Ok(parsed) if parsed.user() == presser => PressAction::Cancel(parsed),
            Ok(parsed) => PressAction::Foreign(parsed),
            Err(_) => PressAction::Invalid,
        }
    }
}
