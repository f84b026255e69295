// src/engine/handlers.rs

//! Async handlers for inbound events.
//!
//! [`Dispatcher`] carries out the decisions of [`Router`]: it submits
//! targets to the registry, answers commands, forwards subscription links,
//! and turns button presses into cancellations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::display::aggregator::ROW_SEPARATOR;
use crate::display::templates::{self, StatusReport};
use crate::display::{Controls, DisplayAggregator, LineLabel, format_line};
use crate::errors::RelayError;
use crate::registry::{CancelOutcome, ItemState, QueuedItem, TaskRegistry};
use crate::subscription::SubscriptionApi;
use crate::types::{DisplayRef, TaskId, UserId};

use super::callback::CallbackPayload;
use super::commands::Command;
use super::core::{MessageAction, PressAction, Router};
use super::{ButtonPress, IncomingMessage};

/// How long an "invalid message" warning stays before it and the offending
/// message are deleted.
pub const DEFAULT_WARNING_TTL: Duration = Duration::from_secs(5);

pub struct Dispatcher {
    router: Router,
    registry: Arc<TaskRegistry>,
    display: Arc<DisplayAggregator>,
    subscription: Option<Arc<dyn SubscriptionApi>>,
    runner_script: PathBuf,
    warning_ttl: Duration,
}

impl Dispatcher {
    pub fn new(router: Router, registry: Arc<TaskRegistry>, display: Arc<DisplayAggregator>) -> Self {
        Self {
            router,
            registry,
            display,
            subscription: None,
            runner_script: PathBuf::new(),
            warning_ttl: DEFAULT_WARNING_TTL,
        }
    }

    pub fn with_subscription(mut self, api: Arc<dyn SubscriptionApi>) -> Self {
        self.subscription = Some(api);
        self
    }

    pub fn with_runner_script(mut self, script: PathBuf) -> Self {
        self.runner_script = script;
        self
    }

    pub fn with_warning_ttl(mut self, ttl: Duration) -> Self {
        self.warning_ttl = ttl;
        self
    }

    async fn reply(&self, msg: &IncomingMessage, text: impl Into<String>) -> Option<DisplayRef> {
        self.display.send(msg.chat, text.into(), None).await
    }

    async fn answer(&self, press: &ButtonPress, text: impl Into<String>, alert: bool) {
        if let Err(err) = self
            .display
            .surface()
            .answer_press(press.id.clone(), text.into(), alert)
            .await
        {
            warn!(press = %press.id, error = %err, "answering button press failed");
        }
    }

    // ---- messages ----------------------------------------------------------

    pub async fn handle_message(&self, msg: IncomingMessage) {
        debug!(user = msg.from.id, chat = msg.chat, "message received");
        match self.router.route_message(msg.from.id, &msg.text) {
            MessageAction::Command(command) => self.handle_command(&msg, command).await,
            MessageAction::Unauthorized => {
                info!(user = msg.from.id, "message from user not on the allow-list");
                let _ = self.reply(&msg, templates::UNAUTHORIZED).await;
            }
            MessageAction::Submit(mut targets) if targets.len() == 1 => {
                if let Some(target) = targets.pop() {
                    self.submit_single(&msg, target).await;
                }
            }
            MessageAction::Submit(targets) => self.submit_batch(&msg, targets).await,
            MessageAction::Subscribe(link) => self.subscribe(&msg, link).await,
            MessageAction::Invalid => self.warn_and_expire(&msg).await,
        }
    }

    async fn handle_command(&self, msg: &IncomingMessage, command: Command) {
        let text = match command {
            Command::Start => templates::welcome(&msg.from.first_name),
            Command::Help => templates::help(),
            Command::Status => {
                let runner = self.runner_script.display().to_string();
                let report = StatusReport {
                    runner: &runner,
                    runner_found: self.runner_script.is_file(),
                    subscription: self.subscription.as_ref().map(|api| api.endpoint()),
                    user: msg.from.id,
                    current: self.registry.current().map(|c| (c.id, c.user)),
                    queue_len: self.registry.queue_len(),
                    queue_capacity: self.registry.queue_capacity(),
                };
                templates::status(&report)
            }
            Command::Unknown(name) => {
                debug!(command = %name, "unknown command");
                templates::UNKNOWN_COMMAND.to_string()
            }
        };
        let _ = self.reply(msg, text).await;
    }

    /// One target: a standalone display with its own cancel control.
    pub async fn submit_single(&self, msg: &IncomingMessage, target: String) {
        let user = msg.from.id;
        let id = self.registry.next_id(user);
        let position = self.registry.queue_len() + 1;
        let label = LineLabel {
            id,
            target: &target,
            row: None,
        };
        let text = format_line(label, &templates::queued(position));
        let controls = Controls::cancel_item(user, id);

        let Some(display) = self.display.send(msg.chat, text, Some(controls)).await else {
            warn!(user, task_id = id, "could not render submission; dropping it");
            return;
        };
        let item = Arc::new(QueuedItem::standalone(target, user, id, display));
        self.enqueue(item).await;
    }

    /// Several targets: one shared display, one row each, one batch control.
    pub async fn submit_batch(&self, msg: &IncomingMessage, targets: Vec<String>) {
        let user = msg.from.id;
        let ids = self.registry.next_ids(user, targets.len());
        let base = self.registry.queue_len();

        let lines: Vec<String> = targets
            .iter()
            .zip(&ids)
            .enumerate()
            .map(|(row, (target, id))| {
                let label = LineLabel {
                    id: *id,
                    target,
                    row: Some(row),
                };
                format_line(label, &templates::queued_with_id(*id, base + row + 1))
            })
            .collect();
        let controls = Controls::cancel_batch(user);

        let body = lines.join(ROW_SEPARATOR);
        let Some(unit) = self.display.send(msg.chat, body, Some(controls.clone())).await else {
            warn!(user, count = targets.len(), "could not render batch; dropping it");
            return;
        };
        self.registry.init_display(unit, lines, Some(controls));
        info!(user, count = targets.len(), %unit, "batch submitted");

        for (row, (target, id)) in targets.into_iter().zip(ids).enumerate() {
            let item = Arc::new(QueuedItem::row(target, user, id, unit, row));
            self.enqueue(item).await;
        }
    }

    async fn enqueue(&self, item: Arc<QueuedItem>) {
        match self.registry.enqueue(Arc::clone(&item)).await {
            Ok(()) => {}
            Err(RelayError::QueueFull { capacity }) => {
                self.display
                    .finish(&item, &templates::rejected_queue_full(item.id, capacity))
                    .await;
            }
            Err(_) => {
                self.display
                    .finish(&item, &templates::rejected_shutting_down(item.id))
                    .await;
            }
        }
    }

    async fn subscribe(&self, msg: &IncomingMessage, link: String) {
        let Some(api) = self.subscription.as_ref() else {
            let _ = self.reply(msg, templates::SUBSCRIPTION_DISABLED).await;
            return;
        };
        info!(user = msg.from.id, link = %link, "subscription requested");
        let pending = self.reply(msg, templates::SUBSCRIPTION_ADDING).await;
        let reply = api.add(link).await;
        match pending {
            Some(display) => self.display.replace(display, reply.text, None).await,
            None => {
                let _ = self.reply(msg, reply.text).await;
            }
        }
    }

    /// Warn about an unusable message, then delete the warning and the
    /// message after the warning TTL without holding up the handler.
    async fn warn_and_expire(&self, msg: &IncomingMessage) {
        let warning = self.reply(msg, templates::INVALID_MESSAGE).await;
        let display = Arc::clone(&self.display);
        let ttl = self.warning_ttl;
        let original = msg.display();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(warning) = warning {
                display.delete(warning).await;
            }
            display.delete(original).await;
        });
    }

    // ---- button presses ----------------------------------------------------

    pub async fn handle_button(&self, press: ButtonPress) {
        debug!(user = press.from.id, payload = %press.payload, "button pressed");
        match self.router.route_press(press.from.id, &press.payload) {
            PressAction::Unauthorized => self.answer(&press, templates::UNAUTHORIZED, true).await,
            PressAction::Invalid => self.answer(&press, templates::INVALID_TASK_ID, true).await,
            PressAction::Foreign(CallbackPayload::CancelBatch { .. }) => {
                self.answer(&press, templates::NOT_YOUR_BATCH, true).await
            }
            PressAction::Foreign(CallbackPayload::CancelItem { .. }) => {
                self.answer(&press, templates::NOT_YOUR_TASK, true).await
            }
            PressAction::Cancel(CallbackPayload::CancelBatch { user }) => {
                let count = self.cancel_batch(user, press.display).await;
                self.answer(&press, templates::batch_cancelled(count), false).await;
            }
            PressAction::Cancel(CallbackPayload::CancelItem { user, id }) => {
                if self.cancel_item(user, id).await {
                    self.answer(&press, templates::CANCELLING, false).await;
                } else {
                    self.answer(&press, templates::ALREADY_FINISHED, true).await;
                }
            }
        }
    }

    /// Cancel every unresolved item of `user` in `display`. Waiting items go
    /// first so the worker cannot pick one up while a running one is being
    /// torn down. Returns how many items were cancelled.
    pub async fn cancel_batch(&self, user: UserId, unit: DisplayRef) -> usize {
        let (waiting, started): (Vec<_>, Vec<_>) = self
            .registry
            .queued_items_for(user, unit)
            .into_iter()
            .partition(|item| item.state() == ItemState::Waiting);

        let mut cancelled = 0;
        for item in waiting.iter().chain(started.iter()) {
            match self.registry.cancel(user, item.id).await {
                CancelOutcome::Waiting(item) => {
                    self.display
                        .finish(&item, &templates::cancelled_from_batch(item.id))
                        .await;
                    cancelled += 1;
                }
                CancelOutcome::Running => cancelled += 1,
                CancelOutcome::NotFound => {}
            }
        }
        info!(user, %unit, cancelled, "batch cancelled");
        cancelled
    }

    /// Cancel one item. Returns false when it was already finished.
    pub async fn cancel_item(&self, user: UserId, id: TaskId) -> bool {
        match self.registry.cancel(user, id).await {
            CancelOutcome::Waiting(item) => {
                self.display
                    .finish(&item, &templates::cancelled_from_queue(id))
                    .await;
                true
            }
            CancelOutcome::Running => true,
            CancelOutcome::NotFound => false,
        }
    }
}
