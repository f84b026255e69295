// src/engine/stdin.rs

//! Line-based console transport.
//!
//! Each stdin line is a message from the console operator in chat 0.
//! `press <message id> <payload>` simulates pressing a button on a displayed
//! message. End of input requests shutdown.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::display::ConsoleSurface;
use crate::types::{ChatId, DisplayRef, UserId};

use super::{ButtonPress, IncomingMessage, InboundEvent, UserInfo};

/// Chat id of the console conversation.
pub const CONSOLE_CHAT: ChatId = 0;

/// Turn one input line into an event. Blank lines yield `None`.
pub fn parse_line(
    line: &str,
    operator: &UserInfo,
    surface: &ConsoleSurface,
    press_seq: &mut u64,
) -> Option<InboundEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(rest) = line.strip_prefix("press ") {
        let mut parts = rest.split_whitespace();
        if let (Some(message), Some(payload)) = (parts.next(), parts.next()) {
            if let Ok(message) = message.parse() {
                *press_seq += 1;
                return Some(InboundEvent::Button(ButtonPress {
                    id: format!("press-{press_seq}"),
                    from: operator.clone(),
                    display: DisplayRef::new(CONSOLE_CHAT, message),
                    payload: payload.to_string(),
                }));
            }
        }
    }

    Some(InboundEvent::Message(IncomingMessage {
        chat: CONSOLE_CHAT,
        message: surface.next_message_id(),
        from: operator.clone(),
        text: line.to_string(),
    }))
}

/// Feed events from `input` until it ends or the engine goes away.
pub async fn pump<R>(
    input: R,
    operator: UserInfo,
    surface: Arc<ConsoleSurface>,
    tx: mpsc::Sender<InboundEvent>,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut press_seq = 0;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(event) = parse_line(&line, &operator, &surface, &mut press_seq) else {
                    continue;
                };
                if tx.send(event).await.is_err() {
                    debug!("engine gone; console transport stopping");
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "console input failed");
                break;
            }
        }
    }
    info!("console input closed; requesting shutdown");
    let _ = tx.send(InboundEvent::ShutdownRequested).await;
}

/// Spawn the transport on the process's stdin.
pub fn spawn_stdin_transport(
    user: UserId,
    surface: Arc<ConsoleSurface>,
    tx: mpsc::Sender<InboundEvent>,
) -> JoinHandle<()> {
    let operator = UserInfo {
        id: user,
        first_name: "operator".to_string(),
    };
    tokio::spawn(pump(BufReader::new(tokio::io::stdin()), operator, surface, tx))
}
