// src/engine/callback.rs

//! Button payloads.
//!
//! - `cancel_summary_<user>`: cancel every pending item of a batch display.
//! - `cancel_<user>_<id>`: cancel one item.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::types::{TaskId, UserId};

const BATCH_PREFIX: &str = "cancel_summary_";
const ITEM_PREFIX: &str = "cancel_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackPayload {
    CancelBatch { user: UserId },
    CancelItem { user: UserId, id: TaskId },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid callback payload: {0:?}")]
pub struct InvalidPayload(pub String);

impl CallbackPayload {
    pub fn encode(&self) -> String {
        match self {
            CallbackPayload::CancelBatch { user } => format!("{BATCH_PREFIX}{user}"),
            CallbackPayload::CancelItem { user, id } => format!("{ITEM_PREFIX}{user}_{id}"),
        }
    }

    /// The user the payload belongs to; only they may press it.
    pub fn user(&self) -> UserId {
        match self {
            CallbackPayload::CancelBatch { user } | CallbackPayload::CancelItem { user, .. } => *user,
        }
    }
}

impl FromStr for CallbackPayload {
    type Err = InvalidPayload;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidPayload(s.to_string());

        if let Some(rest) = s.strip_prefix(BATCH_PREFIX) {
            let user = rest.parse().map_err(|_| invalid())?;
            return Ok(CallbackPayload::CancelBatch { user });
        }

        let rest = s.strip_prefix(ITEM_PREFIX).ok_or_else(invalid)?;
        let (user, id) = rest.split_once('_').ok_or_else(invalid)?;
        Ok(CallbackPayload::CancelItem {
            user: user.parse().map_err(|_| invalid())?,
            id: id.parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for CallbackPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
