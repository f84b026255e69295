// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Queue is full ({capacity} items pending)")]
    QueueFull { capacity: usize },

    #[error("Queue is closed")]
    QueueClosed,

    #[error("Failed to start runner: {0}")]
    Spawn(String),

    #[error("Display surface error: {0}")]
    Display(String),

    #[error("Subscription request failed: {0}")]
    Subscription(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RelayError>;
