//! Core library for the faceplate settings service.
//! This crate holds the network password page logic (credential
//! validation, connect/back flow), the signal strength indicator mapping,
//! the microphone level meter, the connection handlers (mock and
//! NetworkManager over D-Bus, the latter behind a feature flag), UI asset
//! delivery and the HTTP surface the display shell talks to.

pub mod config;
pub mod credentials;
pub mod frontends;
pub mod handlers;
pub mod mic_level;
pub mod network_connect;
pub mod notifications;
pub mod signal;
pub mod traits;
pub mod web_server;

// Define a shared Error and Result type for the entire crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Activation failed: {0}")]
    ActivationFailed(String),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid connectivity reading: {0}")]
    InvalidReading(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),
}

/// A specialized `Result` type for this crate's operations.
pub type Result<T> = std::result::Result<T, Error>;
