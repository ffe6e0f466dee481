//! Error types for the hub client.

use crate::types::EventName;
use thiserror::Error;

/// Main error type for connection and subscription operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Already subscribed: {0}")]
    AlreadySubscribed(EventName),

    #[error("Not subscribed: {0}")]
    NotSubscribed(EventName),

    /// The entry exists but the transport has not confirmed it yet.
    #[error("Subscription still pending: {0}")]
    RegistrationPending(EventName),

    #[error("Transport refused handler for: {0}")]
    HandlerRejected(EventName),

    /// The pending entry changed underneath us while the handler was installed.
    #[error("Subscription entry changed during registration: {0}")]
    RegistrationRace(EventName),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid wait time: {0}ms (expected -1, 0 or a positive value)")]
    InvalidTimeout(i64),

    #[error("Connection is shut down")]
    Closed,
}

impl ClientError {
    /// True for failures that are an expected runtime condition rather than
    /// a broken transport or a programming error.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            ClientError::AlreadySubscribed(_)
                | ClientError::NotSubscribed(_)
                | ClientError::RegistrationPending(_)
                | ClientError::RegistrationRace(_)
        )
    }
}

/// Construction-time validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Hub address is required")]
    MissingAddress,

    #[error("Invalid hub address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Hub name must not be empty")]
    EmptyHubName,

    #[error("Credentials are required")]
    MissingCredentials,

    #[error("Poll interval must be greater than zero")]
    InvalidPollInterval,

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

/// Failures reported by a [`HubTransport`](crate::transport::HubTransport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Disconnect failed: {0}")]
    Disconnect(String),

    #[error("Transport closed")]
    Closed,
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
