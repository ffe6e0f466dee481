//! Connection configuration and construction-time validation.

use crate::consumer::WaitStrategy;
use crate::error::ConfigError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default interval between buffer polls while waiting.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Credentials presented to the hub.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credentials {
    /// Whatever the process environment provides (e.g. integrated auth).
    #[default]
    Ambient,
    /// Explicit username/password pair.
    Basic {
        username: String,
        #[serde(skip_serializing, default)]
        password: String,
    },
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Ambient => f.write_str("Ambient"),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Connection configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Hub address (absolute URI). Required.
    pub address: Option<String>,

    /// Hub (channel) name. Must not be blank.
    pub hub_name: String,

    /// Credentials. `None` is rejected; the default is ambient credentials.
    pub credentials: Option<Credentials>,

    /// Sleep between buffer polls while waiting, and the upper bound of a
    /// single notify wait slice. Written as whole milliseconds in JSON.
    /// Default: 100ms
    #[serde(rename = "poll_interval_ms", with = "duration_ms")]
    pub poll_interval: Duration,

    /// How waiting dequeues sleep.
    pub wait_strategy: WaitStrategy,

    /// Drop buffered payloads when an event is unsubscribed.
    /// Default: false (buffers persist across subscribe cycles)
    pub clear_on_unsubscribe: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: None,
            hub_name: String::new(),
            credentials: Some(Credentials::Ambient),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            wait_strategy: WaitStrategy::default(),
            clear_on_unsubscribe: false,
        }
    }
}

impl ConnectionConfig {
    /// Config for `address` / `hub_name` with ambient credentials.
    pub fn new(address: impl Into<String>, hub_name: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            hub_name: hub_name.into(),
            ..Default::default()
        }
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn basic_auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials(Credentials::basic(username, password))
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn wait_strategy(mut self, strategy: WaitStrategy) -> Self {
        self.wait_strategy = strategy;
        self
    }

    pub fn clear_on_unsubscribe(mut self, clear: bool) -> Self {
        self.clear_on_unsubscribe = clear;
        self
    }

    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check the configuration and resolve the endpoint the transport is
    /// built for.
    pub fn validate(&self) -> Result<HubEndpoint, ConfigError> {
        let raw = match self.address.as_deref().map(str::trim) {
            Some(a) if !a.is_empty() => a,
            _ => return Err(ConfigError::MissingAddress),
        };

        let address = Url::parse(raw).map_err(|e| ConfigError::InvalidAddress {
            address: raw.to_string(),
            reason: e.to_string(),
        })?;
        if address.cannot_be_a_base() {
            return Err(ConfigError::InvalidAddress {
                address: raw.to_string(),
                reason: "not a hierarchical URI".to_string(),
            });
        }

        if self.hub_name.trim().is_empty() {
            return Err(ConfigError::EmptyHubName);
        }

        let credentials = self
            .credentials
            .clone()
            .ok_or(ConfigError::MissingCredentials)?;

        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidPollInterval);
        }

        Ok(HubEndpoint {
            address,
            hub_name: self.hub_name.clone(),
            credentials,
        })
    }
}

/// Serde adapter storing a `Duration` as whole milliseconds.
mod duration_ms {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// A validated hub target, handed to the transport factory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubEndpoint {
    pub address: Url,
    pub hub_name: String,
    pub credentials: Credentials,
}

impl HubEndpoint {
    /// Absolute form of the address.
    pub fn absolute_uri(&self) -> &str {
        self.address.as_str()
    }
}
