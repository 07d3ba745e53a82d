//! Client configuration
//!
//! Plain data structs; loading them from a file or environment is left to the
//! embedding application.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Connection settings for one array (one side of the mirror)
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Ordered controller endpoints, e.g. `https://10.20.0.11:8088`.
    /// Login tries them in sequence until one authenticates.
    pub controllers: Vec<String>,
    /// Management account name
    pub username: String,
    /// Management account password
    pub password: String,
    /// Arrays commonly ship self-signed management certificates
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl DeviceConfig {
    pub(crate) fn validate(&self, side: &str) -> Result<()> {
        if self.controllers.is_empty() {
            return Err(Error::Configuration(format!(
                "{side} device needs at least one controller endpoint"
            )));
        }
        if self.username.is_empty() {
            return Err(Error::Configuration(format!("{side} device username is required")));
        }
        if self.password.is_empty() {
            return Err(Error::Configuration(format!("{side} device password is required")));
        }
        Ok(())
    }
}

/// Configuration for the paired local/remote client
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Local (primary site) array
    pub local: DeviceConfig,
    /// Remote (secondary site) array
    pub remote: DeviceConfig,
    /// Port group bound into every mapping view during attach
    pub port_group: String,
    /// Re-login budget per request before giving up on the session
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,
    /// Ceiling for clone-split and LUN-copy completion waits, in seconds
    #[serde(default = "default_copy_timeout_secs")]
    pub copy_timeout_secs: u64,
    /// Interval between readiness polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_retry_budget() -> u32 {
    10
}

fn default_copy_timeout_secs() -> u64 {
    180
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

impl ClientConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        self.local.validate("local")?;
        self.remote.validate("remote")?;
        if self.port_group.is_empty() {
            return Err(Error::Configuration("port group name is required".into()));
        }
        Ok(())
    }

    pub(crate) fn copy_timeout(&self) -> Duration {
        Duration::from_secs(self.copy_timeout_secs)
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
