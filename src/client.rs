//! Paired-array client
//!
//! [`MetroClient`] owns the two device handles, local and remote, plus the
//! port-group name shared by every attach. Both devices are logged in eagerly
//! at construction; afterwards the session layer re-authenticates reactively
//! for the life of the process.

use futures::future;
use tracing::info;

use crate::config::ClientConfig;
use crate::device::Device;
use crate::error::Result;

/// Client for one mirrored pair of arrays
pub struct MetroClient {
    local: Device,
    remote: Device,
    port_group: String,
}

impl MetroClient {
    /// Validate the configuration, build both device handles, and log in to
    /// both arrays.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let local = Device::new(
            "local",
            &config.local,
            config.retry_budget,
            config.copy_timeout(),
            config.poll_interval(),
        )?;
        let remote = Device::new(
            "remote",
            &config.remote,
            config.retry_budget,
            config.copy_timeout(),
            config.poll_interval(),
        )?;

        // The sides are independent; log in concurrently.
        future::try_join(local.ensure_session(), remote.ensure_session()).await?;
        info!("connected to both arrays");

        Ok(Self {
            local,
            remote,
            port_group: config.port_group,
        })
    }

    /// Local (primary site) device
    pub fn local(&self) -> &Device {
        &self.local
    }

    /// Remote (secondary site) device
    pub fn remote(&self) -> &Device {
        &self.remote
    }

    /// Port group bound into every mapping view during attach
    pub fn port_group(&self) -> &str {
        &self.port_group
    }

    #[cfg(test)]
    pub(crate) fn from_parts(local: Device, remote: Device, port_group: &str) -> Self {
        Self {
            local,
            remote,
            port_group: port_group.to_string(),
        }
    }
}
