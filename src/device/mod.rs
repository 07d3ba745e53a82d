//! Per-array device handle
//!
//! A [`Device`] represents one array (the local or the remote side of the
//! mirror) and composes the session manager with the retrying request
//! executor into authenticated CRUD primitives. Resource operations live in
//! the submodules, one per object family, as `impl Device` blocks.

pub mod group;
pub mod host;
pub mod initiator;
pub mod lun;
pub mod lun_copy;
pub mod mapping;
pub mod pool;
pub mod snapshot;

pub use group::{LunGroup, PortGroup};
pub use host::{Host, HostGroup};
pub use initiator::Initiator;
pub use lun::Lun;
pub use lun_copy::LunCopy;
pub use mapping::MappingView;
pub use pool::StoragePool;
pub use snapshot::Snapshot;

use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::rest::executor::{execute, RequestTemplate};
use crate::rest::session::Session;

// =============================================================================
// Wire Constants
// =============================================================================

/// Object type numbers used by association endpoints
pub(crate) mod obj_type {
    pub const HOST: i64 = 21;
    pub const HOST_GROUP: i64 = 14;
    pub const LUN: i64 = 11;
    pub const LUN_GROUP: i64 = 256;
    pub const LUN_COPY: i64 = 219;
    pub const SNAPSHOT: i64 = 27;
    pub const PORT_GROUP: i64 = 257;
    pub const INITIATOR: i64 = 222;
    pub const MAPPING_VIEW: i64 = 245;
    pub const HYPER_METRO_PAIR: i64 = 15361;
}

/// Status code strings reported in `HEALTHSTATUS`/`RUNNINGSTATUS` fields
pub(crate) mod status {
    pub const HEALTH_OK: &str = "1";
    pub const VOLUME_READY: &str = "27";
    pub const LUN_COPY_READY: &str = "40";
    pub const SNAPSHOT_ACTIVE: &str = "43";
    pub const SNAPSHOT_INACTIVE: &str = "45";
}

/// Sectors per GiB as the array counts mirrored LUN capacity
pub(crate) const SECTORS_PER_GB: u64 = 2 * 1024 * 1024;

/// Body shared by the `associate`/`remove_associate` endpoints
#[derive(Debug, Serialize)]
pub(crate) struct AssociateParam {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "TYPE", skip_serializing_if = "Option::is_none")]
    pub obj_type: Option<String>,
    #[serde(rename = "ASSOCIATEOBJID")]
    pub associate_obj_id: String,
    #[serde(rename = "ASSOCIATEOBJTYPE")]
    pub associate_obj_type: i64,
}

// =============================================================================
// Device
// =============================================================================

/// One array of the mirrored pair
pub struct Device {
    label: &'static str,
    http: reqwest::Client,
    session: Session,
    retry_budget: u32,
    pub(crate) copy_timeout: Duration,
    pub(crate) poll_interval: Duration,
}

impl Device {
    pub(crate) fn new(
        label: &'static str,
        config: &DeviceConfig,
        retry_budget: u32,
        copy_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self> {
        config.validate(label)?;

        // One client per device: the cookie store carries the array's session
        // affinity and must never be shared across arrays.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .cookie_store(true)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            label,
            http,
            session: Session::new(config),
            retry_budget,
            copy_timeout,
            poll_interval,
        })
    }

    /// Which side of the mirror this device is ("local" or "remote")
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Base URL of the controller this device is currently authenticated
    /// against, with the array-reported device id embedded
    pub async fn active_endpoint(&self) -> Option<Url> {
        self.session.current_base_url().await
    }

    /// Log in eagerly instead of waiting for the first rejected request.
    pub(crate) async fn ensure_session(&self) -> Result<()> {
        self.session.authenticated(&self.http).await.map(|_| ())
    }

    // =========================================================================
    // Request Helpers
    // =========================================================================

    /// Endpoint returning exactly one object
    pub(crate) async fn request_object<T: DeserializeOwned>(&self, template: RequestTemplate) -> Result<T> {
        let path = template.path().to_string();
        let data = execute(&self.http, &self.session, self.label, &template, self.retry_budget).await?;
        data.ok_or(Error::EmptyData { path })
    }

    /// Endpoint returning a (possibly absent) list
    pub(crate) async fn request_list<T: DeserializeOwned>(&self, template: RequestTemplate) -> Result<Vec<T>> {
        let data = execute(&self.http, &self.session, self.label, &template, self.retry_budget).await?;
        Ok(data.unwrap_or_default())
    }

    /// Endpoint whose data member is empty or meaningless
    pub(crate) async fn request_unit(&self, template: RequestTemplate) -> Result<()> {
        execute::<serde::de::IgnoredAny>(&self.http, &self.session, self.label, &template, self.retry_budget)
            .await
            .map(|_| ())
    }
}
