//! Storage pool lookup
//!
//! Pools are provisioned out-of-band by array administration; the client only
//! resolves them by name when creating LUNs.

use serde::Deserialize;

use crate::device::Device;
use crate::error::{Error, Result, ResourceKind};
use crate::rest::envelope::{string_i64, string_u64};
use crate::rest::executor::RequestTemplate;
use crate::rest::query::SearchQuery;

/// Storage pool backing LUN allocations
#[derive(Debug, Clone, Deserialize)]
pub struct StoragePool {
    #[serde(rename = "ID", deserialize_with = "string_i64")]
    pub id: i64,
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "USERFREECAPACITY", default, deserialize_with = "string_u64")]
    pub free_capacity_sectors: u64,
    #[serde(rename = "USERTOTALCAPACITY", default, deserialize_with = "string_u64")]
    pub total_capacity_sectors: u64,
    #[serde(rename = "HEALTHSTATUS", default)]
    pub health_status: String,
}

impl Device {
    pub async fn storage_pools(&self, query: &SearchQuery) -> Result<Vec<StoragePool>> {
        let pools: Vec<StoragePool> = self
            .request_list(RequestTemplate::get("/storagepool").search(query))
            .await?;
        if pools.is_empty() {
            return Err(Error::NotFound(ResourceKind::StoragePool));
        }
        Ok(pools)
    }

    /// Resolve a pool by its exact name; the name must be unique on the array.
    pub async fn storage_pool_by_name(&self, name: &str) -> Result<StoragePool> {
        let mut pools = self.storage_pools(&SearchQuery::by_name(name)).await?;
        if pools.len() != 1 {
            return Err(Error::Ambiguous {
                kind: ResourceKind::StoragePool,
                name: name.to_string(),
            });
        }
        Ok(pools.remove(0))
    }
}
