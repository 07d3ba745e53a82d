//! HyperMetro pair and domain operations
//!
//! A HyperMetro pair is the mirrored-volume identity: it references one LUN on
//! each array and carries the synchronization status. Pair records live on
//! both arrays but are managed through the local device; the remote array
//! observes the same objects through the mirror link.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::client::MetroClient;
use crate::device::obj_type;
use crate::error::{Error, Result, ResourceKind};
use crate::rest::envelope::string_i64;
use crate::rest::executor::RequestTemplate;
use crate::rest::query::SearchQuery;

/// Synchronization state of a mirror pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairStatus {
    Normal,
    Synchronizing,
    Invalid,
    Paused,
    ForcedStart,
    ToBeSynchronized,
    #[default]
    Unknown,
}

impl PairStatus {
    fn from_code(code: &str) -> Self {
        match code {
            "1" => PairStatus::Normal,
            "23" => PairStatus::Synchronizing,
            "35" => PairStatus::Invalid,
            "41" => PairStatus::Paused,
            "93" => PairStatus::ForcedStart,
            "100" => PairStatus::ToBeSynchronized,
            _ => PairStatus::Unknown,
        }
    }
}

fn pair_status<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<PairStatus, D::Error> {
    let code = String::deserialize(deserializer)?;
    Ok(PairStatus::from_code(&code))
}

/// Synchronously mirrored volume spanning both arrays
#[derive(Debug, Clone, Deserialize)]
pub struct HyperMetroPair {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "DOMAINID", default)]
    pub domain_id: String,
    #[serde(rename = "LOCALOBJID", deserialize_with = "string_i64")]
    pub local_lun_id: i64,
    #[serde(rename = "REMOTEOBJID", deserialize_with = "string_i64")]
    pub remote_lun_id: i64,
    #[serde(rename = "RUNNINGSTATUS", default, deserialize_with = "pair_status")]
    pub running_status: PairStatus,
    #[serde(rename = "HEALTHSTATUS", default)]
    pub health_status: String,
}

/// Replication domain linking the two arrays
#[derive(Debug, Clone, Deserialize)]
pub struct HyperMetroDomain {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "RUNNINGSTATUS", default)]
    pub running_status: String,
}

#[derive(Debug, Serialize)]
struct CreatePairParam {
    #[serde(rename = "DOMAINID")]
    domain_id: String,
    #[serde(rename = "LOCALOBJID")]
    local_obj_id: String,
    #[serde(rename = "REMOTEOBJID")]
    remote_obj_id: String,
    #[serde(rename = "HCRESOURCETYPE")]
    resource_type: &'static str,
    #[serde(rename = "RECONVERYPOLICY")]
    recovery_policy: &'static str,
    #[serde(rename = "SPEED")]
    speed: i32,
    #[serde(rename = "ISFIRSTSYNC")]
    is_first_sync: bool,
}

#[derive(Debug, Serialize)]
struct PairActionParam {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "TYPE")]
    obj_type: String,
}

impl PairActionParam {
    fn new(pair_id: &str) -> Self {
        Self {
            id: pair_id.to_string(),
            obj_type: obj_type::HYPER_METRO_PAIR.to_string(),
        }
    }
}

impl MetroClient {
    // =========================================================================
    // Pairs
    // =========================================================================

    /// List mirror pairs; an explicit range keeps large listings fast and
    /// duplicate-free.
    pub async fn hyper_metro_pairs(&self, query: Option<SearchQuery>) -> Result<Vec<HyperMetroPair>> {
        let query = query.unwrap_or_else(|| SearchQuery::new().range("[0-4095]"));
        let pairs: Vec<HyperMetroPair> = self
            .local()
            .request_list(RequestTemplate::get("/HyperMetroPair").search(&query))
            .await?;
        if pairs.is_empty() {
            return Err(Error::NotFound(ResourceKind::HyperMetroPair));
        }
        Ok(pairs)
    }

    pub async fn hyper_metro_pair(&self, pair_id: &str) -> Result<HyperMetroPair> {
        self.local()
            .request_object(RequestTemplate::get(format!("/HyperMetroPair/{pair_id}")))
            .await
    }

    /// Create a synchronous pair over two existing LUNs. Fixed policy: manual
    /// first sync, "retain" recovery, medium speed.
    pub async fn create_hyper_metro_pair(
        &self,
        domain_id: &str,
        local_lun_id: i64,
        remote_lun_id: i64,
    ) -> Result<HyperMetroPair> {
        let param = CreatePairParam {
            domain_id: domain_id.to_string(),
            local_obj_id: local_lun_id.to_string(),
            remote_obj_id: remote_lun_id.to_string(),
            resource_type: "1",
            recovery_policy: "1",
            speed: 2,
            is_first_sync: false,
        };

        let pair: HyperMetroPair = self
            .local()
            .request_object(RequestTemplate::post("/HyperMetroPair", &param)?)
            .await?;
        info!(pair = %pair.id, local_lun = local_lun_id, remote_lun = remote_lun_id, "created HyperMetro pair");
        Ok(pair)
    }

    /// Delete a pair record. The pair must be suspended first.
    pub async fn delete_hyper_metro_pair(&self, pair_id: &str) -> Result<()> {
        self.local()
            .request_unit(RequestTemplate::delete(format!("/HyperMetroPair/{pair_id}")))
            .await
    }

    /// Pause synchronization.
    pub async fn suspend_hyper_metro_pair(&self, pair_id: &str) -> Result<()> {
        self.local()
            .request_unit(RequestTemplate::put(
                "/HyperMetroPair/disable_hcpair",
                &PairActionParam::new(pair_id),
            )?)
            .await
    }

    /// Start or resume synchronization.
    pub async fn sync_hyper_metro_pair(&self, pair_id: &str) -> Result<()> {
        self.local()
            .request_unit(RequestTemplate::put(
                "/HyperMetroPair/synchronize_hcpair",
                &PairActionParam::new(pair_id),
            )?)
            .await
    }

    // =========================================================================
    // Domains
    // =========================================================================

    /// List replication domains; both arrays report the same set, so the
    /// local device answers for the pair.
    pub async fn hyper_metro_domains(&self, query: Option<SearchQuery>) -> Result<Vec<HyperMetroDomain>> {
        let mut template = RequestTemplate::get("/HyperMetroDomain");
        if let Some(query) = &query {
            template = template.search(query);
        }

        let domains: Vec<HyperMetroDomain> = self.local().request_list(template).await?;
        if domains.is_empty() {
            return Err(Error::NotFound(ResourceKind::HyperMetroDomain));
        }
        Ok(domains)
    }

    pub async fn hyper_metro_domain_by_name(&self, name: &str) -> Result<HyperMetroDomain> {
        let mut domains = self.hyper_metro_domains(Some(SearchQuery::by_name(name))).await?;
        if domains.len() != 1 {
            return Err(Error::Ambiguous {
                kind: ResourceKind::HyperMetroDomain,
                name: name.to_string(),
            });
        }
        Ok(domains.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_status_codes() {
        assert_eq!(PairStatus::from_code("1"), PairStatus::Normal);
        assert_eq!(PairStatus::from_code("41"), PairStatus::Paused);
        assert_eq!(PairStatus::from_code("100"), PairStatus::ToBeSynchronized);
        assert_eq!(PairStatus::from_code("999"), PairStatus::Unknown);
    }

    #[test]
    fn test_pair_decodes_vendor_fields() {
        let pair: HyperMetroPair = serde_json::from_value(serde_json::json!({
            "ID": "pair-1",
            "DOMAINID": "domain-1",
            "LOCALOBJID": "11",
            "REMOTEOBJID": "22",
            "RUNNINGSTATUS": "41",
            "HEALTHSTATUS": "1",
        }))
        .unwrap();

        assert_eq!(pair.local_lun_id, 11);
        assert_eq!(pair.remote_lun_id, 22);
        assert_eq!(pair.running_status, PairStatus::Paused);
    }
}
