//! Host and host-group primitives
//!
//! The mapping plane pairs every host with a host group of the same encoded
//! name, one host per group. Attach converges on that topology through
//! get-or-create lookups, so repeated attaches never duplicate objects.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::device::{obj_type, AssociateParam, Device};
use crate::error::{Error, Result, ResourceKind};
use crate::naming::encode_name;
use crate::rest::envelope::{string_bool, string_i64};
use crate::rest::executor::RequestTemplate;
use crate::rest::query::SearchQuery;

/// Compute host as the array sees it
#[derive(Debug, Clone, Deserialize)]
pub struct Host {
    #[serde(rename = "ID", deserialize_with = "string_i64")]
    pub id: i64,
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "DESCRIPTION", default)]
    pub description: String,
    #[serde(rename = "ISADD2HOSTGROUP", default, deserialize_with = "string_bool")]
    pub is_in_host_group: bool,
}

/// Host group binding hosts into a mapping view
#[derive(Debug, Clone, Deserialize)]
pub struct HostGroup {
    #[serde(rename = "ID", deserialize_with = "string_i64")]
    pub id: i64,
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "ISADD2MAPPINGVIEW", default, deserialize_with = "string_bool")]
    pub is_in_mapping_view: bool,
}

#[derive(Debug, Serialize)]
struct CreateHostParam<'a> {
    #[serde(rename = "NAME")]
    name: String,
    #[serde(rename = "TYPE")]
    obj_type: String,
    #[serde(rename = "OPERATIONSYSTEM")]
    operating_system: &'static str,
    #[serde(rename = "DESCRIPTION")]
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateHostGroupParam<'a> {
    #[serde(rename = "NAME")]
    name: String,
    #[serde(rename = "DESCRIPTION")]
    description: &'a str,
}

impl Device {
    // =========================================================================
    // Hosts
    // =========================================================================

    pub async fn hosts(&self, query: &SearchQuery) -> Result<Vec<Host>> {
        let hosts: Vec<Host> = self.request_list(RequestTemplate::get("/host").search(query)).await?;
        if hosts.is_empty() {
            return Err(Error::NotFound(ResourceKind::Host));
        }
        Ok(hosts)
    }

    pub async fn create_host(&self, hostname: &str) -> Result<Host> {
        let param = CreateHostParam {
            name: encode_name(hostname),
            obj_type: obj_type::HOST.to_string(),
            operating_system: "0",
            description: hostname,
        };
        let host: Host = self.request_object(RequestTemplate::post("/host", &param)?).await?;
        info!(device = self.label(), host = host.id, hostname, "created host");
        Ok(host)
    }

    // =========================================================================
    // Host Groups
    // =========================================================================

    pub async fn host_groups(&self, query: &SearchQuery) -> Result<Vec<HostGroup>> {
        let groups: Vec<HostGroup> = self
            .request_list(RequestTemplate::get("/hostgroup").search(query))
            .await?;
        if groups.is_empty() {
            return Err(Error::NotFound(ResourceKind::HostGroup));
        }
        Ok(groups)
    }

    pub async fn create_host_group(&self, hostname: &str) -> Result<HostGroup> {
        let param = CreateHostGroupParam {
            name: encode_name(hostname),
            description: hostname,
        };
        self.request_object(RequestTemplate::post("/hostgroup", &param)?).await
    }

    pub async fn associate_host(&self, host_group_id: i64, host_id: i64) -> Result<()> {
        let param = AssociateParam {
            id: host_group_id.to_string(),
            obj_type: None,
            associate_obj_id: host_id.to_string(),
            associate_obj_type: obj_type::HOST,
        };
        self.request_unit(RequestTemplate::post("/hostgroup/associate", &param)?).await
    }

    /// Get the host group and host for a hostname, creating and associating
    /// whatever is missing. Host to host group is strictly 1:1.
    pub async fn host_group_with_host(&self, hostname: &str) -> Result<(HostGroup, Host)> {
        let query = SearchQuery::by_name(&encode_name(hostname));

        let host_group = match self.host_groups(&query).await {
            Ok(mut groups) => {
                if groups.len() != 1 {
                    return Err(Error::Ambiguous {
                        kind: ResourceKind::HostGroup,
                        name: hostname.to_string(),
                    });
                }
                groups.remove(0)
            }
            Err(error) if error.is_not_found() => return self.create_host_group_with_host(hostname).await,
            Err(error) => return Err(error),
        };

        let mut hosts = self.hosts(&query).await?;
        if hosts.len() != 1 {
            return Err(Error::Ambiguous {
                kind: ResourceKind::Host,
                name: hostname.to_string(),
            });
        }
        let host = hosts.remove(0);

        if !host.is_in_host_group {
            self.associate_host(host_group.id, host.id).await?;
        }

        Ok((host_group, host))
    }

    async fn create_host_group_with_host(&self, hostname: &str) -> Result<(HostGroup, Host)> {
        let host = self.create_host(hostname).await?;
        let host_group = self.create_host_group(hostname).await?;
        self.associate_host(host_group.id, host.id).await?;
        Ok((host_group, host))
    }
}
