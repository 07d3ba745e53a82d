//! LUN group and port group primitives
//!
//! LUN groups follow the same one-per-host convention as host groups. Port
//! groups are administered out-of-band; the client only resolves them by name
//! and inspects their mapping-view associations.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::device::{obj_type, AssociateParam, Device};
use crate::error::{Error, Result, ResourceKind};
use crate::naming::encode_name;
use crate::rest::envelope::{string_bool, string_i64};
use crate::rest::executor::RequestTemplate;
use crate::rest::query::SearchQuery;

/// Group of LUNs bound into a mapping view
#[derive(Debug, Clone, Deserialize)]
pub struct LunGroup {
    #[serde(rename = "ID", deserialize_with = "string_i64")]
    pub id: i64,
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "ISADD2MAPPINGVIEW", default, deserialize_with = "string_bool")]
    pub is_in_mapping_view: bool,
}

/// Group of target ports exposed to hosts
#[derive(Debug, Clone, Deserialize)]
pub struct PortGroup {
    #[serde(rename = "ID", deserialize_with = "string_i64")]
    pub id: i64,
    #[serde(rename = "NAME")]
    pub name: String,
}

#[derive(Debug, Serialize)]
struct CreateLunGroupParam<'a> {
    #[serde(rename = "NAME")]
    name: String,
    #[serde(rename = "DESCRIPTION")]
    description: &'a str,
}

impl Device {
    // =========================================================================
    // LUN Groups
    // =========================================================================

    pub async fn lun_groups(&self, query: &SearchQuery) -> Result<Vec<LunGroup>> {
        let groups: Vec<LunGroup> = self
            .request_list(RequestTemplate::get("/lungroup").search(query))
            .await?;
        if groups.is_empty() {
            return Err(Error::NotFound(ResourceKind::LunGroup));
        }
        Ok(groups)
    }

    pub async fn create_lun_group(&self, hostname: &str) -> Result<LunGroup> {
        let param = CreateLunGroupParam {
            name: encode_name(hostname),
            description: hostname,
        };
        let group: LunGroup = self.request_object(RequestTemplate::post("/lungroup", &param)?).await?;
        info!(device = self.label(), lun_group = group.id, hostname, "created LUN group");
        Ok(group)
    }

    /// Get the LUN group for a hostname, creating it when absent.
    pub async fn lun_group_for_host(&self, hostname: &str) -> Result<LunGroup> {
        let query = SearchQuery::by_name(&encode_name(hostname));
        match self.lun_groups(&query).await {
            Ok(mut groups) => {
                if groups.len() != 1 {
                    return Err(Error::Ambiguous {
                        kind: ResourceKind::LunGroup,
                        name: hostname.to_string(),
                    });
                }
                Ok(groups.remove(0))
            }
            Err(error) if error.is_not_found() => self.create_lun_group(hostname).await,
            Err(error) => Err(error),
        }
    }

    /// LUN group a LUN currently belongs to.
    pub async fn lun_group_by_lun(&self, lun_id: i64) -> Result<LunGroup> {
        let query = SearchQuery::new()
            .associated_with(obj_type::LUN, lun_id)
            .of_type(obj_type::LUN_GROUP);
        let mut groups: Vec<LunGroup> = self
            .request_list(RequestTemplate::get("/lungroup/associate").search(&query))
            .await?;

        if groups.is_empty() {
            return Err(Error::NotFound(ResourceKind::LunGroup));
        }
        if groups.len() != 1 {
            return Err(Error::Ambiguous {
                kind: ResourceKind::LunGroup,
                name: format!("LUN {lun_id}"),
            });
        }
        Ok(groups.remove(0))
    }

    pub async fn associate_lun(&self, lun_group_id: i64, lun_id: i64) -> Result<()> {
        let param = AssociateParam {
            id: lun_group_id.to_string(),
            obj_type: None,
            associate_obj_id: lun_id.to_string(),
            associate_obj_type: obj_type::LUN,
        };
        self.request_unit(RequestTemplate::post("/lungroup/associate", &param)?).await
    }

    pub async fn disassociate_lun(&self, lun_group_id: i64, lun_id: i64) -> Result<()> {
        let template = RequestTemplate::delete("/lungroup/associate")
            .param("ID", lun_group_id)
            .param("ASSOCIATEOBJID", lun_id)
            .param("ASSOCIATEOBJTYPE", obj_type::LUN);
        self.request_unit(template).await?;
        info!(device = self.label(), lun_group = lun_group_id, lun = lun_id, "disassociated LUN");
        Ok(())
    }

    // =========================================================================
    // Port Groups
    // =========================================================================

    pub async fn port_groups(&self, query: &SearchQuery) -> Result<Vec<PortGroup>> {
        let groups: Vec<PortGroup> = self
            .request_list(RequestTemplate::get("/portgroup").search(query))
            .await?;
        if groups.is_empty() {
            return Err(Error::NotFound(ResourceKind::PortGroup));
        }
        Ok(groups)
    }

    /// Resolve a port group by its exact name; attach refuses ambiguity.
    pub async fn port_group_by_name(&self, name: &str) -> Result<PortGroup> {
        let mut groups = self.port_groups(&SearchQuery::by_name(name)).await?;
        if groups.len() != 1 {
            return Err(Error::Ambiguous {
                kind: ResourceKind::PortGroup,
                name: name.to_string(),
            });
        }
        Ok(groups.remove(0))
    }

    /// Port groups already associated with a mapping view; empty is a valid
    /// answer here, not a not-found.
    pub async fn port_groups_in_mapping_view(&self, mapping_view_id: i64) -> Result<Vec<PortGroup>> {
        let query = SearchQuery::new().associated_with(obj_type::MAPPING_VIEW, mapping_view_id);
        self.request_list(RequestTemplate::get("/portgroup/associate").search(&query))
            .await
    }

    pub async fn is_port_group_in_mapping_view(&self, mapping_view_id: i64, port_group_id: i64) -> Result<bool> {
        let groups = self.port_groups_in_mapping_view(mapping_view_id).await?;
        Ok(groups.iter().any(|g| g.id == port_group_id))
    }
}
