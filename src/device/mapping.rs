//! Mapping view primitives
//!
//! A mapping view ties a host group, a LUN group, and a port group together;
//! only then do the grouped LUNs become visible to the grouped hosts. Each
//! association is added at most once: the group objects carry an
//! already-associated flag, and port groups are checked through the
//! association listing.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::device::{obj_type, AssociateParam, Device, HostGroup, LunGroup};
use crate::error::{Error, Result, ResourceKind};
use crate::naming::encode_name;
use crate::rest::envelope::string_i64;
use crate::rest::executor::RequestTemplate;
use crate::rest::query::SearchQuery;

/// Mapping view binding a host group, LUN group, and port group
#[derive(Debug, Clone, Deserialize)]
pub struct MappingView {
    #[serde(rename = "ID", deserialize_with = "string_i64")]
    pub id: i64,
    #[serde(rename = "NAME")]
    pub name: String,
}

#[derive(Debug, Serialize)]
struct CreateMappingViewParam {
    #[serde(rename = "NAME")]
    name: String,
    #[serde(rename = "TYPE")]
    obj_type: String,
}

impl Device {
    pub async fn mapping_views(&self, query: &SearchQuery) -> Result<Vec<MappingView>> {
        let views: Vec<MappingView> = self
            .request_list(RequestTemplate::get("/mappingview").search(query))
            .await?;
        if views.is_empty() {
            return Err(Error::NotFound(ResourceKind::MappingView));
        }
        Ok(views)
    }

    pub async fn create_mapping_view(&self, hostname: &str) -> Result<MappingView> {
        let param = CreateMappingViewParam {
            name: encode_name(hostname),
            obj_type: obj_type::MAPPING_VIEW.to_string(),
        };
        let view: MappingView = self
            .request_object(RequestTemplate::post("/mappingview", &param)?)
            .await?;
        info!(device = self.label(), mapping_view = view.id, hostname, "created mapping view");
        Ok(view)
    }

    /// Get the mapping view for a hostname, creating it when absent.
    pub async fn mapping_view_for_host(&self, hostname: &str) -> Result<MappingView> {
        let query = SearchQuery::by_name(&encode_name(hostname));
        match self.mapping_views(&query).await {
            Ok(mut views) => {
                if views.len() != 1 {
                    return Err(Error::Ambiguous {
                        kind: ResourceKind::MappingView,
                        name: hostname.to_string(),
                    });
                }
                Ok(views.remove(0))
            }
            Err(error) if error.is_not_found() => self.create_mapping_view(hostname).await,
            Err(error) => Err(error),
        }
    }

    async fn associate_mapping_view(&self, view_id: i64, associate_obj_type: i64, associate_obj_id: i64) -> Result<()> {
        let param = AssociateParam {
            id: view_id.to_string(),
            obj_type: Some(obj_type::MAPPING_VIEW.to_string()),
            associate_obj_id: associate_obj_id.to_string(),
            associate_obj_type,
        };
        self.request_unit(RequestTemplate::put("/mappingview/create_associate", &param)?)
            .await
    }

    /// Associate host group, LUN group, and port group into the view,
    /// skipping whatever is already associated.
    pub async fn ensure_mapping(
        &self,
        view: &MappingView,
        host_group: &HostGroup,
        lun_group: &LunGroup,
        port_group_id: i64,
    ) -> Result<()> {
        if !host_group.is_in_mapping_view {
            self.associate_mapping_view(view.id, obj_type::HOST_GROUP, host_group.id).await?;
        }

        if !lun_group.is_in_mapping_view {
            self.associate_mapping_view(view.id, obj_type::LUN_GROUP, lun_group.id).await?;
        }

        if !self.is_port_group_in_mapping_view(view.id, port_group_id).await? {
            self.associate_mapping_view(view.id, obj_type::PORT_GROUP, port_group_id).await?;
        }

        Ok(())
    }
}
