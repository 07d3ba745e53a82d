//! iSCSI initiator primitives
//!
//! Initiators are keyed by IQN, which doubles as the object id. Colons in the
//! IQN collide with the filter syntax and must be escaped when searching.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::device::{obj_type, Device};
use crate::error::{Error, Result, ResourceKind};
use crate::naming::escape_filter_value;
use crate::rest::executor::RequestTemplate;
use crate::rest::query::SearchQuery;

/// iSCSI initiator registered on the array
#[derive(Debug, Clone, Deserialize)]
pub struct Initiator {
    /// The IQN
    #[serde(rename = "ID")]
    pub id: String,
    /// Host the initiator is bound to, when bound
    #[serde(rename = "PARENTID", default)]
    pub parent_id: Option<String>,
    #[serde(rename = "USECHAP", default)]
    pub use_chap: String,
}

impl Initiator {
    fn is_bound_to(&self, host_id: i64) -> bool {
        self.parent_id.as_deref() == Some(host_id.to_string().as_str())
    }
}

#[derive(Debug, Serialize)]
struct CreateInitiatorParam<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    #[serde(rename = "TYPE")]
    obj_type: String,
    #[serde(rename = "USECHAP")]
    use_chap: &'static str,
}

#[derive(Debug, Serialize)]
struct BindInitiatorParam<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    #[serde(rename = "TYPE")]
    obj_type: String,
    #[serde(rename = "USECHAP")]
    use_chap: &'static str,
    #[serde(rename = "PARENTID")]
    parent_id: String,
    #[serde(rename = "PARENTTYPE")]
    parent_type: String,
}

impl Device {
    pub async fn initiators(&self, query: &SearchQuery) -> Result<Vec<Initiator>> {
        let initiators: Vec<Initiator> = self
            .request_list(RequestTemplate::get("/iscsi_initiator").search(query))
            .await?;
        if initiators.is_empty() {
            return Err(Error::NotFound(ResourceKind::Initiator));
        }
        Ok(initiators)
    }

    pub async fn create_initiator(&self, iqn: &str) -> Result<Initiator> {
        let param = CreateInitiatorParam {
            id: iqn,
            obj_type: obj_type::INITIATOR.to_string(),
            use_chap: "false",
        };
        let initiator: Initiator = self
            .request_object(RequestTemplate::post("/iscsi_initiator", &param)?)
            .await?;
        info!(device = self.label(), iqn, "created initiator");
        Ok(initiator)
    }

    /// Bind an initiator to a host.
    pub async fn bind_initiator(&self, iqn: &str, host_id: i64) -> Result<Initiator> {
        let param = BindInitiatorParam {
            id: iqn,
            obj_type: obj_type::INITIATOR.to_string(),
            use_chap: "false",
            parent_id: host_id.to_string(),
            parent_type: obj_type::HOST.to_string(),
        };
        let path = format!("/iscsi_initiator/{}", urlencoding::encode(iqn));
        self.request_object(RequestTemplate::put(path, &param)?).await
    }

    /// Get the initiator for an IQN, creating it when absent and binding it
    /// to the host unless it already is.
    pub async fn initiator_for_host(&self, iqn: &str, host_id: i64) -> Result<Initiator> {
        let query = SearchQuery::by_id(&escape_filter_value(iqn));

        let initiator = match self.initiators(&query).await {
            Ok(mut initiators) => {
                if initiators.len() != 1 {
                    return Err(Error::Ambiguous {
                        kind: ResourceKind::Initiator,
                        name: iqn.to_string(),
                    });
                }
                initiators.remove(0)
            }
            Err(error) if error.is_not_found() => self.create_initiator(iqn).await?,
            Err(error) => return Err(error),
        };

        if initiator.is_bound_to(host_id) {
            return Ok(initiator);
        }
        self.bind_initiator(iqn, host_id).await
    }
}
