//! Snapshot primitives
//!
//! Snapshots feed the copy-based provisioning path: a snapshot of the source
//! LUN is activated and then copied into the freshly created target LUN.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::device::{obj_type, status, Device};
use crate::error::{Error, Result};
use crate::naming::encode_name;
use crate::rest::envelope::string_i64;
use crate::rest::executor::RequestTemplate;

/// Point-in-time snapshot of a LUN
#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "ID", deserialize_with = "string_i64")]
    pub id: i64,
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "PARENTID", default, deserialize_with = "string_i64")]
    pub source_lun_id: i64,
    #[serde(rename = "HEALTHSTATUS", default)]
    pub health_status: String,
    #[serde(rename = "RUNNINGSTATUS", default)]
    pub running_status: String,
}

impl Snapshot {
    fn is_ready(&self) -> bool {
        self.running_status == status::SNAPSHOT_ACTIVE || self.running_status == status::SNAPSHOT_INACTIVE
    }
}

#[derive(Debug, Serialize)]
struct CreateSnapshotParam<'a> {
    #[serde(rename = "NAME")]
    name: String,
    #[serde(rename = "TYPE")]
    obj_type: String,
    #[serde(rename = "PARENTTYPE")]
    parent_type: String,
    #[serde(rename = "PARENTID")]
    parent_id: String,
    #[serde(rename = "DESCRIPTION")]
    description: &'a str,
}

impl Device {
    pub async fn snapshot(&self, snapshot_id: i64) -> Result<Snapshot> {
        self.request_object(RequestTemplate::get(format!("/snapshot/{snapshot_id}"))).await
    }

    pub async fn create_snapshot(&self, lun_id: i64, name: &str, description: &str) -> Result<Snapshot> {
        let param = CreateSnapshotParam {
            name: encode_name(name),
            obj_type: obj_type::SNAPSHOT.to_string(),
            parent_type: obj_type::LUN.to_string(),
            parent_id: lun_id.to_string(),
            description,
        };
        self.request_object(RequestTemplate::post("/snapshot", &param)?).await
    }

    /// Create a snapshot and wait the short window it needs to settle.
    pub async fn create_snapshot_with_wait(&self, lun_id: i64, name: &str, description: &str) -> Result<Snapshot> {
        let snapshot = self.create_snapshot(lun_id, name, description).await?;

        let started = Instant::now();
        let deadline = started + self.poll_interval * 10;
        loop {
            match self.snapshot_ready(snapshot.id).await {
                Ok(Some(ready)) => return Ok(ready),
                Ok(None) => {}
                Err(error) => {
                    // An unhealthy snapshot never recovers; drop it before
                    // surfacing the failure.
                    if let Err(cleanup) = self.delete_snapshot(snapshot.id).await {
                        warn!(device = self.label(), snapshot = snapshot.id, error = %cleanup, "failed to delete snapshot");
                    }
                    return Err(error);
                }
            }

            if Instant::now() >= deadline {
                return Err(Error::WaitTimeout {
                    what: "snapshot to settle",
                    waited: started.elapsed(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn snapshot_ready(&self, snapshot_id: i64) -> Result<Option<Snapshot>> {
        let snapshot = self.snapshot(snapshot_id).await?;

        if snapshot.health_status != status::HEALTH_OK {
            return Err(Error::Array {
                code: 0,
                description: format!(
                    "snapshot {snapshot_id} reports unhealthy status {}",
                    snapshot.health_status
                ),
                suggestion: String::new(),
            });
        }

        Ok(snapshot.is_ready().then_some(snapshot))
    }

    pub async fn activate_snapshot(&self, snapshot_id: i64) -> Result<()> {
        #[derive(Debug, Serialize)]
        struct ActivateParam {
            #[serde(rename = "SNAPSHOTLIST")]
            snapshot_list: Vec<String>,
        }

        let param = ActivateParam {
            snapshot_list: vec![snapshot_id.to_string()],
        };
        self.request_unit(RequestTemplate::post("/snapshot/activate", &param)?).await
    }

    pub async fn stop_snapshot(&self, snapshot_id: i64) -> Result<()> {
        #[derive(Debug, Serialize)]
        struct StopParam {
            #[serde(rename = "ID")]
            id: String,
        }

        let param = StopParam {
            id: snapshot_id.to_string(),
        };
        self.request_unit(RequestTemplate::put("/snapshot/stop", &param)?).await
    }

    pub async fn delete_snapshot(&self, snapshot_id: i64) -> Result<()> {
        #[derive(Debug, Serialize)]
        struct DeleteParam {
            #[serde(rename = "ID")]
            id: String,
            #[serde(rename = "TYPE")]
            obj_type: String,
        }

        let param = DeleteParam {
            id: snapshot_id.to_string(),
            obj_type: obj_type::SNAPSHOT.to_string(),
        };
        self.request_unit(RequestTemplate::delete_with_body(
            format!("/snapshot/{snapshot_id}"),
            &param,
        )?)
        .await
    }
}
