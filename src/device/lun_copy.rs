//! LUN copy primitives
//!
//! A LUN copy object describes a bulk transfer from a source (here always an
//! activated snapshot) into a target LUN. Starting it is asynchronous; the
//! copy is polled until it reports ready.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::device::{obj_type, status, Device};
use crate::error::{Error, Result};
use crate::rest::envelope::string_i64;
use crate::rest::executor::RequestTemplate;

/// Bulk copy job between two LUN-like objects
#[derive(Debug, Clone, Deserialize)]
pub struct LunCopy {
    #[serde(rename = "ID", deserialize_with = "string_i64")]
    pub id: i64,
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "HEALTHSTATUS", default)]
    pub health_status: String,
    #[serde(rename = "RUNNINGSTATUS", default)]
    pub running_status: String,
}

impl LunCopy {
    fn is_done(&self) -> bool {
        self.running_status == status::LUN_COPY_READY
    }
}

impl Device {
    pub async fn lun_copy(&self, lun_copy_id: i64) -> Result<LunCopy> {
        self.request_object(RequestTemplate::get(format!("/luncopy/{lun_copy_id}"))).await
    }

    pub async fn create_lun_copy(&self, source_snapshot_id: i64, target_lun_id: i64) -> Result<LunCopy> {
        #[derive(Debug, Serialize)]
        struct CreateParam {
            #[serde(rename = "NAME")]
            name: String,
            #[serde(rename = "SOURCELUN")]
            source_lun: String,
            #[serde(rename = "TARGETLUN")]
            target_lun: String,
            #[serde(rename = "COPYSPEED")]
            copy_speed: i32,
        }

        // The endpoint addresses both ends with a semicolon-delimited locator
        // of which only the id slot is meaningful.
        let param = CreateParam {
            name: format!("LUNCopy_{source_snapshot_id}_{target_lun_id}"),
            source_lun: format!("INVALID;{source_snapshot_id};INVALID;INVALID;INVALID"),
            target_lun: format!("INVALID;{target_lun_id};INVALID;INVALID;INVALID"),
            copy_speed: 4,
        };
        self.request_object(RequestTemplate::post("/luncopy", &param)?).await
    }

    pub async fn start_lun_copy(&self, lun_copy_id: i64) -> Result<()> {
        #[derive(Debug, Serialize)]
        struct StartParam {
            #[serde(rename = "ID")]
            id: String,
            #[serde(rename = "TYPE")]
            obj_type: String,
        }

        let param = StartParam {
            id: lun_copy_id.to_string(),
            obj_type: obj_type::LUN_COPY.to_string(),
        };
        self.request_unit(RequestTemplate::put("/luncopy/start", &param)?).await
    }

    pub async fn delete_lun_copy(&self, lun_copy_id: i64) -> Result<()> {
        self.request_unit(RequestTemplate::delete(format!("/luncopy/{lun_copy_id}"))).await
    }

    /// Start the copy and poll until it finishes or the copy timeout passes.
    pub async fn start_lun_copy_with_wait(&self, lun_copy_id: i64) -> Result<()> {
        self.start_lun_copy(lun_copy_id).await?;

        let started = Instant::now();
        let deadline = started + self.copy_timeout;
        loop {
            let copy = self.lun_copy(lun_copy_id).await?;

            if copy.health_status != status::HEALTH_OK {
                return Err(Error::Array {
                    code: 0,
                    description: format!(
                        "LUN copy {lun_copy_id} reports unhealthy status {}",
                        copy.health_status
                    ),
                    suggestion: String::new(),
                });
            }
            if copy.is_done() {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(Error::WaitTimeout {
                    what: "LUN copy to finish",
                    waited: started.elapsed(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
