//! LUN primitives: CRUD, expansion, cloning, and readiness polling
//!
//! Clone-based provisioning creates a clone LUN that keeps syncing from its
//! source until a split detaches it; the clone only serves I/O once the split
//! finished and the LUN reports healthy-and-ready. The array forbids deleting
//! a LUN that is still referenced by a LUN group or an active mirror, which is
//! why the orchestrator unwinds those references first.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::device::{status, Device, SECTORS_PER_GB};
use crate::error::{Error, Result, ResourceKind};
use crate::naming::encode_name;
use crate::rest::envelope::{string_bool, string_i64, string_u64};
use crate::rest::executor::RequestTemplate;
use crate::rest::query::SearchQuery;

/// Raw block volume on one array
#[derive(Debug, Clone, Deserialize)]
pub struct Lun {
    #[serde(rename = "ID", deserialize_with = "string_i64")]
    pub id: i64,
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "DESCRIPTION", default)]
    pub description: String,
    /// Capacity in sectors, the unit the array reports
    #[serde(rename = "CAPACITY", default, deserialize_with = "string_u64")]
    pub capacity_sectors: u64,
    #[serde(rename = "PARENTID", default, deserialize_with = "string_i64")]
    pub pool_id: i64,
    #[serde(rename = "HEALTHSTATUS", default)]
    pub health_status: String,
    #[serde(rename = "RUNNINGSTATUS", default)]
    pub running_status: String,
    /// Still attached to a clone source (split not finished)
    #[serde(rename = "ISCLONE", default, deserialize_with = "string_bool")]
    pub is_clone: bool,
    #[serde(rename = "ISADD2LUNGROUP", default, deserialize_with = "string_bool")]
    pub is_in_lun_group: bool,
    #[serde(rename = "WWN", default)]
    pub wwn: String,
}

impl Lun {
    /// Healthy, running, and detached from any clone source
    pub fn is_ready(&self) -> bool {
        self.health_status == status::HEALTH_OK
            && self.running_status == status::VOLUME_READY
            && !self.is_clone
    }
}

#[derive(Debug, Serialize)]
struct CreateLunParam<'a> {
    #[serde(rename = "NAME")]
    name: String,
    #[serde(rename = "PARENTID")]
    parent_id: String,
    #[serde(rename = "DESCRIPTION")]
    description: &'a str,
    #[serde(rename = "CAPACITY")]
    capacity: u64,
    #[serde(rename = "WRITEPOLICY")]
    write_policy: &'static str,
    #[serde(rename = "PREFETCHPOLICY")]
    prefetch_policy: &'static str,
    #[serde(rename = "PREFETCHVALUE")]
    prefetch_value: &'static str,
    #[serde(rename = "ALLOCTYPE")]
    alloc_type: i32,
    #[serde(rename = "MIRRORPOLICY")]
    mirror_policy: &'static str,
    #[serde(rename = "DATATRANSFERPOLICY")]
    data_transfer_policy: &'static str,
    #[serde(rename = "WORKLOADTYPEID")]
    workload_type_id: &'static str,
}

#[derive(Debug, Serialize)]
struct CreateCloneLunParam {
    #[serde(rename = "NAME")]
    name: String,
    #[serde(rename = "CLONESOURCEID")]
    clone_source_id: i64,
    #[serde(rename = "ISCLONE")]
    is_clone: bool,
}

impl Device {
    // =========================================================================
    // Lookup
    // =========================================================================

    /// List LUNs matching the query; empty results are a typed not-found.
    pub async fn luns(&self, query: &SearchQuery) -> Result<Vec<Lun>> {
        let luns: Vec<Lun> = self.request_list(RequestTemplate::get("/lun").search(query)).await?;
        if luns.is_empty() {
            return Err(Error::NotFound(ResourceKind::Lun));
        }
        Ok(luns)
    }

    pub async fn lun(&self, lun_id: i64) -> Result<Lun> {
        self.request_object(RequestTemplate::get(format!("/lun/{lun_id}"))).await
    }

    // =========================================================================
    // Create / Delete / Expand
    // =========================================================================

    /// Create a mirror-capable LUN in the named storage pool.
    pub async fn create_lun(&self, name: &str, capacity_gb: u64, pool_name: &str) -> Result<Lun> {
        let pool = self.storage_pool_by_name(pool_name).await?;

        let param = CreateLunParam {
            name: encode_name(name),
            parent_id: pool.id.to_string(),
            description: name,
            capacity: capacity_gb * SECTORS_PER_GB,
            write_policy: "1",
            prefetch_policy: "3",
            prefetch_value: "0",
            alloc_type: 1,
            mirror_policy: "1",
            data_transfer_policy: "0",
            workload_type_id: "0",
        };

        let lun: Lun = self.request_object(RequestTemplate::post("/lun", &param)?).await?;
        info!(device = self.label(), lun = lun.id, name, "created LUN");
        Ok(lun)
    }

    pub async fn delete_lun(&self, lun_id: i64) -> Result<()> {
        self.request_unit(RequestTemplate::delete(format!("/lun/{lun_id}"))).await?;
        info!(device = self.label(), lun = lun_id, "deleted LUN");
        Ok(())
    }

    /// Grow a LUN to the new size. Shrinking is not supported by the array.
    pub async fn expand_lun(&self, lun_id: i64, new_capacity_gb: u64) -> Result<()> {
        #[derive(Debug, Serialize)]
        struct ExpandParam {
            #[serde(rename = "ID")]
            id: String,
            #[serde(rename = "TYPE")]
            obj_type: i64,
            #[serde(rename = "CAPACITY")]
            capacity: u64,
        }

        let param = ExpandParam {
            id: lun_id.to_string(),
            obj_type: super::obj_type::LUN,
            capacity: new_capacity_gb * SECTORS_PER_GB,
        };
        self.request_unit(RequestTemplate::put("/lun/expand", &param)?).await
    }

    // =========================================================================
    // Cloning
    // =========================================================================

    /// Create a clone LUN that keeps syncing from its source until split.
    pub async fn create_clone_lun(&self, source_lun_id: i64, name: &str) -> Result<Lun> {
        let param = CreateCloneLunParam {
            name: encode_name(name),
            clone_source_id: source_lun_id,
            is_clone: true,
        };
        self.request_object(RequestTemplate::post("/lun", &param)?).await
    }

    /// Detach a clone from continuous sync with its source.
    pub async fn split_clone_lun(&self, clone_lun_id: i64) -> Result<()> {
        #[derive(Debug, Serialize)]
        struct SplitParam {
            #[serde(rename = "ID")]
            id: i64,
            #[serde(rename = "SPLITACTION")]
            split_action: i32,
            #[serde(rename = "ISCLONE")]
            is_clone: bool,
            #[serde(rename = "SPLITSPEED")]
            split_speed: i32,
        }

        let param = SplitParam {
            id: clone_lun_id,
            split_action: 1,
            is_clone: true,
            split_speed: 4,
        };
        self.request_unit(RequestTemplate::put("/lunclone_split_switch", &param)?).await
    }

    /// Provision a LUN from a source LUN. The clone strategy inherits the
    /// source LUN's pool.
    pub async fn create_lun_from_source(
        &self,
        source_lun_id: i64,
        name: &str,
        capacity_gb: u64,
    ) -> Result<Lun> {
        let clone = self.create_clone_lun(source_lun_id, name).await?;

        match self.finish_clone(&clone, capacity_gb).await {
            Ok(lun) => Ok(lun),
            Err(error) => {
                // The clone is local to this device and this call stack, so it
                // is safe to compensate here.
                warn!(
                    device = self.label(),
                    lun = clone.id,
                    %error,
                    "clone provisioning failed, deleting clone"
                );
                if let Err(cleanup) = self.delete_lun(clone.id).await {
                    warn!(device = self.label(), lun = clone.id, error = %cleanup, "failed to delete clone");
                }
                Err(error)
            }
        }
    }

    async fn finish_clone(&self, clone: &Lun, capacity_gb: u64) -> Result<Lun> {
        if clone.capacity_sectors < capacity_gb * SECTORS_PER_GB {
            self.expand_lun(clone.id, capacity_gb).await?;
        }
        self.split_clone_lun(clone.id).await?;
        self.wait_lun_ready(clone.id).await
    }

    /// Provision a LUN from a source LUN through a snapshot and a LUN copy.
    /// Slower than cloning but works across storage pools.
    pub async fn create_lun_from_source_by_copy(
        &self,
        source_lun_id: i64,
        name: &str,
        capacity_gb: u64,
        pool_name: &str,
    ) -> Result<Lun> {
        let snapshot_name = Uuid::new_v4().to_string();
        let snapshot = self.create_snapshot_with_wait(source_lun_id, &snapshot_name, name).await?;

        let result = self.copy_from_snapshot(&snapshot, name, capacity_gb, pool_name).await;

        // Snapshot teardown is best-effort; a leftover snapshot does not block
        // the copied LUN.
        if let Err(error) = self.stop_snapshot(snapshot.id).await {
            warn!(device = self.label(), snapshot = snapshot.id, %error, "failed to stop snapshot");
        }
        if let Err(error) = self.delete_snapshot(snapshot.id).await {
            warn!(device = self.label(), snapshot = snapshot.id, %error, "failed to delete snapshot");
        }

        result
    }

    async fn copy_from_snapshot(
        &self,
        snapshot: &super::Snapshot,
        name: &str,
        capacity_gb: u64,
        pool_name: &str,
    ) -> Result<Lun> {
        self.activate_snapshot(snapshot.id).await?;

        let target = self.create_lun_with_wait(name, capacity_gb, pool_name).await?;
        let copy = self.create_lun_copy(snapshot.id, target.id).await?;

        let copied = self.start_lun_copy_with_wait(copy.id).await;
        if let Err(error) = self.delete_lun_copy(copy.id).await {
            warn!(device = self.label(), lun_copy = copy.id, %error, "failed to delete LUN copy");
        }
        copied?;

        self.lun(target.id).await
    }

    // =========================================================================
    // Readiness
    // =========================================================================

    /// Create a LUN and wait the short window a fresh LUN needs to come up.
    pub async fn create_lun_with_wait(&self, name: &str, capacity_gb: u64, pool_name: &str) -> Result<Lun> {
        let lun = self.create_lun(name, capacity_gb, pool_name).await?;
        self.wait_ready_until(lun.id, Instant::now() + self.poll_interval * 10).await
    }

    /// Poll until the LUN reports healthy-and-ready or the copy timeout passes.
    pub async fn wait_lun_ready(&self, lun_id: i64) -> Result<Lun> {
        self.wait_ready_until(lun_id, Instant::now() + self.copy_timeout).await
    }

    async fn wait_ready_until(&self, lun_id: i64, deadline: Instant) -> Result<Lun> {
        let started = Instant::now();
        loop {
            let lun = self.lun(lun_id).await?;
            if lun.is_ready() {
                debug!(device = self.label(), lun = lun_id, "LUN ready");
                return Ok(lun);
            }

            // Deadline is re-checked every iteration so a stalled array cannot
            // stretch the wait past the configured ceiling.
            if Instant::now() >= deadline {
                return Err(Error::WaitTimeout {
                    what: "LUN to become ready",
                    waited: started.elapsed(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_support::mock_device_tuned;
    use assert_matches::assert_matches;
    use httpmock::{Method::DELETE, Method::GET, Method::POST, Method::PUT, MockServer};
    use std::time::Duration;

    fn ok_unit() -> serde_json::Value {
        serde_json::json!({"data": {}, "error": {"code": 0}})
    }

    fn lun_body(id: i64, ready: bool, capacity: u64) -> serde_json::Value {
        serde_json::json!({
            "data": {
                "ID": id.to_string(),
                "NAME": "clone",
                "CAPACITY": capacity.to_string(),
                "HEALTHSTATUS": "1",
                "RUNNINGSTATUS": if ready { "27" } else { "53" },
                "ISCLONE": if ready { "false" } else { "true" },
            },
            "error": {"code": 0},
        })
    }

    #[tokio::test]
    async fn test_clone_timeout_deletes_the_clone() {
        let server = MockServer::start();
        let device = mock_device_tuned(
            "local",
            &server,
            10,
            Duration::from_millis(30),
            Duration::from_millis(5),
        );

        let create = server.mock(|when, then| {
            when.method(POST).path("/deviceManager/rest/dev-1/lun");
            then.status(200).json_body(lun_body(33, false, 100 * SECTORS_PER_GB));
        });
        let split = server.mock(|when, then| {
            when.method(PUT).path("/deviceManager/rest/dev-1/lunclone_split_switch");
            then.status(200).json_body(ok_unit());
        });
        let expand = server.mock(|when, then| {
            when.method(PUT).path("/deviceManager/rest/dev-1/lun/expand");
            then.status(200).json_body(ok_unit());
        });
        // Never becomes ready: the split flag stays set.
        let poll = server.mock(|when, then| {
            when.method(GET).path("/deviceManager/rest/dev-1/lun/33");
            then.status(200).json_body(lun_body(33, false, 100 * SECTORS_PER_GB));
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/deviceManager/rest/dev-1/lun/33");
            then.status(200).json_body(ok_unit());
        });

        let result = device.create_lun_from_source(7, "vol-from-src", 10).await;

        assert_matches!(result, Err(Error::WaitTimeout { .. }));
        create.assert_hits(1);
        split.assert_hits(1);
        // Source capacity already covers the request.
        expand.assert_hits(0);
        assert!(poll.hits() >= 1);
        delete.assert_hits(1);
    }

    #[tokio::test]
    async fn test_clone_expanded_when_smaller_than_requested() {
        let server = MockServer::start();
        let device = mock_device_tuned(
            "local",
            &server,
            10,
            Duration::from_millis(200),
            Duration::from_millis(5),
        );

        server.mock(|when, then| {
            when.method(POST).path("/deviceManager/rest/dev-1/lun");
            then.status(200).json_body(lun_body(34, false, 2 * SECTORS_PER_GB));
        });
        let expand = server.mock(|when, then| {
            when.method(PUT)
                .path("/deviceManager/rest/dev-1/lun/expand")
                .json_body(serde_json::json!({
                    "ID": "34",
                    "TYPE": 11,
                    "CAPACITY": 10 * SECTORS_PER_GB,
                }));
            then.status(200).json_body(ok_unit());
        });
        server.mock(|when, then| {
            when.method(PUT).path("/deviceManager/rest/dev-1/lunclone_split_switch");
            then.status(200).json_body(ok_unit());
        });
        server.mock(|when, then| {
            when.method(GET).path("/deviceManager/rest/dev-1/lun/34");
            then.status(200).json_body(lun_body(34, true, 10 * SECTORS_PER_GB));
        });

        let lun = device.create_lun_from_source(7, "vol-from-src", 10).await.unwrap();

        assert_eq!(lun.id, 34);
        assert!(lun.is_ready());
        expand.assert_hits(1);
    }

    #[tokio::test]
    async fn test_copy_based_provisioning_cleans_up_its_scaffolding() {
        let server = MockServer::start();
        let device = mock_device_tuned(
            "local",
            &server,
            10,
            Duration::from_millis(200),
            Duration::from_millis(5),
        );

        server.mock(|when, then| {
            when.method(POST).path("/deviceManager/rest/dev-1/snapshot");
            then.status(200).json_body(serde_json::json!({
                "data": {"ID": "50", "NAME": "snap", "PARENTID": "7"},
                "error": {"code": 0},
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/deviceManager/rest/dev-1/snapshot/50");
            then.status(200).json_body(serde_json::json!({
                "data": {"ID": "50", "NAME": "snap", "HEALTHSTATUS": "1", "RUNNINGSTATUS": "45"},
                "error": {"code": 0},
            }));
        });
        let activate = server.mock(|when, then| {
            when.method(POST).path("/deviceManager/rest/dev-1/snapshot/activate");
            then.status(200).json_body(ok_unit());
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/deviceManager/rest/dev-1/storagepool")
                .query_param("filter", "NAME::pool-0");
            then.status(200).json_body(serde_json::json!({
                "data": [{"ID": "1", "NAME": "pool-0"}],
                "error": {"code": 0},
            }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/deviceManager/rest/dev-1/lun");
            then.status(200).json_body(lun_body(60, true, 10 * SECTORS_PER_GB));
        });
        server.mock(|when, then| {
            when.method(GET).path("/deviceManager/rest/dev-1/lun/60");
            then.status(200).json_body(lun_body(60, true, 10 * SECTORS_PER_GB));
        });
        server.mock(|when, then| {
            when.method(POST).path("/deviceManager/rest/dev-1/luncopy");
            then.status(200).json_body(serde_json::json!({
                "data": {"ID": "70", "NAME": "LUNCopy_50_60"},
                "error": {"code": 0},
            }));
        });
        let start_copy = server.mock(|when, then| {
            when.method(PUT).path("/deviceManager/rest/dev-1/luncopy/start");
            then.status(200).json_body(ok_unit());
        });
        server.mock(|when, then| {
            when.method(GET).path("/deviceManager/rest/dev-1/luncopy/70");
            then.status(200).json_body(serde_json::json!({
                "data": {"ID": "70", "NAME": "LUNCopy_50_60", "HEALTHSTATUS": "1", "RUNNINGSTATUS": "40"},
                "error": {"code": 0},
            }));
        });
        let copy_delete = server.mock(|when, then| {
            when.method(DELETE).path("/deviceManager/rest/dev-1/luncopy/70");
            then.status(200).json_body(ok_unit());
        });
        let snapshot_stop = server.mock(|when, then| {
            when.method(PUT).path("/deviceManager/rest/dev-1/snapshot/stop");
            then.status(200).json_body(ok_unit());
        });
        let snapshot_delete = server.mock(|when, then| {
            when.method(DELETE).path("/deviceManager/rest/dev-1/snapshot/50");
            then.status(200).json_body(ok_unit());
        });

        let lun = device
            .create_lun_from_source_by_copy(7, "vol-copied", 10, "pool-0")
            .await
            .unwrap();

        assert_eq!(lun.id, 60);
        activate.assert_hits(1);
        start_copy.assert_hits(1);
        // Scaffolding objects are always torn down again.
        copy_delete.assert_hits(1);
        snapshot_stop.assert_hits(1);
        snapshot_delete.assert_hits(1);
    }

    #[tokio::test]
    async fn test_empty_lun_listing_is_not_found() {
        let server = MockServer::start();
        let device = mock_device_tuned("local", &server, 10, Duration::from_secs(1), Duration::from_millis(1));

        server.mock(|when, then| {
            when.method(GET)
                .path("/deviceManager/rest/dev-1/lun")
                .query_param("filter", "NAME::missing");
            then.status(200).json_body(serde_json::json!({"data": [], "error": {"code": 0}}));
        });

        let result = device.luns(&SearchQuery::by_name("missing")).await;
        assert_matches!(result, Err(Error::NotFound(ResourceKind::Lun)));
    }
}
