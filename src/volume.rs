//! Volume lifecycle orchestration
//!
//! The workflows here keep two arrays and one mirror pair consistent through
//! multi-step sequences in which any step can fail. Ordering rules come from
//! the array itself: a LUN cannot be deleted while a LUN group references it
//! or while it is part of an active mirror, and a pair cannot be expanded
//! while synchronization runs. Each failing step is wrapped with its name so
//! a mid-workflow error identifies exactly where the sequence stopped.

use futures::future;
use tracing::{info, warn};

use crate::client::MetroClient;
use crate::device::{Device, Lun};
use crate::error::{Error, Result};
use crate::metro::{HyperMetroPair, PairStatus};

impl MetroClient {
    // =========================================================================
    // Create
    // =========================================================================

    /// Create a blank mirrored volume: one LUN per array, then the pair.
    ///
    /// A pair-creation failure leaves both LUNs behind; cross-array cleanup is
    /// not run unattended, so the error names both orphan ids for manual
    /// reconciliation.
    pub async fn create_volume(
        &self,
        name: &str,
        capacity_gb: u64,
        storage_pool: &str,
        domain_id: &str,
    ) -> Result<HyperMetroPair> {
        let local_lun = self
            .local()
            .create_lun(name, capacity_gb, storage_pool)
            .await
            .map_err(Error::wrap("create lun on local device"))?;
        let remote_lun = self
            .remote()
            .create_lun(name, capacity_gb, storage_pool)
            .await
            .map_err(Error::wrap("create lun on remote device"))?;

        match self
            .create_hyper_metro_pair(domain_id, local_lun.id, remote_lun.id)
            .await
        {
            Ok(pair) => {
                info!(pair = %pair.id, name, "volume created");
                Ok(pair)
            }
            Err(error) => Err(Error::PairOrphans {
                local_lun_id: local_lun.id,
                remote_lun_id: remote_lun.id,
                source: Box::new(error),
            }),
        }
    }

    /// Create a mirrored volume whose sides are cloned from an existing pair.
    ///
    /// The two clone-split-poll legs run concurrently; each can take tens of
    /// seconds on its own. The first error observed wins. `_storage_pool` is
    /// accepted for signature parity with [`MetroClient::create_volume`];
    /// clone-based provisioning always inherits the source LUN's pool.
    pub async fn create_volume_from_source(
        &self,
        name: &str,
        capacity_gb: u64,
        _storage_pool: &str,
        domain_id: &str,
        source_pair_id: &str,
    ) -> Result<HyperMetroPair> {
        let source = self
            .hyper_metro_pair(source_pair_id)
            .await
            .map_err(Error::wrap("resolve source pair"))?;

        let (local_lun, remote_lun) = future::try_join(
            self.local()
                .create_lun_from_source(source.local_lun_id, name, capacity_gb),
            self.remote()
                .create_lun_from_source(source.remote_lun_id, name, capacity_gb),
        )
        .await
        .map_err(Error::wrap("clone source luns"))?;

        match self
            .create_hyper_metro_pair(domain_id, local_lun.id, remote_lun.id)
            .await
        {
            Ok(pair) => {
                info!(pair = %pair.id, source = source_pair_id, name, "volume cloned");
                Ok(pair)
            }
            Err(error) => Err(Error::PairOrphans {
                local_lun_id: local_lun.id,
                remote_lun_id: remote_lun.id,
                source: Box::new(error),
            }),
        }
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Tear a mirrored volume down: unwind attach state, stop the mirror,
    /// delete the pair record, then delete both LUNs.
    ///
    /// Every step failure is terminal. Re-running the whole workflow is safe;
    /// the sub-steps tolerate already-released state.
    pub async fn delete_volume(&self, pair_id: &str) -> Result<()> {
        let pair = self
            .hyper_metro_pair(pair_id)
            .await
            .map_err(Error::wrap("resolve pair"))?;

        release_lun(self.local(), pair.local_lun_id)
            .await
            .map_err(Error::wrap("release local lun"))?;
        release_lun(self.remote(), pair.remote_lun_id)
            .await
            .map_err(Error::wrap("release remote lun"))?;

        if pair.running_status != PairStatus::Paused {
            self.suspend_hyper_metro_pair(&pair.id)
                .await
                .map_err(Error::wrap("suspend pair"))?;
        }
        self.delete_hyper_metro_pair(&pair.id)
            .await
            .map_err(Error::wrap("delete pair"))?;

        self.local()
            .delete_lun(pair.local_lun_id)
            .await
            .map_err(Error::wrap("delete local lun"))?;
        self.remote()
            .delete_lun(pair.remote_lun_id)
            .await
            .map_err(Error::wrap("delete remote lun"))?;

        info!(pair = pair_id, "volume deleted");
        Ok(())
    }

    // =========================================================================
    // Extend
    // =========================================================================

    /// Grow a mirrored volume. The pair must be suspended while the LUNs are
    /// expanded; re-sync is attempted exactly once no matter which side
    /// failed, so the pair is never left suspended by this workflow.
    pub async fn extend_volume(&self, pair_id: &str, new_capacity_gb: u64) -> Result<()> {
        let pair = self
            .hyper_metro_pair(pair_id)
            .await
            .map_err(Error::wrap("resolve pair"))?;

        self.suspend_hyper_metro_pair(&pair.id)
            .await
            .map_err(Error::wrap("suspend pair"))?;

        let expanded = self.expand_both_sides(&pair, new_capacity_gb).await;
        let resumed = self.sync_hyper_metro_pair(&pair.id).await;

        expanded?;
        resumed.map_err(Error::wrap("resume sync"))?;

        info!(pair = pair_id, new_capacity_gb, "volume extended");
        Ok(())
    }

    async fn expand_both_sides(&self, pair: &HyperMetroPair, new_capacity_gb: u64) -> Result<()> {
        self.local()
            .expand_lun(pair.local_lun_id, new_capacity_gb)
            .await
            .map_err(Error::wrap("expand local lun"))?;
        self.remote()
            .expand_lun(pair.remote_lun_id, new_capacity_gb)
            .await
            .map_err(Error::wrap("expand remote lun"))?;
        Ok(())
    }

    // =========================================================================
    // Attach / Detach
    // =========================================================================

    /// Map both sides of a volume to a host, creating whatever mapping-plane
    /// objects are missing. Calling this twice for the same host converges
    /// instead of duplicating.
    pub async fn attach_volume(&self, pair_id: &str, hostname: &str, iqn: &str) -> Result<()> {
        let pair = self
            .hyper_metro_pair(pair_id)
            .await
            .map_err(Error::wrap("resolve pair"))?;

        self.local()
            .attach_lun(self.port_group(), hostname, iqn, pair.local_lun_id)
            .await
            .map_err(Error::wrap("attach on local device"))?;
        self.remote()
            .attach_lun(self.port_group(), hostname, iqn, pair.remote_lun_id)
            .await
            .map_err(Error::wrap("attach on remote device"))?;

        info!(pair = pair_id, hostname, "volume attached");
        Ok(())
    }

    /// Unmap both sides of a volume from its host. Host, mapping view, and
    /// group objects stay behind for the next attach.
    pub async fn detach_volume(&self, pair_id: &str) -> Result<()> {
        let pair = self
            .hyper_metro_pair(pair_id)
            .await
            .map_err(Error::wrap("resolve pair"))?;

        self.local()
            .detach_lun(pair.local_lun_id)
            .await
            .map_err(Error::wrap("detach on local device"))?;
        self.remote()
            .detach_lun(pair.remote_lun_id)
            .await
            .map_err(Error::wrap("detach on remote device"))?;

        info!(pair = pair_id, "volume detached");
        Ok(())
    }
}

/// Disassociate a LUN from its group when attach state exists; a LUN that was
/// never attached passes through untouched.
async fn release_lun(device: &Device, lun_id: i64) -> Result<()> {
    let lun = device.lun(lun_id).await?;
    if !lun.is_in_lun_group {
        return Ok(());
    }

    let group = device.lun_group_by_lun(lun.id).await?;
    device.disassociate_lun(group.id, lun.id).await
}

impl Device {
    /// Map one LUN to a host on this array.
    ///
    /// All lookups go by encoded name, so repeated attaches for the same host
    /// land on the same objects and only fill in what is missing.
    pub async fn attach_lun(&self, port_group_name: &str, hostname: &str, iqn: &str, lun_id: i64) -> Result<()> {
        let port_group = self.port_group_by_name(port_group_name).await?;
        let (host_group, host) = self.host_group_with_host(hostname).await?;
        self.initiator_for_host(iqn, host.id).await?;

        let lun_group = self.lun_group_for_host(hostname).await?;
        let lun: Lun = self.lun(lun_id).await?;
        if !lun.is_in_lun_group {
            self.associate_lun(lun_group.id, lun.id).await?;
        }

        let view = self.mapping_view_for_host(hostname).await?;
        self.ensure_mapping(&view, &host_group, &lun_group, port_group.id).await
    }

    /// Remove one LUN from its LUN group on this array.
    pub async fn detach_lun(&self, lun_id: i64) -> Result<()> {
        let lun = self.lun(lun_id).await?;
        let group = self.lun_group_by_lun(lun.id).await?;

        if let Err(error) = self.disassociate_lun(group.id, lun.id).await {
            warn!(device = self.label(), lun = lun_id, %error, "failed to disassociate lun");
            return Err(error);
        }
        Ok(())
    }
}
