//! Cache locality correlation
//!
//! Confirms that a claim, the volume it is bound to, and the fuse DaemonSet
//! of the resolved runtime agree with each other. The Pod can only be placed
//! next to the cache when all three line up.

use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use tracing::debug;

use fluid_common::crd::{DatasetRef, RuntimeKind};
use fluid_common::labels::{bound_volume_name, referring_dataset, VolumeAttributes};
use fluid_common::Error;

use crate::resolver::ResolvedDataset;
use crate::store::ObjectStore;

/// Where a claim's data is served on the node, and by what
#[derive(Clone, Debug)]
pub struct CacheLocality {
    /// The effective (physical) Dataset
    pub dataset: DatasetRef,
    /// The reference Dataset the claim named, if any
    pub referenced_by: Option<DatasetRef>,
    /// Runtime kind serving the data
    pub runtime_kind: RuntimeKind,
    /// Volume the claim is bound to
    pub volume: String,
    /// Host path of the fuse mount
    pub serving_path: String,
    /// The runtime's fuse DaemonSet
    pub fuse: DaemonSet,
}

/// Checks claim, volume and DaemonSet consistency for a resolved dataset
pub struct CacheLocalityCorrelator<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> CacheLocalityCorrelator<'a> {
    /// Create a correlator reading from `store`
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Correlate `claim` with the dataset it resolved to
    pub async fn correlate(
        &self,
        claim: &PersistentVolumeClaim,
        resolved: &ResolvedDataset,
    ) -> Result<CacheLocality, Error> {
        let claim_ns = claim.metadata.namespace.as_deref().unwrap_or_default();
        let claim_name = claim.metadata.name.as_deref().unwrap_or_default();
        let physical = resolved.effective_ref();
        let kind = resolved.runtime_kind;

        let volume = bound_volume_name(claim)
            .ok_or_else(|| Error::not_bound(claim_ns, claim_name, "claim has no bound volume"))?
            .to_string();
        let attributes = self.volume_attributes(&volume).await?;

        if !attributes.mount_type.eq_ignore_ascii_case(kind.as_str()) {
            return Err(Error::attribute_mismatch(
                &volume,
                format!(
                    "mount type '{}' does not match runtime '{}' of dataset {physical}",
                    attributes.mount_type, kind
                ),
            ));
        }

        if let Some(referring) = referring_dataset(claim) {
            if referring != physical {
                return Err(Error::unresolved_reference(
                    claim_ns,
                    claim_name,
                    format!("claim is labeled as referring to {referring} but resolves to {physical}"),
                ));
            }
        }

        if claim_ns != physical.namespace {
            self.check_physical_claim(&physical, &volume, &attributes)
                .await?;
        }

        let fuse_name = kind.fuse_daemon_set_name(&physical.name);
        let fuse = self
            .store
            .get_daemon_set(&physical.namespace, &fuse_name)
            .await?
            .ok_or_else(|| Error::serving_component_not_found(&physical.namespace, &fuse_name))?;

        debug!(
            claim = %format!("{claim_ns}/{claim_name}"),
            volume = %volume,
            serving_path = %attributes.fluid_path,
            fuse = %fuse_name,
            "correlated cache locality"
        );

        Ok(CacheLocality {
            dataset: physical,
            referenced_by: resolved.referenced_by.clone(),
            runtime_kind: kind,
            volume,
            serving_path: attributes.fluid_path,
            fuse,
        })
    }

    /// The physical dataset's own claim must exist and its volume must
    /// serve the same path as the volume the Pod mounts
    async fn check_physical_claim(
        &self,
        physical: &DatasetRef,
        mounted_volume: &str,
        mounted: &VolumeAttributes,
    ) -> Result<(), Error> {
        let claim = self
            .store
            .get_claim(&physical.namespace, &physical.name)
            .await?
            .ok_or_else(|| {
                Error::not_found("PersistentVolumeClaim", &physical.namespace, &physical.name)
            })?;

        let volume = bound_volume_name(&claim).ok_or_else(|| {
            Error::not_bound(&physical.namespace, &physical.name, "claim has no bound volume")
        })?;
        if volume == mounted_volume {
            return Ok(());
        }

        let attributes = self.volume_attributes(volume).await?;
        if &attributes != mounted {
            return Err(Error::attribute_mismatch(
                mounted_volume,
                format!(
                    "serves {} ({}) but dataset {physical} is served at {} ({}) by volume {volume}",
                    mounted.fluid_path,
                    mounted.mount_type,
                    attributes.fluid_path,
                    attributes.mount_type
                ),
            ));
        }
        Ok(())
    }

    async fn volume_attributes(&self, volume: &str) -> Result<VolumeAttributes, Error> {
        let pv = self
            .store
            .get_volume(volume)
            .await?
            .ok_or_else(|| Error::not_found_cluster_scoped("PersistentVolume", volume))?;
        VolumeAttributes::from_volume(&pv).map_err(|msg| Error::attribute_mismatch(volume, msg))
    }
}
