//! Label and attribute contract
//!
//! Pods, claims, and volumes carry Fluid state in free-form string maps. This
//! module is the only place those keys are interpreted; everything past it
//! works with the typed values returned here.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};

use crate::crd::DatasetRef;

/// Pod label: the Pod runs on serverless nodes and needs a fuse sidecar
pub const INJECT_SERVERLESS: &str = "serverless.fluid.io/inject";

/// Pod label: the fuse sidecar has already been injected
pub const INJECT_SIDECAR_DONE: &str = "done.sidecar.fluid.io/inject";

/// Pod label: fuse runs out-of-process as a DaemonSet on the node
pub const INJECT_SERVERFUL_FUSE: &str = "fuse.serverful.fluid.io/inject";

/// Value marking a boolean label as set
pub const LABEL_TRUE: &str = "true";

/// Prefix of the per-dataset scheduling strictness label
pub const DATASET_SCHED_PREFIX: &str = "fluid.io/dataset.";

/// Suffix of the per-dataset scheduling strictness label
pub const DATASET_SCHED_SUFFIX: &str = ".sched";

/// Claim label prefix marking a dataset-backed claim (`fluid.io/s-<ns>-<name>`)
pub const STORAGE_CAPACITY_PREFIX: &str = "fluid.io/s-";

/// Claim label: name of the physical dataset a reference claim points at
pub const DATASET_REFERRING_NAME: &str = "fluid.io/dataset-referring-name";

/// Claim label: namespace of the physical dataset a reference claim points at
pub const DATASET_REFERRING_NAMESPACE: &str = "fluid.io/dataset-referring-namespace";

/// Volume attribute: serving path of the fuse mount on the node
pub const VOLUME_ATTR_FLUID_PATH: &str = "fluid_path";

/// Volume attribute: runtime kind string of the fuse mount
pub const VOLUME_ATTR_MOUNT_TYPE: &str = "mountType";

fn is_true(labels: &BTreeMap<String, String>, key: &str) -> bool {
    labels.get(key).is_some_and(|v| v == LABEL_TRUE)
}

// =============================================================================
// Pod labels
// =============================================================================

/// How the fuse client reaches the Pod
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InjectionMode {
    /// No injection labels: fuse is served by the node-local DaemonSet
    Default,
    /// Explicitly serverful: fuse runs out-of-process on the node
    Serverful,
    /// Serverless Pod still waiting for its fuse sidecar
    Serverless,
    /// Serverless Pod whose sidecar was already injected
    ServerlessInjected,
}

impl InjectionMode {
    /// Decide the mode from Pod labels
    pub fn from_labels(labels: &BTreeMap<String, String>) -> Self {
        let serverless = is_true(labels, INJECT_SERVERLESS);
        let done = is_true(labels, INJECT_SIDECAR_DONE);

        match (serverless, done) {
            (_, true) => InjectionMode::ServerlessInjected,
            (true, false) => InjectionMode::Serverless,
            (false, false) if is_true(labels, INJECT_SERVERFUL_FUSE) => InjectionMode::Serverful,
            (false, false) => InjectionMode::Default,
        }
    }

    /// True when the Pod must go through the sidecar injection path
    pub fn needs_sidecar(&self) -> bool {
        matches!(self, InjectionMode::Serverless)
    }

    /// True when mount propagation and node affinity are injected
    pub fn mutates_scheduling(&self) -> bool {
        !self.needs_sidecar()
    }
}

/// Per-workload scheduling strictness for one dataset
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulingStrictness {
    /// Dataset locality terms must be satisfied
    Required,
    /// Honor the cluster default tiers only
    Preferred,
}

/// Label key carrying the strictness override for a dataset
pub fn sched_label_key(dataset: &str) -> String {
    format!("{DATASET_SCHED_PREFIX}{dataset}{DATASET_SCHED_SUFFIX}")
}

/// Read the strictness override for a dataset from Pod labels
///
/// Only `required` and `preferred` are recognized; any other value is treated
/// as absent.
pub fn strictness_override(
    labels: &BTreeMap<String, String>,
    dataset: &str,
) -> Option<SchedulingStrictness> {
    match labels.get(&sched_label_key(dataset))?.as_str() {
        "required" => Some(SchedulingStrictness::Required),
        "preferred" => Some(SchedulingStrictness::Preferred),
        _ => None,
    }
}

// =============================================================================
// Claim labels
// =============================================================================

/// Label key marking a claim as dataset-backed
pub fn storage_capacity_label(namespace: &str, name: &str) -> String {
    format!("{STORAGE_CAPACITY_PREFIX}{namespace}-{name}")
}

fn claim_labels(claim: &PersistentVolumeClaim) -> Option<&BTreeMap<String, String>> {
    claim.metadata.labels.as_ref()
}

/// True when the claim is backed by a Fluid dataset
pub fn is_dataset_claim(claim: &PersistentVolumeClaim) -> bool {
    let namespace = claim.metadata.namespace.as_deref().unwrap_or_default();
    let name = claim.metadata.name.as_deref().unwrap_or_default();
    claim_labels(claim)
        .is_some_and(|l| l.contains_key(&storage_capacity_label(namespace, name)))
}

/// Physical dataset a reference claim declares it points at, if labeled
pub fn referring_dataset(claim: &PersistentVolumeClaim) -> Option<DatasetRef> {
    let labels = claim_labels(claim)?;
    let name = labels.get(DATASET_REFERRING_NAME)?;
    let namespace = labels.get(DATASET_REFERRING_NAMESPACE)?;
    Some(DatasetRef::new(namespace.as_str(), name.as_str()))
}

/// Name of the volume a claim is bound to, if any
pub fn bound_volume_name(claim: &PersistentVolumeClaim) -> Option<&str> {
    claim
        .spec
        .as_ref()
        .and_then(|s| s.volume_name.as_deref())
        .filter(|n| !n.is_empty())
}

// =============================================================================
// Volume attributes
// =============================================================================

/// Fluid attributes carried on a dataset volume's CSI source
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VolumeAttributes {
    /// Serving path of the fuse mount on the node
    pub fluid_path: String,
    /// Runtime kind string
    pub mount_type: String,
}

impl VolumeAttributes {
    /// Extract the attributes from a volume
    ///
    /// Returns an error naming the first missing piece.
    pub fn from_volume(volume: &PersistentVolume) -> Result<Self, String> {
        let attrs = volume
            .spec
            .as_ref()
            .and_then(|s| s.csi.as_ref())
            .ok_or_else(|| "volume has no CSI source".to_string())?
            .volume_attributes
            .as_ref()
            .ok_or_else(|| "CSI source has no volume attributes".to_string())?;

        let get = |key: &str| {
            attrs
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| format!("missing volume attribute '{key}'"))
        };

        Ok(Self {
            fluid_path: get(VOLUME_ATTR_FLUID_PATH)?,
            mount_type: get(VOLUME_ATTR_MOUNT_TYPE)?,
        })
    }
}
