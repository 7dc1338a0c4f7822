//! Dataset CRD view
//!
//! A Dataset is either *physical* (it owns a caching runtime) or a
//! *reference*: a single mount of the form `dataset://<namespace>/<name>`
//! forwarding to a physical Dataset, usually in another namespace.

use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Mount-point scheme marking a reference Dataset
pub const DATASET_MOUNT_SCHEME: &str = "dataset://";

/// Kind name used in errors and logs
const DATASET_KIND: &str = "Dataset";

/// A Fluid Dataset as read from the API server
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Standard object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Desired state
    #[serde(default)]
    pub spec: DatasetSpec,

    /// Observed state, absent until the Dataset controller has reconciled it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DatasetStatus>,
}

/// Dataset spec (only the fields the webhook reads)
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSpec {
    /// Underlying storage mounts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<Mount>,
}

/// A single Dataset mount
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Mount {
    /// Mount source, e.g. `oss://bucket/path` or `dataset://ns/name`
    pub mount_point: String,

    /// Optional mount name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Optional path inside the dataset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Dataset status
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatasetStatus {
    /// Binding phase
    #[serde(default)]
    pub phase: DatasetPhase,

    /// Runtimes bound to this dataset
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runtimes: Vec<RuntimeRef>,
}

/// Binding phase of a Dataset
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum DatasetPhase {
    /// Not reconciled yet
    #[default]
    #[serde(rename = "")]
    None,
    /// Waiting for a runtime
    Pending,
    /// Bound to a runtime
    Bound,
    /// Explicitly unbound
    NotBound,
    /// Runtime setup failed
    Failed,
    /// Spec change being rolled out
    Updating,
    /// Data migration in progress
    DataMigrating,
    /// Any phase this crate does not know about
    #[serde(other)]
    Unknown,
}

/// Runtime entry recorded in Dataset status
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeRef {
    /// Runtime object name (equals the dataset name)
    #[serde(default)]
    pub name: String,

    /// Runtime object namespace
    #[serde(default)]
    pub namespace: String,

    /// Runtime kind string, e.g. `alluxio`, `jindo`, `thin`
    #[serde(rename = "type", default)]
    pub runtime_type: String,

    /// Runtime category (e.g. `Accelerate`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Namespace-qualified pointer to a Dataset
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DatasetRef {
    /// Dataset namespace
    pub namespace: String,
    /// Dataset name
    pub name: String,
}

impl DatasetRef {
    /// Create a reference from namespace and name
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse a `dataset://<namespace>/<name>` mount point
    pub fn parse_mount_point(mount_point: &str) -> Result<Self, String> {
        let rest = mount_point
            .strip_prefix(DATASET_MOUNT_SCHEME)
            .ok_or_else(|| format!("mount point '{mount_point}' is not a dataset:// address"))?;

        match rest.split('/').collect::<Vec<_>>().as_slice() {
            [namespace, name] if !namespace.is_empty() && !name.is_empty() => {
                Ok(Self::new(*namespace, *name))
            }
            _ => Err(format!(
                "mount point '{mount_point}' must have the form dataset://<namespace>/<name>"
            )),
        }
    }

    /// Per-node locality label value for this dataset (`<namespace>-<name>`)
    pub fn locality_value(&self) -> String {
        format!("{}-{}", self.namespace, self.name)
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Whether a Dataset owns its data or forwards to another Dataset
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatasetLocality {
    /// Owns a runtime directly
    Physical,
    /// Forwards to the target Dataset
    Reference(DatasetRef),
}

impl Dataset {
    /// Dataset name
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Dataset namespace
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    /// Namespace-qualified pointer to this Dataset
    pub fn to_ref(&self) -> DatasetRef {
        DatasetRef::new(self.namespace(), self.name())
    }

    /// Current binding phase (`None` when status is missing)
    pub fn phase(&self) -> DatasetPhase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }

    /// True when the Dataset is bound to a runtime
    pub fn is_bound(&self) -> bool {
        self.phase() == DatasetPhase::Bound
    }

    /// Runtimes recorded in status
    pub fn runtimes(&self) -> &[RuntimeRef] {
        self.status
            .as_ref()
            .map(|s| s.runtimes.as_slice())
            .unwrap_or_default()
    }

    /// Classify the Dataset as physical or reference
    ///
    /// A reference Dataset has exactly one mount and that mount uses the
    /// `dataset://` scheme. Mixing a `dataset://` mount with other mounts is
    /// rejected.
    pub fn locality(&self) -> Result<DatasetLocality, String> {
        let reference_mounts = self
            .spec
            .mounts
            .iter()
            .filter(|m| m.mount_point.starts_with(DATASET_MOUNT_SCHEME))
            .count();

        match (reference_mounts, self.spec.mounts.as_slice()) {
            (0, _) => Ok(DatasetLocality::Physical),
            (1, [mount]) => DatasetRef::parse_mount_point(&mount.mount_point)
                .map(DatasetLocality::Reference),
            _ => Err(format!(
                "dataset {} mixes {} dataset:// mount(s) with {} total mounts; a reference \
                 dataset must have exactly one mount",
                self.to_ref(),
                reference_mounts,
                self.spec.mounts.len()
            )),
        }
    }
}

impl TryFrom<DynamicObject> for Dataset {
    type Error = Error;

    fn try_from(obj: DynamicObject) -> Result<Self, Self::Error> {
        let value = serde_json::to_value(&obj)
            .map_err(|e| Error::serialization_for_kind(DATASET_KIND, e.to_string()))?;
        serde_json::from_value(value)
            .map_err(|e| Error::serialization_for_kind(DATASET_KIND, e.to_string()))
    }
}
