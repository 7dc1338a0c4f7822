//! Caching runtime kinds and runtime records

use std::fmt;
use std::str::FromStr;

use kube::api::DynamicObject;
use kube::ResourceExt;

/// Caching engine backing a physical Dataset
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuntimeKind {
    /// Alluxio
    Alluxio,
    /// JindoFS
    Jindo,
    /// GooseFS
    GooseFs,
    /// JuiceFS
    JuiceFs,
    /// Thin runtime (generic fuse)
    Thin,
    /// EFC
    Efc,
    /// Vineyard
    Vineyard,
}

/// Runtime kind string that does not match any known engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown runtime kind '{0}'")]
pub struct UnknownRuntimeKind(pub String);

impl RuntimeKind {
    /// All supported runtime kinds
    pub const ALL: [RuntimeKind; 7] = [
        RuntimeKind::Alluxio,
        RuntimeKind::Jindo,
        RuntimeKind::GooseFs,
        RuntimeKind::JuiceFs,
        RuntimeKind::Thin,
        RuntimeKind::Efc,
        RuntimeKind::Vineyard,
    ];

    /// Kind string as written in Dataset status and volume attributes
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeKind::Alluxio => "alluxio",
            RuntimeKind::Jindo => "jindo",
            RuntimeKind::GooseFs => "goosefs",
            RuntimeKind::JuiceFs => "juicefs",
            RuntimeKind::Thin => "thin",
            RuntimeKind::Efc => "efc",
            RuntimeKind::Vineyard => "vineyard",
        }
    }

    /// Engine component name used in the fuse DaemonSet name
    ///
    /// Jindo's fuse is deployed as `jindofs`; every other engine uses its
    /// kind string.
    pub fn fuse_component(&self) -> &'static str {
        match self {
            RuntimeKind::Jindo => "jindofs",
            other => other.as_str(),
        }
    }

    /// Name of the caching fuse DaemonSet for a dataset
    pub fn fuse_daemon_set_name(&self, dataset: &str) -> String {
        format!("{}-{}-fuse", dataset, self.fuse_component())
    }

    /// CRD kind of the runtime object
    pub fn crd_kind(&self) -> &'static str {
        match self {
            RuntimeKind::Alluxio => "AlluxioRuntime",
            RuntimeKind::Jindo => "JindoRuntime",
            RuntimeKind::GooseFs => "GooseFSRuntime",
            RuntimeKind::JuiceFs => "JuiceFSRuntime",
            RuntimeKind::Thin => "ThinRuntime",
            RuntimeKind::Efc => "EFCRuntime",
            RuntimeKind::Vineyard => "VineyardRuntime",
        }
    }

    /// Plural resource name of the runtime CRD
    pub fn crd_plural(&self) -> String {
        format!("{}s", self.crd_kind().to_lowercase())
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuntimeKind {
    type Err = UnknownRuntimeKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuntimeKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownRuntimeKind(s.to_string()))
    }
}

/// A runtime object found in the cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeRecord {
    /// Runtime kind
    pub kind: RuntimeKind,
    /// Runtime namespace
    pub namespace: String,
    /// Runtime name (equals the dataset name)
    pub name: String,
}

impl RuntimeRecord {
    /// Build a record from a fetched runtime object
    pub fn from_object(kind: RuntimeKind, obj: &DynamicObject) -> Self {
        Self {
            kind,
            namespace: obj.namespace().unwrap_or_default(),
            name: obj.name_any(),
        }
    }
}
