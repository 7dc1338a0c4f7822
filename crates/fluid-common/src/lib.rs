//! Common types for the Fluid scheduling webhook: the typed view of Fluid
//! CRDs, the label/attribute contract, errors, and telemetry setup

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod labels;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace where Fluid system components and cluster-wide config live
pub const FLUID_SYSTEM_NAMESPACE: &str = "fluid-system";

/// Name of the ConfigMap holding the tiered locality policy
pub const TIERED_LOCALITY_CONFIGMAP: &str = "tiered-locality-config";

/// Data key inside the tiered locality ConfigMap
pub const TIERED_LOCALITY_DATA_KEY: &str = "tieredLocality";

/// CSI driver that backs dataset volumes
pub const FLUID_CSI_DRIVER: &str = "fuse.csi.fluid.io";
