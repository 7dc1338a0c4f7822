//! Typed views of the Fluid custom resources read by the webhook
//!
//! Fluid CRDs are owned by the Fluid controllers, not by this crate. They are
//! fetched as `DynamicObject`s and decoded into the structs defined here, so
//! the rest of the workspace never touches untyped JSON.

mod dataset;
mod runtime;

pub use dataset::{
    Dataset, DatasetLocality, DatasetPhase, DatasetRef, DatasetSpec, DatasetStatus, Mount,
    RuntimeRef, DATASET_MOUNT_SCHEME,
};
pub use runtime::{RuntimeKind, RuntimeRecord, UnknownRuntimeKind};

use kube::core::{ApiResource, GroupVersionKind};

/// API group of all Fluid data resources
pub const FLUID_GROUP: &str = "data.fluid.io";

/// API version of the Fluid data resources read by the webhook
pub const FLUID_VERSION: &str = "v1alpha1";

/// Build the `ApiResource` for a Fluid kind in `data.fluid.io/v1alpha1`
pub fn fluid_api_resource(kind: &str, plural: &str) -> ApiResource {
    let gvk = GroupVersionKind::gvk(FLUID_GROUP, FLUID_VERSION, kind);
    ApiResource::from_gvk_with_plural(&gvk, plural)
}
