//! Dataset-to-node resolution and cache affinity injection
//!
//! Given a Pod that mounts dataset-backed claims, this crate resolves each
//! claim to its physical Dataset and caching runtime, confirms the runtime's
//! fuse DaemonSet is deployed, and rewrites the Pod so the scheduler places
//! it next to the cache:
//!
//! - [`store`] - read-only lookups of claims, volumes, datasets, runtimes,
//!   DaemonSets and the tiered locality policy
//! - [`resolver`] - claim name to effective (physical) dataset, following at
//!   most one reference hop
//! - [`correlator`] - claim/volume/DaemonSet consistency checks
//! - [`policy`] - the cluster-wide tiered locality policy
//! - [`affinity`] - per-dataset node affinity terms
//! - [`mutation`] - mount propagation and affinity merge into the Pod
//! - [`injector`] - the per-admission entry point tying it all together

#![deny(missing_docs)]

pub mod affinity;
pub mod correlator;
pub mod injector;
pub mod mutation;
pub mod policy;
pub mod resolver;
pub mod store;

#[cfg(test)]
mod testing;

pub use affinity::{AffinityPolicyEngine, DatasetAffinity};
pub use correlator::{CacheLocality, CacheLocalityCorrelator};
pub use injector::{Decision, Injector, Resolution};
pub use mutation::{MutationBuilder, MutationSummary};
pub use policy::{PreferredLocality, TieredLocalityPolicy};
pub use resolver::{DatasetResolver, ResolvedDataset};
pub use store::{KubeObjectStore, ObjectStore};
