//! Test fixtures: object builders and a mock store seeded from them

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{
    CSIPersistentVolumeSource, Container, PersistentVolume, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, PersistentVolumeSpec, Pod,
    PodSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use fluid_common::crd::{
    Dataset, DatasetPhase, DatasetSpec, DatasetStatus, Mount, RuntimeKind, RuntimeRecord,
    RuntimeRef,
};
use fluid_common::labels::{
    storage_capacity_label, DATASET_REFERRING_NAME, DATASET_REFERRING_NAMESPACE,
    VOLUME_ATTR_FLUID_PATH, VOLUME_ATTR_MOUNT_TYPE,
};
use fluid_common::FLUID_CSI_DRIVER;

use crate::policy::{PreferredLocality, TieredLocalityPolicy};
use crate::store::MockObjectStore;

fn meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: (!namespace.is_empty()).then(|| namespace.to_string()),
        ..Default::default()
    }
}

/// Bound physical dataset with one runtime of `kind`
pub fn physical_dataset(namespace: &str, name: &str, kind: RuntimeKind) -> Dataset {
    Dataset {
        metadata: meta(namespace, name),
        spec: DatasetSpec {
            mounts: vec![Mount {
                mount_point: "oss://bucket/data".to_string(),
                name: Some("data".to_string()),
                path: None,
            }],
        },
        status: Some(DatasetStatus {
            phase: DatasetPhase::Bound,
            runtimes: vec![RuntimeRef {
                name: name.to_string(),
                namespace: namespace.to_string(),
                runtime_type: kind.as_str().to_string(),
                category: Some("Accelerate".to_string()),
            }],
        }),
    }
}

/// Physical dataset that no runtime has bound yet
pub fn unbound_dataset(namespace: &str, name: &str) -> Dataset {
    Dataset {
        status: Some(DatasetStatus {
            phase: DatasetPhase::NotBound,
            runtimes: vec![],
        }),
        ..physical_dataset(namespace, name, RuntimeKind::Alluxio)
    }
}

/// Reference dataset forwarding to `target_ns/target_name`
///
/// Bound to a thin runtime, as the reference controller leaves it.
pub fn reference_dataset(
    namespace: &str,
    name: &str,
    target_ns: &str,
    target_name: &str,
) -> Dataset {
    Dataset {
        metadata: meta(namespace, name),
        spec: DatasetSpec {
            mounts: vec![Mount {
                mount_point: format!("dataset://{target_ns}/{target_name}"),
                name: None,
                path: None,
            }],
        },
        status: Some(DatasetStatus {
            phase: DatasetPhase::Bound,
            runtimes: vec![RuntimeRef {
                name: name.to_string(),
                namespace: namespace.to_string(),
                runtime_type: RuntimeKind::Thin.as_str().to_string(),
                category: None,
            }],
        }),
    }
}

/// Runtime object named after its dataset
pub fn runtime(namespace: &str, name: &str, kind: RuntimeKind) -> RuntimeRecord {
    RuntimeRecord {
        kind,
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

/// Claim carrying the dataset label, bound to `volume`
pub fn dataset_claim(namespace: &str, name: &str, volume: &str) -> PersistentVolumeClaim {
    let mut claim = plain_claim(namespace, name, volume);
    claim.metadata.labels = Some(BTreeMap::from([(
        storage_capacity_label(namespace, name),
        "true".to_string(),
    )]));
    claim
}

/// Claim without the dataset label
pub fn plain_claim(namespace: &str, name: &str, volume: &str) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: meta(namespace, name),
        spec: Some(PersistentVolumeClaimSpec {
            volume_name: Some(volume.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Reference claim labeled with the physical dataset it forwards to
pub fn referring_claim(
    namespace: &str,
    name: &str,
    volume: &str,
    target_ns: &str,
    target_name: &str,
) -> PersistentVolumeClaim {
    let mut claim = dataset_claim(namespace, name, volume);
    if let Some(labels) = claim.metadata.labels.as_mut() {
        labels.insert(DATASET_REFERRING_NAME.to_string(), target_name.to_string());
        labels.insert(DATASET_REFERRING_NAMESPACE.to_string(), target_ns.to_string());
    }
    claim
}

/// Fluid CSI volume with the given mount type and serving path
pub fn fluid_volume(name: &str, kind: RuntimeKind, fluid_path: &str) -> PersistentVolume {
    PersistentVolume {
        metadata: meta("", name),
        spec: Some(PersistentVolumeSpec {
            csi: Some(CSIPersistentVolumeSource {
                driver: FLUID_CSI_DRIVER.to_string(),
                volume_handle: name.to_string(),
                volume_attributes: Some(BTreeMap::from([
                    (VOLUME_ATTR_FLUID_PATH.to_string(), fluid_path.to_string()),
                    (VOLUME_ATTR_MOUNT_TYPE.to_string(), kind.as_str().to_string()),
                ])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Fuse DaemonSet for a dataset
pub fn fuse_daemon_set(namespace: &str, dataset: &str, kind: RuntimeKind) -> DaemonSet {
    DaemonSet {
        metadata: meta(namespace, &kind.fuse_daemon_set_name(dataset)),
        ..Default::default()
    }
}

/// Policy with `fluid.io/node` required and the zone preferred
pub fn node_and_zone_policy() -> TieredLocalityPolicy {
    TieredLocalityPolicy {
        preferred: vec![
            PreferredLocality {
                name: "fluid.io/node".to_string(),
                weight: 100,
            },
            PreferredLocality {
                name: "topology.kubernetes.io/zone".to_string(),
                weight: 50,
            },
        ],
        required: vec!["fluid.io/node".to_string()],
    }
}

/// Pod in `namespace` mounting each `(volume, claim)` pair at `/data/<volume>`
pub fn pod(namespace: &str, labels: &[(&str, &str)], claims: &[(&str, &str)]) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some("test".to_string()),
            namespace: Some(namespace.to_string()),
            labels: (!labels.is_empty()).then(|| {
                labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            }),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "test".to_string(),
                image: Some("test".to_string()),
                volume_mounts: Some(
                    claims
                        .iter()
                        .map(|(volume, _)| VolumeMount {
                            name: volume.to_string(),
                            mount_path: format!("/data/{volume}"),
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }],
            volumes: Some(
                claims
                    .iter()
                    .map(|(volume, claim)| Volume {
                        name: volume.to_string(),
                        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                            claim_name: claim.to_string(),
                            read_only: Some(true),
                        }),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

/// In-memory cluster contents used to seed a `MockObjectStore`
#[derive(Clone, Default)]
pub struct Cluster {
    datasets: BTreeMap<Key, Dataset>,
    runtimes: BTreeMap<(String, String, RuntimeKind), RuntimeRecord>,
    claims: BTreeMap<Key, PersistentVolumeClaim>,
    volumes: BTreeMap<String, PersistentVolume>,
    daemon_sets: BTreeMap<Key, DaemonSet>,
    policy: Option<TieredLocalityPolicy>,
}

impl Cluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(mut self, dataset: Dataset) -> Self {
        self.datasets
            .insert(key(dataset.namespace(), dataset.name()), dataset);
        self
    }

    pub fn with_runtime(mut self, runtime: RuntimeRecord) -> Self {
        self.runtimes.insert(
            (runtime.namespace.clone(), runtime.name.clone(), runtime.kind),
            runtime,
        );
        self
    }

    pub fn with_claim(mut self, claim: PersistentVolumeClaim) -> Self {
        let k = key(
            claim.metadata.namespace.as_deref().unwrap_or_default(),
            claim.metadata.name.as_deref().unwrap_or_default(),
        );
        self.claims.insert(k, claim);
        self
    }

    pub fn with_volume(mut self, volume: PersistentVolume) -> Self {
        let name = volume.metadata.name.clone().unwrap_or_default();
        self.volumes.insert(name, volume);
        self
    }

    pub fn with_daemon_set(mut self, ds: DaemonSet) -> Self {
        let k = key(
            ds.metadata.namespace.as_deref().unwrap_or_default(),
            ds.metadata.name.as_deref().unwrap_or_default(),
        );
        self.daemon_sets.insert(k, ds);
        self
    }

    pub fn with_policy(mut self, policy: TieredLocalityPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// A complete, healthy physical dataset `namespace/name` backed by `kind`
    ///
    /// Claim `name` is bound to volume `<namespace>-<name>`.
    pub fn with_physical(self, namespace: &str, name: &str, kind: RuntimeKind) -> Self {
        let volume = format!("{namespace}-{name}");
        let path = format!(
            "/runtime-mnt/{}/{namespace}/{name}/{}-fuse",
            kind.as_str(),
            kind.fuse_component()
        );
        self.with_dataset(physical_dataset(namespace, name, kind))
            .with_runtime(runtime(namespace, name, kind))
            .with_claim(dataset_claim(namespace, name, &volume))
            .with_volume(fluid_volume(&volume, kind, &path))
            .with_daemon_set(fuse_daemon_set(namespace, name, kind))
    }

    /// Mock store answering every lookup from this cluster
    pub fn store(&self) -> MockObjectStore {
        let mut store = MockObjectStore::new();

        let datasets = self.datasets.clone();
        store
            .expect_get_dataset()
            .returning(move |ns, name| Ok(datasets.get(&key(ns, name)).cloned()));

        let runtimes = self.runtimes.clone();
        store.expect_get_runtime().returning(move |ns, name, kind| {
            Ok(runtimes
                .get(&(ns.to_string(), name.to_string(), kind))
                .cloned())
        });

        let claims = self.claims.clone();
        store
            .expect_get_claim()
            .returning(move |ns, name| Ok(claims.get(&key(ns, name)).cloned()));

        let volumes = self.volumes.clone();
        store
            .expect_get_volume()
            .returning(move |name| Ok(volumes.get(name).cloned()));

        let daemon_sets = self.daemon_sets.clone();
        store
            .expect_get_daemon_set()
            .returning(move |ns, name| Ok(daemon_sets.get(&key(ns, name)).cloned()));

        let policy = self.policy.clone();
        store
            .expect_get_tiered_locality_policy()
            .returning(move || Ok(policy.clone()));

        store
    }
}
