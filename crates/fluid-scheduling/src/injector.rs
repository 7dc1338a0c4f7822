//! Per-admission decision
//!
//! `Injector::resolve` resolves and correlates every dataset claim of a Pod
//! (independent claims concurrently). `Resolution::apply` then computes the
//! affinity for each effective dataset and mutates the Pod. Any failure
//! rejects the Pod before it is touched. `Injector::decide` runs both.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::future::try_join_all;
use k8s_openapi::api::core::v1::Pod;
use tracing::{debug, info};

use fluid_common::labels::{is_dataset_claim, InjectionMode};
use fluid_common::Error;

use crate::affinity::{workload_strictness, AffinityPolicyEngine};
use crate::correlator::{CacheLocality, CacheLocalityCorrelator};
use crate::mutation::{MutationBuilder, MutationSummary};
use crate::policy::TieredLocalityPolicy;
use crate::resolver::DatasetResolver;
use crate::store::ObjectStore;

/// Outcome of one admission decision
#[derive(Clone, Debug)]
pub struct Decision {
    /// The Pod, mutated when scheduling hints were injected
    pub pod: Pod,
    /// Injection mode read from the Pod labels
    pub mode: InjectionMode,
    /// One record per dataset claim the Pod mounts
    pub localities: Vec<CacheLocality>,
    /// What the mutation changed
    pub summary: MutationSummary,
}

impl Decision {
    /// True when the Pod must go to the sidecar injection path instead
    pub fn needs_sidecar(&self) -> bool {
        self.mode.needs_sidecar() && !self.localities.is_empty()
    }

    /// True when the Pod differs from what was submitted
    pub fn is_mutated(&self) -> bool {
        !self.summary.is_empty()
    }

    fn unchanged(pod: Pod, mode: InjectionMode, localities: Vec<CacheLocality>) -> Self {
        Self {
            pod,
            mode,
            localities,
            summary: MutationSummary::default(),
        }
    }
}

/// A dataset claim after resolution and correlation
struct ResolvedClaim {
    claim: String,
    volumes: BTreeSet<String>,
    locality: CacheLocality,
}

/// Every dataset claim of a Pod, resolved and correlated, before mutation
pub struct Resolution {
    namespace: String,
    pod: Pod,
    mode: InjectionMode,
    claims: Vec<ResolvedClaim>,
}

impl Resolution {
    /// True when applying will consult the tiered locality policy
    ///
    /// False for Pods without dataset claims and for serverless Pods still
    /// awaiting their sidecar; callers skip the policy lookup for those.
    pub fn needs_policy(&self) -> bool {
        !self.claims.is_empty() && self.mode.mutates_scheduling()
    }

    /// Number of dataset claims resolved
    pub fn dataset_count(&self) -> usize {
        self.claims.len()
    }

    /// Compute affinity under `policy` and mutate the Pod
    pub fn apply(self, policy: Option<&TieredLocalityPolicy>) -> Decision {
        let Resolution {
            namespace,
            mut pod,
            mode,
            claims,
        } = self;
        let pod_name = pod_name(&pod);

        if claims.is_empty() {
            debug!(namespace = %namespace, pod = %pod_name, "pod mounts no dataset claims");
            return Decision::unchanged(pod, mode, Vec::new());
        }

        if !mode.mutates_scheduling() {
            info!(
                namespace = %namespace,
                pod = %pod_name,
                datasets = claims.len(),
                "serverless pod awaits sidecar injection"
            );
            let localities = claims.into_iter().map(|r| r.locality).collect();
            return Decision::unchanged(pod, mode, localities);
        }

        let labels = pod.metadata.labels.clone().unwrap_or_default();
        let engine = AffinityPolicyEngine::new(policy);
        let affinities: Vec<_> = claims
            .iter()
            .map(|r| {
                let strictness = workload_strictness(&labels, &r.claim, &r.locality.dataset);
                engine.compute(&r.locality.dataset, strictness)
            })
            .collect();
        let volumes: BTreeSet<String> = claims
            .iter()
            .flat_map(|r| r.volumes.iter().cloned())
            .collect();

        let summary = MutationBuilder::apply(&mut pod, &volumes, &affinities);

        info!(
            namespace = %namespace,
            pod = %pod_name,
            mode = ?mode,
            datasets = claims.len(),
            mounts = summary.mounts,
            required = summary.required,
            preferred = summary.preferred,
            "injected cache affinity"
        );

        let localities = claims.into_iter().map(|r| r.locality).collect();
        Decision {
            pod,
            mode,
            localities,
            summary,
        }
    }
}

/// Scheduling affinity injector
#[derive(Clone)]
pub struct Injector {
    store: Arc<dyn ObjectStore>,
}

impl Injector {
    /// Create an injector reading from `store`
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Load the cluster-wide tiered locality policy
    pub async fn load_policy(&self) -> Result<Option<TieredLocalityPolicy>, Error> {
        self.store.get_tiered_locality_policy().await
    }

    /// Decide how to admit `pod` in `namespace` under a known policy
    ///
    /// Pods without dataset claims pass through unchanged. Serverless Pods
    /// awaiting their sidecar are resolved but not mutated.
    pub async fn decide(
        &self,
        namespace: &str,
        pod: Pod,
        policy: Option<&TieredLocalityPolicy>,
    ) -> Result<Decision, Error> {
        Ok(self.resolve(namespace, pod).await?.apply(policy))
    }

    /// Resolve and correlate every dataset claim `pod` mounts
    ///
    /// Any failure rejects the Pod before it is touched.
    pub async fn resolve(&self, namespace: &str, pod: Pod) -> Result<Resolution, Error> {
        let mode = InjectionMode::from_labels(&pod.metadata.labels.clone().unwrap_or_default());

        let claims = claim_volumes(&pod);
        if claims.is_empty() {
            debug!(namespace = %namespace, pod = %pod_name(&pod), "pod mounts no claims");
        }

        let resolved: Vec<ResolvedClaim> = try_join_all(
            claims
                .into_iter()
                .map(|(claim, volumes)| self.resolve_claim(namespace, claim, volumes)),
        )
        .await?
        .into_iter()
        .flatten()
        .collect();

        Ok(Resolution {
            namespace: namespace.to_string(),
            pod,
            mode,
            claims: resolved,
        })
    }

    /// Resolve one claim; `None` when it is not dataset-backed
    async fn resolve_claim(
        &self,
        namespace: &str,
        claim_name: String,
        volumes: BTreeSet<String>,
    ) -> Result<Option<ResolvedClaim>, Error> {
        let store = self.store.as_ref();

        let claim = store
            .get_claim(namespace, &claim_name)
            .await?
            .ok_or_else(|| Error::not_found("PersistentVolumeClaim", namespace, &claim_name))?;

        if !is_dataset_claim(&claim) {
            debug!(namespace = %namespace, claim = %claim_name, "claim is not dataset-backed");
            return Ok(None);
        }

        let resolved = DatasetResolver::new(store)
            .resolve(namespace, &claim_name)
            .await?;
        let locality = CacheLocalityCorrelator::new(store)
            .correlate(&claim, &resolved)
            .await?;

        Ok(Some(ResolvedClaim {
            claim: claim_name,
            volumes,
            locality,
        }))
    }
}

/// Claims mounted by the Pod, with the Pod volumes referencing each
fn claim_volumes(pod: &Pod) -> BTreeMap<String, BTreeSet<String>> {
    let mut claims: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let volumes = pod.spec.iter().flat_map(|s| s.volumes.iter().flatten());
    for volume in volumes {
        if let Some(source) = &volume.persistent_volume_claim {
            claims
                .entry(source.claim_name.clone())
                .or_default()
                .insert(volume.name.clone());
        }
    }
    claims
}

fn pod_name(pod: &Pod) -> String {
    pod.metadata
        .name
        .clone()
        .or_else(|| pod.metadata.generate_name.clone())
        .unwrap_or_default()
}
