//! Read-only object lookups
//!
//! Provides a trait-based abstraction over the cluster objects the injector
//! reads, allowing tests to mock Kubernetes while production code uses real
//! API calls. Every lookup returns `Ok(None)` when the object does not exist;
//! callers decide whether absence is fatal.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolume, PersistentVolumeClaim};
use kube::api::{Api, DynamicObject};
use kube::Client;
use tracing::trace;

#[cfg(test)]
use mockall::automock;

use fluid_common::crd::{fluid_api_resource, Dataset, RuntimeKind, RuntimeRecord};
use fluid_common::{Error, FLUID_SYSTEM_NAMESPACE, TIERED_LOCALITY_CONFIGMAP};

use crate::policy::TieredLocalityPolicy;

/// Trait abstracting the object reads needed for one admission decision
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Get a Dataset
    async fn get_dataset(&self, namespace: &str, name: &str) -> Result<Option<Dataset>, Error>;

    /// Get the runtime object of the given kind (named after its dataset)
    async fn get_runtime(
        &self,
        namespace: &str,
        name: &str,
        kind: RuntimeKind,
    ) -> Result<Option<RuntimeRecord>, Error>;

    /// Get a PersistentVolumeClaim
    async fn get_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PersistentVolumeClaim>, Error>;

    /// Get a (cluster-scoped) PersistentVolume
    async fn get_volume(&self, name: &str) -> Result<Option<PersistentVolume>, Error>;

    /// Get a DaemonSet
    async fn get_daemon_set(&self, namespace: &str, name: &str)
        -> Result<Option<DaemonSet>, Error>;

    /// Get the cluster-wide tiered locality policy
    ///
    /// `Ok(None)` means the cluster has no locality preference.
    async fn get_tiered_locality_policy(&self) -> Result<Option<TieredLocalityPolicy>, Error>;
}

/// `ObjectStore` backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeObjectStore {
    client: Client,
    policy_namespace: String,
    policy_name: String,
}

impl KubeObjectStore {
    /// Create a store reading the policy from `fluid-system/tiered-locality-config`
    pub fn new(client: Client) -> Self {
        Self {
            client,
            policy_namespace: FLUID_SYSTEM_NAMESPACE.to_string(),
            policy_name: TIERED_LOCALITY_CONFIGMAP.to_string(),
        }
    }

    /// Read the tiered locality policy from a different ConfigMap
    pub fn with_policy_location(
        mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.policy_namespace = namespace.into();
        self.policy_name = name.into();
        self
    }

    fn fluid_api(&self, namespace: &str, kind: &str, plural: &str) -> Api<DynamicObject> {
        let ar = fluid_api_resource(kind, plural);
        Api::namespaced_with(self.client.clone(), namespace, &ar)
    }
}

#[async_trait]
impl ObjectStore for KubeObjectStore {
    async fn get_dataset(&self, namespace: &str, name: &str) -> Result<Option<Dataset>, Error> {
        trace!(namespace = %namespace, name = %name, "get dataset");
        self.fluid_api(namespace, "Dataset", "datasets")
            .get_opt(name)
            .await?
            .map(Dataset::try_from)
            .transpose()
    }

    async fn get_runtime(
        &self,
        namespace: &str,
        name: &str,
        kind: RuntimeKind,
    ) -> Result<Option<RuntimeRecord>, Error> {
        trace!(namespace = %namespace, name = %name, runtime = %kind, "get runtime");
        let obj = self
            .fluid_api(namespace, kind.crd_kind(), &kind.crd_plural())
            .get_opt(name)
            .await?;
        Ok(obj.map(|o| RuntimeRecord::from_object(kind, &o)))
    }

    async fn get_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PersistentVolumeClaim>, Error> {
        trace!(namespace = %namespace, name = %name, "get claim");
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_volume(&self, name: &str) -> Result<Option<PersistentVolume>, Error> {
        trace!(name = %name, "get volume");
        let api: Api<PersistentVolume> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn get_daemon_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DaemonSet>, Error> {
        trace!(namespace = %namespace, name = %name, "get daemonset");
        let api: Api<DaemonSet> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_tiered_locality_policy(&self) -> Result<Option<TieredLocalityPolicy>, Error> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &self.policy_namespace);
        match api.get_opt(&self.policy_name).await? {
            Some(cm) => TieredLocalityPolicy::from_config_map(&cm),
            None => {
                trace!(
                    namespace = %self.policy_namespace,
                    name = %self.policy_name,
                    "no tiered locality policy configured"
                );
                Ok(None)
            }
        }
    }
}
