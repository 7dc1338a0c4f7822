//! Claim-to-dataset resolution
//!
//! A claim is named after its Dataset. A physical Dataset is used as-is; a
//! reference Dataset forwards to exactly one physical Dataset, possibly in
//! another namespace. Chains of references are rejected.

use tracing::debug;

use fluid_common::crd::{Dataset, DatasetLocality, DatasetRef, RuntimeKind};
use fluid_common::Error;

use crate::store::ObjectStore;

/// Outcome of resolving one claim
#[derive(Clone, Debug)]
pub struct ResolvedDataset {
    /// The Dataset that owns the cache
    pub effective: Dataset,
    /// Runtime kind serving the effective Dataset
    pub runtime_kind: RuntimeKind,
    /// The reference Dataset the claim named, when one hop was followed
    pub referenced_by: Option<DatasetRef>,
}

impl ResolvedDataset {
    /// Pointer to the effective Dataset
    pub fn effective_ref(&self) -> DatasetRef {
        self.effective.to_ref()
    }
}

/// Resolves claims to their effective Dataset and runtime kind
pub struct DatasetResolver<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> DatasetResolver<'a> {
    /// Create a resolver reading from `store`
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Resolve the Dataset backing claim `namespace/name`
    pub async fn resolve(&self, namespace: &str, name: &str) -> Result<ResolvedDataset, Error> {
        let dataset = self
            .store
            .get_dataset(namespace, name)
            .await?
            .ok_or_else(|| Error::not_found("Dataset", namespace, name))?;

        let locality = dataset
            .locality()
            .map_err(|msg| Error::unresolved_reference(namespace, name, msg))?;

        let (effective, runtime_kind, referenced_by) = match locality {
            DatasetLocality::Physical => {
                let kind = runtime_kind_of(&dataset)
                    .map_err(|reason| Error::not_bound(namespace, name, reason))?;
                (dataset, kind, None)
            }
            DatasetLocality::Reference(target) => {
                let (physical, kind) = self.follow_reference(&dataset, &target).await?;
                (physical, kind, Some(dataset.to_ref()))
            }
        };

        if self
            .store
            .get_runtime(effective.namespace(), effective.name(), runtime_kind)
            .await?
            .is_none()
        {
            return Err(Error::not_bound(
                effective.namespace(),
                effective.name(),
                format!("{} runtime object does not exist", runtime_kind.crd_kind()),
            ));
        }

        debug!(
            claim = %format!("{namespace}/{name}"),
            dataset = %effective.to_ref(),
            runtime = %runtime_kind,
            via_reference = referenced_by.is_some(),
            "resolved dataset"
        );

        Ok(ResolvedDataset {
            effective,
            runtime_kind,
            referenced_by,
        })
    }

    async fn follow_reference(
        &self,
        reference: &Dataset,
        target: &DatasetRef,
    ) -> Result<(Dataset, RuntimeKind), Error> {
        let (ns, name) = (reference.namespace(), reference.name());

        let physical = self
            .store
            .get_dataset(&target.namespace, &target.name)
            .await?
            .ok_or_else(|| {
                Error::unresolved_reference(ns, name, format!("target dataset {target} not found"))
            })?;

        match physical.locality() {
            Ok(DatasetLocality::Physical) => {}
            Ok(DatasetLocality::Reference(_)) => {
                return Err(Error::reference_chain_too_deep(ns, name, target.to_string()));
            }
            Err(msg) => {
                return Err(Error::unresolved_reference(
                    ns,
                    name,
                    format!("target dataset {target}: {msg}"),
                ));
            }
        }

        let kind = runtime_kind_of(&physical).map_err(|reason| {
            Error::unresolved_reference(ns, name, format!("target dataset {target}: {reason}"))
        })?;

        Ok((physical, kind))
    }
}

/// Runtime kind of a bound Dataset
///
/// Only the first runtime recorded in status is used.
fn runtime_kind_of(dataset: &Dataset) -> Result<RuntimeKind, String> {
    if !dataset.is_bound() {
        return Err(format!("dataset phase is {:?}", dataset.phase()));
    }
    let runtime = dataset
        .runtimes()
        .first()
        .ok_or_else(|| "dataset has no runtime in status".to_string())?;
    runtime
        .runtime_type
        .parse()
        .map_err(|e: fluid_common::crd::UnknownRuntimeKind| e.to_string())
}
