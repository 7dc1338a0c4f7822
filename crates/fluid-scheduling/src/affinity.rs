//! Node affinity for dataset cache locality
//!
//! Turns the tiered locality policy into node selector requirements for one
//! effective dataset. Every term matches `<key> In [<namespace>-<name>]`.
//!
//! A per-workload `fluid.io/dataset.<name>.sched` label can promote the
//! preferred tiers to required. It never demotes a required tier.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    NodeSelectorRequirement, NodeSelectorTerm, PreferredSchedulingTerm,
};

use fluid_common::crd::DatasetRef;
use fluid_common::labels::{strictness_override, SchedulingStrictness};

use crate::policy::TieredLocalityPolicy;

const OPERATOR_IN: &str = "In";

/// Node affinity terms for one effective dataset
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DatasetAffinity {
    /// Requirements every candidate node must match
    pub required: Vec<NodeSelectorRequirement>,
    /// Weighted soft preferences
    pub preferred: Vec<PreferredSchedulingTerm>,
}

impl DatasetAffinity {
    /// True when there is nothing to inject
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.preferred.is_empty()
    }
}

/// Computes dataset affinity from the cluster policy
pub struct AffinityPolicyEngine<'a> {
    policy: Option<&'a TieredLocalityPolicy>,
}

impl<'a> AffinityPolicyEngine<'a> {
    /// Create an engine for `policy`; `None` yields no terms at all
    pub fn new(policy: Option<&'a TieredLocalityPolicy>) -> Self {
        Self { policy }
    }

    /// Compute affinity for `dataset` under an optional strictness override
    pub fn compute(
        &self,
        dataset: &DatasetRef,
        strictness: Option<SchedulingStrictness>,
    ) -> DatasetAffinity {
        let Some(policy) = self.policy else {
            return DatasetAffinity::default();
        };
        let value = dataset.locality_value();
        let promote = strictness == Some(SchedulingStrictness::Required);

        let promoted = policy
            .preferred
            .iter()
            .filter(|_| promote)
            .map(|p| p.name.as_str());
        let mut required_keys: Vec<&str> = Vec::new();
        for key in policy.required.iter().map(String::as_str).chain(promoted) {
            if !required_keys.contains(&key) {
                required_keys.push(key);
            }
        }

        let preferred = if promote {
            Vec::new()
        } else {
            policy
                .preferred
                .iter()
                .filter(|p| !required_keys.contains(&p.name.as_str()))
                .map(|p| PreferredSchedulingTerm {
                    weight: p.weight,
                    preference: NodeSelectorTerm {
                        match_expressions: Some(vec![requirement(&p.name, &value)]),
                        match_fields: None,
                    },
                })
                .collect()
        };

        DatasetAffinity {
            required: required_keys
                .into_iter()
                .map(|key| requirement(key, &value))
                .collect(),
            preferred,
        }
    }
}

/// Strictness override for a resolved claim
///
/// The label is read under both the dataset name the claim refers to and
/// the effective dataset name. `required` under either name wins.
pub fn workload_strictness(
    labels: &BTreeMap<String, String>,
    claim_dataset: &str,
    effective: &DatasetRef,
) -> Option<SchedulingStrictness> {
    match (
        strictness_override(labels, claim_dataset),
        strictness_override(labels, &effective.name),
    ) {
        (Some(SchedulingStrictness::Required), _) | (_, Some(SchedulingStrictness::Required)) => {
            Some(SchedulingStrictness::Required)
        }
        (by_claim, by_effective) => by_claim.or(by_effective),
    }
}

fn requirement(key: &str, value: &str) -> NodeSelectorRequirement {
    NodeSelectorRequirement {
        key: key.to_string(),
        operator: OPERATOR_IN.to_string(),
        values: Some(vec![value.to_string()]),
    }
}
