//! Pod mutation
//!
//! Sets host-to-container mount propagation on dataset mounts and merges
//! dataset affinity into the Pod's node affinity. Existing terms are kept;
//! fluid terms are added only when not already present, so applying the
//! same mutation twice is a no-op.

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::{
    Affinity, Container, NodeAffinity, NodeSelector, NodeSelectorTerm, Pod,
};

use crate::affinity::DatasetAffinity;

/// Mount propagation mode for dataset mounts
pub const HOST_TO_CONTAINER: &str = "HostToContainer";

/// What one application changed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MutationSummary {
    /// Volume mounts whose propagation was set
    pub mounts: usize,
    /// Required expressions appended (counted per selector term)
    pub required: usize,
    /// Preferred terms appended
    pub preferred: usize,
}

impl MutationSummary {
    /// True when the Pod was left untouched
    pub fn is_empty(&self) -> bool {
        self.mounts == 0 && self.required == 0 && self.preferred == 0
    }
}

/// Applies dataset mount and affinity changes to a Pod
pub struct MutationBuilder;

impl MutationBuilder {
    /// Mutate `pod` in place
    ///
    /// `volumes` names the Pod volumes backed by resolved dataset claims.
    pub fn apply(
        pod: &mut Pod,
        volumes: &BTreeSet<String>,
        affinities: &[DatasetAffinity],
    ) -> MutationSummary {
        let Some(spec) = pod.spec.as_mut() else {
            return MutationSummary::default();
        };

        let mut summary = MutationSummary::default();

        let containers = spec
            .containers
            .iter_mut()
            .chain(spec.init_containers.iter_mut().flatten());
        for container in containers {
            summary.mounts += set_mount_propagation(container, volumes);
        }

        if affinities.iter().all(DatasetAffinity::is_empty) {
            return summary;
        }

        let node_affinity = spec
            .affinity
            .get_or_insert_with(Affinity::default)
            .node_affinity
            .get_or_insert_with(NodeAffinity::default);

        for affinity in affinities {
            summary.required += merge_required(node_affinity, affinity);
            summary.preferred += merge_preferred(node_affinity, affinity);
        }

        summary
    }
}

fn set_mount_propagation(container: &mut Container, volumes: &BTreeSet<String>) -> usize {
    let mut updated = 0;
    for mount in container.volume_mounts.iter_mut().flatten() {
        if volumes.contains(&mount.name)
            && mount.mount_propagation.as_deref() != Some(HOST_TO_CONTAINER)
        {
            mount.mount_propagation = Some(HOST_TO_CONTAINER.to_string());
            updated += 1;
        }
    }
    updated
}

/// Required expressions are ANDed into every existing selector term, since
/// selector terms are ORed by the scheduler.
fn merge_required(node_affinity: &mut NodeAffinity, affinity: &DatasetAffinity) -> usize {
    if affinity.required.is_empty() {
        return 0;
    }

    let selector = node_affinity
        .required_during_scheduling_ignored_during_execution
        .get_or_insert_with(NodeSelector::default);
    if selector.node_selector_terms.is_empty() {
        selector.node_selector_terms.push(NodeSelectorTerm::default());
    }

    let mut added = 0;
    for term in &mut selector.node_selector_terms {
        let expressions = term.match_expressions.get_or_insert_with(Vec::new);
        for requirement in &affinity.required {
            if !expressions.contains(requirement) {
                expressions.push(requirement.clone());
                added += 1;
            }
        }
    }
    added
}

fn merge_preferred(node_affinity: &mut NodeAffinity, affinity: &DatasetAffinity) -> usize {
    if affinity.preferred.is_empty() {
        return 0;
    }

    let terms = node_affinity
        .preferred_during_scheduling_ignored_during_execution
        .get_or_insert_with(Vec::new);

    let mut added = 0;
    for term in &affinity.preferred {
        if !terms.contains(term) {
            terms.push(term.clone());
            added += 1;
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affinity::AffinityPolicyEngine;
    use crate::testing::{node_and_zone_policy, pod};
    use fluid_common::crd::DatasetRef;
    use fluid_common::labels::SchedulingStrictness;
    use k8s_openapi::api::core::v1::{NodeSelectorRequirement, VolumeMount};

    fn volumes(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn affinity_for(name: &str) -> DatasetAffinity {
        let policy = node_and_zone_policy();
        AffinityPolicyEngine::new(Some(&policy))
            .compute(&DatasetRef::new("big-data", name), None)
    }

    fn required_terms(pod: &Pod) -> Vec<NodeSelectorTerm> {
        pod.spec
            .as_ref()
            .and_then(|s| s.affinity.as_ref())
            .and_then(|a| a.node_affinity.as_ref())
            .and_then(|n| n.required_during_scheduling_ignored_during_execution.as_ref())
            .map(|s| s.node_selector_terms.clone())
            .unwrap_or_default()
    }

    fn propagation(pod: &Pod, container: usize) -> Vec<Option<String>> {
        pod.spec.as_ref().unwrap().containers[container]
            .volume_mounts
            .iter()
            .flatten()
            .map(|m| m.mount_propagation.clone())
            .collect()
    }

    #[test]
    fn sets_propagation_only_on_dataset_mounts() {
        let mut pod = pod("big-data", &[], &[("dataset", "done"), ("scratch", "plain")]);

        let summary = MutationBuilder::apply(&mut pod, &volumes(&["dataset"]), &[]);

        assert_eq!(summary.mounts, 1);
        assert_eq!(
            propagation(&pod, 0),
            vec![Some(HOST_TO_CONTAINER.to_string()), None]
        );
        assert!(pod.spec.as_ref().unwrap().affinity.is_none());
    }

    #[test]
    fn init_containers_are_mutated_too() {
        let mut pod = pod("big-data", &[], &[("dataset", "done")]);
        let spec = pod.spec.as_mut().unwrap();
        spec.init_containers = Some(vec![Container {
            name: "warmup".to_string(),
            volume_mounts: Some(vec![VolumeMount {
                name: "dataset".to_string(),
                mount_path: "/warm".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }]);

        let summary = MutationBuilder::apply(&mut pod, &volumes(&["dataset"]), &[]);

        assert_eq!(summary.mounts, 2);
        let init = &pod.spec.as_ref().unwrap().init_containers.as_ref().unwrap()[0];
        assert_eq!(
            init.volume_mounts.as_ref().unwrap()[0].mount_propagation.as_deref(),
            Some(HOST_TO_CONTAINER)
        );
    }

    #[test]
    fn creates_affinity_when_pod_has_none() {
        let mut pod = pod("big-data", &[], &[("dataset", "done")]);

        let summary =
            MutationBuilder::apply(&mut pod, &volumes(&["dataset"]), &[affinity_for("done")]);

        assert_eq!(summary.required, 1);
        assert_eq!(summary.preferred, 1);
        let terms = required_terms(&pod);
        assert_eq!(terms.len(), 1);
        assert_eq!(
            terms[0].match_expressions.as_ref().unwrap()[0].key,
            "fluid.io/node"
        );
    }

    /// Story: user-supplied selector terms are kept, and the dataset
    /// requirement is ANDed into each of them
    #[test]
    fn story_existing_required_terms_are_preserved() {
        let gpu = NodeSelectorRequirement {
            key: "gpu".to_string(),
            operator: "Exists".to_string(),
            values: None,
        };
        let arm = NodeSelectorRequirement {
            key: "kubernetes.io/arch".to_string(),
            operator: "In".to_string(),
            values: Some(vec!["arm64".to_string()]),
        };
        let mut pod = pod("big-data", &[], &[("dataset", "done")]);
        pod.spec.as_mut().unwrap().affinity = Some(Affinity {
            node_affinity: Some(NodeAffinity {
                required_during_scheduling_ignored_during_execution: Some(NodeSelector {
                    node_selector_terms: vec![
                        NodeSelectorTerm {
                            match_expressions: Some(vec![gpu.clone()]),
                            match_fields: None,
                        },
                        NodeSelectorTerm {
                            match_expressions: Some(vec![arm.clone()]),
                            match_fields: None,
                        },
                    ],
                }),
                ..Default::default()
            }),
            ..Default::default()
        });

        let summary =
            MutationBuilder::apply(&mut pod, &volumes(&["dataset"]), &[affinity_for("done")]);

        assert_eq!(summary.required, 2);
        let terms = required_terms(&pod);
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].match_expressions.as_ref().unwrap()[0], gpu);
        assert_eq!(terms[1].match_expressions.as_ref().unwrap()[0], arm);
        for term in &terms {
            assert_eq!(term.match_expressions.as_ref().unwrap().len(), 2);
        }
    }

    /// Story: admission replays must not grow the Pod
    #[test]
    fn story_apply_is_idempotent() {
        let mut pod = pod("big-data", &[], &[("dataset", "done"), ("other", "other")]);
        let policy = node_and_zone_policy();
        let engine = AffinityPolicyEngine::new(Some(&policy));
        let affinities = vec![
            engine.compute(
                &DatasetRef::new("big-data", "done"),
                Some(SchedulingStrictness::Required),
            ),
            engine.compute(&DatasetRef::new("big-data", "other"), None),
        ];
        let vols = volumes(&["dataset", "other"]);

        let first = MutationBuilder::apply(&mut pod, &vols, &affinities);
        let snapshot = pod.clone();
        let second = MutationBuilder::apply(&mut pod, &vols, &affinities);

        assert!(!first.is_empty());
        assert!(second.is_empty());
        assert_eq!(pod, snapshot);
    }

    #[test]
    fn same_dataset_twice_adds_terms_once() {
        let mut pod = pod("big-data", &[], &[("a", "done"), ("b", "done")]);

        let summary = MutationBuilder::apply(
            &mut pod,
            &volumes(&["a", "b"]),
            &[affinity_for("done"), affinity_for("done")],
        );

        assert_eq!(summary.mounts, 2);
        assert_eq!(summary.required, 1);
        assert_eq!(summary.preferred, 1);
    }

    #[test]
    fn empty_affinity_leaves_affinity_untouched() {
        let mut pod = pod("big-data", &[], &[("dataset", "done")]);

        MutationBuilder::apply(
            &mut pod,
            &volumes(&["dataset"]),
            &[DatasetAffinity::default()],
        );

        assert!(pod.spec.as_ref().unwrap().affinity.is_none());
    }
}
