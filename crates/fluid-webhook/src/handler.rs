//! Pod Mutation Webhook
//!
//! Handles AdmissionReview requests for Pods, injecting mount propagation
//! and dataset cache node affinity computed by the scheduling injector.

use std::sync::Arc;

use axum::{extract::State, Json};
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::DynamicObject,
    core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview},
};
use tracing::{debug, error, info, warn};

use fluid_common::Error;
use fluid_scheduling::{Decision, Injector};

use crate::config::FailurePolicy;
use crate::error::WebhookError;

/// Path the MutatingWebhookConfiguration points at
pub const MUTATE_PODS_PATH: &str = "/mutate-fluid-io-v1alpha1-schedulepod";

/// Shared state for webhook handlers
#[derive(Clone)]
pub struct WebhookState {
    /// Scheduling injector
    pub injector: Injector,
    /// What to do when resolution fails
    pub failure_policy: FailurePolicy,
}

impl WebhookState {
    /// Create webhook state
    pub fn new(injector: Injector, failure_policy: FailurePolicy) -> Self {
        Self {
            injector,
            failure_policy,
        }
    }
}

/// Handle mutating admission review for Pods
pub async fn mutate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<Pod>>,
) -> Result<Json<AdmissionReview<DynamicObject>>, WebhookError> {
    let request: AdmissionRequest<Pod> = body.try_into().map_err(|e| {
        error!(error = %e, "Failed to parse admission request");
        WebhookError::InvalidReview(format!("{e}"))
    })?;

    let response = mutate_pod(&state, &request).await;
    Ok(Json(response.into_review()))
}

/// Process a single Pod admission request
pub async fn mutate_pod(
    state: &WebhookState,
    request: &AdmissionRequest<Pod>,
) -> AdmissionResponse {
    let uid = request.uid.clone();

    let Some(pod) = &request.object else {
        debug!(uid = %uid, "No pod object in request, allowing unchanged");
        return AdmissionResponse::from(request);
    };

    let namespace = pod
        .metadata
        .namespace
        .clone()
        .filter(|ns| !ns.is_empty())
        .or_else(|| request.namespace.clone())
        .unwrap_or_default();

    match decide(state, &namespace, pod).await {
        Ok(decision) => respond(request, pod, &decision),
        Err(err) => {
            warn!(
                uid = %uid,
                namespace = %namespace,
                pod = ?pod.metadata.name,
                reason = err.reason(),
                error = %err,
                failure_policy = ?state.failure_policy,
                "Dataset resolution failed"
            );
            match state.failure_policy {
                FailurePolicy::Deny => {
                    AdmissionResponse::from(request).deny(format!("{}: {err}", err.reason()))
                }
                FailurePolicy::Allow => AdmissionResponse::from(request),
            }
        }
    }
}

/// Resolve the Pod's claims, then read the policy only if it will be used
async fn decide(state: &WebhookState, namespace: &str, pod: &Pod) -> Result<Decision, Error> {
    let resolution = state.injector.resolve(namespace, pod.clone()).await?;
    if !resolution.needs_policy() {
        return Ok(resolution.apply(None));
    }
    let policy = state.injector.load_policy().await?;
    Ok(resolution.apply(policy.as_ref()))
}

/// Turn a decision into a response carrying the JSON patch, if any
fn respond(
    request: &AdmissionRequest<Pod>,
    original: &Pod,
    decision: &Decision,
) -> AdmissionResponse {
    let uid = &request.uid;

    if decision.needs_sidecar() {
        info!(
            uid = %uid,
            datasets = decision.localities.len(),
            "Pod left for sidecar injection"
        );
    }
    if !decision.is_mutated() {
        return AdmissionResponse::from(request);
    }

    let patch = match pod_patch(original, &decision.pod) {
        Ok(patch) => patch,
        Err(e) => {
            error!(uid = %uid, error = %e, "Failed to diff pod");
            return AdmissionResponse::from(request).deny(format!("patch generation error: {e}"));
        }
    };

    info!(uid = %uid, patch_ops = patch.0.len(), "Applying patch to pod");

    match AdmissionResponse::from(request).with_patch(patch) {
        Ok(response) => response,
        Err(e) => {
            error!(uid = %uid, error = %e, "Failed to serialize patch");
            AdmissionResponse::from(request).deny(format!("patch serialization error: {e}"))
        }
    }
}

/// RFC 6902 patch turning `before` into `after`
fn pod_patch(before: &Pod, after: &Pod) -> Result<json_patch::Patch, serde_json::Error> {
    let before = serde_json::to_value(before)?;
    let after = serde_json::to_value(after)?;
    Ok(json_patch::diff(&before, &after))
}
