//! Webhook HTTP(S) server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tracing::{info, warn};

use crate::config::TlsFiles;
use crate::error::WebhookError;
use crate::handler::{mutate_handler, WebhookState, MUTATE_PODS_PATH};

/// Time allowed for in-flight admission calls after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind the server
    pub addr: SocketAddr,
    /// PEM files; plain HTTP when absent
    pub tls: Option<TlsFiles>,
}

/// Create the webhook router
///
/// - POST /mutate-fluid-io-v1alpha1-schedulepod - inject cache affinity into Pods
/// - GET /healthz - liveness
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(MUTATE_PODS_PATH, post(mutate_handler))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

/// Serve the webhook until a shutdown signal arrives
pub async fn start_server(config: ServerConfig, state: Arc<WebhookState>) -> Result<(), WebhookError> {
    let app = webhook_router(state);

    let handle = Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone()));

    match config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .map_err(|e| WebhookError::Tls(format!("{}: {e}", tls.cert.display())))?;

            info!(addr = %config.addr, "Starting webhook server (TLS)");
            axum_server::bind_rustls(config.addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            warn!(addr = %config.addr, "No TLS files configured, serving plain HTTP");
            axum_server::bind(config.addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    info!("Webhook server stopped");
    Ok(())
}

async fn shutdown_on_signal(handle: Handle) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }

    info!("Shutdown signal received");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use async_trait::async_trait;
    use fluid_common::crd::{Dataset, RuntimeKind, RuntimeRecord};
    use fluid_common::Error;
    use fluid_scheduling::{Injector, ObjectStore, TieredLocalityPolicy};
    use k8s_openapi::api::apps::v1::DaemonSet;
    use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};

    use crate::config::FailurePolicy;

    /// Store with nothing in it
    struct EmptyStore;

    #[async_trait]
    impl ObjectStore for EmptyStore {
        async fn get_dataset(&self, _: &str, _: &str) -> Result<Option<Dataset>, Error> {
            Ok(None)
        }
        async fn get_runtime(
            &self,
            _: &str,
            _: &str,
            _: RuntimeKind,
        ) -> Result<Option<RuntimeRecord>, Error> {
            Ok(None)
        }
        async fn get_claim(&self, _: &str, _: &str) -> Result<Option<PersistentVolumeClaim>, Error> {
            Ok(None)
        }
        async fn get_volume(&self, _: &str) -> Result<Option<PersistentVolume>, Error> {
            Ok(None)
        }
        async fn get_daemon_set(&self, _: &str, _: &str) -> Result<Option<DaemonSet>, Error> {
            Ok(None)
        }
        async fn get_tiered_locality_policy(&self) -> Result<Option<TieredLocalityPolicy>, Error> {
            Ok(None)
        }
    }

    fn router() -> Router {
        let state = WebhookState::new(Injector::new(Arc::new(EmptyStore)), FailurePolicy::Deny);
        webhook_router(Arc::new(state))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let response = router()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"ok");
    }

    /// Story: the API server posts a review for a Pod whose claim is gone;
    /// the answer is a well-formed review that denies it
    #[tokio::test]
    async fn story_review_round_trip_denies_missing_claim() {
        let review = serde_json::json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "3f1c",
                "kind": {"group": "", "version": "v1", "kind": "Pod"},
                "resource": {"group": "", "version": "v1", "resource": "pods"},
                "namespace": "big-data",
                "operation": "CREATE",
                "userInfo": {},
                "object": {
                    "apiVersion": "v1",
                    "kind": "Pod",
                    "metadata": {"name": "test", "namespace": "big-data"},
                    "spec": {
                        "containers": [{"name": "test", "image": "test"}],
                        "volumes": [{
                            "name": "dataset",
                            "persistentVolumeClaim": {"claimName": "noexist"}
                        }]
                    }
                }
            }
        });

        let response = router()
            .oneshot(
                Request::post(MUTATE_PODS_PATH)
                    .header("content-type", "application/json")
                    .body(Body::from(review.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "AdmissionReview");
        assert_eq!(body["response"]["uid"], "3f1c");
        assert_eq!(body["response"]["allowed"], false);
        assert!(body["response"]["status"]["message"]
            .as_str()
            .unwrap()
            .contains("noexist"));
    }

    #[tokio::test]
    async fn review_without_request_is_rejected() {
        let review = serde_json::json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview"
        });

        let response = router()
            .oneshot(
                Request::post(MUTATE_PODS_PATH)
                    .header("content-type", "application/json")
                    .body(Body::from(review.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("invalid admission review"));
    }
}
