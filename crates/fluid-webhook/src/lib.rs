//! Fluid scheduling webhook
//!
//! Mutating admission webhook that resolves the datasets a Pod mounts and
//! injects cache node affinity plus `HostToContainer` mount propagation.
//!
//! - [`config`] - command line and environment
//! - [`handler`] - AdmissionReview handling and JSON patch generation
//! - [`server`] - axum router and TLS listener
//! - [`error`] - transport level errors

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod handler;
pub mod server;

pub use config::{Cli, FailurePolicy, TlsFiles};
pub use error::WebhookError;
pub use handler::{mutate_handler, mutate_pod, WebhookState, MUTATE_PODS_PATH};
pub use server::{start_server, webhook_router, ServerConfig};
