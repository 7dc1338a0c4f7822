//! Command line and environment configuration

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use fluid_common::telemetry::LogFormat;
use fluid_common::{FLUID_SYSTEM_NAMESPACE, TIERED_LOCALITY_CONFIGMAP};

/// What to do with a Pod whose datasets could not be resolved
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum FailurePolicy {
    /// Reject the Pod
    #[default]
    Deny,
    /// Admit the Pod unmodified
    Allow,
}

/// Fluid scheduling affinity webhook
#[derive(Parser, Debug, Clone)]
#[command(name = "fluid-webhook", version, about, long_about = None)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "WEBHOOK_LISTEN_ADDR", default_value = "0.0.0.0:9443")]
    pub listen_addr: SocketAddr,

    /// TLS certificate (PEM)
    #[arg(long, env = "WEBHOOK_TLS_CERT", requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    /// TLS private key (PEM)
    #[arg(long, env = "WEBHOOK_TLS_KEY", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,

    /// Namespace of the tiered locality ConfigMap
    #[arg(long, env = "FLUID_POLICY_NAMESPACE", default_value = FLUID_SYSTEM_NAMESPACE)]
    pub policy_namespace: String,

    /// Name of the tiered locality ConfigMap
    #[arg(long, env = "FLUID_POLICY_NAME", default_value = TIERED_LOCALITY_CONFIGMAP)]
    pub policy_name: String,

    /// Rejection behaviour when resolution fails
    #[arg(long, env = "WEBHOOK_FAILURE_POLICY", value_enum, default_value_t = FailurePolicy::Deny)]
    pub failure_policy: FailurePolicy,

    /// Log output format (json or text)
    #[arg(long, env = "LOG_FORMAT", default_value = "json")]
    pub log_format: LogFormat,
}

/// PEM files for the TLS listener
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsFiles {
    /// Certificate chain
    pub cert: PathBuf,
    /// Private key
    pub key: PathBuf,
}

impl Cli {
    /// TLS files, when both were given
    pub fn tls(&self) -> Option<TlsFiles> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some(TlsFiles {
                cert: cert.clone(),
                key: key.clone(),
            }),
            _ => None,
        }
    }
}
