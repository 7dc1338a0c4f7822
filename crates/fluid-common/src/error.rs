//! Error types for dataset resolution and affinity injection
//!
//! Every variant rejects the admission of a single Pod; none of them is
//! fatal to the process. Variants carry the namespace/name of the object
//! that caused the failure so the denial message is actionable.

use thiserror::Error;

/// Main error type for resolution and injection
#[derive(Debug, Error)]
pub enum Error {
    /// A claim, dataset, or volume the Pod depends on does not exist
    #[error("{kind} {} not found", qualified_name(.namespace, .name))]
    NotFound {
        /// Object kind (PersistentVolumeClaim, Dataset, PersistentVolume)
        kind: String,
        /// Namespace, empty for cluster-scoped objects
        namespace: String,
        /// Object name
        name: String,
    },

    /// The dataset (or its claim) is not bound to a runtime yet
    #[error("{namespace}/{name} is not bound: {reason}")]
    NotBound {
        /// Namespace of the unbound object
        namespace: String,
        /// Name of the unbound object
        name: String,
        /// What is missing
        reason: String,
    },

    /// A reference dataset points at something that cannot be used
    #[error("reference dataset {namespace}/{name} cannot be resolved: {message}")]
    UnresolvedReference {
        /// Reference dataset namespace
        namespace: String,
        /// Reference dataset name
        name: String,
        /// Description of what is wrong with the target
        message: String,
    },

    /// A reference dataset points at another reference dataset
    #[error("reference dataset {namespace}/{name} points at reference dataset {target}; only one level of indirection is supported")]
    ReferenceChainTooDeep {
        /// Reference dataset namespace
        namespace: String,
        /// Reference dataset name
        name: String,
        /// The target, itself a reference (`namespace/name`)
        target: String,
    },

    /// Volume attributes disagree with the resolved runtime
    #[error("volume {volume} attributes mismatch: {message}")]
    AttributeMismatch {
        /// PersistentVolume name
        volume: String,
        /// Description of the mismatch
        message: String,
    },

    /// The runtime's fuse DaemonSet is not deployed
    #[error("caching DaemonSet {namespace}/{name} not found; the runtime is declared but not deployed")]
    ServingComponentNotFound {
        /// DaemonSet namespace
        namespace: String,
        /// DaemonSet name
        name: String,
    },

    /// The tiered locality policy exists but cannot be used
    #[error("invalid tiered locality policy: {message}")]
    InvalidPolicy {
        /// Description of what's invalid
        message: String,
    },

    /// An external object could not be decoded
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being decoded (if known)
        kind: Option<String>,
    },

    /// Kubernetes API error while reading an object
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },
}

/// `namespace/name`, or just `name` for cluster-scoped objects
fn qualified_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}/{name}")
    }
}

impl Error {
    /// Create a not-found error for a namespaced object
    pub fn not_found(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create a not-found error for a cluster-scoped object
    pub fn not_found_cluster_scoped(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::not_found(kind, "", name)
    }

    /// Create a not-bound error
    pub fn not_bound(
        namespace: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::NotBound {
            namespace: namespace.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an unresolved-reference error
    pub fn unresolved_reference(
        namespace: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::UnresolvedReference {
            namespace: namespace.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a reference-chain-too-deep error
    pub fn reference_chain_too_deep(
        namespace: impl Into<String>,
        name: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::ReferenceChainTooDeep {
            namespace: namespace.into(),
            name: name.into(),
            target: target.into(),
        }
    }

    /// Create an attribute-mismatch error
    pub fn attribute_mismatch(volume: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AttributeMismatch {
            volume: volume.into(),
            message: message.into(),
        }
    }

    /// Create a serving-component-not-found error
    pub fn serving_component_not_found(
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::ServingComponentNotFound {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create an invalid-policy error
    pub fn invalid_policy(msg: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Stable machine-readable reason, used in admission denials
    pub fn reason(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "NotFound",
            Error::NotBound { .. } => "NotBound",
            Error::UnresolvedReference { .. } => "UnresolvedReference",
            Error::ReferenceChainTooDeep { .. } => "ReferenceChainTooDeep",
            Error::AttributeMismatch { .. } => "AttributeMismatch",
            Error::ServingComponentNotFound { .. } => "ServingComponentNotFound",
            Error::InvalidPolicy { .. } => "InvalidPolicy",
            Error::Serialization { .. } => "Serialization",
            Error::Kube { .. } => "LookupFailed",
        }
    }

    /// Check if resubmitting the same Pod might succeed without any change
    /// to cluster objects
    ///
    /// Only transport failures qualify. Every other kind needs a controller
    /// (or a user) to create or fix an object first.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            _ => false,
        }
    }

    /// Get the kind of the missing object for not-found errors
    pub fn missing_kind(&self) -> Option<&str> {
        match self {
            Error::NotFound { kind, .. } => Some(kind),
            _ => None,
        }
    }
}
