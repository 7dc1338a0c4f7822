//! Tiered locality policy
//!
//! The policy lives in a ConfigMap (`fluid-system/tiered-locality-config`,
//! key `tieredLocality`) as YAML:
//!
//! ```yaml
//! preferred:
//!   - name: fluid.io/node
//!     weight: 100
//!   - name: topology.kubernetes.io/zone
//!     weight: 50
//! required:
//!   - fluid.io/node
//! ```
//!
//! Each entry names a node label key. A dataset's cache nodes carry every
//! key with the value `<namespace>-<name>` of the dataset.

use k8s_openapi::api::core::v1::ConfigMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use fluid_common::{Error, TIERED_LOCALITY_DATA_KEY};

/// Valid range for preferred weights, as accepted by the scheduler
const WEIGHT_RANGE: std::ops::RangeInclusive<i32> = 1..=100;

/// A soft locality tier
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct PreferredLocality {
    /// Node label key
    pub name: String,
    /// Scheduler weight (1-100)
    pub weight: i32,
}

/// Cluster-wide locality tiers
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TieredLocalityPolicy {
    /// Soft tiers, in the order they are emitted
    #[serde(default)]
    pub preferred: Vec<PreferredLocality>,

    /// Label keys the Pod must always match
    #[serde(default)]
    pub required: Vec<String>,
}

impl TieredLocalityPolicy {
    /// Parse and validate the YAML policy document
    pub fn parse(yaml: &str) -> Result<Self, Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let policy: Self =
            serde_yaml::from_str(yaml).map_err(|e| Error::invalid_policy(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Read the policy from its ConfigMap
    ///
    /// Returns `Ok(None)` when the ConfigMap carries no policy key.
    pub fn from_config_map(cm: &ConfigMap) -> Result<Option<Self>, Error> {
        let Some(raw) = cm
            .data
            .as_ref()
            .and_then(|d| d.get(TIERED_LOCALITY_DATA_KEY))
        else {
            debug!(
                configmap = cm.metadata.name.as_deref().unwrap_or_default(),
                key = TIERED_LOCALITY_DATA_KEY,
                "configmap has no tiered locality key"
            );
            return Ok(None);
        };
        Self::parse(raw).map(Some)
    }

    /// True when neither tier names a key
    pub fn is_empty(&self) -> bool {
        self.preferred.is_empty() && self.required.is_empty()
    }

    /// Weight of a preferred key, if the key is a preferred tier
    pub fn preferred_weight(&self, key: &str) -> Option<i32> {
        self.preferred
            .iter()
            .find(|p| p.name == key)
            .map(|p| p.weight)
    }

    fn validate(&self) -> Result<(), Error> {
        for key in &self.required {
            if key.is_empty() {
                return Err(Error::invalid_policy("required tier with empty label key"));
            }
        }
        for tier in &self.preferred {
            if tier.name.is_empty() {
                return Err(Error::invalid_policy("preferred tier with empty label key"));
            }
            if !WEIGHT_RANGE.contains(&tier.weight) {
                return Err(Error::invalid_policy(format!(
                    "preferred tier '{}' has weight {}, must be between {} and {}",
                    tier.name,
                    tier.weight,
                    WEIGHT_RANGE.start(),
                    WEIGHT_RANGE.end()
                )));
            }
        }
        Ok(())
    }
}
