// Backend Descriptor - adapter identity and declared capabilities

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::capability::{AspectRatio, Capability, Quality};
use crate::domain::job_config::JobConfig;

/// Backend identifier (stable, unique within a registry)
pub type BackendId = String;

/// Static description of one generation backend, consumed by the registry
/// at registration time. Owned exclusively by the registry once registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub id: BackendId,
    pub capabilities: BTreeSet<Capability>,
    pub qualities: BTreeSet<Quality>,
    pub aspect_ratios: BTreeSet<AspectRatio>,
    pub max_duration_secs: f64,
    /// Higher weight is preferred during candidate ordering
    #[serde(default)]
    pub priority_weight: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl BackendDescriptor {
    /// Check whether this backend can satisfy a job configuration.
    ///
    /// Eligibility: enabled, capability superset, supported quality and
    /// aspect ratio, duration within the declared maximum.
    pub fn supports(&self, config: &JobConfig) -> bool {
        self.enabled
            && config.required_capabilities.is_subset(&self.capabilities)
            && self.qualities.contains(&config.quality)
            && self.aspect_ratios.contains(&config.aspect_ratio)
            && config.duration_secs <= self.max_duration_secs
    }
}
