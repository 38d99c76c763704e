// Job Configuration - immutable description of desired output

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::capability::{AspectRatio, Capability, Quality};
use crate::domain::error::{DomainError, Result};

/// Maximum output duration in seconds
pub const MAX_DURATION_SECS: f64 = 300.0;

/// Immutable description of the desired generation output.
///
/// Every field required by the chosen backend must be present before
/// dispatch; `validate` enforces the backend-independent part of that
/// invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub prompt: String,
    #[serde(default)]
    pub reference_image: Option<String>,
    /// Input asset references (asset IDs resolved by the caller)
    #[serde(default)]
    pub input_assets: Vec<String>,
    pub duration_secs: f64,
    pub quality: Quality,
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub camera_movement: Option<String>,
    #[serde(default = "default_motion_strength")]
    pub motion_strength: f32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub required_capabilities: BTreeSet<Capability>,
    /// Free-form backend-specific parameters, forwarded verbatim
    #[serde(default)]
    pub extra_params: serde_json::Map<String, serde_json::Value>,
}

fn default_motion_strength() -> f32 {
    0.5
}

impl JobConfig {
    /// Minimal constructor; capabilities are derived from the input shape
    /// (reference image present -> image-to-video, otherwise text-to-video).
    pub fn new(
        prompt: impl Into<String>,
        duration_secs: f64,
        quality: Quality,
        aspect_ratio: AspectRatio,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            reference_image: None,
            input_assets: Vec::new(),
            duration_secs,
            quality,
            aspect_ratio,
            style: None,
            camera_movement: None,
            motion_strength: default_motion_strength(),
            seed: None,
            required_capabilities: BTreeSet::from([Capability::TextToVideo]),
            extra_params: serde_json::Map::new(),
        }
    }

    pub fn with_reference_image(mut self, asset_ref: impl Into<String>) -> Self {
        self.reference_image = Some(asset_ref.into());
        self.required_capabilities.insert(Capability::ImageToVideo);
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.required_capabilities.insert(capability);
        self
    }

    /// Validate the backend-independent invariants of this configuration.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(DomainError::ValidationError("prompt must not be empty".into()));
        }
        if self.duration_secs <= 0.0 || self.duration_secs > MAX_DURATION_SECS {
            return Err(DomainError::ValidationError(format!(
                "duration must be in (0, {}] seconds, got {}",
                MAX_DURATION_SECS, self.duration_secs
            )));
        }
        if !(0.0..=1.0).contains(&self.motion_strength) {
            return Err(DomainError::ValidationError(format!(
                "motion_strength must be in [0, 1], got {}",
                self.motion_strength
            )));
        }
        if self.required_capabilities.is_empty() {
            return Err(DomainError::ValidationError(
                "required_capabilities must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> JobConfig {
        JobConfig::new("a fox leaps over a stream", 5.0, Quality::FullHd1080, AspectRatio::Landscape)
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let mut config = valid_config();
        config.prompt = "   ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_bounds() {
        let mut config = valid_config();
        config.duration_secs = 0.0;
        assert!(config.validate().is_err());

        config.duration_secs = MAX_DURATION_SECS + 1.0;
        assert!(config.validate().is_err());

        config.duration_secs = MAX_DURATION_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_motion_strength_bounds() {
        let mut config = valid_config();
        config.motion_strength = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reference_image_adds_capability() {
        let config = valid_config().with_reference_image("asset-42");
        assert!(config.required_capabilities.contains(&Capability::ImageToVideo));
    }

    #[test]
    fn test_serde_round_trip_uses_wire_names() {
        let config = valid_config();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["quality"], "1080p");
        assert_eq!(json["aspect_ratio"], "16:9");
        let back: JobConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.quality, Quality::FullHd1080);
    }
}
