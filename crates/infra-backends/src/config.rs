// Backend endpoint configuration (JSON file)

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use vidra_core::domain::{AspectRatio, Capability, Quality};
use vidra_core::error::{AppError, Result};

fn default_timeout_secs() -> u64 {
    120
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_max_wait_secs() -> u64 {
    600
}

fn default_enabled() -> bool {
    true
}

/// One backend endpoint definition, as loaded from the backends file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendEndpointConfig {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub capabilities: BTreeSet<Capability>,
    pub qualities: BTreeSet<Quality>,
    pub aspect_ratios: BTreeSet<AspectRatio>,
    pub max_duration_secs: f64,
    #[serde(default)]
    pub priority_weight: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Per-request HTTP timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Interval between status polls while a job is in flight
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Upper bound on the total wait for one generation
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

impl BackendEndpointConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("backend name must not be empty".into()));
        }
        if self.base_url.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "backend '{}' has no base_url",
                self.name
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "backend '{}' has no api_key",
                self.name
            )));
        }
        if self.capabilities.is_empty() {
            return Err(AppError::Validation(format!(
                "backend '{}' declares no capabilities",
                self.name
            )));
        }
        Ok(())
    }
}

/// Top-level structure of the backends file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendsFile {
    pub backends: Vec<BackendEndpointConfig>,
}

/// Load and validate backend definitions from a JSON file
pub fn load_backends_file(path: impl AsRef<Path>) -> Result<Vec<BackendEndpointConfig>> {
    let raw = std::fs::read_to_string(path.as_ref())
        .map_err(|e| AppError::Validation(format!("cannot read backends file: {}", e)))?;
    let file: BackendsFile = serde_json::from_str(&raw)?;
    for backend in &file.backends {
        backend.validate()?;
    }
    Ok(file.backends)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "backends": [
                {
                    "name": "luma",
                    "base_url": "https://api.example.com/v1",
                    "api_key": "key-123",
                    "capabilities": ["text_to_video", "image_to_video"],
                    "qualities": ["720p", "1080p"],
                    "aspect_ratios": ["16:9", "1:1"],
                    "max_duration_secs": 5.0,
                    "priority_weight": 10
                }
            ]
        }"#
    }

    #[test]
    fn test_parse_backends_file() {
        let file: BackendsFile = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(file.backends.len(), 1);
        let backend = &file.backends[0];
        assert_eq!(backend.name, "luma");
        assert!(backend.enabled);
        assert_eq!(backend.timeout_secs, 120);
        assert!(backend.capabilities.contains(&Capability::TextToVideo));
        backend.validate().unwrap();
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let mut file: BackendsFile = serde_json::from_str(sample_json()).unwrap();
        file.backends[0].api_key = String::new();
        assert!(file.backends[0].validate().is_err());
    }
}
