// Backend Registry - capability-indexed catalog of adapters

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::domain::{BackendDescriptor, BackendId, JobConfig};
use crate::error::{AppError, Result};
use crate::port::BackendAdapter;

/// Capability-indexed catalog of backend adapters.
///
/// Registration and unregistration are atomic with respect to concurrent
/// lookups; readers never observe a half-updated registry.
#[derive(Default)]
pub struct BackendRegistry {
    adapters: RwLock<HashMap<BackendId, Arc<dyn BackendAdapter>>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend adapter under its descriptor id.
    ///
    /// # Errors
    /// `AppError::Conflict` if an adapter with the same id is already
    /// registered.
    pub fn register(&self, adapter: Arc<dyn BackendAdapter>) -> Result<()> {
        let descriptor = adapter.descriptor();
        let mut adapters = self
            .adapters
            .write()
            .map_err(|_| AppError::Internal("registry lock poisoned".into()))?;

        if adapters.contains_key(&descriptor.id) {
            return Err(AppError::Conflict(format!(
                "backend '{}' already registered",
                descriptor.id
            )));
        }

        info!(
            backend = %descriptor.id,
            capabilities = ?descriptor.capabilities,
            weight = descriptor.priority_weight,
            "Backend registered"
        );
        adapters.insert(descriptor.id, adapter);
        Ok(())
    }

    /// Remove an adapter; returns true if it existed.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self
            .adapters
            .write()
            .map(|mut a| a.remove(id).is_some())
            .unwrap_or(false);
        if removed {
            info!(backend = %id, "Backend unregistered");
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn BackendAdapter>> {
        self.adapters.read().ok()?.get(id).cloned()
    }

    /// Descriptors of all registered backends
    pub fn list(&self) -> Vec<BackendDescriptor> {
        self.adapters
            .read()
            .map(|a| a.values().map(|adapter| adapter.descriptor()).collect())
            .unwrap_or_default()
    }

    /// Find candidate backends able to satisfy a job configuration.
    ///
    /// Candidates are ordered by declared priority weight (descending), then
    /// by id for determinism. An empty result is a normal outcome, not an
    /// error; the generation engine handles it.
    pub fn find(&self, config: &JobConfig) -> Vec<Arc<dyn BackendAdapter>> {
        let adapters = match self.adapters.read() {
            Ok(a) => a,
            Err(_) => return Vec::new(),
        };

        let mut candidates: Vec<(BackendDescriptor, Arc<dyn BackendAdapter>)> = adapters
            .values()
            .filter_map(|adapter| {
                let descriptor = adapter.descriptor();
                (descriptor.supports(config) && adapter.validate_config(config))
                    .then(|| (descriptor, Arc::clone(adapter)))
            })
            .collect();

        candidates.sort_by(|(a, _), (b, _)| {
            b.priority_weight
                .cmp(&a.priority_weight)
                .then_with(|| a.id.cmp(&b.id))
        });

        debug!(
            candidates = candidates.len(),
            quality = %config.quality,
            aspect = %config.aspect_ratio,
            "Registry lookup"
        );

        candidates.into_iter().map(|(_, adapter)| adapter).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AspectRatio, Quality};
    use crate::port::backend_adapter::mocks::MockBackend;

    fn config() -> JobConfig {
        JobConfig::new("ocean waves", 5.0, Quality::FullHd1080, AspectRatio::Landscape)
    }

    #[test]
    fn test_register_and_get() {
        let registry = BackendRegistry::new();
        registry
            .register(Arc::new(MockBackend::new_success("luma")))
            .unwrap();

        assert!(registry.get("luma").is_some());
        assert!(registry.get("runway").is_none());
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn test_duplicate_registration_is_conflict() {
        let registry = BackendRegistry::new();
        registry
            .register(Arc::new(MockBackend::new_success("luma")))
            .unwrap();

        let err = registry
            .register(Arc::new(MockBackend::new_success("luma")))
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = BackendRegistry::new();
        registry
            .register(Arc::new(MockBackend::new_success("luma")))
            .unwrap();

        assert!(registry.unregister("luma"));
        assert!(!registry.unregister("luma"));
    }

    #[test]
    fn test_find_orders_by_weight_then_id() {
        let registry = BackendRegistry::new();
        registry
            .register(Arc::new(MockBackend::new_success("pika").with_weight(5)))
            .unwrap();
        registry
            .register(Arc::new(MockBackend::new_success("runway").with_weight(10)))
            .unwrap();
        registry
            .register(Arc::new(MockBackend::new_success("luma").with_weight(10)))
            .unwrap();

        let ids: Vec<String> = registry
            .find(&config())
            .iter()
            .map(|a| a.descriptor().id)
            .collect();
        assert_eq!(ids, vec!["luma", "runway", "pika"]);
    }

    #[test]
    fn test_find_empty_is_normal() {
        let registry = BackendRegistry::new();
        assert!(registry.find(&config()).is_empty());
    }

    #[test]
    fn test_find_filters_unsupported_quality() {
        let registry = BackendRegistry::new();
        let backend = MockBackend::new_success("limited");
        let mut descriptor = backend.descriptor();
        descriptor.qualities = std::collections::BTreeSet::from([Quality::Hd720]);
        registry
            .register(Arc::new(backend.with_descriptor(descriptor)))
            .unwrap();

        assert!(registry.find(&config()).is_empty());
    }
}
