//! Provider registry: provider id to adapter

use std::collections::BTreeMap;
use std::sync::Arc;

use crmsync_domain::{ProviderId, ProviderInfo};

use super::ports::ProviderAdapter;

/// Adapters keyed by provider id.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: BTreeMap<ProviderId, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its descriptor id, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        let id = adapter.descriptor().id.clone();
        self.adapters.insert(id, adapter);
    }

    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, provider: &ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider).cloned()
    }

    /// Unknown providers are never configured.
    pub fn is_configured(&self, provider: &ProviderId) -> bool {
        self.adapters.get(provider).is_some_and(|a| a.is_configured())
    }

    /// Registered providers ordered by id.
    pub fn supported_providers(&self) -> Vec<ProviderInfo> {
        self.adapters
            .values()
            .map(|adapter| {
                let descriptor = adapter.descriptor();
                ProviderInfo {
                    id: descriptor.id.clone(),
                    name: descriptor.name.clone(),
                    configured: adapter.is_configured(),
                    capabilities: descriptor.capabilities.clone(),
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry").field("providers", &self.adapters.keys()).finish()
    }
}
