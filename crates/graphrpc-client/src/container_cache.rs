//! Per-endpoint cache of container name to type tag mappings.

use dashmap::DashMap;
use std::sync::Arc;

/// Bidirectional container/type mapping for one endpoint.
///
/// Populated lazily from RPC answers. Concurrent populate attempts for the
/// same key converge: the first value stored wins.
#[derive(Debug, Default)]
pub struct ContainerNameCache {
    container_by_type: DashMap<String, String>,
    type_by_container: DashMap<String, String>,
}

impl ContainerNameCache {
    /// Cached container for `type_tag`.
    pub fn container_of(&self, type_tag: &str) -> Option<String> {
        self.container_by_type.get(type_tag).map(|v| v.value().clone())
    }

    /// Cached type tag for `container`.
    pub fn type_of(&self, container: &str) -> Option<String> {
        self.type_by_container.get(container).map(|v| v.value().clone())
    }

    /// Records a mapping in both directions and returns the container name
    /// now cached for `type_tag`.
    pub fn insert(&self, type_tag: &str, container: &str) -> String {
        self.type_by_container
            .entry(container.to_string())
            .or_insert_with(|| type_tag.to_string());
        self.container_by_type
            .entry(type_tag.to_string())
            .or_insert_with(|| container.to_string())
            .value()
            .clone()
    }

    pub fn len(&self) -> usize {
        self.container_by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.container_by_type.is_empty()
    }
}

/// The cache service: one [`ContainerNameCache`] per endpoint address.
///
/// Create it once and hand clones to every client that should share
/// lookups; entries are never torn down.
#[derive(Debug, Clone, Default)]
pub struct ContainerCaches {
    endpoints: Arc<DashMap<String, Arc<ContainerNameCache>>>,
}

impl ContainerCaches {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by every client of `endpoint`, created on first use.
    /// A trailing slash does not make a different endpoint.
    pub fn for_endpoint(&self, endpoint: &str) -> Arc<ContainerNameCache> {
        self.endpoints
            .entry(endpoint.trim_end_matches('/').to_string())
            .or_default()
            .value()
            .clone()
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_writer_wins() {
        let cache = ContainerNameCache::default();
        assert_eq!(cache.insert("Invoice", "invoices"), "invoices");
        assert_eq!(cache.insert("Invoice", "other"), "invoices");
        assert_eq!(cache.container_of("Invoice").as_deref(), Some("invoices"));
        assert_eq!(cache.type_of("invoices").as_deref(), Some("Invoice"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_shared_per_endpoint() {
        let caches = ContainerCaches::new();
        let a = caches.for_endpoint("http://127.0.0.1:1/");
        let b = caches.clone().for_endpoint("http://127.0.0.1:1");
        let c = caches.for_endpoint("http://127.0.0.1:2");

        a.insert("Invoice", "invoices");
        assert_eq!(b.container_of("Invoice").as_deref(), Some("invoices"));
        assert!(c.is_empty());
        assert_eq!(caches.endpoint_count(), 2);
    }

    #[test]
    fn test_concurrent_population_converges() {
        let cache = Arc::new(ContainerNameCache::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.insert("Invoice", &format!("invoices{}", i)))
            })
            .collect();
        let winners: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(winners.iter().all(|w| w == &winners[0]));
        assert_eq!(cache.container_of("Invoice"), Some(winners[0].clone()));
    }
}
