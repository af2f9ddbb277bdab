//! Name-keyed resource cache

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::EngineResult;

/// Shared resources keyed by name, kept until the cache is dropped.
///
/// The first request for a name runs the loader; later requests return the
/// same `Arc` without calling it.
#[derive(Debug)]
pub struct ResourceCache<T> {
    kind: &'static str,
    items: HashMap<String, Arc<T>>,
}

impl<T> ResourceCache<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            items: HashMap::new(),
        }
    }

    pub fn load_or_get(
        &mut self,
        name: &str,
        loader: impl FnOnce() -> EngineResult<T>,
    ) -> EngineResult<Arc<T>> {
        if let Some(item) = self.items.get(name) {
            log::debug!("{} '{}' served from cache", self.kind, name);
            return Ok(item.clone());
        }

        let item = Arc::new(loader()?);
        log::debug!("{} '{}' loaded", self.kind, name);
        self.items.insert(name.to_string(), item.clone());
        Ok(item)
    }

    /// Register an already built resource, replacing any previous entry
    pub fn insert(&mut self, name: &str, item: T) -> Arc<T> {
        let item = Arc::new(item);
        self.items.insert(name.to_string(), item.clone());
        item
    }

    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.items.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    /// Drop the cache's references; resources still held elsewhere stay alive
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn second_load_hits_cache() {
        let mut cache = ResourceCache::new("number");
        let mut calls = 0;

        let a = cache
            .load_or_get("one", || {
                calls += 1;
                Ok(1)
            })
            .unwrap();
        let b = cache
            .load_or_get("one", || {
                calls += 1;
                Ok(2)
            })
            .unwrap();

        assert_eq!(calls, 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*b, 1);
    }

    #[test]
    fn failed_load_is_not_cached() {
        let mut cache: ResourceCache<u32> = ResourceCache::new("number");
        let err = cache.load_or_get("bad", || Err(EngineError::NotInitialized));
        assert!(err.is_err());
        assert!(!cache.contains("bad"));

        assert_eq!(*cache.load_or_get("bad", || Ok(7)).unwrap(), 7);
        assert_eq!(cache.len(), 1);
    }
}
