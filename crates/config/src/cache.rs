//! Per-owner cache of objects built from LLM profiles.
//!
//! Building a model client is expensive, so callers keep one per profile
//! name. The cache is an ordinary value: whoever owns it decides when it is
//! cleared (the orchestrator clears it whenever it builds a new starting
//! agent) and nothing is shared between owners.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

/// Cache of `T` keyed by profile name.
#[derive(Debug)]
pub struct ProfileCache<T> {
    entries: RwLock<HashMap<String, Arc<T>>>,
}

impl<T> ProfileCache<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cached value for `profile`, if any.
    pub fn get(&self, profile: &str) -> Option<Arc<T>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(profile)
            .cloned()
    }

    /// Cached value for `profile`, building it with `init` on a miss.
    pub fn get_or_insert_with<F>(&self, profile: &str, init: F) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        match self.try_get_or_insert_with(profile, || Ok::<T, std::convert::Infallible>(init())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Like [`ProfileCache::get_or_insert_with`] for fallible builders.
    /// Nothing is cached when `init` fails.
    pub fn try_get_or_insert_with<F, E>(&self, profile: &str, init: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(hit) = self.get(profile) {
            return Ok(hit);
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have filled the slot between the two locks.
        if let Some(hit) = entries.get(profile) {
            return Ok(Arc::clone(hit));
        }
        debug!("Building cached entry for profile '{profile}'");
        let value = Arc::new(init()?);
        entries.insert(profile.to_string(), Arc::clone(&value));
        Ok(value)
    }

    /// Drop the entry for one profile. Returns whether one existed.
    pub fn invalidate(&self, profile: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(profile)
            .is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for ProfileCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
