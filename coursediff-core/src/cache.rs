//! Annotation list cache keyed by `(material_id, change_id)`.
//!
//! Entries move through `fetching -> fresh -> stale -> fetching`. The front end
//! polls [`AnnotationCache::needs_fetch`] for the keys it displays and issues a
//! fetch when it returns `true`; writes invalidate exactly one key.
//!
//! Every invalidation bumps the entry's generation. A fetch carries the
//! generation it was issued under, and a result from an older generation is
//! shown but leaves the entry stale so the next poll fetches again.

use std::collections::HashMap;

use crate::session::SessionKey;
use crate::thread::{build_thread, Thread};
use crate::types::Annotation;

#[derive(Debug, Default)]
struct CacheEntry {
    thread: Thread,
    loaded: bool,
    stale: bool,
    fetching: bool,
    generation: u64,
    thread_generation: u64,
}

#[derive(Debug, Default)]
pub struct AnnotationCache {
    entries: HashMap<SessionKey, CacheEntry>,
}

impl AnnotationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built thread for `key`, if it was ever loaded. Stale threads are
    /// still returned so the view does not blank while refetching.
    pub fn thread(&self, key: &SessionKey) -> Option<&Thread> {
        self.entries
            .get(key)
            .filter(|e| e.loaded)
            .map(|e| &e.thread)
    }

    /// `true` when `key` has never been loaded or was invalidated, and no fetch
    /// is already outstanding.
    pub fn needs_fetch(&self, key: &SessionKey) -> bool {
        match self.entries.get(key) {
            None => true,
            Some(e) => !e.fetching && (!e.loaded || e.stale),
        }
    }

    /// Records that a fetch for `key` is outstanding and returns the
    /// generation to hand back to [`AnnotationCache::store`].
    pub fn mark_fetching(&mut self, key: SessionKey) -> u64 {
        let entry = self.entries.entry(key).or_default();
        entry.fetching = true;
        entry.generation
    }

    /// Stores a fetched annotation list and rebuilds its thread.
    pub fn store(&mut self, key: SessionKey, generation: u64, annotations: &[Annotation]) {
        let entry = self.entries.entry(key).or_default();
        if generation > entry.generation || (entry.loaded && generation < entry.thread_generation) {
            return;
        }
        entry.thread = build_thread(annotations);
        entry.thread_generation = generation;
        entry.loaded = true;
        if generation == entry.generation {
            entry.fetching = false;
            entry.stale = false;
        }
    }

    /// Records a failed fetch so the next poll may retry.
    pub fn fetch_failed(&mut self, key: &SessionKey, generation: u64) {
        if let Some(entry) = self.entries.get_mut(key) {
            if entry.generation == generation {
                entry.fetching = false;
            }
        }
    }

    /// Marks exactly `key` as stale. Other keys are never touched.
    pub fn invalidate(&mut self, key: &SessionKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.stale = true;
            entry.fetching = false;
            entry.generation += 1;
            tracing::debug!(?key, generation = entry.generation, "annotation cache invalidated");
        }
    }

    pub fn is_stale(&self, key: &SessionKey) -> bool {
        self.entries.get(key).is_some_and(|e| e.stale)
    }
}
