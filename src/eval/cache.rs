// eval/cache.rs - Per-worker sample memo for `GeneratorCache` ops
//
// Keys are exact: op index, seed, dimensionality and the raw bits of every
// coordinate. A hit therefore returns precisely what re-evaluating the
// source would produce. Each worker owns its own cache, so no locking.

use lru::LruCache;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;
use std::num::NonZeroUsize;

/// Identity of one cached sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleKey {
    pub node: u32,
    pub seed: i32,
    pub dims: u8,
    pub coords: [u32; 4],
}

impl SampleKey {
    pub fn new(node: u32, seed: i32, point: &[f32]) -> Self {
        let mut coords = [0u32; 4];
        for (bits, v) in coords.iter_mut().zip(point) {
            *bits = v.to_bits();
        }
        SampleKey {
            node,
            seed,
            dims: point.len() as u8,
            coords,
        }
    }
}

/// Bounded LRU of sample values. Capacity 0 disables memoisation.
pub struct EvalCache {
    entries: Option<LruCache<SampleKey, f32, BuildHasherDefault<FxHasher>>>,
    hits: u64,
    misses: u64,
}

impl EvalCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity)
                .map(|cap| LruCache::with_hasher(cap, BuildHasherDefault::default())),
            hits: 0,
            misses: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    pub fn lookup(&mut self, key: &SampleKey) -> Option<f32> {
        let found = self.entries.as_mut()?.get(key).copied();
        match found {
            Some(_) => self.hits += 1,
            None => self.misses += 1,
        }
        found
    }

    pub fn store(&mut self, key: SampleKey, value: f32) {
        if let Some(entries) = self.entries.as_mut() {
            entries.put(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
