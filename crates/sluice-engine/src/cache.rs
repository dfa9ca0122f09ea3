//! Default-probability cache.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use sluice_core::ids::ObligorId;
use sluice_core::types::{FeatureVector, Obligor};

/// Scores keyed by obligor and record version.
///
/// A newer record whose features are unchanged reuses the cached score;
/// changed features force a re-score.
#[derive(Debug, Default)]
pub struct ScoreCache {
    scores: RwLock<HashMap<ObligorId, CachedScore>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
struct CachedScore {
    version: u64,
    features: FeatureVector,
    pd: f64,
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that needed a fresh score.
    pub misses: u64,
    /// Cached obligors.
    pub entries: usize,
}

impl ScoreCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached score for this obligor record, if still valid.
    pub fn get(&self, obligor: &Obligor) -> Option<f64> {
        let mut scores = self.scores.write();
        let hit = match scores.get_mut(&obligor.id) {
            Some(cached) if cached.version == obligor.version => Some(cached.pd),
            Some(cached) if cached.features == obligor.features => {
                cached.version = obligor.version;
                Some(cached.pd)
            }
            _ => None,
        };
        let counter = if hit.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        hit
    }

    /// Store a fresh score.
    pub fn insert(&self, obligor: &Obligor, pd: f64) {
        self.scores.write().insert(
            obligor.id.clone(),
            CachedScore {
                version: obligor.version,
                features: obligor.features,
                pd,
            },
        );
    }

    /// Drop one obligor's score.
    pub fn invalidate(&self, id: &ObligorId) {
        self.scores.write().remove(id);
    }

    /// Clear all scores.
    pub fn clear(&self) {
        self.scores.write().clear();
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.scores.read().len(),
        }
    }
}
