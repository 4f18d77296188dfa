use std::sync::Arc;

use crate::geometry::Fp;
use crate::glyph_cache::{CacheStats, GlyphCache};
use crate::glyph_db::{GlyphDatabase, GlyphQuery};
use crate::glyph_store::{FallbackRamp, GlyphStore};

/// Picks the character for a shaded cell, either through the cached feature
/// database or, when none could be loaded, a fixed brightness ramp.
#[derive(Clone, Debug)]
pub enum GlyphSelector {
    Cached(GlyphCache),
    Ramp(FallbackRamp),
}

impl GlyphSelector {
    pub fn from_database(db: Arc<GlyphDatabase>) -> GlyphSelector {
        GlyphSelector::Cached(GlyphCache::new(db))
    }

    /// Loads the store and builds a database. Any failure is logged and
    /// contained here: the caller gets the ramp instead.
    pub fn from_store(store: &dyn GlyphStore) -> GlyphSelector {
        match store.load().and_then(GlyphDatabase::from_records) {
            Ok(db) => GlyphSelector::from_database(Arc::new(db)),
            Err(err) => {
                log::warn!("glyph database unavailable, using brightness ramp: {err}");
                GlyphSelector::Ramp(FallbackRamp)
            }
        }
    }

    pub fn database(&self) -> Option<Arc<GlyphDatabase>> {
        match self {
            GlyphSelector::Cached(cache) => Some(cache.database().clone()),
            GlyphSelector::Ramp(_) => None,
        }
    }

    pub fn warmup(&mut self) {
        if let GlyphSelector::Cached(cache) = self {
            cache.warmup();
        }
    }

    pub fn stats(&self) -> CacheStats {
        match self {
            GlyphSelector::Cached(cache) => cache.stats(),
            GlyphSelector::Ramp(_) => CacheStats::default(),
        }
    }

    pub fn select(&mut self, brightness: Fp, query: &GlyphQuery) -> char {
        match self {
            GlyphSelector::Cached(cache) => cache.select(query).character,
            GlyphSelector::Ramp(ramp) => ramp.select(brightness),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use crate::glyph_db::tests::sample_records;
    use crate::glyph_db::GlyphRecord;
    use crate::glyph_store::MemoryGlyphStore;

    struct BrokenStore;

    impl GlyphStore for BrokenStore {
        fn load(&self) -> Result<Vec<GlyphRecord>, RenderError> {
            Err(RenderError::EmptyGlyphSet)
        }
    }

    #[test_log::test]
    fn broken_store_falls_back_to_ramp() {
        let mut selector = GlyphSelector::from_store(&BrokenStore);
        assert!(matches!(selector, GlyphSelector::Ramp(_)));
        assert!(selector.database().is_none());
        assert_eq!(selector.select(1.0, &GlyphQuery::default()), '@');
    }

    #[test_log::test]
    fn empty_store_falls_back_to_ramp() {
        let selector = GlyphSelector::from_store(&MemoryGlyphStore(vec![]));
        assert!(matches!(selector, GlyphSelector::Ramp(_)));
    }

    #[test]
    fn memory_store_uses_database() {
        let mut selector = GlyphSelector::from_store(&MemoryGlyphStore(sample_records()));
        assert!(selector.database().is_some());
        let darkest = GlyphQuery {
            coverage: 0.0,
            roundness: Some(0.0),
            complexity: Some(0.0),
            style: None,
        };
        assert_eq!(selector.select(0.0, &darkest), ' ');
        assert_eq!(selector.stats().misses, 1);
    }
}
