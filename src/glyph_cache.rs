use std::sync::Arc;

use crate::geometry::Fp;
use crate::glyph_db::{GlyphDatabase, GlyphQuery, GlyphRecord, GlyphStyle};

pub const COVERAGE_BUCKETS: usize = 32;
pub const ROUNDNESS_BUCKETS: usize = 8;
pub const COMPLEXITY_BUCKETS: usize = 8;
/// Eight named styles plus "none".
pub const STYLE_BUCKETS: usize = 9;
pub const SLOT_COUNT: usize = COVERAGE_BUCKETS * ROUNDNESS_BUCKETS * COMPLEXITY_BUCKETS * STYLE_BUCKETS;

const NO_STYLE: usize = STYLE_BUCKETS - 1;
const EMPTY: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub filled: usize,
}

fn bucket(value: Fp, buckets: usize) -> usize {
    let scaled = (value.clamp(0.0, 1.0) * buckets as Fp).floor() as usize;
    scaled.min(buckets - 1)
}

fn bucket_center(index: usize, buckets: usize) -> Fp {
    (index as Fp + 0.5) / buckets as Fp
}

/// Slot key for a query. Missing roundness/complexity quantise from 0.5.
pub fn cache_key(query: &GlyphQuery) -> usize {
    let coverage = bucket(query.coverage, COVERAGE_BUCKETS);
    let roundness = bucket(query.roundness.unwrap_or(0.5), ROUNDNESS_BUCKETS);
    let complexity = bucket(query.complexity.unwrap_or(0.5), COMPLEXITY_BUCKETS);
    let style = query.style.map_or(NO_STYLE, GlyphStyle::index);
    ((coverage * ROUNDNESS_BUCKETS + roundness) * COMPLEXITY_BUCKETS + complexity) * STYLE_BUCKETS + style
}

/// The query a slot stands for: every parameter at its bucket centre.
///
/// Roundness and complexity are always present here. A caller that left them
/// out shares the midpoint slot, so its answer is scored with both terms and
/// may differ from `GlyphDatabase::query_best` on the raw query.
fn representative(key: usize) -> GlyphQuery {
    let style = key % STYLE_BUCKETS;
    let rest = key / STYLE_BUCKETS;
    let complexity = rest % COMPLEXITY_BUCKETS;
    let rest = rest / COMPLEXITY_BUCKETS;
    let roundness = rest % ROUNDNESS_BUCKETS;
    let coverage = rest / ROUNDNESS_BUCKETS;
    GlyphQuery {
        coverage: bucket_center(coverage, COVERAGE_BUCKETS),
        roundness: Some(bucket_center(roundness, ROUNDNESS_BUCKETS)),
        complexity: Some(bucket_center(complexity, COMPLEXITY_BUCKETS)),
        style: GlyphStyle::ALL.get(style).copied(),
    }
}

/// Quantised memo table in front of a `GlyphDatabase`. The database never
/// changes after load, so slots are never invalidated during a run.
#[derive(Clone, Debug)]
pub struct GlyphCache {
    db: Arc<GlyphDatabase>,
    slots: Vec<u32>,
    hits: u64,
    misses: u64,
}

impl GlyphCache {
    pub fn new(db: Arc<GlyphDatabase>) -> GlyphCache {
        GlyphCache {
            db,
            slots: vec![EMPTY; SLOT_COUNT],
            hits: 0,
            misses: 0,
        }
    }

    pub fn database(&self) -> &Arc<GlyphDatabase> {
        &self.db
    }

    fn fill(&mut self, key: usize) -> usize {
        let index = self.db.query_best_index(&representative(key));
        self.slots[key] = index as u32;
        index
    }

    pub fn select(&mut self, query: &GlyphQuery) -> &GlyphRecord {
        let key = cache_key(query);
        let index = match self.slots[key] {
            EMPTY => {
                self.misses += 1;
                self.fill(key)
            }
            index => {
                self.hits += 1;
                index as usize
            }
        };
        self.db.record(index)
    }

    /// Fills every slot, then zeroes the counters so stats reflect live traffic only.
    pub fn warmup(&mut self) {
        for key in 0..SLOT_COUNT {
            if self.slots[key] == EMPTY {
                self.fill(key);
            }
        }
        self.hits = 0;
        self.misses = 0;
        log::debug!("glyph cache warmed: {} slots", SLOT_COUNT);
    }

    pub fn clear_cache(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = EMPTY);
        self.hits = 0;
        self.misses = 0;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            filled: self.slots.iter().filter(|s| **s != EMPTY).count(),
        }
    }
}
