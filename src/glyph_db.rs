//! In-memory glyph feature database.
//!
//! Records are loaded once, min-max normalised over the whole set and sorted
//! by normalised coverage. Nothing is mutated afterwards, so the database can
//! be shared freely between threads and any memoised answer stays valid.

use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::geometry::{Fp, EPS};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlyphStyle {
    Dense,
    Light,
    Round,
    Angular,
    Line,
    Noise,
    Block,
    Symbolic,
}

impl GlyphStyle {
    pub const ALL: [GlyphStyle; 8] = [
        GlyphStyle::Dense,
        GlyphStyle::Light,
        GlyphStyle::Round,
        GlyphStyle::Angular,
        GlyphStyle::Line,
        GlyphStyle::Noise,
        GlyphStyle::Block,
        GlyphStyle::Symbolic,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_name(name: &str) -> Option<GlyphStyle> {
        match name.to_ascii_lowercase().as_str() {
            "dense" => Some(GlyphStyle::Dense),
            "light" => Some(GlyphStyle::Light),
            "round" => Some(GlyphStyle::Round),
            "angular" => Some(GlyphStyle::Angular),
            "line" => Some(GlyphStyle::Line),
            "noise" => Some(GlyphStyle::Noise),
            "block" => Some(GlyphStyle::Block),
            "symbolic" => Some(GlyphStyle::Symbolic),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Symmetry {
    pub horizontal: Fp,
    pub vertical: Fp,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StrokeWidth {
    pub mean: Fp,
    pub std_dev: Fp,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlyphFeatures {
    pub coverage: Fp,
    pub roundness: Fp,
    pub complexity: Fp,
    pub symmetry: Symmetry,
    pub connected_components: u32,
    pub aspect_ratio: Fp,
    pub stroke_width: StrokeWidth,
    pub endpoints: u32,
    pub junctions: u32,
    pub euler_number: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlyphRecord {
    pub code_point: u32,
    pub character: char,
    pub features: GlyphFeatures,
    #[serde(skip)]
    pub norm_coverage: Fp,
    #[serde(skip)]
    pub norm_complexity: Fp,
    #[serde(skip)]
    pub norm_components: Fp,
}

impl GlyphRecord {
    pub fn new(character: char, features: GlyphFeatures) -> Self {
        GlyphRecord {
            code_point: character as u32,
            character,
            features,
            norm_coverage: 0.0,
            norm_complexity: 0.0,
            norm_components: 0.0,
        }
    }
}

/// What the shader asks for. Missing roundness/complexity terms are not scored.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GlyphQuery {
    pub coverage: Fp,
    pub roundness: Option<Fp>,
    pub complexity: Option<Fp>,
    pub style: Option<GlyphStyle>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Range {
    pub min: Fp,
    pub max: Fp,
}

impl Range {
    fn over(values: impl Iterator<Item = Fp>) -> Range {
        values.fold(
            Range {
                min: Fp::INFINITY,
                max: Fp::NEG_INFINITY,
            },
            |r, v| Range {
                min: r.min.min(v),
                max: r.max.max(v),
            },
        )
    }

    fn normalize(&self, value: Fp) -> Fp {
        let span = self.max - self.min;
        if span > EPS {
            ((value - self.min) / span).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Normalisation bounds, fixed at load time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub coverage: Range,
    pub complexity: Range,
    pub components: Range,
}

const COVERAGE_WINDOW: Fp = 0.1;
const COVERAGE_WEIGHT: Fp = 4.0;
const ROUNDNESS_WEIGHT: Fp = 1.0;
const COMPLEXITY_WEIGHT: Fp = 1.0;
const STYLE_WEIGHT: Fp = 1.5;

fn bias_dense(r: &GlyphRecord) -> Fp {
    1.0 - r.norm_coverage
}
fn bias_light(r: &GlyphRecord) -> Fp {
    r.norm_coverage
}
fn bias_round(r: &GlyphRecord) -> Fp {
    1.0 - r.features.roundness
}
fn bias_angular(r: &GlyphRecord) -> Fp {
    r.features.roundness
}
fn bias_line(r: &GlyphRecord) -> Fp {
    r.norm_components
}
fn bias_noise(r: &GlyphRecord) -> Fp {
    r.norm_complexity
}
fn bias_block(r: &GlyphRecord) -> Fp {
    r.features.symmetry.horizontal
}
fn bias_symbolic(_: &GlyphRecord) -> Fp {
    0.0
}

/// Style penalty (lower is better) indexed by `GlyphStyle::index`.
static STYLE_BIAS: [fn(&GlyphRecord) -> Fp; 8] = [
    bias_dense,
    bias_light,
    bias_round,
    bias_angular,
    bias_line,
    bias_noise,
    bias_block,
    bias_symbolic,
];

#[derive(Debug)]
pub struct GlyphDatabase {
    records: Vec<GlyphRecord>,
    bounds: Bounds,
}

impl GlyphDatabase {
    pub fn from_records(mut records: Vec<GlyphRecord>) -> Result<GlyphDatabase, RenderError> {
        if records.is_empty() {
            return Err(RenderError::EmptyGlyphSet);
        }
        let bounds = Bounds {
            coverage: Range::over(records.iter().map(|r| r.features.coverage)),
            complexity: Range::over(records.iter().map(|r| r.features.complexity)),
            components: Range::over(records.iter().map(|r| r.features.connected_components as Fp)),
        };
        for record in records.iter_mut() {
            record.norm_coverage = bounds.coverage.normalize(record.features.coverage);
            record.norm_complexity = bounds.complexity.normalize(record.features.complexity);
            record.norm_components = bounds.components.normalize(record.features.connected_components as Fp);
        }
        // stable, so equal coverages keep store order
        records.sort_by(|a, b| a.norm_coverage.total_cmp(&b.norm_coverage));
        log::info!(
            "glyph database loaded: {} records, coverage {:.3}..{:.3}",
            records.len(),
            bounds.coverage.min,
            bounds.coverage.max
        );
        Ok(GlyphDatabase { records, bounds })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn records(&self) -> &[GlyphRecord] {
        &self.records
    }

    pub fn record(&self, index: usize) -> &GlyphRecord {
        &self.records[index]
    }

    pub fn score(record: &GlyphRecord, query: &GlyphQuery) -> Fp {
        let mut score = COVERAGE_WEIGHT * (record.norm_coverage - query.coverage).abs();
        if let Some(roundness) = query.roundness {
            score += ROUNDNESS_WEIGHT * (record.features.roundness - roundness).abs();
        }
        if let Some(complexity) = query.complexity {
            score += COMPLEXITY_WEIGHT * (record.norm_complexity - complexity).abs();
        }
        if let Some(style) = query.style {
            score += STYLE_WEIGHT * STYLE_BIAS[style.index()](record);
        }
        score
    }

    /// Index of the best-scoring record within the coverage window around the
    /// target, or of the nearest record by coverage when the window is empty.
    /// Ties go to the earliest record in sorted order.
    pub fn query_best_index(&self, query: &GlyphQuery) -> usize {
        let low = query.coverage - COVERAGE_WINDOW;
        let high = query.coverage + COVERAGE_WINDOW;
        let start = self.records.partition_point(|r| r.norm_coverage < low);
        let end = start
            + self.records[start..]
                .iter()
                .take_while(|r| r.norm_coverage <= high)
                .count();

        if start == end {
            return self.nearest_by_coverage(start, query.coverage);
        }

        let mut best = start;
        let mut best_score = Fp::INFINITY;
        for (index, record) in self.records[start..end].iter().enumerate() {
            let score = Self::score(record, query);
            if score < best_score {
                best_score = score;
                best = start + index;
            }
        }
        best
    }

    pub fn query_best(&self, query: &GlyphQuery) -> &GlyphRecord {
        &self.records[self.query_best_index(query)]
    }

    fn nearest_by_coverage(&self, insertion: usize, target: Fp) -> usize {
        let after = insertion.min(self.records.len() - 1);
        if insertion == 0 {
            return after;
        }
        let before = insertion - 1;
        let d_before = (self.records[before].norm_coverage - target).abs();
        let d_after = (self.records[after].norm_coverage - target).abs();
        if d_before <= d_after {
            // first record of the run sharing that coverage
            let coverage = self.records[before].norm_coverage;
            self.records.partition_point(|r| r.norm_coverage < coverage)
        } else {
            after
        }
    }
}
