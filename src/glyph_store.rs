use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RenderError;
use crate::geometry::Fp;
use crate::glyph_db::GlyphRecord;

/// Read-only source of glyph feature records, consulted once at startup.
pub trait GlyphStore {
    fn load(&self) -> Result<Vec<GlyphRecord>, RenderError>;
}

/// JSON array of glyph records on disk.
pub struct JsonGlyphStore {
    path: PathBuf,
}

impl JsonGlyphStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonGlyphStore {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl GlyphStore for JsonGlyphStore {
    fn load(&self) -> Result<Vec<GlyphRecord>, RenderError> {
        let content = fs::read_to_string(&self.path).map_err(|source| RenderError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| RenderError::Decode {
            what: self.path.display().to_string(),
            source,
        })
    }
}

pub struct MemoryGlyphStore(pub Vec<GlyphRecord>);

impl GlyphStore for MemoryGlyphStore {
    fn load(&self) -> Result<Vec<GlyphRecord>, RenderError> {
        Ok(self.0.clone())
    }
}

/// Fixed brightness ramp used whenever no glyph database is available.
#[derive(Clone, Copy, Debug, Default)]
pub struct FallbackRamp;

const RAMP: &[u8] = b" .:-=+*#%@";

impl FallbackRamp {
    pub fn select(&self, brightness: Fp) -> char {
        let last = RAMP.len() - 1;
        let index = (brightness.clamp(0.0, 1.0) * last as Fp).round() as usize;
        RAMP[index.min(last)] as char
    }
}
