//! Renderer configuration.
//!
//! Every section falls back to its defaults when missing, so a config file
//! only needs to name the values it changes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::geometry::Fp;
use crate::quality::QualityConfig;
use crate::raymarch::MarchConfig;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub march: MarchConfig,
    pub grid: GridConfig,
    pub quality: QualityConfig,
    pub temporal: TemporalConfig,
    pub dispatch: DispatchConfig,
    pub camera: CameraConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub cell_size: Fp,
    /// Also consult the 26 neighbouring cells on lookup.
    pub dilate_neighbors: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            cell_size: 2.0,
            dilate_neighbors: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalConfig {
    pub enabled: bool,
    /// Per-component tolerance when deciding whether the camera moved.
    pub camera_epsilon: Fp,
    /// Keep reusing hits on stationary entities while others move. Turning
    /// it off retraces every pixel in any frame where something moves.
    pub reuse_under_motion: bool,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        TemporalConfig {
            enabled: true,
            camera_epsilon: 0.001,
            reuse_under_motion: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub parallel: bool,
    pub tile_size: u32,
    /// Worker count; all cores but one when unset.
    pub workers: Option<usize>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            parallel: false,
            tile_size: crate::tiles::TILE_SIZE,
            workers: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Height of an output cell divided by its width.
    pub cell_aspect: Fp,
}

impl Default for CameraConfig {
    fn default() -> Self {
        CameraConfig { cell_aspect: 2.0 }
    }
}

impl RenderConfig {
    pub fn from_json_str(content: &str) -> Result<RenderConfig, RenderError> {
        let config: RenderConfig = serde_json::from_str(content).map_err(|source| RenderError::Decode {
            what: "render config".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<RenderConfig, RenderError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        let invalid = |message: &str| Err(RenderError::InvalidConfig(message.to_string()));
        if !(self.grid.cell_size > 0.0) {
            return invalid("grid.cell_size must be positive");
        }
        if self.dispatch.tile_size == 0 {
            return invalid("dispatch.tile_size must be at least 1");
        }
        if self.dispatch.workers == Some(0) {
            return invalid("dispatch.workers must be at least 1");
        }
        let quality = &self.quality;
        if !(quality.min_scale > 0.0) || quality.min_scale > quality.max_scale || quality.max_scale > 1.0 {
            return invalid("quality scale bounds must satisfy 0 < min_scale <= max_scale <= 1");
        }
        if !(self.march.hit_threshold > 0.0) || !(self.march.max_distance > 0.0) {
            return invalid("march.hit_threshold and march.max_distance must be positive");
        }
        if !(self.camera.cell_aspect > 0.0) {
            return invalid("camera.cell_aspect must be positive");
        }
        Ok(())
    }
}
