//! Sphere-tracing renderer for signed-distance-field scenes that outputs a
//! grid of coloured text glyphs instead of pixels.

extern crate nalgebra as na;

pub mod aabb;
pub mod animation;
pub mod camera;
pub mod config;
pub mod error;
pub mod geometry;
pub mod glyph_cache;
pub mod glyph_db;
pub mod glyph_store;
pub mod glyphs;
pub mod lighting;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod quality;
pub mod raymarch;
pub mod scene;
pub mod sdf;
pub mod spatial_grid;
pub mod temporal;
pub mod tiles;
pub mod world;

#[cfg(test)]
mod tests;

pub use config::RenderConfig;
pub use error::RenderError;
pub use orchestrator::{FrameOrchestrator, FrameStats};
