//! Per-frame driver: animation, temporal reuse, adaptive quality and the
//! choice between the single-threaded scan and the tile workers.

use std::sync::Arc;
use std::time::Instant;

use crate::animation;
use crate::camera::CameraPose;
use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::geometry::Fp;
use crate::glyph_cache::CacheStats;
use crate::glyphs::GlyphSelector;
use crate::output::OutputBuffer;
use crate::pipeline::PixelPipeline;
use crate::quality::{AdaptiveQuality, FrameDeadline};
use crate::scene::Scene;
use crate::spatial_grid::SpatialGrid;
use crate::temporal::{decide, FrameMotion, PixelRecord, ReusePolicy, TemporalCache};
use crate::tiles::{partition, PixelTask, Tile, TileDispatcher, TileRequest, TileResponse, TileSettings};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub traces: usize,
    pub full_reuse: usize,
    pub geometry_reuse: usize,
    /// Traced pixels whose ray hit nothing.
    pub misses: usize,
    /// The frame deadline cut the scan short.
    pub aborted: bool,
    pub elapsed_ms: Fp,
    /// Resolution scale the frame was rendered at.
    pub scale: Fp,
    /// Dirty cells in the output buffer after this frame.
    pub dirty: usize,
}

fn reuse_policy(scene: &Scene, record: &PixelRecord, motion: &FrameMotion) -> ReusePolicy {
    let (stationary, animated) = match record.entity.and_then(|i| scene.entities.get(i)) {
        Some(entity) => (entity.is_stationary(), entity.material.is_animated()),
        None => (true, false),
    };
    decide(record, motion, stationary, animated)
}

pub struct FrameOrchestrator {
    config: RenderConfig,
    scene: Scene,
    grid: SpatialGrid,
    glyphs: GlyphSelector,
    quality: AdaptiveQuality,
    temporal: TemporalCache,
    /// Full-resolution buffer handed to the presenter.
    output: OutputBuffer,
    /// Render-resolution buffer, upsampled into `output`.
    render: OutputBuffer,
    dispatcher: Option<TileDispatcher>,
    tile_settings: Arc<TileSettings>,
    last_camera: Option<CameraPose>,
    width: u32,
    height: u32,
}

impl FrameOrchestrator {
    pub fn new(
        config: RenderConfig,
        scene: Scene,
        mut glyphs: GlyphSelector,
        width: u32,
        height: u32,
    ) -> Result<FrameOrchestrator, RenderError> {
        config.validate()?;
        let degenerate = scene.degenerate_entities();
        if !degenerate.is_empty() {
            log::warn!("entities {degenerate:?} have a zero scale component and will not be drawn");
        }
        glyphs.warmup();
        let grid = SpatialGrid::build(&scene.entities, config.grid.cell_size, config.grid.dilate_neighbors);
        let dispatcher = if config.dispatch.parallel {
            Some(TileDispatcher::new(config.dispatch.workers, &glyphs)?)
        } else {
            None
        };
        let tile_settings = Arc::new(TileSettings {
            march: config.march.clone(),
            cell_size: config.grid.cell_size,
            dilate: config.grid.dilate_neighbors,
            cell_aspect: config.camera.cell_aspect,
            center_steps: config.quality.center_steps,
            edge_steps: config.quality.edge_steps,
        });
        let quality = AdaptiveQuality::new(config.quality.clone());
        let (render_width, render_height) = quality.scaled_dimensions(width, height);
        Ok(FrameOrchestrator {
            grid,
            glyphs,
            quality,
            temporal: TemporalCache::new(render_width, render_height),
            output: OutputBuffer::new(width, height),
            render: OutputBuffer::new(render_width, render_height),
            dispatcher,
            tile_settings,
            last_camera: None,
            width,
            height,
            config,
            scene,
        })
    }

    pub fn output(&self) -> &OutputBuffer {
        &self.output
    }

    /// Call once the presenter has consumed the dirty cells.
    pub fn clear_dirty(&mut self) {
        self.output.clear_dirty();
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn quality_scale(&self) -> Fp {
        self.quality.scale()
    }

    /// Mean of the last few frame times.
    pub fn average_frame_ms(&self) -> Option<Fp> {
        self.quality.average_ms()
    }

    pub fn glyph_stats(&self) -> CacheStats {
        self.glyphs.stats()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == (self.width, self.height) {
            return;
        }
        log::debug!("output resized to {width}x{height}");
        self.width = width;
        self.height = height;
        self.output.resize(width, height);
        self.invalidate_temporal();
    }

    pub fn invalidate_temporal(&mut self) {
        self.temporal.invalidate_all();
    }

    /// Advances the scene by `dt` seconds and renders one frame.
    pub fn tick(&mut self, dt: Fp, camera: Option<CameraPose>) -> FrameStats {
        let start = Instant::now();
        if let Some(pose) = camera {
            self.scene.camera = pose;
        }
        if animation::advance(&mut self.scene, dt) {
            self.grid.rebuild(&self.scene.entities);
        }

        let camera_static = self
            .last_camera
            .as_ref()
            .is_some_and(|last| last.approx_eq(&self.scene.camera, self.config.temporal.camera_epsilon));
        self.last_camera = Some(self.scene.camera.clone());
        let motion = FrameMotion {
            camera_static: camera_static && self.config.temporal.enabled,
            any_moving: self.scene.any_moving(),
            any_flicker: self.scene.any_flickering(),
            reuse_under_motion: self.config.temporal.reuse_under_motion,
        };

        let scale = self.quality.scale();
        let (width, height) = self.quality.scaled_dimensions(self.width, self.height);
        if self.temporal.resize(width, height) {
            log::debug!("render resolution now {width}x{height}, temporal records dropped");
        }
        self.render.resize(width, height);

        let mut stats = FrameStats {
            scale,
            ..Default::default()
        };
        if self.dispatcher.is_some() {
            self.render_tiles(width, height, &motion, &mut stats);
        } else {
            self.render_scan(width, height, &motion, &mut stats);
        }
        self.output.upsample_from(&self.render);

        stats.dirty = self.output.dirty_count();
        stats.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.quality.record_frame(stats.elapsed_ms);
        stats
    }

    fn render_scan(&mut self, width: u32, height: u32, motion: &FrameMotion, stats: &mut FrameStats) {
        let pipeline = PixelPipeline::new(
            &self.scene,
            &self.grid,
            &self.config.march,
            self.config.camera.cell_aspect,
        );
        let quality = self.quality.config();
        let deadline = FrameDeadline::new(quality.frame_deadline_ms, quality.deadline_check_interval);
        let mut done = 0;
        for y in 0..height {
            for x in 0..width {
                if deadline.should_abort(done) {
                    log::debug!("frame deadline hit after {done} pixels");
                    // untouched pixels keep last frame's cells but must be traced next time
                    self.temporal.invalidate_from(x, y);
                    stats.aborted = true;
                    return;
                }
                done += 1;

                let record = self.temporal.get(x, y);
                let index = self.render.index(x, y);
                match reuse_policy(&self.scene, record, motion) {
                    ReusePolicy::Full => stats.full_reuse += 1,
                    ReusePolicy::Geometry => {
                        let cell = pipeline.reshade(record, x, y, width, height, &mut self.glyphs);
                        self.render.write(index, &cell);
                        stats.geometry_reuse += 1;
                    }
                    ReusePolicy::None => {
                        let steps = self.quality.steps_for_pixel(x, y, width, height);
                        let outcome = pipeline.trace_pixel(x, y, width, height, steps, &mut self.glyphs);
                        if outcome.record.entity.is_none() {
                            stats.misses += 1;
                        }
                        self.render.write(index, &outcome.cell);
                        self.temporal.store(x, y, outcome.record);
                        stats.traces += 1;
                    }
                }
            }
        }
    }

    /// One request per tile that has work left after the reuse decision.
    /// Fully reused pixels are counted here and never leave the orchestrator.
    fn plan_tiles(&self, width: u32, height: u32, motion: &FrameMotion, stats: &mut FrameStats) -> Vec<TileRequest> {
        let mut requests = vec![];
        for tile in partition(width, height, self.config.dispatch.tile_size) {
            let mut tasks = Vec::with_capacity(tile.pixel_count());
            let mut reused = 0;
            for y in tile.y0..tile.y1 {
                for x in tile.x0..tile.x1 {
                    let record = self.temporal.get(x, y);
                    tasks.push(match reuse_policy(&self.scene, record, motion) {
                        ReusePolicy::Full => {
                            reused += 1;
                            PixelTask::Skip
                        }
                        ReusePolicy::Geometry => PixelTask::Reshade(record.clone()),
                        ReusePolicy::None => PixelTask::Trace,
                    });
                }
            }
            stats.full_reuse += reused;
            if reused == tasks.len() {
                continue;
            }
            requests.push(TileRequest {
                tile,
                scene: self.scene.clone(),
                width,
                height,
                settings: Arc::clone(&self.tile_settings),
                tasks,
            });
        }
        requests
    }

    fn render_tiles(&mut self, width: u32, height: u32, motion: &FrameMotion, stats: &mut FrameStats) {
        let requests = self.plan_tiles(width, height, motion, stats);
        if requests.is_empty() {
            return;
        }
        let Some(dispatcher) = &self.dispatcher else {
            return;
        };
        let tiles: Vec<Tile> = requests.iter().map(|request| request.tile).collect();
        let responses = dispatcher.run_batch(requests);
        self.merge_tiles(&tiles, responses, stats);
    }

    /// Writes worker results back. Tiles without a response keep last frame's
    /// cells and are traced again next frame.
    fn merge_tiles(&mut self, tiles: &[Tile], responses: Vec<TileResponse>, stats: &mut FrameStats) {
        for tile in tiles.iter().filter(|t| !responses.iter().any(|r| r.tile == **t)) {
            log::debug!("tile {tile:?} lost, invalidating its pixels");
            for y in tile.y0..tile.y1 {
                for x in tile.x0..tile.x1 {
                    self.temporal.invalidate(x, y);
                }
            }
        }
        for response in responses {
            stats.misses += response.misses.len();
            for pixel in response.cells {
                let index = self.render.index(pixel.x, pixel.y);
                self.render.write(index, &pixel.cell);
                if pixel.traced {
                    self.temporal.store(pixel.x, pixel.y, pixel.record);
                    stats.traces += 1;
                } else {
                    stats.geometry_reuse += 1;
                }
            }
        }
    }
}
