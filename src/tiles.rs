//! Tile-parallel frame rendering.
//!
//! The frame is cut into fixed-size tiles. Each tile is submitted to a worker
//! pool together with its own copy of the scene and a per-pixel task list
//! decided from last frame's records; the worker rebuilds a grid and sampler
//! for that copy, handles only its pixels and answers with a message.
//! Workers never see the shared output buffer or the temporal cache.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use crate::error::RenderError;
use crate::geometry::Fp;
use crate::glyphs::GlyphSelector;
use crate::output::Cell;
use crate::pipeline::PixelPipeline;
use crate::quality::steps_for_pixel;
use crate::raymarch::MarchConfig;
use crate::scene::Scene;
use crate::spatial_grid::SpatialGrid;
use crate::temporal::PixelRecord;

pub const TILE_SIZE: u32 = 16;

/// Pixel rectangle `[x0, x1) x [y0, y1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tile {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Tile {
    pub fn pixel_count(&self) -> usize {
        ((self.x1 - self.x0) * (self.y1 - self.y0)) as usize
    }
}

pub fn partition(width: u32, height: u32, size: u32) -> Vec<Tile> {
    let size = size.max(1);
    let mut tiles = vec![];
    for y0 in (0..height).step_by(size as usize) {
        for x0 in (0..width).step_by(size as usize) {
            tiles.push(Tile {
                x0,
                y0,
                x1: (x0 + size).min(width),
                y1: (y0 + size).min(height),
            });
        }
    }
    tiles
}

/// Everything a worker needs besides the scene.
#[derive(Clone, Debug)]
pub struct TileSettings {
    pub march: MarchConfig,
    pub cell_size: Fp,
    pub dilate: bool,
    pub cell_aspect: Fp,
    pub center_steps: u32,
    pub edge_steps: u32,
}

/// What a worker does with one pixel.
#[derive(Clone, Debug, PartialEq)]
pub enum PixelTask {
    /// Last frame's cell stands; nothing comes back for this pixel.
    Skip,
    /// Shade the stored hit again without tracing.
    Reshade(PixelRecord),
    Trace,
}

#[derive(Clone, Debug)]
pub struct TileRequest {
    pub tile: Tile,
    pub scene: Scene,
    pub width: u32,
    pub height: u32,
    pub settings: Arc<TileSettings>,
    /// Row-major within the tile. Empty means trace every pixel.
    pub tasks: Vec<PixelTask>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShadedPixel {
    pub x: u32,
    pub y: u32,
    pub cell: Cell,
    pub record: PixelRecord,
    /// False when the cell came from re-shading a stored hit.
    pub traced: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TileResponse {
    pub tile: Tile,
    pub cells: Vec<ShadedPixel>,
    /// Traced pixels whose ray hit nothing.
    pub misses: Vec<(u32, u32)>,
}

/// Worker body: renders one tile against the request's own scene copy.
pub fn render_tile(request: &TileRequest, glyphs: &mut GlyphSelector) -> TileResponse {
    let settings = &request.settings;
    let grid = SpatialGrid::build(&request.scene.entities, settings.cell_size, settings.dilate);
    let pipeline = PixelPipeline::new(&request.scene, &grid, &settings.march, settings.cell_aspect);
    let tile = request.tile;
    let mut cells = Vec::with_capacity(tile.pixel_count());
    let mut misses = vec![];
    let mut slot = 0;
    for y in tile.y0..tile.y1 {
        for x in tile.x0..tile.x1 {
            let task = if request.tasks.is_empty() {
                &PixelTask::Trace
            } else {
                &request.tasks[slot]
            };
            slot += 1;
            match task {
                PixelTask::Skip => {}
                PixelTask::Reshade(record) => cells.push(ShadedPixel {
                    x,
                    y,
                    cell: pipeline.reshade(record, x, y, request.width, request.height, glyphs),
                    record: record.clone(),
                    traced: false,
                }),
                PixelTask::Trace => {
                    let steps =
                        steps_for_pixel(x, y, request.width, request.height, settings.center_steps, settings.edge_steps);
                    let outcome = pipeline.trace_pixel(x, y, request.width, request.height, steps, glyphs);
                    if outcome.record.entity.is_none() {
                        misses.push((x, y));
                    }
                    cells.push(ShadedPixel {
                        x,
                        y,
                        cell: outcome.cell,
                        record: outcome.record,
                        traced: true,
                    });
                }
            }
        }
    }
    TileResponse { tile, cells, misses }
}

/// Pending result of one submitted tile.
pub struct TileHandle {
    tile: Tile,
    receiver: mpsc::Receiver<TileResponse>,
}

impl TileHandle {
    /// Blocks until the worker answers. `None` if the worker died.
    pub fn join(self) -> Option<TileResponse> {
        match self.receiver.recv() {
            Ok(response) => Some(response),
            Err(_) => {
                log::warn!("tile worker for {:?} finished without a result", self.tile);
                None
            }
        }
    }
}

pub struct TileDispatcher {
    pool: rayon::ThreadPool,
    /// One private glyph selector per worker thread, reused across frames.
    selectors: Arc<Vec<Mutex<GlyphSelector>>>,
}

impl TileDispatcher {
    /// All cores but one, and never fewer than one worker.
    pub fn default_workers() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .saturating_sub(1)
            .max(1)
    }

    /// Each worker gets its own clone of `glyphs`: a private cache over the
    /// shared read-only database, or the ramp.
    pub fn new(workers: Option<usize>, glyphs: &GlyphSelector) -> Result<TileDispatcher, RenderError> {
        let workers = workers.unwrap_or_else(Self::default_workers).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tile-worker-{i}"))
            .panic_handler(|_| log::warn!("tile worker panicked; its tile is dropped for this frame"))
            .build()?;
        let selectors = (0..workers).map(|_| Mutex::new(glyphs.clone())).collect();
        log::info!("tile dispatcher started with {workers} workers");
        Ok(TileDispatcher {
            pool,
            selectors: Arc::new(selectors),
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn submit(&self, request: TileRequest) -> TileHandle {
        let (sender, receiver) = mpsc::sync_channel(1);
        let tile = request.tile;
        let selectors = Arc::clone(&self.selectors);
        self.pool.spawn(move || {
            let slot = rayon::current_thread_index().unwrap_or(0) % selectors.len();
            let mut glyphs = selectors[slot].lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let response = render_tile(&request, &mut glyphs);
            // the receiver is gone only if the frame was abandoned
            let _ = sender.send(response);
        });
        TileHandle { tile, receiver }
    }

    /// Submits every request, then waits for all of them. Lost tiles are
    /// skipped; their pixels keep last frame's contents.
    pub fn run_batch(&self, requests: Vec<TileRequest>) -> Vec<TileResponse> {
        let handles: Vec<TileHandle> = requests.into_iter().map(|request| self.submit(request)).collect();
        handles.into_iter().filter_map(TileHandle::join).collect()
    }
}
