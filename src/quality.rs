use std::time::{Duration, Instant};

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use crate::geometry::Fp;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Turns the resolution-scale lever on or off; step falloff always applies.
    pub adaptive: bool,
    pub target_frame_ms: Fp,
    pub min_scale: Fp,
    pub max_scale: Fp,
    pub scale_down_step: Fp,
    pub scale_up_step: Fp,
    pub center_steps: u32,
    pub edge_steps: u32,
    pub frame_deadline_ms: Fp,
    /// Pixels between two deadline checks in the single-threaded scan.
    pub deadline_check_interval: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        QualityConfig {
            adaptive: true,
            target_frame_ms: 16.0,
            min_scale: 0.5,
            max_scale: 1.0,
            scale_down_step: 0.05,
            scale_up_step: 0.02,
            center_steps: 64,
            edge_steps: 24,
            frame_deadline_ms: 12.0,
            deadline_check_interval: 64,
        }
    }
}

/// Step budget for a pixel, falling off linearly from `center` at the screen
/// centre to `edge` at the corners.
pub fn steps_for_pixel(x: u32, y: u32, width: u32, height: u32, center: u32, edge: u32) -> u32 {
    let nx = (x as Fp + 0.5) / width.max(1) as Fp * 2.0 - 1.0;
    let ny = (y as Fp + 0.5) / height.max(1) as Fp * 2.0 - 1.0;
    let r = ((nx * nx + ny * ny).sqrt() / std::f64::consts::SQRT_2).clamp(0.0, 1.0);
    let steps = center as Fp + (edge as Fp - center as Fp) * r;
    steps.round().max(1.0) as u32
}

const HISTORY: usize = 8;

/// Holds the render-resolution scale and nudges it after every frame:
/// down quickly when over budget, up slowly when comfortably under.
#[derive(Clone, Debug)]
pub struct AdaptiveQuality {
    config: QualityConfig,
    scale: Fp,
    recent: ArrayVec<Fp, HISTORY>,
}

impl AdaptiveQuality {
    pub fn new(config: QualityConfig) -> Self {
        let scale = config.max_scale;
        AdaptiveQuality {
            config,
            scale,
            recent: ArrayVec::new(),
        }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    pub fn scale(&self) -> Fp {
        self.scale
    }

    pub fn steps_for_pixel(&self, x: u32, y: u32, width: u32, height: u32) -> u32 {
        steps_for_pixel(x, y, width, height, self.config.center_steps, self.config.edge_steps)
    }

    pub fn scaled_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let w = (width as Fp * self.scale).round().max(1.0) as u32;
        let h = (height as Fp * self.scale).round().max(1.0) as u32;
        (w.min(width.max(1)), h.min(height.max(1)))
    }

    pub fn average_ms(&self) -> Option<Fp> {
        if self.recent.is_empty() {
            None
        } else {
            Some(self.recent.iter().sum::<Fp>() / self.recent.len() as Fp)
        }
    }

    /// Feeds the last frame time. Returns the new scale when it changed.
    pub fn record_frame(&mut self, frame_ms: Fp) -> Option<Fp> {
        if self.recent.is_full() {
            self.recent.remove(0);
        }
        self.recent.push(frame_ms);
        if !self.config.adaptive {
            return None;
        }
        let target = self.config.target_frame_ms;
        let proposed = if frame_ms > target * 1.2 {
            (self.scale - self.config.scale_down_step).max(self.config.min_scale)
        } else if frame_ms < target * 0.8 {
            (self.scale + self.config.scale_up_step).min(self.config.max_scale)
        } else {
            self.scale
        };
        // keep repeated steps from drifting off the configured bounds
        let proposed = (proposed * 1e6).round() / 1e6;
        if proposed == self.scale {
            return None;
        }
        log::info!(
            "resolution scale {:.2} -> {:.2} (frame {:.2} ms, target {:.2} ms)",
            self.scale,
            proposed,
            frame_ms,
            target
        );
        self.scale = proposed;
        Some(proposed)
    }
}

/// Best-effort per-frame time limit, sampled every `interval` pixels.
pub struct FrameDeadline {
    start: Instant,
    budget: Duration,
    interval: u32,
}

impl FrameDeadline {
    pub fn new(budget_ms: Fp, interval: u32) -> Self {
        FrameDeadline {
            start: Instant::now(),
            budget: Duration::from_secs_f64(budget_ms.max(0.0) / 1000.0),
            interval: interval.max(1),
        }
    }

    pub fn should_abort(&self, pixels_done: u32) -> bool {
        pixels_done > 0 && pixels_done % self.interval == 0 && self.start.elapsed() > self.budget
    }
}
