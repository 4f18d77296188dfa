use crate::geometry::{Fp, Vec3f};

/// What a pixel resolved to last frame.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelRecord {
    pub valid: bool,
    pub depth: Fp,
    /// Hit entity index, `None` when the ray missed everything.
    pub entity: Option<usize>,
    pub position: Vec3f,
    pub normal: Vec3f,
}

impl Default for PixelRecord {
    fn default() -> Self {
        PixelRecord {
            valid: false,
            depth: Fp::INFINITY,
            entity: None,
            position: Vec3f::zeros(),
            normal: Vec3f::zeros(),
        }
    }
}

impl PixelRecord {
    pub fn miss() -> Self {
        PixelRecord {
            valid: true,
            ..Default::default()
        }
    }

    pub fn hit(entity: usize, depth: Fp, position: Vec3f, normal: Vec3f) -> Self {
        PixelRecord {
            valid: true,
            depth,
            entity: Some(entity),
            position,
            normal,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReusePolicy {
    /// Output cell is left untouched.
    Full,
    /// Stored hit position and normal are re-shaded; no trace.
    Geometry,
    /// Full trace.
    None,
}

/// Frame-wide inputs to the reuse decision.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameMotion {
    pub camera_static: bool,
    pub any_moving: bool,
    pub any_flicker: bool,
    /// Keep reusing hits on stationary entities while other entities move.
    /// A moving entity that passes in front of such a pixel is then not drawn
    /// there until the pixel is traced again.
    pub reuse_under_motion: bool,
}

pub fn decide(record: &PixelRecord, frame: &FrameMotion, hit_stationary: bool, hit_animated: bool) -> ReusePolicy {
    if !frame.camera_static || !record.valid {
        return ReusePolicy::None;
    }
    match record.entity {
        None if frame.any_moving => ReusePolicy::None,
        None => ReusePolicy::Full,
        Some(_) if !hit_stationary => ReusePolicy::None,
        Some(_) if frame.any_moving && !frame.reuse_under_motion => ReusePolicy::None,
        Some(_) if frame.any_flicker || hit_animated => ReusePolicy::Geometry,
        Some(_) => ReusePolicy::Full,
    }
}

/// Per-pixel memory of the previous frame, sized to the render resolution.
#[derive(Clone, Debug, Default)]
pub struct TemporalCache {
    width: u32,
    height: u32,
    records: Vec<PixelRecord>,
}

impl TemporalCache {
    pub fn new(width: u32, height: u32) -> Self {
        TemporalCache {
            width,
            height,
            records: vec![PixelRecord::default(); (width * height) as usize],
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Reallocates when the size changes, which leaves every record invalid.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if (width, height) == (self.width, self.height) {
            return false;
        }
        *self = TemporalCache::new(width, height);
        true
    }

    pub fn invalidate_all(&mut self) {
        for record in self.records.iter_mut() {
            record.valid = false;
        }
    }

    pub fn invalidate(&mut self, x: u32, y: u32) {
        let index = (y * self.width + x) as usize;
        self.records[index].valid = false;
    }

    /// Invalidates `(x, y)` and every pixel after it in row-major order.
    pub fn invalidate_from(&mut self, x: u32, y: u32) {
        let start = (y * self.width + x) as usize;
        for record in self.records.iter_mut().skip(start) {
            record.valid = false;
        }
    }

    pub fn get(&self, x: u32, y: u32) -> &PixelRecord {
        &self.records[(y * self.width + x) as usize]
    }

    pub fn store(&mut self, x: u32, y: u32, record: PixelRecord) {
        let index = (y * self.width + x) as usize;
        self.records[index] = record;
    }

    pub fn valid_count(&self) -> usize {
        self.records.iter().filter(|r| r.valid).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn still() -> FrameMotion {
        FrameMotion {
            camera_static: true,
            ..Default::default()
        }
    }

    fn hit() -> PixelRecord {
        PixelRecord::hit(0, 3.0, Vec3f::zeros(), Vec3f::z())
    }

    #[test]
    fn invalid_or_moved_camera_means_full_trace() {
        assert_eq!(decide(&PixelRecord::default(), &still(), true, false), ReusePolicy::None);
        let moved = FrameMotion {
            camera_static: false,
            ..still()
        };
        assert_eq!(decide(&hit(), &moved, true, false), ReusePolicy::None);
    }

    #[test]
    fn misses_reuse_only_without_moving_entities() {
        assert_eq!(decide(&PixelRecord::miss(), &still(), true, false), ReusePolicy::Full);
        let moving = FrameMotion {
            any_moving: true,
            ..still()
        };
        assert_eq!(decide(&PixelRecord::miss(), &moving, true, false), ReusePolicy::None);
    }

    #[test]
    fn stationary_hits_reuse_fully_or_reshade() {
        assert_eq!(decide(&hit(), &still(), true, false), ReusePolicy::Full);
        let flicker = FrameMotion {
            any_flicker: true,
            ..still()
        };
        assert_eq!(decide(&hit(), &flicker, true, false), ReusePolicy::Geometry);
        assert_eq!(decide(&hit(), &still(), true, true), ReusePolicy::Geometry);
        assert_eq!(decide(&hit(), &still(), false, false), ReusePolicy::None);
    }

    #[test]
    fn motion_elsewhere_blocks_hit_reuse_unless_allowed() {
        let moving = FrameMotion {
            any_moving: true,
            ..still()
        };
        assert_eq!(decide(&hit(), &moving, true, false), ReusePolicy::None);
        let lenient = FrameMotion {
            reuse_under_motion: true,
            ..moving
        };
        assert_eq!(decide(&hit(), &lenient, true, false), ReusePolicy::Full);
    }

    #[test]
    fn resize_reallocates_and_invalidates() {
        let mut cache = TemporalCache::new(4, 3);
        cache.store(1, 2, PixelRecord::miss());
        assert_eq!(cache.valid_count(), 1);
        assert!(!cache.resize(4, 3));
        assert_eq!(cache.valid_count(), 1);
        assert!(cache.resize(8, 3));
        assert_eq!(cache.valid_count(), 0);
        assert_eq!(cache.dimensions(), (8, 3));

        cache.store(0, 0, hit());
        cache.store(7, 1, hit());
        cache.store(7, 2, hit());
        cache.invalidate_from(0, 2);
        assert_eq!(cache.valid_count(), 2);
        cache.invalidate(0, 0);
        assert!(!cache.get(0, 0).valid);
        assert!(cache.get(7, 1).valid);
        cache.invalidate_all();
        assert_eq!(cache.valid_count(), 0);
        assert_eq!(cache.get(7, 2).entity, Some(0));
    }
}
