use crate::geometry::{Fp, Vec3f};
use crate::glyph_db::GlyphQuery;
use crate::glyphs::GlyphSelector;
use crate::lighting::{apply_fog, shade};
use crate::output::Cell;
use crate::raymarch::{march, MarchConfig};
use crate::scene::Scene;
use crate::spatial_grid::SpatialGrid;
use crate::temporal::PixelRecord;
use crate::world::WorldSampler;

#[derive(Clone, Debug, PartialEq)]
pub struct PixelOutcome {
    pub cell: Cell,
    pub record: PixelRecord,
}

/// Trace, shade and glyph selection for single pixels of one frame. Every
/// stage has a fallback, so a pixel always produces a cell.
pub struct PixelPipeline<'a> {
    scene: &'a Scene,
    sampler: WorldSampler<'a>,
    march: &'a MarchConfig,
    cell_aspect: Fp,
}

impl<'a> PixelPipeline<'a> {
    pub fn new(scene: &'a Scene, grid: &'a SpatialGrid, march: &'a MarchConfig, cell_aspect: Fp) -> Self {
        PixelPipeline {
            scene,
            sampler: WorldSampler::new(&scene.entities, grid),
            march,
            cell_aspect,
        }
    }

    pub fn background(&self) -> Cell {
        Cell::blank(self.scene.environment.background)
    }

    fn view_direction(&self, x: u32, y: u32, width: u32, height: u32) -> Vec3f {
        self.scene
            .camera
            .ray_for_pixel(x, y, width, height, self.cell_aspect)
            .direction
    }

    pub fn trace_pixel(&self, x: u32, y: u32, width: u32, height: u32, steps: u32, glyphs: &mut GlyphSelector) -> PixelOutcome {
        let ray = self.scene.camera.ray_for_pixel(x, y, width, height, self.cell_aspect);
        match march(&self.sampler, &ray, steps, self.march) {
            Some(hit) => PixelOutcome {
                cell: self.shade_surface(hit.entity, &hit.position, &hit.normal, hit.distance, &ray.direction, glyphs),
                record: PixelRecord::hit(hit.entity, hit.distance, hit.position, hit.normal),
            },
            None => PixelOutcome {
                cell: self.background(),
                record: PixelRecord::miss(),
            },
        }
    }

    /// Re-lights a stored hit without tracing.
    pub fn reshade(&self, record: &PixelRecord, x: u32, y: u32, width: u32, height: u32, glyphs: &mut GlyphSelector) -> Cell {
        match record.entity {
            Some(entity) => {
                let view = self.view_direction(x, y, width, height);
                self.shade_surface(entity, &record.position, &record.normal, record.depth, &view, glyphs)
            }
            None => self.background(),
        }
    }

    fn shade_surface(
        &self,
        entity: usize,
        position: &Vec3f,
        normal: &Vec3f,
        depth: Fp,
        view: &Vec3f,
        glyphs: &mut GlyphSelector,
    ) -> Cell {
        let Some(entity) = self.sampler.entity(entity) else {
            return self.background();
        };
        let material = &entity.material;
        let environment = &self.scene.environment;
        let lit = shade(&self.scene.lights, environment, material, self.scene.time, position, normal);
        let lit = apply_fog(environment, lit, depth);
        let brightness = lit.brightness as Fp;
        let query = GlyphQuery {
            coverage: brightness,
            roundness: Some((1.0 - material.roughness).clamp(0.0, 1.0)),
            // grazing surfaces get busier glyphs
            complexity: Some(1.0 - normal.dot(view).abs().min(1.0)),
            style: material.glyph_style,
        };
        let character = glyphs.select(brightness, &query);
        Cell::new(character, lit.rgb, lit.brightness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraPose;
    use crate::geometry::{Geometry, Transform};
    use crate::glyph_store::FallbackRamp;
    use crate::scene::{Entity, Light, LightKind, Material};

    fn lit_sphere_scene() -> Scene {
        let mut scene = Scene::new(CameraPose::looking_from(Vec3f::new(0.0, 1.0, 6.0)));
        scene.environment.background = [1, 2, 3];
        scene.entities.push(Entity::new(
            0,
            Geometry::Sphere { radius: 1.0 },
            Transform::at(Vec3f::new(0.0, 1.0, 0.0)),
            Material::with_color([255, 128, 0]),
        ));
        scene.lights.push(Light::new(
            LightKind::Directional {
                direction: Vec3f::new(0.0, 0.0, -1.0),
            },
            1.0,
        ));
        scene
    }

    #[test]
    fn centre_pixel_hits_and_corner_misses() {
        let scene = lit_sphere_scene();
        let grid = SpatialGrid::build(&scene.entities, 2.0, false);
        let config = MarchConfig::default();
        let pipeline = PixelPipeline::new(&scene, &grid, &config, 2.0);
        let mut glyphs = GlyphSelector::Ramp(FallbackRamp);

        let centre = pipeline.trace_pixel(10, 5, 21, 11, 64, &mut glyphs);
        assert_eq!(centre.record.entity, Some(0));
        assert!((centre.record.depth - 5.0).abs() < 0.02);
        assert_eq!(centre.cell.character(), '@');
        assert_eq!(centre.cell.rgb[2], 0);
        assert!(centre.cell.rgb[0] > centre.cell.rgb[1]);

        let corner = pipeline.trace_pixel(0, 0, 21, 11, 64, &mut glyphs);
        assert!(corner.record.valid);
        assert_eq!(corner.record.entity, None);
        assert_eq!(corner.cell, Cell::blank([1, 2, 3]));
    }

    #[test]
    fn reshade_matches_fresh_trace_for_static_scene() {
        let scene = lit_sphere_scene();
        let grid = SpatialGrid::build(&scene.entities, 2.0, false);
        let config = MarchConfig::default();
        let pipeline = PixelPipeline::new(&scene, &grid, &config, 2.0);
        let mut glyphs = GlyphSelector::Ramp(FallbackRamp);
        let traced = pipeline.trace_pixel(11, 5, 21, 11, 64, &mut glyphs);
        let reshaded = pipeline.reshade(&traced.record, 11, 5, 21, 11, &mut glyphs);
        assert_eq!(traced.cell, reshaded);
    }
}
