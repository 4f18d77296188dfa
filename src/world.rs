use crate::geometry::{Fp, Vec3f, FP_INF};
use crate::scene::Entity;
use crate::sdf;
use crate::spatial_grid::SpatialGrid;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub distance: Fp,
    /// Index of the nearest entity, `None` for the background sentinel.
    pub entity: Option<usize>,
}

impl Sample {
    pub fn background() -> Sample {
        Sample {
            distance: FP_INF,
            entity: None,
        }
    }
}

/// Answers "what is nearest to this point" over a grid built from the same
/// entity slice. Borrowing both keeps a rebuild from interleaving with sampling.
#[derive(Clone, Copy)]
pub struct WorldSampler<'a> {
    entities: &'a [Entity],
    grid: &'a SpatialGrid,
}

impl<'a> WorldSampler<'a> {
    pub fn new(entities: &'a [Entity], grid: &'a SpatialGrid) -> Self {
        WorldSampler { entities, grid }
    }

    pub fn entities(&self) -> &'a [Entity] {
        self.entities
    }

    pub fn entity(&self, index: usize) -> Option<&'a Entity> {
        self.entities.get(index)
    }

    pub fn grid(&self) -> &'a SpatialGrid {
        self.grid
    }

    pub fn sample(&self, point: &Vec3f) -> Sample {
        self.sample_near(point, point)
    }

    /// Evaluates at `point` using the candidates of `anchor`'s cell, so samples
    /// a hair away from a surface still see the entity that owns it.
    pub fn sample_near(&self, anchor: &Vec3f, point: &Vec3f) -> Sample {
        let mut best = Sample::background();
        for index in self.grid.candidates(anchor).iter() {
            let Some(entity) = self.entities.get(index) else {
                continue;
            };
            let distance = entity_distance(entity, point);
            if distance < best.distance {
                best = Sample {
                    distance,
                    entity: Some(index),
                };
            }
        }
        best
    }
}

/// Distance from a world point to one entity. The local-space distance is
/// scaled by the smallest scale component, which is exact only for uniform
/// scale. Entities with a zero scale axis have no surface.
pub fn entity_distance(entity: &Entity, point: &Vec3f) -> Fp {
    let transform = &entity.transform;
    if transform.is_degenerate() {
        return FP_INF;
    }
    let local = transform.to_local(point);
    sdf::distance(&local, &entity.geometry) * transform.min_scale()
}
