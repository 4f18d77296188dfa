use serde::{Deserialize, Serialize};

use crate::geometry::{Fp, Ray, Vec3f};
use crate::world::WorldSampler;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarchConfig {
    /// Step budget when the caller does not supply one.
    pub max_steps: u32,
    pub hit_threshold: Fp,
    pub max_distance: Fp,
    /// Central-difference offset for normals.
    pub normal_epsilon: Fp,
}

impl Default for MarchConfig {
    fn default() -> Self {
        MarchConfig {
            max_steps: 64,
            hit_threshold: 0.01,
            max_distance: 100.0,
            normal_epsilon: 0.001,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Hit {
    pub position: Vec3f,
    pub normal: Vec3f,
    /// Ray parameter at the hit, equal to distance for unit directions.
    pub distance: Fp,
    pub entity: usize,
    pub steps: u32,
}

/// Sphere-traces `ray` (unit direction) through `sampler`.
///
/// Each step advances by the sampled distance, capped at the exit of the
/// current grid cell because entities outside the cell are not sampled.
/// Advancing by the field value assumes it is 1-Lipschitz; non-uniform scale
/// breaks that and can overshoot thin geometry.
pub fn march(sampler: &WorldSampler, ray: &Ray, max_steps: u32, config: &MarchConfig) -> Option<Hit> {
    let grid = sampler.grid();
    let mut t = 0.0;
    for step in 0..max_steps {
        let position = ray.at(t);
        let sample = sampler.sample(&position);
        if let Some(entity) = sample.entity {
            if sample.distance < config.hit_threshold {
                return Some(Hit {
                    normal: estimate_normal(sampler, &position, config.normal_epsilon),
                    position,
                    distance: t,
                    entity,
                    steps: step + 1,
                });
            }
        }
        t += sample.distance.min(grid.exit_distance(&position, &ray.direction));
        if t > config.max_distance {
            return None;
        }
    }
    None
}

/// Central-difference gradient of the field around `p`, six samples taken
/// with the candidate set of `p`'s own cell.
pub fn estimate_normal(sampler: &WorldSampler, p: &Vec3f, eps: Fp) -> Vec3f {
    let axis = |offset: Vec3f| {
        sampler.sample_near(p, &(p + offset)).distance - sampler.sample_near(p, &(p - offset)).distance
    };
    let gradient = Vec3f::new(
        axis(Vec3f::new(eps, 0.0, 0.0)),
        axis(Vec3f::new(0.0, eps, 0.0)),
        axis(Vec3f::new(0.0, 0.0, eps)),
    );
    let len = gradient.norm();
    if len.is_finite() && len > 0.0 {
        gradient / len
    } else {
        Vec3f::zeros()
    }
}
