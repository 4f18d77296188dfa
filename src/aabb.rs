use crate::geometry::{Fp, Geometry, Transform, Vec3f, FP_INF, FP_NEG_INF};

#[derive(Clone, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3f,
    pub max: Vec3f,
}

impl Default for Aabb {
    fn default() -> Self {
        Aabb {
            min: Vec3f::new(FP_INF, FP_INF, FP_INF),
            max: Vec3f::new(FP_NEG_INF, FP_NEG_INF, FP_NEG_INF),
        }
    }
}

/// Integer coordinate of a grid cell.
pub type CellCoord = (i64, i64, i64);

pub fn cell_of(point: &Vec3f, cell_size: Fp) -> CellCoord {
    (
        (point.x / cell_size).floor() as i64,
        (point.y / cell_size).floor() as i64,
        (point.z / cell_size).floor() as i64,
    )
}

impl Aabb {
    pub fn around(center: Vec3f, half: Vec3f) -> Aabb {
        Aabb {
            min: center - half,
            max: center + half,
        }
    }

    pub fn extend_aabb(&self, aabb: &Aabb) -> Aabb {
        Aabb {
            min: self.min.inf(&aabb.min),
            max: self.max.sup(&aabb.max),
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    /// Axis-aligned bound of a finite geometry under `transform`. Rotation is
    /// not taken into account; `None` for planes and generic SDFs.
    pub fn for_geometry(geometry: &Geometry, transform: &Transform) -> Option<Aabb> {
        let s = transform.scale.abs();
        let center = transform.position;
        match geometry {
            Geometry::Sphere { radius } => {
                let r = radius * s.x.max(s.y).max(s.z);
                Some(Aabb::around(center, Vec3f::new(r, r, r)))
            }
            Geometry::Box { half_extents } => {
                Some(Aabb::around(center, half_extents.abs().component_mul(&s)))
            }
            Geometry::Cylinder { radius, height } => {
                let r = radius * s.x.max(s.z);
                Some(Aabb::around(center, Vec3f::new(r, height * 0.5 * s.y, r)))
            }
            Geometry::Plane { .. } | Geometry::Generic { .. } => None,
        }
    }

    /// Every grid cell this box overlaps, inclusive on both ends.
    pub fn cells(&self, cell_size: Fp) -> impl Iterator<Item = CellCoord> {
        let lo = cell_of(&self.min, cell_size);
        let hi = cell_of(&self.max, cell_size);
        (lo.0..=hi.0).flat_map(move |x| {
            (lo.1..=hi.1).flat_map(move |y| (lo.2..=hi.2).map(move |z| (x, y, z)))
        })
    }
}
