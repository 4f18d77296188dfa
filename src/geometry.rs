use na::Vector3;
use serde::{Deserialize, Serialize};

pub type Fp = f64;
pub type Vec3f = Vector3<Fp>;

pub static EPS: Fp = 0.00001;
pub const FP_INF: Fp = Fp::INFINITY;
pub const FP_NEG_INF: Fp = Fp::NEG_INFINITY;

/// Scale components below this magnitude make the local-space transform
/// meaningless; such entities are sampled as "no surface".
pub const DEGENERATE_SCALE: Fp = 1e-9;

#[derive(Clone, Debug)]
pub struct Ray {
    pub origin: Vec3f,
    pub direction: Vec3f,
}

impl Ray {
    pub fn at(&self, t: Fp) -> Vec3f {
        self.origin + self.direction * t
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    Sphere { radius: Fp },
    Box { half_extents: Vec3f },
    Plane { normal: Vec3f },
    Cylinder { radius: Fp, height: Fp },
    /// Named analytic SDF. Kinds the evaluator does not know yield no surface.
    Generic { kind: String, params: Vec<Fp> },
}

impl Geometry {
    /// Planes and generic SDFs have no useful bound and never enter the grid.
    pub fn is_infinite(&self) -> bool {
        matches!(self, Geometry::Plane { .. } | Geometry::Generic { .. })
    }
}

/// Position, Euler rotation (radians, applied X then Y then Z) and per-axis scale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3f,
    #[serde(default)]
    pub rotation: Vec3f,
    #[serde(default = "unit_scale")]
    pub scale: Vec3f,
}

fn unit_scale() -> Vec3f {
    Vec3f::new(1.0, 1.0, 1.0)
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            position: Vec3f::zeros(),
            rotation: Vec3f::zeros(),
            scale: unit_scale(),
        }
    }
}

impl Transform {
    pub fn at(position: Vec3f) -> Self {
        Transform {
            position,
            ..Default::default()
        }
    }

    pub fn min_scale(&self) -> Fp {
        self.scale.x.min(self.scale.y).min(self.scale.z)
    }

    pub fn is_degenerate(&self) -> bool {
        self.scale.iter().any(|s| s.abs() < DEGENERATE_SCALE)
    }

    /// World point into the entity's local frame: translate, undo rotation in
    /// reverse axis order, then divide by scale.
    pub fn to_local(&self, point: &Vec3f) -> Vec3f {
        let p = point - self.position;
        let p = rotate_z(&p, -self.rotation.z);
        let p = rotate_y(&p, -self.rotation.y);
        let p = rotate_x(&p, -self.rotation.x);
        p.component_div(&self.scale)
    }
}

pub fn rotate_x(v: &Vec3f, angle: Fp) -> Vec3f {
    let (s, c) = angle.sin_cos();
    Vec3f::new(v.x, v.y * c - v.z * s, v.y * s + v.z * c)
}

pub fn rotate_y(v: &Vec3f, angle: Fp) -> Vec3f {
    let (s, c) = angle.sin_cos();
    Vec3f::new(v.x * c + v.z * s, v.y, -v.x * s + v.z * c)
}

pub fn rotate_z(v: &Vec3f, angle: Fp) -> Vec3f {
    let (s, c) = angle.sin_cos();
    Vec3f::new(v.x * c - v.y * s, v.x * s + v.y * c, v.z)
}

/// Forward Euler rotation, X then Y then Z.
pub fn rotate_euler(v: &Vec3f, euler: &Vec3f) -> Vec3f {
    let v = rotate_x(v, euler.x);
    let v = rotate_y(&v, euler.y);
    rotate_z(&v, euler.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_local_undoes_forward_rotation() {
        let transform = Transform {
            position: Vec3f::new(1.0, -2.0, 0.5),
            rotation: Vec3f::new(0.3, -1.1, 2.0),
            scale: Vec3f::new(1.0, 1.0, 1.0),
        };
        let local = Vec3f::new(0.25, 0.5, -0.75);
        let world = rotate_euler(&local, &transform.rotation) + transform.position;
        let back = transform.to_local(&world);
        assert!((back - local).norm() < 1e-12);
    }

    #[test]
    fn to_local_divides_by_scale() {
        let transform = Transform {
            position: Vec3f::zeros(),
            rotation: Vec3f::zeros(),
            scale: Vec3f::new(2.0, 4.0, 0.5),
        };
        let local = transform.to_local(&Vec3f::new(2.0, 2.0, 2.0));
        assert_eq!(local, Vec3f::new(1.0, 0.5, 4.0));
    }

    #[test]
    fn zero_scale_is_degenerate() {
        let mut transform = Transform::default();
        assert!(!transform.is_degenerate());
        transform.scale.y = 0.0;
        assert!(transform.is_degenerate());
    }
}
