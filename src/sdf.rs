use crate::geometry::{Fp, Geometry, Vec3f, FP_INF};

/// Signed distance from a point in the geometry's local frame to its surface.
///
/// Geometry the evaluator cannot handle (an unknown generic kind, missing
/// parameters, a zero plane normal) reports `+inf`, meaning "no surface here".
pub fn distance(p: &Vec3f, geometry: &Geometry) -> Fp {
    match geometry {
        Geometry::Sphere { radius } => p.norm() - radius,
        Geometry::Box { half_extents } => box_distance(p, half_extents),
        Geometry::Plane { normal } => {
            let len = normal.norm();
            if len == 0.0 {
                FP_INF
            } else {
                p.dot(&(normal / len))
            }
        }
        Geometry::Cylinder { radius, height } => {
            let radial = (p.x * p.x + p.z * p.z).sqrt() - radius;
            let axial = p.y.abs() - height * 0.5;
            let outside = (radial.max(0.0).powi(2) + axial.max(0.0).powi(2)).sqrt();
            outside + radial.max(axial).min(0.0)
        }
        Geometry::Generic { kind, params } => generic_distance(p, kind, params),
    }
}

fn box_distance(p: &Vec3f, half_extents: &Vec3f) -> Fp {
    let q = p.abs() - half_extents;
    let outside = q.sup(&Vec3f::zeros()).norm();
    let inside = q.x.max(q.y).max(q.z).min(0.0);
    outside + inside
}

fn generic_distance(p: &Vec3f, kind: &str, params: &[Fp]) -> Fp {
    match (kind, params) {
        ("torus", [major, minor, ..]) => {
            let ring = (p.x * p.x + p.z * p.z).sqrt() - major;
            (ring * ring + p.y * p.y).sqrt() - minor
        }
        ("capsule", [radius, half_height, ..]) => {
            let y = p.y - p.y.clamp(-half_height, *half_height);
            Vec3f::new(p.x, y, p.z).norm() - radius
        }
        // Bound rather than exact distance, still 1-Lipschitz.
        ("octahedron", [size, ..]) => (p.x.abs() + p.y.abs() + p.z.abs() - size) * 0.577_350_27,
        _ => FP_INF,
    }
}
