use serde::{Deserialize, Serialize};

use crate::geometry::{rotate_euler, Fp, Ray, Vec3f};

/// Camera position plus Euler rotation (pitch, yaw, roll). With zero
/// rotation the camera looks down -Z with +Y up.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vec3f,
    #[serde(default)]
    pub rotation: Vec3f,
    #[serde(default = "default_fov_y")]
    pub fov_y: Fp,
}

fn default_fov_y() -> Fp {
    std::f64::consts::FRAC_PI_3
}

impl Default for CameraPose {
    fn default() -> Self {
        CameraPose {
            position: Vec3f::zeros(),
            rotation: Vec3f::zeros(),
            fov_y: default_fov_y(),
        }
    }
}

impl CameraPose {
    pub fn looking_from(position: Vec3f) -> Self {
        CameraPose {
            position,
            ..Default::default()
        }
    }

    /// True when every position and rotation component is within `eps`.
    pub fn approx_eq(&self, other: &CameraPose, eps: Fp) -> bool {
        let close = |a: &Vec3f, b: &Vec3f| a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= eps);
        close(&self.position, &other.position)
            && close(&self.rotation, &other.rotation)
            && (self.fov_y - other.fov_y).abs() <= eps
    }

    pub fn forward(&self) -> Vec3f {
        rotate_euler(&Vec3f::new(0.0, 0.0, -1.0), &self.rotation)
    }

    /// Primary ray through the centre of cell `(x, y)` of a `width` x `height`
    /// grid whose cells are `cell_aspect` times taller than they are wide.
    pub fn ray_for_pixel(&self, x: u32, y: u32, width: u32, height: u32, cell_aspect: Fp) -> Ray {
        let w = width.max(1) as Fp;
        let h = height.max(1) as Fp;
        let real_x = x as Fp + 0.5;
        let real_y = y as Fp + 0.5;
        let half_height = (self.fov_y * 0.5).tan();
        let aspect = w / (h * cell_aspect);
        let px = (2.0 * real_x / w - 1.0) * half_height * aspect;
        let py = -(2.0 * real_y / h - 1.0) * half_height;
        let local = Vec3f::new(px, py, -1.0);
        Ray {
            origin: self.position,
            direction: rotate_euler(&local, &self.rotation).normalize(),
        }
    }
}
