use serde::{Deserialize, Serialize};

use crate::camera::CameraPose;
use crate::geometry::{Fp, Geometry, Transform, Vec3f, EPS};
use crate::glyph_db::GlyphStyle;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fog {
    pub density: Fp,
    pub color: [u8; 3],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub ambient: Fp,
    pub background: [u8; 3],
    #[serde(default)]
    pub fog: Option<Fog>,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            ambient: 0.1,
            background: [0, 0, 0],
            fog: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseShape {
    Sine,
    Smooth,
    Jitter,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Flicker {
    pub speed: Fp,
    pub amplitude: Fp,
    pub shape: NoiseShape,
    #[serde(default)]
    pub seed: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LightKind {
    Point { position: Vec3f },
    Directional { direction: Vec3f },
    Spot { position: Vec3f, direction: Vec3f },
    /// Accepted from the scene but contributes nothing when shading.
    Area { position: Vec3f, size: Vec3f },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub kind: LightKind,
    /// Unmodulated intensity as loaded.
    pub base_intensity: Fp,
    /// `base_intensity` times this tick's flicker modulation.
    #[serde(default)]
    pub current_intensity: Fp,
    pub color: [Fp; 3],
    #[serde(default)]
    pub range: Option<Fp>,
    #[serde(default)]
    pub falloff: Option<Fp>,
    #[serde(default)]
    pub flicker: Option<Flicker>,
}

impl Light {
    pub fn new(kind: LightKind, intensity: Fp) -> Self {
        Light {
            kind,
            base_intensity: intensity,
            current_intensity: intensity,
            color: [1.0, 1.0, 1.0],
            range: None,
            falloff: None,
            flicker: None,
        }
    }

    pub fn is_flickering(&self) -> bool {
        self.flicker
            .as_ref()
            .map_or(false, |f| f.amplitude.abs() > EPS && f.speed.abs() > EPS)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionBehavior {
    Static,
    Pulse,
    Flicker,
    Flow,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    pub behavior: MotionBehavior,
    pub speed: Fp,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub color: [u8; 3],
    #[serde(default = "full_brightness")]
    pub brightness: Fp,
    #[serde(default)]
    pub emissive: Option<Fp>,
    #[serde(default)]
    pub roughness: Fp,
    #[serde(default)]
    pub reflectivity: Fp,
    #[serde(default)]
    pub glyph_style: Option<GlyphStyle>,
    #[serde(default)]
    pub motion: Option<Motion>,
}

fn full_brightness() -> Fp {
    1.0
}

impl Default for Material {
    fn default() -> Self {
        Material {
            color: [255, 255, 255],
            brightness: 1.0,
            emissive: None,
            roughness: 0.5,
            reflectivity: 0.0,
            glyph_style: None,
            motion: None,
        }
    }
}

impl Material {
    pub fn with_color(color: [u8; 3]) -> Self {
        Material {
            color,
            ..Default::default()
        }
    }

    /// Shading of an animated material changes over time even when nothing moves.
    pub fn is_animated(&self) -> bool {
        self.motion
            .as_ref()
            .map_or(false, |m| m.behavior != MotionBehavior::Static && m.speed != 0.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    #[serde(default)]
    pub linear: Vec3f,
    #[serde(default)]
    pub angular: Vec3f,
}

impl Velocity {
    pub fn is_zero(&self) -> bool {
        self.linear.norm() <= EPS && self.angular.norm() <= EPS
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: u32,
    pub transform: Transform,
    pub geometry: Geometry,
    pub material: Material,
    #[serde(default)]
    pub velocity: Option<Velocity>,
}

impl Entity {
    pub fn new(id: u32, geometry: Geometry, transform: Transform, material: Material) -> Self {
        Entity {
            id,
            transform,
            geometry,
            material,
            velocity: None,
        }
    }

    pub fn is_stationary(&self) -> bool {
        self.velocity.as_ref().map_or(true, Velocity::is_zero)
    }
}

/// Typed, already-validated scene snapshot. Loaded once, then mutated in
/// place by the animation step; cloning gives tile workers an independent copy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub time: Fp,
    pub camera: CameraPose,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub lights: Vec<Light>,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl Scene {
    pub fn new(camera: CameraPose) -> Self {
        Scene {
            time: 0.0,
            camera,
            environment: Default::default(),
            lights: vec![],
            entities: vec![],
        }
    }

    pub fn any_moving(&self) -> bool {
        self.entities.iter().any(|e| !e.is_stationary())
    }

    pub fn any_flickering(&self) -> bool {
        self.lights.iter().any(Light::is_flickering)
    }

    pub fn any_animated_material(&self) -> bool {
        self.entities.iter().any(|e| e.material.is_animated())
    }

    pub fn degenerate_entities(&self) -> Vec<u32> {
        self.entities
            .iter()
            .filter(|e| e.transform.is_degenerate())
            .map(|e| e.id)
            .collect()
    }
}
