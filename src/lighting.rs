use crate::animation::noise;
use crate::geometry::{Fp, Vec3f};
use crate::scene::{Environment, Light, LightKind, Material, MotionBehavior, NoiseShape};

/// Cosine of the fixed 30 degree spot half-angle.
const SPOT_COS_HALF_ANGLE: Fp = 0.866_025_403_784_438_6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shade {
    pub rgb: [u8; 3],
    pub brightness: f32,
}

fn lambert(normal: &Vec3f, to_light: &Vec3f) -> Fp {
    normal.dot(to_light).max(0.0)
}

fn point_attenuation(light: &Light, distance: Fp) -> Fp {
    let falloff = match light.falloff {
        Some(exponent) => 1.0 / distance.max(1e-6).powf(exponent),
        None => 1.0 / (distance * distance).max(1e-12),
    };
    let cutoff = match light.range {
        Some(range) if range > 0.0 => (1.0 - (distance / range).powi(2)).max(0.0),
        _ => 1.0,
    };
    falloff * cutoff
}

/// Scalar (pre-colour) contribution of one light at a surface point.
pub fn light_contribution(light: &Light, position: &Vec3f, normal: &Vec3f) -> Fp {
    let intensity = light.current_intensity;
    match &light.kind {
        LightKind::Point { position: source } => {
            let to_light = source - position;
            let distance = to_light.norm();
            if distance == 0.0 {
                return 0.0;
            }
            intensity * point_attenuation(light, distance) * lambert(normal, &(to_light / distance))
        }
        LightKind::Directional { direction } => {
            let len = direction.norm();
            if len == 0.0 {
                return 0.0;
            }
            intensity * lambert(normal, &(-direction / len))
        }
        LightKind::Spot {
            position: source,
            direction,
        } => {
            let to_light = source - position;
            let distance = to_light.norm();
            let axis_len = direction.norm();
            if distance == 0.0 || axis_len == 0.0 {
                return 0.0;
            }
            let to_light = to_light / distance;
            if (-to_light).dot(&(direction / axis_len)) < SPOT_COS_HALF_ANGLE {
                return 0.0;
            }
            intensity * point_attenuation(light, distance) * lambert(normal, &to_light)
        }
        LightKind::Area { .. } => 0.0,
    }
}

/// Time-varying multiplier a material's motion tag applies to its shading.
pub fn motion_modulation(material: &Material, position: &Vec3f, time: Fp) -> Fp {
    let Some(motion) = &material.motion else {
        return 1.0;
    };
    let phase = time * motion.speed;
    match motion.behavior {
        MotionBehavior::Static => 1.0,
        MotionBehavior::Pulse => 0.75 + 0.25 * phase.sin(),
        MotionBehavior::Flicker => 0.7 + 0.3 * noise(NoiseShape::Smooth, 0x5eed, phase),
        MotionBehavior::Flow => 0.75 + 0.25 * (position.y * 2.0 - phase).sin(),
    }
}

/// Lights a surface point. Emission is added before the base-colour multiply;
/// ambient is always added. Brightness is the mean of the accumulated channels.
pub fn shade(
    lights: &[Light],
    environment: &Environment,
    material: &Material,
    time: Fp,
    position: &Vec3f,
    normal: &Vec3f,
) -> Shade {
    let mut accumulated = [0.0; 3];
    for light in lights {
        let contribution = light_contribution(light, position, normal);
        if contribution <= 0.0 {
            continue;
        }
        for (channel, tint) in accumulated.iter_mut().zip(light.color.iter()) {
            *channel += contribution * tint;
        }
    }
    let emissive = material.emissive.unwrap_or(0.0);
    let gain = material.brightness * motion_modulation(material, position, time);
    for channel in accumulated.iter_mut() {
        *channel = (*channel + emissive + environment.ambient) * gain;
    }

    let mut rgb = [0u8; 3];
    for c in 0..3 {
        rgb[c] = (accumulated[c] * material.color[c] as Fp).floor().clamp(0.0, 255.0) as u8;
    }
    let mean = accumulated.iter().sum::<Fp>() / 3.0;
    Shade {
        rgb,
        brightness: mean.clamp(0.0, 1.0) as f32,
    }
}

/// Blends a shaded colour toward the fog colour by `1 - exp(-density * t)`.
pub fn apply_fog(environment: &Environment, shade: Shade, distance: Fp) -> Shade {
    let Some(fog) = &environment.fog else {
        return shade;
    };
    let amount = 1.0 - (-fog.density.max(0.0) * distance).exp();
    let mut rgb = shade.rgb;
    for (c, value) in rgb.iter_mut().enumerate() {
        let mixed = *value as Fp * (1.0 - amount) + fog.color[c] as Fp * amount;
        *value = mixed.round().clamp(0.0, 255.0) as u8;
    }
    Shade {
        rgb,
        brightness: (shade.brightness as Fp * (1.0 - amount)) as f32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Fog, Motion};

    fn dark() -> Environment {
        Environment {
            ambient: 0.0,
            background: [0, 0, 0],
            fog: None,
        }
    }

    #[test]
    fn point_light_inverse_square() {
        let light = Light::new(
            LightKind::Point {
                position: Vec3f::new(0.0, 2.0, 0.0),
            },
            4.0,
        );
        let c = light_contribution(&light, &Vec3f::zeros(), &Vec3f::y());
        assert!((c - 1.0).abs() < 1e-12);
        // facing away
        assert_eq!(light_contribution(&light, &Vec3f::zeros(), &-Vec3f::y()), 0.0);
    }

    #[test]
    fn range_cutoff_and_custom_falloff() {
        let mut light = Light::new(
            LightKind::Point {
                position: Vec3f::new(0.0, 2.0, 0.0),
            },
            1.0,
        );
        light.range = Some(4.0);
        let c = light_contribution(&light, &Vec3f::zeros(), &Vec3f::y());
        assert!((c - 0.25 * 0.75).abs() < 1e-12);
        light.range = Some(1.0);
        assert_eq!(light_contribution(&light, &Vec3f::zeros(), &Vec3f::y()), 0.0);
        light.range = None;
        light.falloff = Some(1.0);
        assert!((light_contribution(&light, &Vec3f::zeros(), &Vec3f::y()) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn spot_cone_excludes_outside_points() {
        let light = Light::new(
            LightKind::Spot {
                position: Vec3f::new(0.0, 1.0, 0.0),
                direction: Vec3f::new(0.0, -1.0, 0.0),
            },
            1.0,
        );
        assert!(light_contribution(&light, &Vec3f::zeros(), &Vec3f::y()) > 0.99);
        // 45 degrees off the axis
        assert_eq!(light_contribution(&light, &Vec3f::new(1.0, 0.0, 0.0), &Vec3f::y()), 0.0);
    }

    #[test]
    fn area_light_contributes_nothing() {
        let light = Light::new(
            LightKind::Area {
                position: Vec3f::new(0.0, 1.0, 0.0),
                size: Vec3f::new(1.0, 1.0, 1.0),
            },
            10.0,
        );
        assert_eq!(light_contribution(&light, &Vec3f::zeros(), &Vec3f::y()), 0.0);
    }

    #[test]
    fn emissive_before_base_colour_and_ambient_always() {
        let material = Material {
            color: [200, 100, 0],
            emissive: Some(0.5),
            ..Default::default()
        };
        let env = Environment {
            ambient: 0.25,
            ..dark()
        };
        let shade = shade(&[], &env, &material, 0.0, &Vec3f::zeros(), &Vec3f::y());
        assert_eq!(shade.rgb, [150, 75, 0]);
        assert!((shade.brightness - 0.75).abs() < 1e-6);
    }

    #[test]
    fn channels_clamp_and_brightness_saturates() {
        let light = Light::new(
            LightKind::Directional {
                direction: Vec3f::new(0.0, -1.0, 0.0),
            },
            3.0,
        );
        let shade = shade(&[light], &dark(), &Material::default(), 0.0, &Vec3f::zeros(), &Vec3f::y());
        assert_eq!(shade.rgb, [255, 255, 255]);
        assert_eq!(shade.brightness, 1.0);
    }

    #[test]
    fn pulse_modulates_over_time() {
        let material = Material {
            emissive: Some(1.0),
            motion: Some(Motion {
                behavior: MotionBehavior::Pulse,
                speed: 1.0,
            }),
            ..Default::default()
        };
        let rest = shade(&[], &dark(), &material, 0.0, &Vec3f::zeros(), &Vec3f::y());
        let peak = shade(&[], &dark(), &material, std::f64::consts::FRAC_PI_2, &Vec3f::zeros(), &Vec3f::y());
        assert!(peak.brightness > rest.brightness);
    }

    #[test]
    fn fog_pulls_toward_fog_colour() {
        let env = Environment {
            fog: Some(Fog {
                density: 10.0,
                color: [10, 20, 30],
            }),
            ..dark()
        };
        let lit = Shade {
            rgb: [255, 255, 255],
            brightness: 1.0,
        };
        let fogged = apply_fog(&env, lit, 50.0);
        assert_eq!(fogged.rgb, [10, 20, 30]);
        assert!(fogged.brightness < 1e-6);
        assert_eq!(apply_fog(&dark(), lit, 50.0), lit);
    }
}
