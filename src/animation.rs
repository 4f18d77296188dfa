use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::geometry::Fp;
use crate::scene::{Light, NoiseShape, Scene};

fn lattice_rng(seed: u64, cell: i64) -> Xoshiro256PlusPlus {
    Xoshiro256PlusPlus::seed_from_u64(seed ^ (cell as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Deterministic noise in `[-1, 1]` for a given seed and phase.
pub fn noise(shape: NoiseShape, seed: u64, phase: Fp) -> Fp {
    match shape {
        NoiseShape::Sine => phase.sin(),
        NoiseShape::Smooth => {
            let cell = phase.floor();
            let frac = phase - cell;
            let a: Fp = lattice_rng(seed, cell as i64).gen_range(-1.0..=1.0);
            let b: Fp = lattice_rng(seed, cell as i64 + 1).gen_range(-1.0..=1.0);
            let t = frac * frac * (3.0 - 2.0 * frac);
            a + (b - a) * t
        }
        NoiseShape::Jitter => {
            // a fresh gaussian draw four times per unit of phase
            let step = (phase * 4.0).floor() as i64;
            let Ok(normal) = Normal::<Fp>::new(0.0, 0.5) else {
                return 0.0;
            };
            normal.sample(&mut lattice_rng(seed, step)).clamp(-1.0, 1.0)
        }
    }
}

/// Flicker multiplier for a light at scene time `time`, never negative.
pub fn flicker_modulation(light: &Light, time: Fp) -> Fp {
    match &light.flicker {
        Some(flicker) => (1.0 + flicker.amplitude * noise(flicker.shape, flicker.seed, time * flicker.speed)).max(0.0),
        None => 1.0,
    }
}

/// Advances the scene by `dt` seconds: integrates entity velocities and
/// recomputes every light's current intensity from its base intensity.
/// Returns true when any entity transform changed.
pub fn advance(scene: &mut Scene, dt: Fp) -> bool {
    scene.time += dt;
    let mut moved = false;
    for entity in scene.entities.iter_mut() {
        let Some(velocity) = &entity.velocity else {
            continue;
        };
        if velocity.is_zero() || dt == 0.0 {
            continue;
        }
        entity.transform.position += velocity.linear * dt;
        entity.transform.rotation += velocity.angular * dt;
        moved = true;
    }
    let time = scene.time;
    for light in scene.lights.iter_mut() {
        light.current_intensity = light.base_intensity * flicker_modulation(light, time);
    }
    moved
}
