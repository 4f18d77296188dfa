use crate::camera::CameraPose;
use crate::config::RenderConfig;
use crate::geometry::{Fp, Geometry, Ray, Transform, Vec3f};
use crate::glyph_db::tests::sample_records;
use crate::glyph_db::GlyphDatabase;
use crate::glyph_store::{FallbackRamp, GlyphStore, JsonGlyphStore};
use crate::glyphs::GlyphSelector;
use crate::orchestrator::FrameOrchestrator;
use crate::raymarch::{march, MarchConfig};
use crate::scene::{Entity, Flicker, Light, LightKind, Material, NoiseShape, Scene, Velocity};
use crate::spatial_grid::SpatialGrid;
use crate::world::WorldSampler;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::Arc;

const WIDTH: u32 = 32;
const HEIGHT: u32 = 16;

fn steady_config() -> RenderConfig {
    let mut config = RenderConfig::default();
    config.quality.adaptive = false;
    config.quality.frame_deadline_ms = 60_000.0;
    config
}

fn entity(id: u32, geometry: Geometry, at: Vec3f, color: [u8; 3]) -> Entity {
    Entity::new(id, geometry, Transform::at(at), Material::with_color(color))
}

fn still_life() -> Scene {
    let mut scene = Scene::new(CameraPose::looking_from(Vec3f::new(0.0, 1.5, 7.0)));
    scene.entities = vec![
        entity(0, Geometry::Plane { normal: Vec3f::y() }, Vec3f::zeros(), [90, 90, 90]),
        entity(1, Geometry::Sphere { radius: 1.0 }, Vec3f::new(-1.5, 1.0, 0.0), [220, 60, 40]),
        entity(
            2,
            Geometry::Box {
                half_extents: Vec3f::new(0.7, 0.7, 0.7),
            },
            Vec3f::new(1.5, 0.7, 0.0),
            [40, 120, 220],
        ),
    ];
    scene.lights = vec![
        Light::new(LightKind::Point { position: Vec3f::new(3.0, 5.0, 4.0) }, 30.0),
        Light::new(
            LightKind::Directional {
                direction: Vec3f::new(-0.3, -1.0, -0.2),
            },
            0.4,
        ),
    ];
    scene
}

fn database() -> Arc<GlyphDatabase> {
    Arc::new(GlyphDatabase::from_records(sample_records()).unwrap())
}

fn orchestrator(config: RenderConfig, scene: Scene) -> FrameOrchestrator {
    FrameOrchestrator::new(config, scene, GlyphSelector::from_database(database()), WIDTH, HEIGHT).unwrap()
}

#[test]
fn second_static_frame_traces_nothing_and_changes_nothing() {
    let mut frames = orchestrator(steady_config(), still_life());
    let first = frames.tick(0.0, None);
    assert_eq!(first.traces, (WIDTH * HEIGHT) as usize);
    let before = frames.output().clone();
    frames.clear_dirty();

    let second = frames.tick(0.016, None);
    assert_eq!(second.traces, 0);
    assert_eq!(second.full_reuse, (WIDTH * HEIGHT) as usize);
    assert_eq!(second.dirty, 0);
    assert_eq!(frames.output().code_points, before.code_points);
    assert_eq!(frames.output().rgb, before.rgb);
}

#[test]
fn identical_inputs_give_identical_frames() {
    let mut a = orchestrator(steady_config(), still_life());
    let mut b = orchestrator(steady_config(), still_life());
    for _ in 0..3 {
        a.tick(0.016, None);
        b.tick(0.016, None);
    }
    assert_eq!(a.output(), b.output());
    assert!(a.output().code_points.iter().any(|c| *c != ' ' as u32));
}

#[test]
fn tile_workers_match_single_threaded_scan() {
    let mut serial = orchestrator(steady_config(), still_life());
    let mut config = steady_config();
    config.dispatch.parallel = true;
    config.dispatch.workers = Some(3);
    config.dispatch.tile_size = 8;
    let mut parallel = orchestrator(config, still_life());

    serial.tick(0.0, None);
    let stats = parallel.tick(0.0, None);
    assert_eq!(stats.traces, (WIDTH * HEIGHT) as usize);
    assert_eq!(serial.output().code_points, parallel.output().code_points);
    assert_eq!(serial.output().rgb, parallel.output().rgb);
    assert_eq!(serial.output().brightness, parallel.output().brightness);
}

fn tile_config() -> RenderConfig {
    let mut config = steady_config();
    config.dispatch.parallel = true;
    config.dispatch.workers = Some(2);
    config.dispatch.tile_size = 8;
    config
}

#[test]
fn tile_workers_skip_a_static_second_frame() {
    let mut frames = orchestrator(tile_config(), still_life());
    frames.tick(0.0, None);
    let before = frames.output().clone();
    frames.clear_dirty();

    let second = frames.tick(0.016, None);
    assert_eq!(second.traces, 0);
    assert_eq!(second.full_reuse, (WIDTH * HEIGHT) as usize);
    assert_eq!(second.dirty, 0);
    assert_eq!(frames.output().code_points, before.code_points);
}

#[test]
fn tile_workers_reshade_like_the_scan_under_flicker() {
    let flickering = || {
        let mut scene = still_life();
        scene.lights[0].flicker = Some(Flicker {
            speed: 3.0,
            amplitude: 0.5,
            shape: NoiseShape::Sine,
            seed: 7,
        });
        scene
    };
    let mut serial = orchestrator(steady_config(), flickering());
    let mut parallel = orchestrator(tile_config(), flickering());
    for dt in [0.0, 0.25] {
        let a = serial.tick(dt, None);
        let b = parallel.tick(dt, None);
        assert_eq!((a.traces, a.geometry_reuse, a.full_reuse), (b.traces, b.geometry_reuse, b.full_reuse));
        assert_eq!(a.misses, b.misses);
    }
    assert!(parallel.tick(0.25, None).geometry_reuse > 0);
    assert_eq!(serial.tick(0.25, None).traces, 0);
    assert_eq!(serial.output().code_points, parallel.output().code_points);
    assert_eq!(serial.output().rgb, parallel.output().rgb);
}

#[test]
fn flickering_light_reshades_stored_hits() {
    let mut scene = still_life();
    scene.lights[0].flicker = Some(Flicker {
        speed: 3.0,
        amplitude: 0.5,
        shape: NoiseShape::Sine,
        seed: 7,
    });
    let mut frames = orchestrator(steady_config(), scene);
    frames.tick(0.0, None);
    let stats = frames.tick(0.25, None);
    assert_eq!(stats.traces, 0);
    assert!(stats.geometry_reuse > 0);
    assert_eq!(stats.geometry_reuse + stats.full_reuse, (WIDTH * HEIGHT) as usize);
    let intensity = frames.scene().lights[0].current_intensity;
    assert!((intensity - 30.0 * (1.0 + 0.5 * (0.25 * 3.0 as Fp).sin())).abs() < 1e-9);
}

fn with_moving_sphere() -> Scene {
    let mut scene = still_life();
    scene.entities[1].velocity = Some(Velocity {
        linear: Vec3f::new(1.0, 0.0, 0.0),
        angular: Vec3f::zeros(),
    });
    scene
}

#[test]
fn moving_entity_leaves_stationary_hits_reused() {
    let mut frames = orchestrator(steady_config(), with_moving_sphere());
    let first = frames.tick(0.0, None);
    let stats = frames.tick(0.5, None);
    assert!((frames.scene().entities[1].transform.position.x + 1.0).abs() < 1e-12);
    // plane and box hits stay; sphere hits and misses are traced again
    assert!(stats.full_reuse > 0);
    assert!(stats.traces > 0);
    assert_eq!(stats.geometry_reuse, 0);
    assert_eq!(stats.traces + stats.full_reuse, (WIDTH * HEIGHT) as usize);
    assert!(stats.traces >= first.misses);
}

#[test]
fn conservative_motion_mode_retraces_every_pixel() {
    let mut config = steady_config();
    config.temporal.reuse_under_motion = false;
    let mut frames = orchestrator(config, with_moving_sphere());
    frames.tick(0.0, None);
    let stats = frames.tick(0.5, None);
    assert_eq!(stats.traces, (WIDTH * HEIGHT) as usize);
    assert_eq!(stats.full_reuse, 0);
}

#[test]
fn zero_scale_entity_renders_as_nothing() {
    let mut with_degenerate = still_life();
    let mut squashed = entity(9, Geometry::Sphere { radius: 1.0 }, Vec3f::new(0.0, 1.5, 3.0), [255, 0, 255]);
    squashed.transform.scale = Vec3f::new(0.0, 1.0, 1.0);
    with_degenerate.entities.push(squashed);

    let mut a = orchestrator(steady_config(), with_degenerate);
    let mut b = orchestrator(steady_config(), still_life());
    a.tick(0.0, None);
    b.tick(0.0, None);
    assert_eq!(a.output(), b.output());
}

#[test]
fn slow_frames_shrink_render_but_not_output() {
    let mut config = steady_config();
    config.quality.adaptive = true;
    config.quality.target_frame_ms = 1e-6;
    let mut frames = orchestrator(config, still_life());
    let first = frames.tick(0.0, None);
    assert_eq!(first.scale, 1.0);
    assert_eq!(frames.quality_scale(), 0.95);

    let second = frames.tick(0.016, None);
    assert_eq!(second.scale, 0.95);
    // 32x16 at 0.95 renders 30x15, which drops every temporal record
    assert_eq!(second.traces, 30 * 15);
    assert_eq!(frames.output().width(), WIDTH);
    assert_eq!(frames.output().height(), HEIGHT);
}

#[test]
fn expired_deadline_cuts_scan_and_keeps_finished_pixels() {
    let mut config = steady_config();
    config.quality.frame_deadline_ms = 0.0;
    config.quality.deadline_check_interval = 100;
    let mut frames = orchestrator(config, still_life());
    let first = frames.tick(0.0, None);
    assert!(first.aborted);
    assert!(first.traces < (WIDTH * HEIGHT) as usize);
    let second = frames.tick(0.016, None);
    assert_eq!(second.full_reuse, first.traces);
}

#[test]
fn missing_glyph_store_still_renders_with_ramp() {
    let glyphs = GlyphSelector::from_store(&JsonGlyphStore::new("/no/such/glyphs.json"));
    assert!(matches!(glyphs, GlyphSelector::Ramp(FallbackRamp)));
    let mut frames = FrameOrchestrator::new(steady_config(), still_life(), glyphs, WIDTH, HEIGHT).unwrap();
    frames.tick(0.0, None);
    let text = frames.output().to_text();
    assert_eq!(text.lines().count(), HEIGHT as usize);
    assert!(text.chars().any(|c| "@%#*+=-:.".contains(c)));
}

#[test]
fn bundled_glyph_set_loads() {
    let store = JsonGlyphStore::new(concat!(env!("CARGO_MANIFEST_DIR"), "/glyphs/ascii.json"));
    let records = store.load().unwrap();
    assert!(records.iter().all(|r| r.code_point == r.character as u32));
    let db = GlyphDatabase::from_records(records).unwrap();
    assert_eq!(db.records()[0].character, ' ');
    assert_eq!(db.records().last().unwrap().norm_coverage, 1.0);
}

#[test]
fn random_hits_lie_on_the_surface() {
    let scene = still_life();
    let grid = SpatialGrid::build(&scene.entities, 2.0, false);
    let sampler = WorldSampler::new(&scene.entities, &grid);
    let config = MarchConfig::default();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(2024);
    let mut hits = 0;
    for _ in 0..500 {
        let origin = Vec3f::new(rng.gen_range(-4.0..4.0), rng.gen_range(1.0..5.0), rng.gen_range(5.0..9.0));
        let target = Vec3f::new(rng.gen_range(-3.0..3.0), rng.gen_range(0.0..2.0), rng.gen_range(-1.0..1.0));
        let ray = Ray {
            origin,
            direction: (target - origin).normalize(),
        };
        let Some(hit) = march(&sampler, &ray, 256, &config) else {
            continue;
        };
        hits += 1;
        assert!(sampler.sample(&hit.position).distance < config.hit_threshold);
        assert!((hit.normal.norm() - 1.0).abs() < 1e-6);
        assert!(hit.normal.dot(&ray.direction) < 0.0, "normal faces the camera");
    }
    assert!(hits > 350, "only {hits} of 500 rays hit");
}
