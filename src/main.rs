use std::io::Write;

use anyhow::{bail, Context};
use glyph_raymarch::camera::CameraPose;
use glyph_raymarch::geometry::{Geometry, Transform, Vec3f};
use glyph_raymarch::glyph_db::GlyphStyle;
use glyph_raymarch::glyph_store::{FallbackRamp, JsonGlyphStore};
use glyph_raymarch::glyphs::GlyphSelector;
use glyph_raymarch::output::OutputBuffer;
use glyph_raymarch::scene::{
    Entity, Flicker, Fog, Light, LightKind, Material, Motion, MotionBehavior, NoiseShape, Scene, Velocity,
};
use glyph_raymarch::{FrameOrchestrator, RenderConfig};
use image::{ImageFormat, RgbImage};
use indicatif::{ProgressBar, ProgressStyle};

const FRAME_DT: f64 = 1.0 / 60.0;

struct Args {
    config: Option<String>,
    glyphs: Option<String>,
    frames: u32,
    png: Option<String>,
    width: u32,
    height: u32,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        config: None,
        glyphs: None,
        frames: 60,
        png: None,
        width: 100,
        height: 36,
    };
    let mut it = std::env::args().skip(1);
    while let Some(flag) = it.next() {
        let mut value = || it.next().with_context(|| format!("{flag} needs a value"));
        match flag.as_str() {
            "--config" => args.config = Some(value()?),
            "--glyphs" => args.glyphs = Some(value()?),
            "--png" => args.png = Some(value()?),
            "--frames" => args.frames = value()?.parse().context("--frames expects a number")?,
            "--width" => args.width = value()?.parse().context("--width expects a number")?,
            "--height" => args.height = value()?.parse().context("--height expects a number")?,
            other => bail!(
                "unknown argument {other}\nusage: glyph-raymarch [--config cfg.json] [--glyphs glyphs.json] \
                 [--frames N] [--width W] [--height H] [--png out.png]"
            ),
        }
    }
    Ok(args)
}

fn demo_scene() -> Scene {
    let mut scene = Scene::new(CameraPose {
        position: Vec3f::new(0.0, 2.0, 8.0),
        rotation: Vec3f::new(-0.15, 0.0, 0.0),
        ..Default::default()
    });
    scene.environment.background = [8, 8, 16];
    scene.environment.fog = Some(Fog {
        density: 0.04,
        color: [20, 20, 35],
    });

    let ground = Material {
        roughness: 0.9,
        glyph_style: Some(GlyphStyle::Line),
        ..Material::with_color([110, 100, 90])
    };
    scene.entities.push(Entity::new(
        0,
        Geometry::Plane { normal: Vec3f::y() },
        Transform::default(),
        ground,
    ));
    scene.entities.push(Entity::new(
        1,
        Geometry::Sphere { radius: 1.0 },
        Transform::at(Vec3f::new(-2.2, 1.0, 0.0)),
        Material {
            roughness: 0.1,
            glyph_style: Some(GlyphStyle::Round),
            ..Material::with_color([230, 80, 60])
        },
    ));
    scene.entities.push(Entity::new(
        2,
        Geometry::Box {
            half_extents: Vec3f::new(0.8, 0.8, 0.8),
        },
        Transform {
            position: Vec3f::new(0.0, 0.8, -1.0),
            rotation: Vec3f::new(0.0, 0.6, 0.0),
            ..Default::default()
        },
        Material {
            glyph_style: Some(GlyphStyle::Block),
            ..Material::with_color([70, 140, 230])
        },
    ));
    scene.entities.push(Entity::new(
        3,
        Geometry::Cylinder {
            radius: 0.6,
            height: 2.4,
        },
        Transform::at(Vec3f::new(2.4, 1.2, -0.5)),
        Material {
            glyph_style: Some(GlyphStyle::Angular),
            motion: Some(Motion {
                behavior: MotionBehavior::Pulse,
                speed: 2.0,
            }),
            ..Material::with_color([90, 210, 120])
        },
    ));
    let mut torus = Entity::new(
        4,
        Geometry::Generic {
            kind: "torus".to_string(),
            params: vec![0.7, 0.2],
        },
        Transform::at(Vec3f::new(0.0, 2.6, -1.0)),
        Material {
            emissive: Some(0.3),
            glyph_style: Some(GlyphStyle::Symbolic),
            ..Material::with_color([240, 200, 80])
        },
    );
    torus.velocity = Some(Velocity {
        linear: Vec3f::zeros(),
        angular: Vec3f::new(0.8, 0.0, 0.4),
    });
    scene.entities.push(torus);

    let mut lamp = Light::new(LightKind::Point { position: Vec3f::new(3.0, 5.0, 4.0) }, 40.0);
    lamp.color = [1.0, 0.9, 0.8];
    lamp.flicker = Some(Flicker {
        speed: 4.0,
        amplitude: 0.25,
        shape: NoiseShape::Smooth,
        seed: 11,
    });
    scene.lights.push(lamp);
    scene.lights.push(Light::new(
        LightKind::Directional {
            direction: Vec3f::new(0.4, -1.0, -0.3),
        },
        0.35,
    ));
    scene
}

fn print_truecolor(buffer: &OutputBuffer) -> std::io::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for y in 0..buffer.height() {
        for x in 0..buffer.width() {
            let cell = buffer.cell(buffer.index(x, y));
            let [r, g, b] = cell.rgb;
            write!(out, "\x1b[38;2;{r};{g};{b}m{}", cell.character())?;
        }
        writeln!(out, "\x1b[0m")?;
    }
    out.flush()
}

fn dump_rendered_to_png(buffer: &OutputBuffer, png_path: &str) -> anyhow::Result<()> {
    let mut img = RgbImage::new(buffer.width(), buffer.height());
    for y in 0..buffer.height() {
        for x in 0..buffer.width() {
            img.get_pixel_mut(x, y).0 = buffer.rgb[buffer.index(x, y)];
        }
    }
    img.save_with_format(png_path, ImageFormat::Png)
        .with_context(|| format!("failed to write {png_path}"))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => RenderConfig::from_json_file(path).with_context(|| format!("loading config {path}"))?,
        None => RenderConfig::default(),
    };
    let glyphs = match &args.glyphs {
        Some(path) => GlyphSelector::from_store(&JsonGlyphStore::new(path)),
        None => GlyphSelector::Ramp(FallbackRamp),
    };
    let mut frames = FrameOrchestrator::new(config, demo_scene(), glyphs, args.width, args.height)
        .context("failed to set up renderer")?;

    let progress = ProgressBar::new(args.frames as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} frames {msg}")
            .context("bad progress template")?,
    );
    let mut traced = 0;
    for _ in 0..args.frames {
        let stats = frames.tick(FRAME_DT, None);
        traced += stats.traces;
        progress.set_message(format!("{:.1} ms, scale {:.2}", stats.elapsed_ms, stats.scale));
        progress.inc(1);
    }
    progress.finish_and_clear();

    let glyph_stats = frames.glyph_stats();
    log::info!(
        "{} frames, {traced} rays traced, recent frame {:.2} ms, glyph cache {} hits / {} misses",
        args.frames,
        frames.average_frame_ms().unwrap_or(0.0),
        glyph_stats.hits,
        glyph_stats.misses
    );
    print_truecolor(frames.output())?;
    if let Some(path) = &args.png {
        dump_rendered_to_png(frames.output(), path)?;
    }
    Ok(())
}
