//! Headless frame runner
//!
//! Drives the orchestrator on the recording device for a fixed number of
//! frames and logs what was submitted. Useful for checking a settings file
//! without a GPU.
//!
//! ```text
//! headless_frames [settings.json] [frames]
//! ```
//!
//! Scripted input: the camera flies forward for the first quarter, the
//! renderer switches to the path tracer at the half-way point and the camera
//! then rests so accumulation can converge.

use anyhow::Context;
use glam::{Mat4, UVec2, Vec3};

use hybrid::renderer::core::RecordedCommand;
use hybrid::resources::input::ButtonState;
use hybrid::resources::uniforms::GpuLight;
use hybrid::utils::FrameTimer;
use hybrid::{
    FrameOrchestrator, HeadlessDevice, Input, Key, ModelSystem, PlaneOptions, PointLights,
    RenderDevice, RenderMode, RendererSettings, create_box, create_plane,
};

const DEFAULT_FRAMES: u32 = 240;
const FIXED_DT: f32 = 1.0 / 60.0;

fn build_scene() -> ModelSystem {
    let mut models = ModelSystem::new();
    models.add(
        create_plane(PlaneOptions {
            width: 56.0,
            depth: 34.0,
            ..Default::default()
        }),
        &[Mat4::IDENTITY],
    );
    let pillars: Vec<Mat4> = (0..6)
        .map(|i| Mat4::from_translation(Vec3::new(-20.0 + 8.0 * i as f32, 2.0, 0.0)))
        .collect();
    models.add(create_box(1.5, 4.0, 1.5), &pillars);
    models
}

fn build_lights() -> PointLights {
    let mut lights = PointLights::new();
    lights.add(GpuLight::new(Vec3::new(-4.5, 5.7, -2.0), Vec3::new(3.5, 0.8, 0.9) * 6.3, 0.3));
    lights.add(GpuLight::new(Vec3::new(-0.5, 5.7, -2.0), Vec3::new(0.5, 3.8, 0.9) * 6.3, 0.3));
    lights.add(GpuLight::new(Vec3::new(4.5, 5.7, -2.0), Vec3::new(4.0, 0.5, 1.0) * 6.3, 0.3));
    lights
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let settings = match args.next() {
        Some(path) => RendererSettings::load(&path)
            .with_context(|| format!("loading renderer settings from {path}"))?,
        None => RendererSettings::default(),
    };
    let frames = match args.next() {
        Some(n) => n.parse::<u32>().context("frame count must be a positive integer")?,
        None => DEFAULT_FRAMES,
    };

    let mut orchestrator = match FrameOrchestrator::new(
        HeadlessDevice::default(),
        build_scene(),
        Box::new(build_lights()),
        settings,
    ) {
        Ok(orchestrator) => orchestrator,
        Err(err) if err.is_fatal() => {
            log::error!("{err}");
            std::process::exit(1);
        }
        Err(err) => return Err(err.into()),
    };

    let mut input = Input::new();
    let mut timer = FrameTimer::new();
    let mut resets = 0u32;
    let mut dispatches = 0usize;

    for frame in 0..frames {
        input.start_frame();
        if frame == 0 {
            input.inject_key(Key::W, ButtonState::Pressed);
        }
        if frame == frames / 4 {
            input.inject_key(Key::W, ButtonState::Released);
        }
        if frame == frames / 2 {
            orchestrator.set_render_mode(RenderMode::PathTracer);
        }
        if frame == frames * 3 / 4 {
            orchestrator.on_resize(UVec2::new(1920, 1080));
        }

        timer.begin();
        let report = orchestrator.render_frame(FIXED_DT, &input);
        timer.end();
        if report.accumulation_reset {
            resets += 1;
        }
        if report.collision.responses > 0 {
            log::debug!(
                "Frame {}: {} collision responses",
                report.frame,
                report.collision.responses
            );
        }
        dispatches += orchestrator
            .device_mut()
            .take_commands()
            .iter()
            .filter(|c| matches!(c, RecordedCommand::Dispatch(_)))
            .count();
    }

    log::info!(
        "{} frames recorded ({dispatches} dispatches), {resets} accumulation resets",
        orchestrator.device().frames_submitted()
    );
    log::info!(
        "Recording time per frame: mean {:?}, min {:?}, max {:?}",
        timer.mean(),
        timer.shortest(),
        timer.longest()
    );
    if let Some(tracer) = orchestrator.path_tracer() {
        log::info!("Path tracer reached {} samples per pixel", tracer.samples());
    }

    let device = orchestrator.shutdown();
    if device.misuse_count() > 0 {
        anyhow::bail!("{} resource misuses recorded", device.misuse_count());
    }
    log::info!(
        "Shutdown clean: {} textures, {} buffers, {} resident handles left",
        device.texture_count(),
        device.buffer_count(),
        device.resident_handle_count()
    );
    Ok(())
}
