//! Frame Orchestrator Tests
//!
//! Tests for:
//! - Start-up capability checks and fallbacks
//! - Render/presentation resolution and resize reallocation
//! - Idempotent `apply()` of unchanged requests
//! - Render mode switching and resource lifecycle
//! - Per-frame report (presented image, hotkeys)

use glam::{Mat4, UVec2};

use hybrid::renderer::core::{PassKind, RecordedCommand};
use hybrid::renderer::{GBufferSlot, ModeResources};
use hybrid::resources::input::ButtonState;
use hybrid::{
    Capabilities, FrameOrchestrator, HeadlessDevice, Input, Key, ModelSystem, PlaneOptions,
    PointLights, RenderDevice, RenderError, RenderMode, RendererSettings, TemporalMode, VrsMode,
    create_plane,
};

const DT: f32 = 1.0 / 60.0;

fn scene() -> ModelSystem {
    let mut models = ModelSystem::new();
    models.add(
        create_plane(PlaneOptions {
            width: 20.0,
            depth: 20.0,
            ..Default::default()
        }),
        &[Mat4::IDENTITY],
    );
    models
}

fn orchestrator_on(
    device: HeadlessDevice,
    settings: RendererSettings,
) -> FrameOrchestrator<HeadlessDevice, ModelSystem> {
    match FrameOrchestrator::new(device, scene(), Box::new(PointLights::new()), settings) {
        Ok(orchestrator) => orchestrator,
        Err(err) => panic!("bring-up failed: {err}"),
    }
}

fn orchestrator(settings: RendererSettings) -> FrameOrchestrator<HeadlessDevice, ModelSystem> {
    orchestrator_on(HeadlessDevice::default(), settings)
}

fn settings_at(presentation: UVec2, scale: f32) -> RendererSettings {
    RendererSettings {
        presentation,
        resolution_scale: scale,
        ..Default::default()
    }
}

fn label_size(device: &HeadlessDevice, label: &str) -> Vec<UVec2> {
    device.textures_labeled(label).map(|(_, desc)| desc.size()).collect()
}

// ============================================================================
// Start-up
// ============================================================================

#[test]
fn missing_required_capability_is_fatal() {
    let result = FrameOrchestrator::new(
        HeadlessDevice::new(Capabilities::empty()),
        scene(),
        Box::new(PointLights::new()),
        RendererSettings::default(),
    );
    let Err(err) = result else {
        panic!("bring-up must fail without required capabilities");
    };
    assert!(matches!(err, RenderError::MissingCapability { .. }));
    assert!(err.is_fatal());
}

#[test]
fn unsupported_optional_features_fall_back_at_startup() {
    let mut settings = RendererSettings {
        temporal_mode: TemporalMode::Upscaler,
        ..Default::default()
    };
    settings.raster.vrs = VrsMode::Apply;

    let orch = orchestrator_on(HeadlessDevice::new(Capabilities::REQUIRED), settings);
    assert_eq!(orch.temporal_mode(), TemporalMode::None);
    assert_eq!(orch.settings().raster.vrs, VrsMode::Off);
    assert!(!orch.temporal().has_upscaler_targets());
}

#[test]
fn zero_presentation_is_clamped() {
    let orch = orchestrator(settings_at(UVec2::ZERO, 1.0));
    assert_eq!(orch.presentation_resolution(), UVec2::ONE);
    assert_eq!(orch.render_resolution(), UVec2::ONE);
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn half_scale_renders_at_half_resolution() {
    let present = UVec2::new(1920, 1080);
    let orch = orchestrator(settings_at(present, 0.5));
    let render = UVec2::new(960, 540);

    assert_eq!(orch.render_resolution(), render);
    assert_eq!(orch.presentation_resolution(), present);

    let device = orch.device();
    for slot in GBufferSlot::ALL {
        assert_eq!(label_size(device, slot.label()), vec![render], "{slot:?}");
    }
    assert_eq!(label_size(device, "Raster Result"), vec![render]);
    assert_eq!(label_size(device, "Post Output"), vec![present]);
    assert_eq!(orch.post().size(), present);
}

#[test]
fn resize_reallocates_without_stale_residency() {
    let mut orch = orchestrator(settings_at(UVec2::new(1920, 1080), 0.5));
    let input = Input::new();
    orch.render_frame(DT, &input);
    let textures = orch.device().texture_count();
    let buffers = orch.device().buffer_count();

    orch.on_resize(UVec2::new(1280, 720));
    orch.render_frame(DT, &input);

    let render = UVec2::new(640, 360);
    assert_eq!(orch.render_resolution(), render);
    assert!((orch.resolution_scale() - 0.5).abs() < f32::EPSILON);

    let device = orch.device();
    for slot in GBufferSlot::ALL {
        assert_eq!(label_size(device, slot.label()), vec![render], "{slot:?}");
    }
    assert_eq!(device.resident_handle_count(), GBufferSlot::ALL.len());
    assert_eq!(device.texture_count(), textures);
    assert_eq!(device.buffer_count(), buffers);
    assert_eq!(device.misuse_count(), 0);
}

#[test]
fn reapplying_identical_values_reallocates_nothing() {
    let present = UVec2::new(1600, 900);
    let mut orch = orchestrator(settings_at(present, 0.75));
    orch.render_frame(DT, &Input::new());

    let before = orch
        .rasterizer()
        .map(|pipeline| pipeline.gbuffer().texture(GBufferSlot::Depth));

    orch.set_resolution(present, 0.75);
    orch.set_render_mode(RenderMode::Rasterizer);
    assert!(orch.set_temporal_mode(TemporalMode::None).is_ok());
    orch.apply();
    assert!(!orch.has_pending_changes());

    let after = orch
        .rasterizer()
        .map(|pipeline| pipeline.gbuffer().texture(GBufferSlot::Depth));
    assert_eq!(before, after);
    assert!(orch.device().is_resident(after.unwrap_or_default()));
}

#[test]
fn invalid_scale_keeps_current_scale() {
    let mut orch = orchestrator(settings_at(UVec2::new(1920, 1080), 0.5));
    orch.set_resolution(UVec2::new(1920, 1080), 0.0);
    orch.set_resolution(UVec2::new(1920, 1080), f32::NAN);
    orch.apply();
    assert_eq!(orch.render_resolution(), UVec2::new(960, 540));
}

#[test]
fn changes_wait_for_apply() {
    let mut orch = orchestrator(RendererSettings::default());
    orch.set_render_mode(RenderMode::PathTracer);
    assert!(orch.has_pending_changes());
    assert_eq!(orch.render_mode(), RenderMode::Rasterizer);

    orch.apply();
    assert_eq!(orch.render_mode(), RenderMode::PathTracer);
}

// ============================================================================
// Mode switching
// ============================================================================

#[test]
fn mode_round_trip_returns_to_baseline() {
    let mut orch = orchestrator(RendererSettings::default());
    let input = Input::new();
    orch.render_frame(DT, &input);

    let textures = orch.device().texture_count();
    let buffers = orch.device().buffer_count();
    let resident = orch.device().resident_handle_count();
    assert_eq!(resident, GBufferSlot::ALL.len());

    orch.set_render_mode(RenderMode::PathTracer);
    let report = orch.render_frame(DT, &input);
    assert_eq!(report.mode, RenderMode::PathTracer);
    {
        let device = orch.device();
        assert_eq!(device.textures_labeled("Raster Result").count(), 0);
        assert_eq!(device.textures_labeled("Path Tracer Result").count(), 1);
        assert_eq!(device.resident_handle_count(), 0);
    }

    orch.set_render_mode(RenderMode::Rasterizer);
    orch.render_frame(DT, &input);
    let device = orch.device();
    assert_eq!(device.textures_labeled("Path Tracer Result").count(), 0);
    assert_eq!(device.texture_count(), textures);
    assert_eq!(device.buffer_count(), buffers);
    assert_eq!(device.resident_handle_count(), resident);
    assert_eq!(device.misuse_count(), 0);
}

#[test]
fn mode_switch_never_holds_both_sets() {
    let mut orch = orchestrator(RendererSettings::default());
    orch.render_frame(DT, &Input::new());
    let rasterizing = orch.device().texture_count();

    orch.device_mut().reset_peak_texture_count();
    orch.set_render_mode(RenderMode::PathTracer);
    orch.apply();
    let tracing = orch.device().texture_count();
    assert!(tracing < rasterizing);
    assert_eq!(orch.device().peak_texture_count(), rasterizing);

    orch.device_mut().reset_peak_texture_count();
    orch.set_render_mode(RenderMode::Rasterizer);
    orch.apply();
    assert_eq!(orch.device().texture_count(), rasterizing);
    assert_eq!(orch.device().peak_texture_count(), rasterizing);
    assert_eq!(orch.device().misuse_count(), 0);
}

#[test]
fn switching_mode_and_size_together_skips_resizing_the_old_mode() {
    let start = UVec2::new(1280, 720);
    let target = UVec2::new(1920, 1080);

    let mut switched = orchestrator(settings_at(start, 1.0));
    switched.render_frame(DT, &Input::new());
    let created = switched.device().textures_created();
    switched.set_resolution(target, 1.0);
    switched.set_render_mode(RenderMode::PathTracer);
    switched.apply();
    let switch_cost = switched.device().textures_created() - created;

    let mut tracing = orchestrator(RendererSettings {
        render_mode: RenderMode::PathTracer,
        ..settings_at(start, 1.0)
    });
    tracing.render_frame(DT, &Input::new());
    let created = tracing.device().textures_created();
    tracing.set_resolution(target, 1.0);
    tracing.apply();
    let resize_cost = tracing.device().textures_created() - created;

    assert_eq!(switch_cost, resize_cost);
    assert_eq!(
        switched.mode_resources().map(ModeResources::mode),
        Some(RenderMode::PathTracer)
    );
    assert_eq!(label_size(switched.device(), "Path Tracer Result"), vec![target]);
    assert_eq!(label_size(switched.device(), "GBuffer Depth"), Vec::<UVec2>::new());
}

#[test]
fn path_tracer_frames_record_no_raster_passes() {
    let settings = RendererSettings {
        render_mode: RenderMode::PathTracer,
        ..Default::default()
    };
    let mut orch = orchestrator(settings);
    orch.render_frame(DT, &Input::new());

    let passes = orch.device().recorded_passes();
    assert!(passes.contains(&PassKind::PathTrace));
    assert!(!passes.contains(&PassKind::GBuffer));
    assert!(!passes.contains(&PassKind::TaaResolve));
    assert!(matches!(orch.mode_resources(), Some(ModeResources::PathTracer(_))));
}

// ============================================================================
// Frame report
// ============================================================================

#[test]
fn presented_image_is_post_output() {
    let present = UVec2::new(800, 600);
    let mut orch = orchestrator(settings_at(present, 1.0));
    let report = orch.render_frame(DT, &Input::new());

    assert_eq!(report.presented, orch.post().output());
    let presents: Vec<_> = orch
        .device()
        .commands()
        .iter()
        .filter_map(|cmd| match cmd {
            RecordedCommand::Present { image, viewport } => Some((*image, *viewport)),
            _ => None,
        })
        .collect();
    assert_eq!(presents, vec![(report.presented, present)]);
    assert!(matches!(orch.device().commands().last(), Some(RecordedCommand::EndFrame)));
    assert_eq!(orch.device().frames_submitted(), 1);
    assert_eq!(orch.frame_index(), 1);
}

#[test]
fn hotkeys_are_reported() {
    let mut orch = orchestrator(RendererSettings::default());
    let mut input = Input::new();
    input.start_frame();
    input.inject_key(Key::Escape, ButtonState::Pressed);
    input.inject_key(Key::V, ButtonState::Pressed);
    let report = orch.render_frame(DT, &input);
    assert!(report.exit_requested);
    assert!(report.toggle_vsync);
    assert!(!report.toggle_fullscreen);

    input.start_frame();
    let report = orch.render_frame(DT, &input);
    assert!(!report.exit_requested);
}

#[test]
fn releasing_capture_stops_the_camera() {
    let mut orch = orchestrator(RendererSettings::default());
    assert!(orch.cursor_captured());

    let mut input = Input::new();
    input.start_frame();
    input.inject_key(Key::W, ButtonState::Pressed);
    orch.render_frame(DT, &input);
    assert!(orch.camera().velocity.length() > 0.0);

    input.start_frame();
    input.inject_key(Key::E, ButtonState::Pressed);
    orch.render_frame(DT, &input);
    assert!(!orch.cursor_captured());
    assert_eq!(orch.camera().velocity, glam::Vec3::ZERO);

    // W is still held but input is ignored while released.
    let position = orch.camera().position;
    input.start_frame();
    orch.render_frame(DT, &input);
    assert_eq!(orch.camera().position, position);
}

#[test]
fn shutdown_releases_everything() {
    let mut orch = orchestrator(RendererSettings {
        temporal_mode: TemporalMode::Taa,
        ..Default::default()
    });
    orch.render_frame(DT, &Input::new());
    orch.set_render_mode(RenderMode::PathTracer);
    orch.render_frame(DT, &Input::new());

    let device = orch.shutdown();
    assert_eq!(device.texture_count(), 0);
    assert_eq!(device.buffer_count(), 0);
    assert_eq!(device.resident_handle_count(), 0);
    assert_eq!(device.misuse_count(), 0);
}
