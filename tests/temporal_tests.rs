//! Temporal Jitter & Upscaling Tests
//!
//! Tests for:
//! - Per-frame projection jitter (period, bound, disabled modes)
//! - Lazy allocation of TAA / upscaler targets
//! - Capability rejection of the spatio-temporal upscaler
//! - Resolve dispatch bindings

use glam::{UVec2, Vec2};

use hybrid::renderer::GBufferSlot;
use hybrid::renderer::core::{PassKind, RecordedCommand};
use hybrid::{
    Capabilities, FrameOrchestrator, FrameReport, HeadlessDevice, Input, ModelSystem, PointLights,
    RenderError, RenderMode, RendererSettings, TemporalMode,
};

const DT: f32 = 1.0 / 60.0;

fn orchestrator_on(
    device: HeadlessDevice,
    settings: RendererSettings,
) -> FrameOrchestrator<HeadlessDevice, ModelSystem> {
    match FrameOrchestrator::new(device, ModelSystem::new(), Box::new(PointLights::new()), settings) {
        Ok(orchestrator) => orchestrator,
        Err(err) => panic!("bring-up failed: {err}"),
    }
}

fn with_mode(mode: TemporalMode) -> RendererSettings {
    RendererSettings {
        temporal_mode: mode,
        presentation: UVec2::new(1920, 1080),
        resolution_scale: 0.5,
        ..Default::default()
    }
}

fn run(orch: &mut FrameOrchestrator<HeadlessDevice, ModelSystem>, frames: usize) -> Vec<FrameReport> {
    let input = Input::new();
    (0..frames).map(|_| orch.render_frame(DT, &input)).collect()
}

// ============================================================================
// Jitter
// ============================================================================

#[test]
fn taa_jitter_cycles_with_sample_count() {
    let settings = with_mode(TemporalMode::Taa);
    let period = settings.temporal.taa_samples as usize;
    let mut orch = orchestrator_on(HeadlessDevice::default(), settings);
    let render = orch.render_resolution().as_vec2();

    let jitter: Vec<Vec2> = run(&mut orch, period * 3).iter().map(|r| r.jitter).collect();

    for (i, j) in jitter.iter().enumerate() {
        assert!(j.x.abs() <= 1.0 / render.x && j.y.abs() <= 1.0 / render.y, "frame {i}: {j}");
        if i + period < jitter.len() {
            assert_eq!(*j, jitter[i + period], "frame {i}");
        }
    }
    // Every phase in one period is distinct.
    for a in 0..period {
        for b in (a + 1)..period {
            assert_ne!(jitter[a], jitter[b]);
        }
    }
    assert_eq!(orch.temporal().sample_count(), period as u32);
}

#[test]
fn jitter_is_zero_without_temporal_mode() {
    let mut orch = orchestrator_on(HeadlessDevice::default(), with_mode(TemporalMode::None));
    assert!(run(&mut orch, 8).iter().all(|r| r.jitter == Vec2::ZERO));
}

#[test]
fn path_tracer_is_never_jittered() {
    let settings = RendererSettings {
        render_mode: RenderMode::PathTracer,
        ..with_mode(TemporalMode::Taa)
    };
    let mut orch = orchestrator_on(HeadlessDevice::default(), settings);
    assert!(run(&mut orch, 8).iter().all(|r| r.jitter == Vec2::ZERO));
}

#[test]
fn jitter_reaches_the_projection_only() {
    let mut orch = orchestrator_on(HeadlessDevice::default(), with_mode(TemporalMode::Taa));
    let report = run(&mut orch, 1).remove(0);
    assert_ne!(report.jitter, Vec2::ZERO);

    let data = orch.frame_state().data();
    assert_eq!(data.proj_view, orch.camera().view_projection());
    assert_ne!(data.projection, orch.camera().projection_matrix());
}

#[test]
fn upscaler_parameters_follow_resolution() {
    let mut orch = orchestrator_on(HeadlessDevice::default(), with_mode(TemporalMode::Upscaler));
    run(&mut orch, 1);

    let temporal = orch.temporal();
    assert_eq!(temporal.sample_count(), 32);
    assert!((temporal.mip_bias() - (-1.0 + 0.25)).abs() < 1e-6);
    assert_eq!(temporal.data().sample_count, 32);
}

// ============================================================================
// Allocation
// ============================================================================

#[test]
fn targets_are_allocated_lazily_and_kept() {
    let mut orch = orchestrator_on(HeadlessDevice::default(), with_mode(TemporalMode::None));
    assert!(!orch.temporal().has_taa_targets());
    assert_eq!(orch.device().textures_labeled("TAA History A").count(), 0);

    orch.set_temporal_mode(TemporalMode::Taa).expect("TAA is always available");
    run(&mut orch, 1);
    assert!(orch.temporal().has_taa_targets());
    let history: Vec<_> = orch.device().textures_labeled("TAA History A").map(|(id, _)| id).collect();
    assert_eq!(history.len(), 1);

    orch.set_temporal_mode(TemporalMode::None).expect("None is always available");
    run(&mut orch, 1);
    assert!(orch.temporal().has_taa_targets());
    let kept: Vec<_> = orch.device().textures_labeled("TAA History A").map(|(id, _)| id).collect();
    assert_eq!(history, kept);
}

#[test]
fn resize_drops_inactive_targets() {
    let mut orch = orchestrator_on(HeadlessDevice::default(), with_mode(TemporalMode::Taa));
    orch.set_temporal_mode(TemporalMode::None).expect("None is always available");
    orch.apply();
    assert!(orch.temporal().has_taa_targets());

    orch.on_resize(UVec2::new(1280, 720));
    orch.apply();
    assert!(!orch.temporal().has_taa_targets());
    assert_eq!(orch.device().textures_labeled("TAA History B").count(), 0);
    assert_eq!(orch.device().misuse_count(), 0);
}

#[test]
fn upscaler_targets_use_both_resolutions() {
    let orch = orchestrator_on(HeadlessDevice::default(), with_mode(TemporalMode::Upscaler));
    let device = orch.device();
    let output: Vec<_> = device.textures_labeled("Upscaler Output").map(|(_, d)| d.size()).collect();
    let reactive: Vec<_> =
        device.textures_labeled("Upscaler Reactive Mask").map(|(_, d)| d.size()).collect();
    assert_eq!(output, vec![UVec2::new(1920, 1080)]);
    assert_eq!(reactive, vec![UVec2::new(960, 540)]);
}

// ============================================================================
// Capabilities
// ============================================================================

#[test]
fn upscaler_request_rejected_without_capability() {
    let mut orch =
        orchestrator_on(HeadlessDevice::new(Capabilities::REQUIRED), with_mode(TemporalMode::Taa));

    let result = orch.set_temporal_mode(TemporalMode::Upscaler);
    assert!(matches!(result, Err(RenderError::Rejected { .. })));
    assert!(!orch.has_pending_changes());

    run(&mut orch, 1);
    assert_eq!(orch.temporal_mode(), TemporalMode::Taa);
    assert!(!orch.temporal().has_upscaler_targets());
}

// ============================================================================
// Resolve
// ============================================================================

#[test]
fn taa_resolve_ping_pongs_history() {
    let mut orch = orchestrator_on(HeadlessDevice::default(), with_mode(TemporalMode::Taa));
    run(&mut orch, 2);

    let resolves: Vec<_> = orch
        .device()
        .commands()
        .iter()
        .filter_map(|cmd| match cmd {
            RecordedCommand::Dispatch(d) if d.pass == PassKind::TaaResolve => Some(d.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(resolves.len(), 2);

    let pipeline = orch.rasterizer().expect("raster mode");
    let gbuffer = pipeline.gbuffer();
    for resolve in &resolves {
        assert_eq!(resolve.texture_at(0), Some(gbuffer.result()));
        assert_eq!(resolve.texture_at(2), Some(gbuffer.texture(GBufferSlot::Velocity)));
        assert_eq!(resolve.texture_at(3), Some(gbuffer.texture(GBufferSlot::Depth)));
    }
    // Frame 1 reads what frame 0 wrote.
    let written = resolves[0].image_at(0).map(|image| image.texture);
    assert_eq!(resolves[1].texture_at(1), written);
    assert_ne!(resolves[1].image_at(0).map(|image| image.texture), written);
}

#[test]
fn no_temporal_mode_presents_raster_result_directly() {
    let mut orch = orchestrator_on(HeadlessDevice::default(), with_mode(TemporalMode::None));
    run(&mut orch, 1);

    let raster = orch.rasterizer().map(|p| p.result());
    let tone_map_input = orch.device().commands().iter().find_map(|cmd| match cmd {
        RecordedCommand::Dispatch(d) if d.pass == PassKind::ToneMap => d.texture_at(0),
        _ => None,
    });
    assert_eq!(tone_map_input, raster);
    assert!(!orch.device().recorded_passes().contains(&PassKind::TaaResolve));
}
