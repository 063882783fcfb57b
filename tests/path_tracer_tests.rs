//! Path Tracer Accumulation Tests
//!
//! Tests for:
//! - Sample counting across static frames
//! - Accumulation reset on camera and instance motion
//! - No reset when matrices are rewritten unchanged
//! - Reset on resize and settings change

use glam::{Mat4, UVec2, Vec3};

use hybrid::renderer::settings::PathTracerSettings;
use hybrid::{
    FrameOrchestrator, FrameReport, GeometryProvider, HeadlessDevice, Input, ModelSystem,
    PointLights, RenderMode, RendererSettings, create_box,
};

const DT: f32 = 1.0 / 60.0;

type Orchestrator = FrameOrchestrator<HeadlessDevice, ModelSystem>;

fn orchestrator() -> Orchestrator {
    let mut scene = ModelSystem::new();
    scene.add(
        create_box(1.0, 1.0, 1.0),
        &[Mat4::from_translation(Vec3::new(0.0, 0.0, -20.0))],
    );
    let mut settings = RendererSettings {
        render_mode: RenderMode::PathTracer,
        presentation: UVec2::new(320, 240),
        ..Default::default()
    };
    settings.camera.start_captured = false;

    match FrameOrchestrator::new(HeadlessDevice::default(), scene, Box::new(PointLights::new()), settings) {
        Ok(orchestrator) => orchestrator,
        Err(err) => panic!("bring-up failed: {err}"),
    }
}

fn frame(orch: &mut Orchestrator) -> FrameReport {
    orch.render_frame(DT, &Input::new())
}

fn samples(report: &FrameReport) -> u32 {
    report.accumulated_samples.expect("path tracer frame")
}

// ============================================================================
// Accumulation
// ============================================================================

#[test]
fn static_frames_accumulate() {
    let mut orch = orchestrator();
    for expected in 1..=5 {
        let report = frame(&mut orch);
        assert!(!report.scene_changed);
        assert!(!report.accumulation_reset);
        assert_eq!(samples(&report), expected);
    }
}

#[test]
fn camera_motion_resets_accumulation() {
    let mut orch = orchestrator();
    for _ in 0..4 {
        frame(&mut orch);
    }

    orch.camera_mut().position += Vec3::new(0.5, 0.0, 0.0);
    let report = frame(&mut orch);
    assert!(report.scene_changed);
    assert!(report.accumulation_reset);
    assert_eq!(samples(&report), 1);

    let report = frame(&mut orch);
    assert!(!report.accumulation_reset);
    assert_eq!(samples(&report), 2);
}

#[test]
fn instance_motion_resets_accumulation() {
    let mut orch = orchestrator();
    for _ in 0..3 {
        frame(&mut orch);
    }

    orch.scene_mut().instances_mut()[0]
        .set_model(Mat4::from_translation(Vec3::new(1.0, 0.0, -20.0)));
    let report = frame(&mut orch);
    assert!(report.scene_changed);
    assert!(report.accumulation_reset);
    assert_eq!(samples(&report), 1);

    // Motion is committed after the frame that saw it.
    let report = frame(&mut orch);
    assert!(!report.scene_changed);
    assert_eq!(samples(&report), 2);
}

#[test]
fn unchanged_matrices_do_not_reset() {
    let mut orch = orchestrator();
    for _ in 0..3 {
        frame(&mut orch);
    }

    let model = orch.scene().instances()[0].model();
    orch.scene_mut().instances_mut()[0].set_model(model);
    let position = orch.camera().position;
    orch.camera_mut().position = position;

    let report = frame(&mut orch);
    assert!(!report.scene_changed);
    assert!(!report.accumulation_reset);
    assert_eq!(samples(&report), 4);
}

#[test]
fn first_frame_after_switch_starts_fresh() {
    let mut settings = RendererSettings::default();
    settings.camera.start_captured = false;
    let Ok(mut orch) = FrameOrchestrator::new(
        HeadlessDevice::default(),
        ModelSystem::new(),
        Box::new(PointLights::new()),
        settings,
    ) else {
        panic!("bring-up failed");
    };
    let report = orch.render_frame(DT, &Input::new());
    assert_eq!(report.accumulated_samples, None);

    orch.set_render_mode(RenderMode::PathTracer);
    let report = orch.render_frame(DT, &Input::new());
    assert_eq!(report.accumulated_samples, Some(1));
    assert!(!report.accumulation_reset);
}

// ============================================================================
// Resize & settings
// ============================================================================

#[test]
fn resize_restarts_accumulation() {
    let mut orch = orchestrator();
    for _ in 0..3 {
        frame(&mut orch);
    }
    orch.on_resize(UVec2::new(640, 480));
    let report = frame(&mut orch);
    assert_eq!(samples(&report), 1);
    assert!(report.accumulation_reset);

    let tracer = orch.path_tracer().expect("path tracer");
    assert_eq!(tracer.size(), UVec2::new(640, 480));
}

#[test]
fn settings_change_restarts_accumulation() {
    let mut orch = orchestrator();
    for _ in 0..3 {
        frame(&mut orch);
    }
    orch.set_path_tracer_settings(PathTracerSettings {
        ray_depth: 3,
        ..Default::default()
    });
    let report = frame(&mut orch);
    assert!(report.accumulation_reset);
    assert!(!report.scene_changed);
    assert_eq!(samples(&report), 1);

    // Same values again: nothing to restart.
    orch.set_path_tracer_settings(PathTracerSettings {
        ray_depth: 3,
        ..Default::default()
    });
    let report = frame(&mut orch);
    assert!(!report.accumulation_reset);
    assert_eq!(samples(&report), 2);
}

#[test]
fn reapplying_current_settings_keeps_accumulating() {
    let mut orch = orchestrator();
    for _ in 0..4 {
        frame(&mut orch);
    }
    orch.set_path_tracer_settings(PathTracerSettings::default());
    let report = frame(&mut orch);
    assert!(!report.accumulation_reset);
    assert_eq!(samples(&report), 5);

    // Raising the sample bound is not a new image either.
    orch.set_path_tracer_settings(PathTracerSettings {
        max_samples_per_pixel: 64,
        ..Default::default()
    });
    assert_eq!(samples(&frame(&mut orch)), 6);
}

#[test]
fn converged_image_stops_dispatching() {
    let mut orch = orchestrator();
    orch.set_path_tracer_settings(PathTracerSettings {
        max_samples_per_pixel: 3,
        ..Default::default()
    });
    let reports: Vec<_> = (0..6).map(|_| frame(&mut orch)).collect();
    assert_eq!(samples(&reports[5]), 3);

    let dispatches = orch
        .device()
        .recorded_passes()
        .into_iter()
        .filter(|p| *p == hybrid::renderer::core::PassKind::PathTrace)
        .count();
    assert_eq!(dispatches, 3);
}
