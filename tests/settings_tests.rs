//! Renderer Settings Tests
//!
//! Tests for:
//! - JSON loading with partial documents and defaults
//! - Render resolution derivation
//! - Error classification of bad configuration

use glam::UVec2;

use hybrid::renderer::settings::scaled_resolution;
use hybrid::{RenderError, RenderMode, RendererSettings, TemporalMode, VrsMode};

#[test]
fn empty_document_yields_defaults() {
    let settings = RendererSettings::from_json_str("{}").expect("valid JSON");
    assert_eq!(settings, RendererSettings::default());
    assert_eq!(settings.presentation, UVec2::new(1280, 720));
    assert_eq!(settings.render_mode, RenderMode::Rasterizer);
    assert_eq!(settings.temporal_mode, TemporalMode::None);
}

#[test]
fn partial_document_overrides_only_named_fields() {
    let json = r#"{
        "render_mode": "PathTracer",
        "temporal_mode": "Taa",
        "presentation": [1920, 1080],
        "resolution_scale": 0.5,
        "raster": { "ssr": true, "vrs": "Debug" },
        "collision": { "sphere_radius": 0.25 }
    }"#;
    let settings = RendererSettings::from_json_str(json).expect("valid settings");

    assert_eq!(settings.render_mode, RenderMode::PathTracer);
    assert_eq!(settings.temporal_mode, TemporalMode::Taa);
    assert_eq!(settings.render_resolution(), UVec2::new(960, 540));
    assert!(settings.raster.ssr);
    assert!(settings.raster.ssao, "unnamed toggles keep defaults");
    assert_eq!(settings.raster.vrs, VrsMode::Debug);
    assert!((settings.collision.sphere_radius - 0.25).abs() < f32::EPSILON);
    assert_eq!(settings.collision.test_steps, 3);
}

#[test]
fn malformed_document_is_a_config_error() {
    let err = RendererSettings::from_json_str("{ \"render_mode\": 3 ").unwrap_err();
    assert!(matches!(err, RenderError::ConfigError(_)));
    assert!(!err.is_fatal());
}

#[test]
fn missing_file_is_an_io_error() {
    let err = RendererSettings::load("/nonexistent/hybrid-settings.json").unwrap_err();
    assert!(matches!(err, RenderError::IoError(_)));
}

#[test]
fn settings_survive_a_save_and_load() {
    let mut settings = RendererSettings::default();
    settings.raster.gi = true;
    settings.path_tracer.max_samples_per_pixel = 64;

    let path = std::env::temp_dir().join(format!("hybrid-settings-{}.json", std::process::id()));
    std::fs::write(&path, serde_json::to_string_pretty(&settings).expect("serializable"))
        .expect("temp dir is writable");
    let loaded = RendererSettings::load(&path).expect("readable settings");
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded, settings);
}

#[test]
fn scaled_resolution_floors_and_clamps() {
    assert_eq!(scaled_resolution(UVec2::new(1920, 1080), 0.5), UVec2::new(960, 540));
    assert_eq!(scaled_resolution(UVec2::new(1001, 999), 0.5), UVec2::new(500, 499));
    assert_eq!(scaled_resolution(UVec2::new(4, 4), 0.01), UVec2::ONE);
    assert_eq!(scaled_resolution(UVec2::new(1280, 720), 1.0), UVec2::new(1280, 720));
}
