//! Renderer Settings
//!
//! Configuration consumed by [`FrameOrchestrator::new`] and by the runtime
//! setters. Every struct derives `serde` with `#[serde(default)]`, so a JSON
//! file only needs to name the fields it overrides:
//!
//! ```json
//! {
//!     "render_mode": "Rasterizer",
//!     "temporal_mode": "Taa",
//!     "resolution_scale": 0.5,
//!     "raster": { "ssr": true, "vrs": "Debug" }
//! }
//! ```
//!
//! [`FrameOrchestrator::new`]: crate::renderer::FrameOrchestrator::new

use std::path::Path;

use glam::{UVec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::collision::CollisionSettings;
use crate::errors::Result;
use crate::renderer::passes::bloom::BloomSettings;
use crate::renderer::passes::shading_rate::ShadingRateSettings;
use crate::renderer::passes::ssao::SsaoSettings;
use crate::renderer::passes::ssr::SsrSettings;
use crate::renderer::passes::tone_mapping::ToneMappingSettings;
use crate::renderer::passes::volumetric::VolumetricSettings;
use crate::renderer::passes::voxel_gi::VoxelGiSettings;

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

/// Which pipeline produces the frame. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderMode {
    /// Multi-pass deferred rasterization.
    #[default]
    Rasterizer,
    /// Progressive accumulation path tracing.
    PathTracer,
}

/// Temporal anti-aliasing / reconstruction. Only meaningful for the rasterizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TemporalMode {
    #[default]
    None,
    /// Jittered accumulation at presentation resolution.
    Taa,
    /// Spatio-temporal upscaling from render to presentation resolution.
    Upscaler,
}

impl TemporalMode {
    /// Tag written to [`GpuTemporalData::temporal_mode`](crate::resources::uniforms::GpuTemporalData).
    #[inline]
    #[must_use]
    pub fn gpu_tag(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Taa => 1,
            Self::Upscaler => 2,
        }
    }
}

/// Variable-rate shading classification mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VrsMode {
    #[default]
    Off,
    /// Classify and feed the shading-rate image to the lighting resolve.
    Apply,
    /// Classify and overlay the chosen rates on the result.
    Debug,
}

// ---------------------------------------------------------------------------
// Per-component settings
// ---------------------------------------------------------------------------

/// Feature toggles and effect parameters of the deferred pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterSettings {
    pub ssao: bool,
    pub ssr: bool,
    pub volumetric: bool,
    /// Voxel global illumination (voxelization + cone tracing).
    pub gi: bool,
    pub vrs: VrsMode,
    /// Draws the G-buffer pass with line polygons.
    pub wireframe: bool,
    /// Replaces the whole raster sequence with the voxel debug view.
    pub render_voxel_grid: bool,

    pub ssao_params: SsaoSettings,
    pub ssr_params: SsrSettings,
    pub volumetric_params: VolumetricSettings,
    pub gi_params: VoxelGiSettings,
    pub vrs_params: ShadingRateSettings,
}

impl Default for RasterSettings {
    fn default() -> Self {
        Self {
            ssao: true,
            ssr: false,
            volumetric: true,
            gi: false,
            vrs: VrsMode::Off,
            wireframe: false,
            render_voxel_grid: false,
            ssao_params: SsaoSettings::default(),
            ssr_params: SsrSettings::default(),
            volumetric_params: VolumetricSettings::default(),
            gi_params: VoxelGiSettings::default(),
            vrs_params: ShadingRateSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalSettings {
    /// Length of the jitter sequence in TAA mode.
    pub taa_samples: u32,
    /// Added to `log2(render / presentation)` for the upscaler's mip bias.
    pub upscaler_extra_mip_bias: f32,
}

impl Default for TemporalSettings {
    fn default() -> Self {
        Self {
            taa_samples: 6,
            upscaler_extra_mip_bias: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathTracerSettings {
    pub ray_depth: u32,
    pub focal_length: f32,
    pub lens_radius: f32,
    /// Accumulation stops once this many samples were taken. `0` = unbounded.
    pub max_samples_per_pixel: u32,
}

impl Default for PathTracerSettings {
    fn default() -> Self {
        Self {
            ray_depth: 6,
            focal_length: 10.0,
            lens_radius: 0.0,
            max_samples_per_pixel: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PostSettings {
    pub bloom: BloomSettings,
    pub tone_mapping: ToneMappingSettings,
}

/// Fly-camera parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: Vec3,
    /// Degrees.
    pub yaw: f32,
    /// Degrees.
    pub pitch: f32,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Acceleration applied per held movement key.
    pub speed: f32,
    pub sprint_multiplier: f32,
    /// Degrees per pixel of mouse motion.
    pub sensitivity: f32,
    /// Fraction of velocity kept after one second without input.
    pub damping: f32,
    /// Whether mouse look starts captured. `E` toggles it at runtime.
    pub start_captured: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: Vec3::new(6.252, 9.49, -1.96),
            yaw: -183.5,
            pitch: 0.5,
            fov: 102.0,
            near: 0.01,
            far: 500.0,
            speed: 40.0,
            sprint_multiplier: 4.0,
            sensitivity: 0.1,
            damping: 0.0005,
            start_captured: true,
        }
    }
}

// ---------------------------------------------------------------------------
// RendererSettings
// ---------------------------------------------------------------------------

/// Global renderer configuration.
///
/// | Field              | Default            |
/// |--------------------|--------------------|
/// | `render_mode`      | `Rasterizer`       |
/// | `temporal_mode`    | `None`             |
/// | `presentation`     | 1280 × 720         |
/// | `resolution_scale` | `1.0`              |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub render_mode: RenderMode,
    pub temporal_mode: TemporalMode,
    /// Presentation (window) resolution.
    pub presentation: UVec2,
    /// Render resolution = `floor(presentation * resolution_scale)`.
    pub resolution_scale: f32,

    pub raster: RasterSettings,
    pub temporal: TemporalSettings,
    pub path_tracer: PathTracerSettings,
    pub post: PostSettings,
    pub camera: CameraSettings,
    pub collision: CollisionSettings,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::default(),
            temporal_mode: TemporalMode::default(),
            presentation: UVec2::new(1280, 720),
            resolution_scale: 1.0,
            raster: RasterSettings::default(),
            temporal: TemporalSettings::default(),
            path_tracer: PathTracerSettings::default(),
            post: PostSettings::default(),
            camera: CameraSettings::default(),
            collision: CollisionSettings::default(),
        }
    }
}

impl RendererSettings {
    /// Parses settings from a JSON document. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_json_str(&text)?;
        log::info!("Loaded renderer settings from {}", path.display());
        Ok(settings)
    }

    /// Render resolution derived from the presentation size and scale.
    #[must_use]
    pub fn render_resolution(&self) -> UVec2 {
        scaled_resolution(self.presentation, self.resolution_scale)
    }
}

/// `floor(presentation * scale)` per axis, clamped to at least one pixel.
#[must_use]
pub fn scaled_resolution(presentation: UVec2, scale: f32) -> UVec2 {
    let scaled = (presentation.as_vec2() * scale).floor();
    scaled.as_uvec2().max(UVec2::ONE)
}
