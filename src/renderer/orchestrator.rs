//! Frame Orchestrator
//!
//! Top-level driver of the hybrid renderer. One call to
//! [`FrameOrchestrator::render_frame`] runs:
//!
//! ```text
//!  apply()            staged resolution → render mode → temporal mode → toggles
//!  update             input, camera advance, collision, jitter, uploads
//!  reset check        path tracer only: camera or instance motion
//!  render             DeferredPipeline | AccumulationPathTracer
//!  temporal resolve   rasterizer only
//!  post               bloom + tone mapping at presentation resolution
//!  present            end_frame, commit instance motion
//! ```
//!
//! # Explicit commit
//!
//! Setters only stage a change. Nothing is reallocated until [`apply`] runs,
//! either called directly or as the first step of `render_frame`, so a frame
//! never sees a half-migrated resource set. Requests the device cannot honour
//! are rejected by the setter and leave the staged state untouched.
//!
//! [`apply`]: FrameOrchestrator::apply

use glam::{UVec2, Vec2};

use crate::collision::{CollisionReport, CollisionResolver, CollisionSettings};
use crate::errors::{RenderError, Result};
use crate::renderer::core::device::{Capabilities, RenderDevice, TextureId};
use crate::renderer::deferred::{DeferredPipeline, RasterFrame};
use crate::renderer::frame_state::FrameState;
use crate::renderer::path_tracer::AccumulationPathTracer;
use crate::renderer::post::PostStack;
use crate::renderer::settings::{
    PathTracerSettings, PostSettings, RasterSettings, RenderMode, RendererSettings, TemporalMode,
    VrsMode, scaled_resolution,
};
use crate::renderer::temporal::TemporalUpscaler;
use crate::resources::input::{Input, Key};
use crate::scene::camera::Camera;
use crate::scene::light::LightManager;
use crate::scene::model_system::GeometryProvider;

/// Resources of the active render mode. Exactly one variant is alive.
pub enum ModeResources {
    Rasterizer(DeferredPipeline),
    PathTracer(AccumulationPathTracer),
}

impl ModeResources {
    #[must_use]
    pub fn mode(&self) -> RenderMode {
        match self {
            Self::Rasterizer(_) => RenderMode::Rasterizer,
            Self::PathTracer(_) => RenderMode::PathTracer,
        }
    }

    fn resize(&mut self, device: &mut dyn RenderDevice, size: UVec2) {
        match self {
            Self::Rasterizer(pipeline) => {
                pipeline.resize(device, size);
            }
            Self::PathTracer(tracer) => {
                tracer.resize(device, size);
            }
        }
    }

    fn apply(&mut self, device: &mut dyn RenderDevice) {
        match self {
            Self::Rasterizer(pipeline) => pipeline.apply(device),
            Self::PathTracer(tracer) => tracer.apply(device),
        }
    }

    fn release(self, device: &mut dyn RenderDevice) {
        match self {
            Self::Rasterizer(pipeline) => pipeline.release(device),
            Self::PathTracer(tracer) => tracer.release(device),
        }
    }

    #[must_use]
    pub fn as_rasterizer(&self) -> Option<&DeferredPipeline> {
        match self {
            Self::Rasterizer(pipeline) => Some(pipeline),
            Self::PathTracer(_) => None,
        }
    }

    #[must_use]
    pub fn as_path_tracer(&self) -> Option<&AccumulationPathTracer> {
        match self {
            Self::Rasterizer(_) => None,
            Self::PathTracer(tracer) => Some(tracer),
        }
    }
}

#[derive(Debug, Default)]
struct PendingChanges {
    resolution: Option<(UVec2, f32)>,
    render_mode: Option<RenderMode>,
    temporal_mode: Option<TemporalMode>,
    raster: Option<RasterSettings>,
    path_tracer: Option<PathTracerSettings>,
    post: Option<PostSettings>,
}

impl PendingChanges {
    fn is_empty(&self) -> bool {
        self.resolution.is_none()
            && self.render_mode.is_none()
            && self.temporal_mode.is_none()
            && self.raster.is_none()
            && self.path_tracer.is_none()
            && self.post.is_none()
    }
}

/// What happened during one [`FrameOrchestrator::render_frame`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Index of the rendered frame.
    pub frame: u64,
    pub mode: RenderMode,
    /// Image handed to the presentation surface.
    pub presented: TextureId,
    /// Camera or an instance moved this frame.
    pub scene_changed: bool,
    /// The path tracer discarded its accumulated image this frame.
    pub accumulation_reset: bool,
    /// Path-tracer samples per pixel after this frame.
    pub accumulated_samples: Option<u32>,
    pub collision: CollisionReport,
    pub jitter: Vec2,
    /// `Escape` was pressed; the shell decides whether to close.
    pub exit_requested: bool,
    /// `V` was pressed.
    pub toggle_vsync: bool,
    /// `F11` was pressed.
    pub toggle_fullscreen: bool,
}

pub struct FrameOrchestrator<D: RenderDevice, S: GeometryProvider> {
    device: D,
    scene: S,
    lights: Box<dyn LightManager>,

    settings: RendererSettings,
    pending: PendingChanges,

    camera: Camera,
    cursor_captured: bool,
    collision: CollisionResolver,

    frame_state: FrameState,
    /// Empty only inside `apply_render_mode`, between releasing the outgoing
    /// set and creating the incoming one.
    mode: Option<ModeResources>,
    temporal: TemporalUpscaler,
    post: PostStack,

    frame: u64,
}

impl<D: RenderDevice, S: GeometryProvider> FrameOrchestrator<D, S> {
    /// Brings the renderer up on `device`.
    ///
    /// Fails with [`RenderError::MissingCapability`] when the device lacks a
    /// required capability. Optional capabilities requested by `settings`
    /// but unsupported fall back to their off state with a warning.
    pub fn new(
        mut device: D,
        scene: S,
        lights: Box<dyn LightManager>,
        mut settings: RendererSettings,
    ) -> Result<Self> {
        let capabilities = device.capabilities();
        let missing = capabilities.missing_required();
        if !missing.is_empty() {
            log::error!("Device lacks required capabilities: {missing:?}");
            return Err(RenderError::MissingCapability {
                missing: format!("{missing:?}"),
            });
        }

        if settings.temporal_mode == TemporalMode::Upscaler
            && !capabilities.contains(Capabilities::SPATIAL_UPSCALER)
        {
            log::warn!("No spatio-temporal upscaler available, starting with temporal mode None");
            settings.temporal_mode = TemporalMode::None;
        }
        if settings.raster.vrs == VrsMode::Apply
            && !capabilities.contains(Capabilities::VARIABLE_RATE_SHADING)
        {
            log::warn!("Variable rate shading unsupported, starting with VRS off");
            settings.raster.vrs = VrsMode::Off;
        }

        settings.presentation = settings.presentation.max(UVec2::ONE);
        let present = settings.presentation;
        let render = settings.render_resolution();

        let camera = Camera::from_settings(&settings.camera, present.x as f32 / present.y as f32);
        let mode = Self::create_mode(&mut device, settings.render_mode, render, &settings);
        let temporal = TemporalUpscaler::new(
            &mut device,
            settings.temporal_mode,
            &settings.temporal,
            render,
            present,
        );
        let post = PostStack::new(&mut device, present, &settings.post);

        log::info!(
            "Renderer ready: {:?}, temporal {:?}, render {}x{} -> present {}x{}",
            settings.render_mode,
            settings.temporal_mode,
            render.x,
            render.y,
            present.x,
            present.y
        );

        Ok(Self {
            device,
            scene,
            lights,
            cursor_captured: settings.camera.start_captured,
            collision: CollisionResolver::new(settings.collision.clone()),
            settings,
            pending: PendingChanges::default(),
            camera,
            frame_state: FrameState::new(),
            mode: Some(mode),
            temporal,
            post,
            frame: 0,
        })
    }

    fn create_mode(
        device: &mut dyn RenderDevice,
        mode: RenderMode,
        size: UVec2,
        settings: &RendererSettings,
    ) -> ModeResources {
        match mode {
            RenderMode::Rasterizer => {
                ModeResources::Rasterizer(DeferredPipeline::new(device, size, &settings.raster))
            }
            RenderMode::PathTracer => ModeResources::PathTracer(AccumulationPathTracer::new(
                device,
                size,
                &settings.path_tracer,
            )),
        }
    }

    // ========================================================================
    // Staged requests
    // ========================================================================

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.pending.render_mode = Some(mode);
    }

    /// Stages a new presentation size and render scale. Zero extents are
    /// clamped to one pixel; a non-finite or non-positive scale keeps the
    /// current one.
    pub fn set_resolution(&mut self, presentation: UVec2, scale: f32) {
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            log::warn!("Ignoring resolution scale {scale}");
            self.staged_scale()
        };
        self.pending.resolution = Some((presentation.max(UVec2::ONE), scale));
    }

    /// Window resize: keeps the current scale.
    pub fn on_resize(&mut self, size: UVec2) {
        self.set_resolution(size, self.staged_scale());
    }

    fn staged_scale(&self) -> f32 {
        self.pending
            .resolution
            .map_or(self.settings.resolution_scale, |(_, scale)| scale)
    }

    /// Stages a temporal mode. The upscaler needs
    /// [`Capabilities::SPATIAL_UPSCALER`].
    pub fn set_temporal_mode(&mut self, mode: TemporalMode) -> Result<()> {
        if mode == TemporalMode::Upscaler
            && !self.device.capabilities().contains(Capabilities::SPATIAL_UPSCALER)
        {
            log::warn!("Temporal mode {mode:?} rejected: no spatio-temporal upscaler");
            return Err(RenderError::rejected(
                format!("temporal mode {mode:?}"),
                "device has no spatio-temporal upscaler",
            ));
        }
        self.pending.temporal_mode = Some(mode);
        Ok(())
    }

    /// Stages raster toggles and effect parameters. VRS `Apply` needs
    /// [`Capabilities::VARIABLE_RATE_SHADING`].
    pub fn set_raster_settings(&mut self, settings: RasterSettings) -> Result<()> {
        if settings.vrs == VrsMode::Apply
            && !self.device.capabilities().contains(Capabilities::VARIABLE_RATE_SHADING)
        {
            log::warn!("VRS apply mode rejected: variable rate shading unsupported");
            return Err(RenderError::rejected(
                "VRS apply mode",
                "device does not support variable rate shading",
            ));
        }
        self.pending.raster = Some(settings);
        Ok(())
    }

    pub fn set_path_tracer_settings(&mut self, settings: PathTracerSettings) {
        self.pending.path_tracer = Some(settings);
    }

    pub fn set_post_settings(&mut self, settings: PostSettings) {
        self.pending.post = Some(settings);
    }

    /// Takes effect immediately; collision owns no GPU state.
    pub fn set_collision_settings(&mut self, settings: CollisionSettings) {
        self.settings.collision = settings.clone();
        self.collision.settings = settings;
    }

    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Commits every staged change in a fixed order: resolution, render mode,
    /// temporal mode, then feature settings. Re-applying identical values
    /// reallocates nothing.
    pub fn apply(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        let mode_switch = pending
            .render_mode
            .filter(|&mode| mode != self.settings.render_mode);

        if let Some((presentation, scale)) = pending.resolution {
            // A mode about to be replaced is created at the new size instead.
            self.apply_resolution(presentation, scale, mode_switch.is_none());
        }
        if let Some(mode) = mode_switch {
            self.apply_render_mode(mode);
        }
        if let Some(mode) = pending.temporal_mode
            && mode != self.settings.temporal_mode
        {
            self.temporal.set_mode(&mut self.device, mode);
            log::info!("Temporal mode: {:?} -> {mode:?}", self.settings.temporal_mode);
            self.settings.temporal_mode = mode;
        }
        if let Some(raster) = pending.raster {
            if let Some(ModeResources::Rasterizer(pipeline)) = &mut self.mode {
                pipeline.set_settings(&raster);
            }
            self.settings.raster = raster;
        }
        if let Some(path_tracer) = pending.path_tracer {
            if let Some(ModeResources::PathTracer(tracer)) = &mut self.mode {
                tracer.set_settings(&path_tracer);
            }
            self.settings.path_tracer = path_tracer;
        }
        if let Some(post) = pending.post {
            self.post.set_settings(&post);
            self.settings.post = post;
        }

        if let Some(mode) = &mut self.mode {
            mode.apply(&mut self.device);
        }
        self.post.apply(&mut self.device);
    }

    fn apply_resolution(&mut self, presentation: UVec2, scale: f32, resize_mode: bool) {
        if presentation == self.settings.presentation && scale == self.settings.resolution_scale {
            return;
        }
        let render = scaled_resolution(presentation, scale);
        self.settings.presentation = presentation;
        self.settings.resolution_scale = scale;

        if resize_mode && let Some(mode) = &mut self.mode {
            mode.resize(&mut self.device, render);
        }
        self.temporal.resize(&mut self.device, render, presentation);
        self.post.resize(&mut self.device, presentation);
        self.camera
            .set_aspect(presentation.x as f32 / presentation.y as f32);

        log::info!(
            "Resolution: render {}x{} -> present {}x{} (scale {scale})",
            render.x,
            render.y,
            presentation.x,
            presentation.y
        );
    }

    /// Releases the current mode's resources, then creates the new mode's
    /// at the render resolution. The two sets are never alive together.
    fn apply_render_mode(&mut self, mode: RenderMode) {
        let current = self.settings.render_mode;
        if mode == current {
            return;
        }
        if let Some(previous) = self.mode.take() {
            previous.release(&mut self.device);
        }
        self.settings.render_mode = mode;
        let render = self.render_resolution();
        self.mode = Some(Self::create_mode(&mut self.device, mode, render, &self.settings));
        log::info!("Render mode: {current:?} -> {mode:?}");
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Updates and renders one frame, then presents it.
    pub fn render_frame(&mut self, delta_time: f32, input: &Input) -> FrameReport {
        self.apply();

        // === Update ===
        if input.get_key_down(Key::E) {
            self.cursor_captured = !self.cursor_captured;
            if !self.cursor_captured {
                self.camera.velocity = glam::Vec3::ZERO;
            }
            log::debug!("Cursor captured: {}", self.cursor_captured);
        }

        let previous_position = self.camera.position;
        if self.cursor_captured {
            self.camera.process_input(input, delta_time);
        }
        self.camera.advance(delta_time);
        let collision =
            self.collision
                .resolve(&mut self.camera, previous_position, delta_time, &self.scene);

        let jitter = match self.settings.render_mode {
            RenderMode::Rasterizer => self.temporal.update(self.frame),
            RenderMode::PathTracer => Vec2::ZERO,
        };
        self.frame_state
            .update(&self.camera, jitter, delta_time, self.frame);
        let frame_data = self.frame_state.upload(&mut self.device);
        let temporal_data = self.temporal.upload(&mut self.device);
        self.lights.update_gpu_buffers(&mut self.device);

        let scene_changed = self.frame_state.camera_moved()
            || self.scene.instances().iter().any(|instance| instance.did_move());

        // === Render ===
        let mut accumulation_reset = false;
        let mut accumulated_samples = None;
        let image = match &mut self.mode {
            Some(ModeResources::Rasterizer(pipeline)) => {
                pipeline.render(
                    &mut self.device,
                    &mut self.scene,
                    self.lights.as_ref(),
                    &RasterFrame {
                        frame_data,
                        temporal_data,
                        cull_matrix: self.frame_state.data().proj_view,
                    },
                );
                self.temporal
                    .resolve(&mut self.device, pipeline.gbuffer(), frame_data)
            }
            Some(ModeResources::PathTracer(tracer)) => {
                if scene_changed {
                    tracer.reset();
                }
                // Settings changes and resizes restart it during `apply`.
                accumulation_reset = tracer.take_restart();
                tracer.compute(&mut self.device, frame_data);
                accumulated_samples = Some(tracer.samples());
                tracer.result()
            }
            None => unreachable!("render mode switch left no resources"),
        };

        let presented = self.post.run(&mut self.device, image);
        self.device.present(presented, self.settings.presentation);
        self.device.end_frame();

        for instance in self.scene.instances_mut() {
            instance.commit_motion();
        }

        let report = FrameReport {
            frame: self.frame,
            mode: self.settings.render_mode,
            presented,
            scene_changed,
            accumulation_reset,
            accumulated_samples,
            collision,
            jitter,
            exit_requested: input.get_key_down(Key::Escape),
            toggle_vsync: input.get_key_down(Key::V),
            toggle_fullscreen: input.get_key_down(Key::F11),
        };
        log::trace!("Frame {} recorded ({:?})", self.frame, report.mode);
        self.frame += 1;
        report
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn render_mode(&self) -> RenderMode {
        self.settings.render_mode
    }

    #[inline]
    #[must_use]
    pub fn temporal_mode(&self) -> TemporalMode {
        self.settings.temporal_mode
    }

    #[inline]
    #[must_use]
    pub fn presentation_resolution(&self) -> UVec2 {
        self.settings.presentation
    }

    #[inline]
    #[must_use]
    pub fn render_resolution(&self) -> UVec2 {
        self.settings.render_resolution()
    }

    #[inline]
    #[must_use]
    pub fn resolution_scale(&self) -> f32 {
        self.settings.resolution_scale
    }

    #[must_use]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    #[must_use]
    pub fn mode_resources(&self) -> Option<&ModeResources> {
        self.mode.as_ref()
    }

    /// The deferred pipeline while rasterizing.
    #[must_use]
    pub fn rasterizer(&self) -> Option<&DeferredPipeline> {
        self.mode.as_ref().and_then(ModeResources::as_rasterizer)
    }

    #[must_use]
    pub fn path_tracer(&self) -> Option<&AccumulationPathTracer> {
        self.mode.as_ref().and_then(ModeResources::as_path_tracer)
    }

    #[must_use]
    pub fn temporal(&self) -> &TemporalUpscaler {
        &self.temporal
    }

    #[must_use]
    pub fn post(&self) -> &PostStack {
        &self.post
    }

    #[must_use]
    pub fn frame_state(&self) -> &FrameState {
        &self.frame_state
    }

    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    #[must_use]
    pub fn cursor_captured(&self) -> bool {
        self.cursor_captured
    }

    /// Index of the next frame to render.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    #[must_use]
    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    #[must_use]
    pub fn lights(&self) -> &dyn LightManager {
        self.lights.as_ref()
    }

    pub fn lights_mut(&mut self) -> &mut dyn LightManager {
        self.lights.as_mut()
    }

    /// Releases every GPU resource and hands the device back.
    pub fn shutdown(mut self) -> D {
        if let Some(mode) = self.mode.take() {
            mode.release(&mut self.device);
        }
        self.temporal.release(&mut self.device);
        self.post.release(&mut self.device);
        self.frame_state.release(&mut self.device);
        self.lights.release(&mut self.device);
        log::info!("Renderer shut down after {} frames", self.frame);
        self.device
    }
}
