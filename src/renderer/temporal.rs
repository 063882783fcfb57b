//! Temporal reconstruction
//!
//! Owns the sub-pixel jitter sequence and the targets of the two temporal
//! modes:
//!
//! | Mode       | Samples                         | Mip bias                    | Targets                                  |
//! |------------|---------------------------------|-----------------------------|------------------------------------------|
//! | `None`     | 1 (no jitter)                   | 0                           | none                                     |
//! | `Taa`      | `taa_samples`                   | 0                           | 2 history targets (presentation)          |
//! | `Upscaler` | `ceil(8 * (present / render)²)` | `log2(render / present) + k`| output (presentation), reactive (render) |
//!
//! Targets are created the first time a mode is selected and survive a switch
//! back to `None`. A resolution change resizes the active mode's targets and
//! releases the inactive ones.

use glam::{UVec2, Vec2};

use crate::renderer::core::device::{
    BarrierScope, BufferId, DispatchDesc, ImageAccess, ImageBinding, PassKind, RenderDevice,
    TextureBinding, TextureId, workgroups_2d,
};
use crate::renderer::passes::{COMPUTE_LOCAL_SIZE, ScreenTarget};
use crate::renderer::resource_set::{GBufferResources, GBufferSlot, RESULT_FORMAT};
use crate::renderer::settings::{TemporalMode, TemporalSettings};
use crate::resources::uniform_slot::UniformSlot;
use crate::resources::uniforms::GpuTemporalData;

const REACTIVE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

// ─── Jitter sequence ──────────────────────────────────────────────────────────

/// Radical inverse of `index` in `base`, in `[0, 1)`.
#[inline]
#[must_use]
pub fn halton(index: u32, base: u32) -> f32 {
    let mut result = 0.0f32;
    let mut f = 1.0f32;
    let mut i = index;

    while i > 0 {
        f /= base as f32;
        result += f * (i % base) as f32;
        i /= base;
    }

    result
}

/// Clip-space jitter for `frame`.
///
/// Uses Halton (2, 3) at the 1-based index `frame % sample_count + 1`, mapped
/// to `[-1, 1]` and divided by the render resolution. A sample count of 1 or
/// less disables jitter.
#[must_use]
pub fn jitter_offset(frame: u64, sample_count: u32, render: UVec2) -> Vec2 {
    if sample_count <= 1 {
        return Vec2::ZERO;
    }
    let index = (frame % u64::from(sample_count)) as u32 + 1;
    let unit = Vec2::new(halton(index, 2), halton(index, 3)) * 2.0 - 1.0;
    unit / render.max(UVec2::ONE).as_vec2()
}

/// Jitter phases the upscaler needs to cover one presentation pixel.
#[must_use]
pub fn upscaler_sample_count(render: UVec2, present: UVec2) -> u32 {
    let ratio = present.x as f32 / render.x.max(1) as f32;
    (8.0 * ratio * ratio).ceil().max(1.0) as u32
}

/// Texture LOD bias that keeps upscaled detail at presentation sharpness.
#[must_use]
pub fn upscaler_mip_bias(render: UVec2, present: UVec2, extra: f32) -> f32 {
    (render.x.max(1) as f32 / present.x.max(1) as f32).log2() + extra
}

// ─── Mode resources ───────────────────────────────────────────────────────────

struct TaaResources {
    history: [ScreenTarget; 2],
    /// History target written next.
    current: usize,
}

impl TaaResources {
    fn new(device: &mut dyn RenderDevice, present: UVec2) -> Self {
        log::debug!("TAA history allocated at {}x{}", present.x, present.y);
        Self {
            history: [
                ScreenTarget::new(device, "TAA History A", present, RESULT_FORMAT),
                ScreenTarget::new(device, "TAA History B", present, RESULT_FORMAT),
            ],
            current: 0,
        }
    }

    fn resize(&mut self, device: &mut dyn RenderDevice, present: UVec2) {
        for target in &mut self.history {
            target.resize(device, present);
        }
    }

    fn release(self, device: &mut dyn RenderDevice) {
        for target in self.history {
            target.release(device);
        }
    }
}

struct UpscalerResources {
    output: ScreenTarget,
    reactive: ScreenTarget,
}

impl UpscalerResources {
    fn new(device: &mut dyn RenderDevice, render: UVec2, present: UVec2) -> Self {
        log::debug!(
            "Upscaler targets allocated ({}x{} -> {}x{})",
            render.x,
            render.y,
            present.x,
            present.y
        );
        Self {
            output: ScreenTarget::new(device, "Upscaler Output", present, RESULT_FORMAT),
            reactive: ScreenTarget::new(device, "Upscaler Reactive Mask", render, REACTIVE_FORMAT),
        }
    }

    fn resize(&mut self, device: &mut dyn RenderDevice, render: UVec2, present: UVec2) {
        self.output.resize(device, present);
        self.reactive.resize(device, render);
    }

    fn release(self, device: &mut dyn RenderDevice) {
        self.output.release(device);
        self.reactive.release(device);
    }
}

// ─── TemporalUpscaler ─────────────────────────────────────────────────────────

pub struct TemporalUpscaler {
    mode: TemporalMode,
    settings: TemporalSettings,
    data: UniformSlot<GpuTemporalData>,
    render_size: UVec2,
    present_size: UVec2,
    taa: Option<TaaResources>,
    upscaler: Option<UpscalerResources>,
}

impl TemporalUpscaler {
    pub fn new(
        device: &mut dyn RenderDevice,
        mode: TemporalMode,
        settings: &TemporalSettings,
        render_size: UVec2,
        present_size: UVec2,
    ) -> Self {
        let mut upscaler = Self {
            mode: TemporalMode::None,
            settings: settings.clone(),
            data: UniformSlot::new(GpuTemporalData::default(), "Temporal Data"),
            render_size,
            present_size,
            taa: None,
            upscaler: None,
        };
        upscaler.set_mode(device, mode);
        upscaler.data.apply(device);
        upscaler
    }

    /// Switches mode, creating its targets on first use. Switching to `None`
    /// keeps whatever was allocated.
    pub fn set_mode(&mut self, device: &mut dyn RenderDevice, mode: TemporalMode) {
        match mode {
            TemporalMode::None => {}
            TemporalMode::Taa => {
                if self.taa.is_none() {
                    self.taa = Some(TaaResources::new(device, self.present_size));
                }
            }
            TemporalMode::Upscaler => {
                if self.upscaler.is_none() {
                    self.upscaler = Some(UpscalerResources::new(
                        device,
                        self.render_size,
                        self.present_size,
                    ));
                }
            }
        }
        self.mode = mode;
    }

    pub fn set_settings(&mut self, settings: &TemporalSettings) {
        self.settings = settings.clone();
    }

    /// Resizes the active mode's targets and releases the others.
    pub fn resize(&mut self, device: &mut dyn RenderDevice, render_size: UVec2, present_size: UVec2) {
        if render_size == self.render_size && present_size == self.present_size {
            return;
        }
        self.render_size = render_size;
        self.present_size = present_size;

        match self.taa.take() {
            Some(mut taa) if self.mode == TemporalMode::Taa => {
                taa.resize(device, present_size);
                self.taa = Some(taa);
            }
            Some(taa) => taa.release(device),
            None => {}
        }
        match self.upscaler.take() {
            Some(mut up) if self.mode == TemporalMode::Upscaler => {
                up.resize(device, render_size, present_size);
                self.upscaler = Some(up);
            }
            Some(up) => up.release(device),
            None => {}
        }
    }

    /// Length of the jitter sequence in the current mode.
    #[must_use]
    pub fn sample_count(&self) -> u32 {
        match self.mode {
            TemporalMode::None => 1,
            TemporalMode::Taa => self.settings.taa_samples.max(1),
            TemporalMode::Upscaler => upscaler_sample_count(self.render_size, self.present_size),
        }
    }

    #[must_use]
    pub fn mip_bias(&self) -> f32 {
        match self.mode {
            TemporalMode::Upscaler => upscaler_mip_bias(
                self.render_size,
                self.present_size,
                self.settings.upscaler_extra_mip_bias,
            ),
            TemporalMode::None | TemporalMode::Taa => 0.0,
        }
    }

    /// Recomputes jitter, sample count and mip bias for `frame`. Returns the
    /// jitter to apply to the projection.
    pub fn update(&mut self, frame: u64) -> Vec2 {
        let sample_count = self.sample_count();
        let data = GpuTemporalData {
            jitter: jitter_offset(frame, sample_count, self.render_size),
            sample_count,
            temporal_mode: self.mode.gpu_tag(),
            mip_bias: self.mip_bias(),
            ..Default::default()
        };
        if data != *self.data.get() {
            self.data.set(data);
        }
        data.jitter
    }

    pub fn upload(&mut self, device: &mut dyn RenderDevice) -> BufferId {
        self.data.apply(device)
    }

    /// Resolves the raster result into the image handed to post-processing.
    ///
    /// In `None` mode this is the raster result itself.
    pub fn resolve(
        &mut self,
        device: &mut dyn RenderDevice,
        gbuffer: &GBufferResources,
        frame_data: BufferId,
    ) -> TextureId {
        let temporal = self.data.apply(device);
        let uniforms = [frame_data, temporal];

        match self.mode {
            TemporalMode::None => gbuffer.result(),
            TemporalMode::Taa => {
                let Some(taa) = &mut self.taa else {
                    return gbuffer.result();
                };
                let write = taa.current;
                let read = 1 - write;
                let target = taa.history[write].id();

                let textures = [
                    TextureBinding::new(0, gbuffer.result()),
                    TextureBinding::new(1, taa.history[read].id()),
                    TextureBinding::new(2, gbuffer.texture(GBufferSlot::Velocity)),
                    TextureBinding::new(3, gbuffer.texture(GBufferSlot::Depth)),
                ];
                let images = [ImageBinding::new(0, target, ImageAccess::WriteOnly)];
                device.dispatch(&DispatchDesc {
                    textures: &textures,
                    images: &images,
                    uniforms: &uniforms,
                    ..DispatchDesc::new(
                        PassKind::TaaResolve,
                        workgroups_2d(self.present_size, COMPUTE_LOCAL_SIZE),
                    )
                });
                device.barrier(BarrierScope::TEXTURE_FETCH);

                taa.current = read;
                target
            }
            TemporalMode::Upscaler => {
                let Some(up) = &self.upscaler else {
                    return gbuffer.result();
                };
                let textures = [
                    TextureBinding::new(0, gbuffer.result()),
                    TextureBinding::new(1, gbuffer.texture(GBufferSlot::Velocity)),
                    TextureBinding::new(2, gbuffer.texture(GBufferSlot::Depth)),
                    TextureBinding::new(3, up.reactive.id()),
                ];
                let images = [ImageBinding::new(0, up.output.id(), ImageAccess::WriteOnly)];
                device.dispatch(&DispatchDesc {
                    textures: &textures,
                    images: &images,
                    uniforms: &uniforms,
                    ..DispatchDesc::new(
                        PassKind::Upscale,
                        workgroups_2d(self.present_size, COMPUTE_LOCAL_SIZE),
                    )
                });
                device.barrier(BarrierScope::TEXTURE_FETCH);
                up.output.id()
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn mode(&self) -> TemporalMode {
        self.mode
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &GpuTemporalData {
        self.data.get()
    }

    #[inline]
    #[must_use]
    pub fn buffer(&self) -> Option<BufferId> {
        self.data.buffer()
    }

    #[must_use]
    pub fn has_taa_targets(&self) -> bool {
        self.taa.is_some()
    }

    #[must_use]
    pub fn has_upscaler_targets(&self) -> bool {
        self.upscaler.is_some()
    }

    pub fn release(mut self, device: &mut dyn RenderDevice) {
        if let Some(taa) = self.taa.take() {
            taa.release(device);
        }
        if let Some(up) = self.upscaler.take() {
            up.release(device);
        }
        self.data.release(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halton_matches_radical_inverse() {
        assert!((halton(1, 2) - 0.5).abs() < 1e-6);
        assert!((halton(3, 2) - 0.75).abs() < 1e-6);
        assert!((halton(2, 3) - 2.0 / 3.0).abs() < 1e-6);
        assert!((halton(3, 3) - 1.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn jitter_repeats_with_sample_count_and_stays_sub_pixel() {
        let render = UVec2::new(960, 540);
        let texel = Vec2::ONE / render.as_vec2();
        for frame in 0..24 {
            let j = jitter_offset(frame, 6, render);
            assert_eq!(j, jitter_offset(frame + 6, 6, render));
            assert!(j.x.abs() <= texel.x && j.y.abs() <= texel.y);
        }
        assert_eq!(jitter_offset(5, 1, render), Vec2::ZERO);
    }

    #[test]
    fn upscaler_parameters_follow_resolution_ratio() {
        let render = UVec2::new(960, 540);
        let present = UVec2::new(1920, 1080);
        assert_eq!(upscaler_sample_count(render, present), 32);
        assert!((upscaler_mip_bias(render, present, 0.25) + 0.75).abs() < 1e-6);
        assert_eq!(upscaler_sample_count(present, present), 8);
    }
}
