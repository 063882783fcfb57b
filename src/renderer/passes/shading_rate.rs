//! Variable-rate shading classification.
//!
//! Picks a coarse shading rate per 16×16 tile from the lit result's luminance
//! variance and the velocity buffer. In [`VrsMode::Apply`] the rate image is
//! handed to the next lighting resolve; in [`VrsMode::Debug`] the chosen rates
//! are overlaid on the result instead.

use glam::UVec2;
use serde::{Deserialize, Serialize};

use crate::define_gpu_data_struct;
use crate::renderer::core::device::{
    BarrierScope, BufferId, DispatchDesc, ImageAccess, ImageBinding, PassKind, RenderDevice,
    TextureBinding, TextureDesc, TextureId,
};
use crate::renderer::resource_set::{GBufferResources, GBufferSlot};
use crate::renderer::settings::VrsMode;
use crate::resources::uniform_slot::UniformSlot;

/// Pixels per shading-rate texel along each axis.
pub const TILE_SIZE: u32 = 16;

const RATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Uint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadingRateSettings {
    /// Weight of screen-space motion when lowering the rate.
    pub speed_factor: f32,
    /// Luminance variance below which a tile may be shaded coarsely.
    pub lum_variance_factor: f32,
}

impl Default for ShadingRateSettings {
    fn default() -> Self {
        Self {
            speed_factor: 0.2,
            lum_variance_factor: 0.025,
        }
    }
}

define_gpu_data_struct!(
    struct GpuShadingRateData {
        pub speed_factor: f32 = 0.2,
        pub lum_variance_factor: f32 = 0.025,
        pub(crate) __pad: [u32; 2],
    }
);

impl From<&ShadingRateSettings> for GpuShadingRateData {
    fn from(s: &ShadingRateSettings) -> Self {
        Self {
            speed_factor: s.speed_factor,
            lum_variance_factor: s.lum_variance_factor,
            ..Default::default()
        }
    }
}

/// Rate-image size covering `size` pixels.
#[must_use]
pub fn tile_count(size: UVec2) -> UVec2 {
    UVec2::new(size.x.div_ceil(TILE_SIZE), size.y.div_ceil(TILE_SIZE)).max(UVec2::ONE)
}

fn create_rate_image(device: &mut dyn RenderDevice, size: UVec2) -> TextureId {
    device.create_texture(&TextureDesc::d2(
        "Shading Rate Image",
        tile_count(size),
        RATE_FORMAT,
        wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::STORAGE_BINDING,
    ))
}

pub struct ShadingRateClassifier {
    uniforms: UniformSlot<GpuShadingRateData>,
    rate_image: TextureId,
    size: UVec2,
}

impl ShadingRateClassifier {
    pub fn new(device: &mut dyn RenderDevice, size: UVec2, settings: &ShadingRateSettings) -> Self {
        let mut uniforms = UniformSlot::new(GpuShadingRateData::from(settings), "Shading Rate Uniforms");
        uniforms.apply(device);
        Self {
            uniforms,
            rate_image: create_rate_image(device, size),
            size,
        }
    }

    pub fn set_settings(&mut self, settings: &ShadingRateSettings) {
        let data = GpuShadingRateData::from(settings);
        if data != *self.uniforms.get() {
            self.uniforms.set(data);
        }
    }

    pub fn apply(&mut self, device: &mut dyn RenderDevice) {
        self.uniforms.apply(device);
    }

    pub fn resize(&mut self, device: &mut dyn RenderDevice, size: UVec2) -> bool {
        if size == self.size {
            return false;
        }
        device.destroy_texture(self.rate_image);
        self.rate_image = create_rate_image(device, size);
        self.size = size;
        true
    }

    /// Classifies the current result. Does nothing when `mode` is `Off`.
    pub fn compute(
        &self,
        device: &mut dyn RenderDevice,
        gbuffer: &GBufferResources,
        mode: VrsMode,
        frame_data: BufferId,
    ) {
        let Some(params) = self.uniforms.buffer() else {
            return;
        };
        let debug = match mode {
            VrsMode::Off => return,
            VrsMode::Apply => false,
            VrsMode::Debug => true,
        };

        let textures = [
            TextureBinding::new(0, gbuffer.result()),
            TextureBinding::new(1, gbuffer.texture(GBufferSlot::Velocity)),
        ];
        let rate = ImageBinding::new(0, self.rate_image, ImageAccess::WriteOnly);
        let overlay = ImageBinding::new(1, gbuffer.result(), ImageAccess::ReadWrite);
        let images_apply = [rate];
        let images_debug = [rate, overlay];
        let images: &[ImageBinding] = if debug { &images_debug } else { &images_apply };
        let uniforms = [frame_data, params];
        let tiles = tile_count(self.size);

        device.dispatch(&DispatchDesc {
            textures: &textures,
            images,
            uniforms: &uniforms,
            constants: u32::from(debug),
            ..DispatchDesc::new(PassKind::ShadingRate, [tiles.x, tiles.y, 1])
        });
        device.barrier(BarrierScope::TEXTURE_FETCH | BarrierScope::SHADER_IMAGE_ACCESS);
    }

    #[inline]
    #[must_use]
    pub fn rate_image(&self) -> TextureId {
        self.rate_image
    }

    pub fn release(mut self, device: &mut dyn RenderDevice) {
        self.uniforms.release(device);
        device.destroy_texture(self.rate_image);
    }
}
