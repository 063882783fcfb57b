//! Tone mapping + gamma
//!
//! Final HDR→LDR resolve at presentation resolution. Reads the frame (unit 0)
//! and, when present, the bloom chain (unit 1); writes an RGBA8 image that is
//! handed to presentation.

use glam::UVec2;
use serde::{Deserialize, Serialize};

use super::{COMPUTE_LOCAL_SIZE, ScreenTarget};
use crate::define_gpu_data_struct;
use crate::renderer::core::device::{
    BarrierScope, DispatchDesc, ImageAccess, ImageBinding, PassKind, RenderDevice, TextureBinding,
    TextureId, workgroups_2d,
};
use crate::resources::uniform_slot::UniformSlot;

pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneMappingSettings {
    pub exposure: f32,
    pub gamma: f32,
    /// Blue-noise dithering before quantization.
    pub dithering: bool,
}

impl Default for ToneMappingSettings {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            gamma: 2.2,
            dithering: true,
        }
    }
}

define_gpu_data_struct!(
    struct GpuToneMappingData {
        pub exposure: f32 = 1.0,
        pub gamma: f32 = 2.2,
        pub dithering: u32 = 1,
        pub(crate) __pad: u32,
    }
);

impl From<&ToneMappingSettings> for GpuToneMappingData {
    fn from(s: &ToneMappingSettings) -> Self {
        Self {
            exposure: s.exposure,
            gamma: s.gamma,
            dithering: u32::from(s.dithering),
            ..Default::default()
        }
    }
}

pub struct ToneMapPass {
    uniforms: UniformSlot<GpuToneMappingData>,
    output: ScreenTarget,
}

impl ToneMapPass {
    pub fn new(device: &mut dyn RenderDevice, size: UVec2, settings: &ToneMappingSettings) -> Self {
        let mut uniforms = UniformSlot::new(GpuToneMappingData::from(settings), "Tone Mapping Uniforms");
        uniforms.apply(device);
        Self {
            uniforms,
            output: ScreenTarget::new(device, "Post Output", size, OUTPUT_FORMAT),
        }
    }

    pub fn set_settings(&mut self, settings: &ToneMappingSettings) {
        let data = GpuToneMappingData::from(settings);
        if data != *self.uniforms.get() {
            self.uniforms.set(data);
        }
    }

    pub fn apply(&mut self, device: &mut dyn RenderDevice) {
        self.uniforms.apply(device);
    }

    pub fn resize(&mut self, device: &mut dyn RenderDevice, size: UVec2) -> bool {
        self.output.resize(device, size)
    }

    pub fn compute(&self, device: &mut dyn RenderDevice, input: TextureId, bloom: Option<TextureId>) {
        let Some(params) = self.uniforms.buffer() else {
            return;
        };
        let mut textures: smallvec::SmallVec<[TextureBinding; 2]> =
            smallvec::smallvec![TextureBinding::new(0, input)];
        textures.extend(bloom.map(|b| TextureBinding::new(1, b)));
        let images = [ImageBinding::new(0, self.output.id(), ImageAccess::WriteOnly)];
        let uniforms = [params];

        device.dispatch(&DispatchDesc {
            textures: &textures,
            images: &images,
            uniforms: &uniforms,
            constants: u32::from(bloom.is_some()),
            ..DispatchDesc::new(PassKind::ToneMap, workgroups_2d(self.output.size(), COMPUTE_LOCAL_SIZE))
        });
        device.barrier(BarrierScope::TEXTURE_FETCH);
    }

    #[inline]
    #[must_use]
    pub fn output(&self) -> TextureId {
        self.output.id()
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        self.output.size()
    }

    pub fn release(mut self, device: &mut dyn RenderDevice) {
        self.uniforms.release(device);
        self.output.release(device);
    }
}
