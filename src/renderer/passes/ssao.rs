//! Screen Space Ambient Occlusion
//!
//! One compute dispatch over the G-buffer:
//!
//! ```text
//!  GBuffer Depth  ──(unit 0)──┐
//!                             ├──► SsaoPass ──► R8Unorm occlusion
//!  GBuffer Normal ──(unit 1)──┘
//! ```
//!
//! The result is sampled by the merge pass at texture unit 2.

use glam::UVec2;
use serde::{Deserialize, Serialize};

use super::{COMPUTE_LOCAL_SIZE, ScreenTarget};
use crate::define_gpu_data_struct;
use crate::renderer::core::device::{
    BarrierScope, BufferId, DispatchDesc, ImageAccess, ImageBinding, PassKind, RenderDevice,
    TextureBinding, TextureId, workgroups_2d,
};
use crate::renderer::resource_set::{GBufferResources, GBufferSlot};
use crate::resources::uniform_slot::UniformSlot;

const SSAO_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsaoSettings {
    /// Hemisphere samples per pixel.
    pub samples: u32,
    /// World-space sampling radius.
    pub radius: f32,
    pub strength: f32,
}

impl Default for SsaoSettings {
    fn default() -> Self {
        Self {
            samples: 10,
            radius: 0.1,
            strength: 2.0,
        }
    }
}

define_gpu_data_struct!(
    struct GpuSsaoData {
        pub samples: u32 = 10,
        pub radius: f32 = 0.1,
        pub strength: f32 = 2.0,
        pub(crate) __pad: u32,
    }
);

impl From<&SsaoSettings> for GpuSsaoData {
    fn from(s: &SsaoSettings) -> Self {
        Self {
            samples: s.samples,
            radius: s.radius,
            strength: s.strength,
            ..Default::default()
        }
    }
}

pub struct SsaoPass {
    uniforms: UniformSlot<GpuSsaoData>,
    result: ScreenTarget,
}

impl SsaoPass {
    pub fn new(device: &mut dyn RenderDevice, size: UVec2, settings: &SsaoSettings) -> Self {
        let mut uniforms = UniformSlot::new(GpuSsaoData::from(settings), "SSAO Uniforms");
        uniforms.apply(device);
        Self {
            uniforms,
            result: ScreenTarget::new(device, "SSAO Result", size, SSAO_TEXTURE_FORMAT),
        }
    }

    /// Stages new parameters; they reach the GPU on [`apply`](Self::apply).
    pub fn set_settings(&mut self, settings: &SsaoSettings) {
        let data = GpuSsaoData::from(settings);
        if data != *self.uniforms.get() {
            self.uniforms.set(data);
        }
    }

    pub fn apply(&mut self, device: &mut dyn RenderDevice) {
        self.uniforms.apply(device);
    }

    pub fn resize(&mut self, device: &mut dyn RenderDevice, size: UVec2) -> bool {
        self.result.resize(device, size)
    }

    pub fn compute(&self, device: &mut dyn RenderDevice, gbuffer: &GBufferResources, frame_data: BufferId) {
        let Some(params) = self.uniforms.buffer() else {
            return;
        };
        let textures = [
            TextureBinding::new(0, gbuffer.texture(GBufferSlot::Depth)),
            TextureBinding::new(1, gbuffer.texture(GBufferSlot::NormalSpecular)),
        ];
        let images = [ImageBinding::new(0, self.result.id(), ImageAccess::WriteOnly)];
        let uniforms = [frame_data, params];

        device.dispatch(&DispatchDesc {
            textures: &textures,
            images: &images,
            uniforms: &uniforms,
            ..DispatchDesc::new(
                PassKind::Ssao,
                workgroups_2d(self.result.size(), COMPUTE_LOCAL_SIZE),
            )
        });
        device.barrier(BarrierScope::TEXTURE_FETCH);
    }

    #[inline]
    #[must_use]
    pub fn result(&self) -> TextureId {
        self.result.id()
    }

    #[must_use]
    pub fn params(&self) -> &GpuSsaoData {
        self.uniforms.get()
    }

    pub fn release(mut self, device: &mut dyn RenderDevice) {
        self.uniforms.release(device);
        self.result.release(device);
    }
}
