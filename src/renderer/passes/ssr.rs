//! Screen Space Reflections
//!
//! Ray-marches the depth buffer from each pixel along the reflected view ray,
//! then refines the first crossing with a binary search. Reads the lit result
//! (unit 0), normals (unit 1) and depth (unit 2).

use glam::UVec2;
use serde::{Deserialize, Serialize};

use super::{COMPUTE_LOCAL_SIZE, ScreenTarget};
use crate::define_gpu_data_struct;
use crate::renderer::core::device::{
    BarrierScope, BufferId, DispatchDesc, ImageAccess, ImageBinding, PassKind, RenderDevice,
    TextureBinding, TextureId, workgroups_2d,
};
use crate::renderer::resource_set::{GBufferResources, GBufferSlot, RESULT_FORMAT};
use crate::resources::uniform_slot::UniformSlot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsrSettings {
    /// Linear march steps.
    pub samples: u32,
    /// Binary refinement steps after the first hit.
    pub binary_search_samples: u32,
    pub max_distance: f32,
}

impl Default for SsrSettings {
    fn default() -> Self {
        Self {
            samples: 30,
            binary_search_samples: 8,
            max_distance: 50.0,
        }
    }
}

define_gpu_data_struct!(
    struct GpuSsrData {
        pub samples: u32 = 30,
        pub binary_search_samples: u32 = 8,
        pub max_distance: f32 = 50.0,
        pub(crate) __pad: u32,
    }
);

impl From<&SsrSettings> for GpuSsrData {
    fn from(s: &SsrSettings) -> Self {
        Self {
            samples: s.samples,
            binary_search_samples: s.binary_search_samples,
            max_distance: s.max_distance,
            ..Default::default()
        }
    }
}

pub struct SsrPass {
    uniforms: UniformSlot<GpuSsrData>,
    result: ScreenTarget,
}

impl SsrPass {
    pub fn new(device: &mut dyn RenderDevice, size: UVec2, settings: &SsrSettings) -> Self {
        let mut uniforms = UniformSlot::new(GpuSsrData::from(settings), "SSR Uniforms");
        uniforms.apply(device);
        Self {
            uniforms,
            result: ScreenTarget::new(device, "SSR Result", size, RESULT_FORMAT),
        }
    }

    pub fn set_settings(&mut self, settings: &SsrSettings) {
        let data = GpuSsrData::from(settings);
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
            TextureBinding::new(0, gbuffer.result()),
            TextureBinding::new(1, gbuffer.texture(GBufferSlot::NormalSpecular)),
            TextureBinding::new(2, gbuffer.texture(GBufferSlot::Depth)),
        ];
        let images = [ImageBinding::new(0, self.result.id(), ImageAccess::WriteOnly)];
        let uniforms = [frame_data, params];

        device.dispatch(&DispatchDesc {
            textures: &textures,
            images: &images,
            uniforms: &uniforms,
            ..DispatchDesc::new(PassKind::Ssr, workgroups_2d(self.result.size(), COMPUTE_LOCAL_SIZE))
        });
        device.barrier(BarrierScope::TEXTURE_FETCH);
    }

    #[inline]
    #[must_use]
    pub fn result(&self) -> TextureId {
        self.result.id()
    }

    #[must_use]
    pub fn params(&self) -> &GpuSsrData {
        self.uniforms.get()
    }

    pub fn release(mut self, device: &mut dyn RenderDevice) {
        self.uniforms.release(device);
        self.result.release(device);
    }
}
