//! Volumetric light scattering.
//!
//! Marches from the camera towards the G-buffer depth accumulating in-scattered
//! light from the scene's point lights. Consecutive frames alternate between
//! two interleaved sample patterns; the frame parity travels in the dispatch
//! constants.

use glam::{UVec2, Vec3};
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
pub struct VolumetricSettings {
    pub samples: u32,
    /// Henyey-Greenstein anisotropy.
    pub scattering: f32,
    pub max_distance: f32,
    pub strength: f32,
    pub absorbance: Vec3,
}

impl Default for VolumetricSettings {
    fn default() -> Self {
        Self {
            samples: 7,
            scattering: 0.758,
            max_distance: 50.0,
            strength: 5.0,
            absorbance: Vec3::splat(0.025),
        }
    }
}

define_gpu_data_struct!(
    struct GpuVolumetricData {
        pub absorbance: Vec3 = Vec3::splat(0.025),
        pub samples: u32 = 7,
        pub scattering: f32 = 0.758,
        pub max_distance: f32 = 50.0,
        pub strength: f32 = 5.0,
        pub(crate) __pad: u32,
    }
);

impl From<&VolumetricSettings> for GpuVolumetricData {
    fn from(s: &VolumetricSettings) -> Self {
        Self {
            absorbance: s.absorbance,
            samples: s.samples,
            scattering: s.scattering,
            max_distance: s.max_distance,
            strength: s.strength,
            ..Default::default()
        }
    }
}

pub struct VolumetricPass {
    uniforms: UniformSlot<GpuVolumetricData>,
    result: ScreenTarget,
    frame_parity: u32,
}

impl VolumetricPass {
    pub fn new(device: &mut dyn RenderDevice, size: UVec2, settings: &VolumetricSettings) -> Self {
        let mut uniforms = UniformSlot::new(GpuVolumetricData::from(settings), "Volumetric Uniforms");
        uniforms.apply(device);
        Self {
            uniforms,
            result: ScreenTarget::new(device, "Volumetric Result", size, RESULT_FORMAT),
            frame_parity: 0,
        }
    }

    pub fn set_settings(&mut self, settings: &VolumetricSettings) {
        let data = GpuVolumetricData::from(settings);
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

    pub fn compute(
        &mut self,
        device: &mut dyn RenderDevice,
        gbuffer: &GBufferResources,
        frame_data: BufferId,
        lights: Option<BufferId>,
    ) {
        let Some(params) = self.uniforms.buffer() else {
            return;
        };
        let textures = [TextureBinding::new(0, gbuffer.texture(GBufferSlot::Depth))];
        let images = [ImageBinding::new(0, self.result.id(), ImageAccess::WriteOnly)];
        let mut uniforms: smallvec::SmallVec<[BufferId; 3]> = smallvec::smallvec![frame_data, params];
        uniforms.extend(lights);

        device.dispatch(&DispatchDesc {
            textures: &textures,
            images: &images,
            uniforms: &uniforms,
            constants: self.frame_parity,
            ..DispatchDesc::new(
                PassKind::Volumetric,
                workgroups_2d(self.result.size(), COMPUTE_LOCAL_SIZE),
            )
        });
        device.barrier(BarrierScope::TEXTURE_FETCH);
        self.frame_parity ^= 1;
    }

    #[inline]
    #[must_use]
    pub fn result(&self) -> TextureId {
        self.result.id()
    }

    /// Parity the next dispatch will use.
    #[inline]
    #[must_use]
    pub fn frame_parity(&self) -> u32 {
        self.frame_parity
    }

    #[must_use]
    pub fn params(&self) -> &GpuVolumetricData {
        self.uniforms.get()
    }

    pub fn release(mut self, device: &mut dyn RenderDevice) {
        self.uniforms.release(device);
        self.result.release(device);
    }
}
