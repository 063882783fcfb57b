//! Bloom
//!
//! Progressive downsample/upsample chain on a presentation-resolution target:
//!
//! ```text
//!  HDR input ─► mip 0 ─► mip 1 ─► … ─► mip N-1     (BloomDownsample, threshold + clamp on mip 0)
//!              mip 0 ◄─ mip 1 ◄─ … ◄─ mip N-1     (BloomUpsample, additive)
//! ```
//!
//! Every dispatch is followed by a barrier since the next one reads its output.

use glam::UVec2;
use serde::{Deserialize, Serialize};

use super::COMPUTE_LOCAL_SIZE;
use crate::define_gpu_data_struct;
use crate::renderer::core::device::{
    BarrierScope, DispatchDesc, ImageAccess, ImageBinding, PassKind, RenderDevice, TextureBinding,
    TextureDesc, TextureId, workgroups_2d,
};
use crate::renderer::resource_set::RESULT_FORMAT;
use crate::resources::uniform_slot::UniformSlot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    pub enabled: bool,
    /// Luminance above which pixels contribute.
    pub threshold: f32,
    /// Upper bound on contributing luminance (firefly suppression).
    pub clamp: f32,
    /// Maximum chain length. Clamped to what the target size allows.
    pub max_mip_levels: u32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 1.0,
            clamp: 8.0,
            max_mip_levels: 6,
        }
    }
}

define_gpu_data_struct!(
    struct GpuBloomData {
        pub threshold: f32 = 1.0,
        pub clamp: f32 = 8.0,
        pub(crate) __pad: [u32; 2],
    }
);

/// Chain length for a target of `size`: each level keeps at least one pixel.
#[must_use]
pub fn mip_levels(size: UVec2, max_levels: u32) -> u32 {
    let smallest = size.x.min(size.y).max(1);
    (smallest.ilog2() + 1).min(max_levels.max(1))
}

pub struct BloomPass {
    uniforms: UniformSlot<GpuBloomData>,
    texture: TextureId,
    size: UVec2,
    levels: u32,
    max_levels: u32,
}

impl BloomPass {
    pub fn new(device: &mut dyn RenderDevice, size: UVec2, settings: &BloomSettings) -> Self {
        let mut uniforms = UniformSlot::new(
            GpuBloomData {
                threshold: settings.threshold,
                clamp: settings.clamp,
                ..Default::default()
            },
            "Bloom Uniforms",
        );
        uniforms.apply(device);

        let levels = mip_levels(size, settings.max_mip_levels);
        Self {
            uniforms,
            texture: Self::create_chain(device, size, levels),
            size,
            levels,
            max_levels: settings.max_mip_levels,
        }
    }

    fn create_chain(device: &mut dyn RenderDevice, size: UVec2, levels: u32) -> TextureId {
        device.create_texture(
            &TextureDesc::d2(
                "Bloom Chain",
                size,
                RESULT_FORMAT,
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::STORAGE_BINDING,
            )
            .with_mips(levels),
        )
    }

    pub fn set_settings(&mut self, settings: &BloomSettings) {
        let data = GpuBloomData {
            threshold: settings.threshold,
            clamp: settings.clamp,
            ..Default::default()
        };
        if data != *self.uniforms.get() {
            self.uniforms.set(data);
        }
        self.max_levels = settings.max_mip_levels;
    }

    /// Uploads parameters and rebuilds the chain if its length changed.
    pub fn apply(&mut self, device: &mut dyn RenderDevice) {
        self.uniforms.apply(device);
        let levels = mip_levels(self.size, self.max_levels);
        if levels != self.levels {
            device.destroy_texture(self.texture);
            self.texture = Self::create_chain(device, self.size, levels);
            self.levels = levels;
        }
    }

    pub fn resize(&mut self, device: &mut dyn RenderDevice, size: UVec2) -> bool {
        if size == self.size {
            return false;
        }
        device.destroy_texture(self.texture);
        self.levels = mip_levels(size, self.max_levels);
        self.texture = Self::create_chain(device, size, self.levels);
        self.size = size;
        true
    }

    fn mip_size(&self, mip: u32) -> UVec2 {
        (self.size >> mip).max(UVec2::ONE)
    }

    pub fn compute(&self, device: &mut dyn RenderDevice, input: TextureId) {
        let Some(params) = self.uniforms.buffer() else {
            return;
        };
        let uniforms = [params];

        for mip in 0..self.levels {
            let input_binding = [TextureBinding::new(0, input)];
            let src = ImageBinding::new(0, self.texture, ImageAccess::ReadOnly).mip(mip.saturating_sub(1));
            let dst = ImageBinding::new(1, self.texture, ImageAccess::WriteOnly).mip(mip);
            let images_first = [dst];
            let images_chain = [src, dst];
            let (textures, images): (&[TextureBinding], &[ImageBinding]) = if mip == 0 {
                (&input_binding, &images_first)
            } else {
                (&[], &images_chain)
            };

            device.dispatch(&DispatchDesc {
                textures,
                images,
                uniforms: &uniforms,
                constants: mip,
                ..DispatchDesc::new(
                    PassKind::BloomDownsample,
                    workgroups_2d(self.mip_size(mip), COMPUTE_LOCAL_SIZE),
                )
            });
            device.barrier(BarrierScope::SHADER_IMAGE_ACCESS);
        }

        for mip in (0..self.levels.saturating_sub(1)).rev() {
            let images = [
                ImageBinding::new(0, self.texture, ImageAccess::ReadOnly).mip(mip + 1),
                ImageBinding::new(1, self.texture, ImageAccess::ReadWrite).mip(mip),
            ];
            device.dispatch(&DispatchDesc {
                images: &images,
                uniforms: &uniforms,
                constants: mip,
                ..DispatchDesc::new(
                    PassKind::BloomUpsample,
                    workgroups_2d(self.mip_size(mip), COMPUTE_LOCAL_SIZE),
                )
            });
            device.barrier(BarrierScope::SHADER_IMAGE_ACCESS | BarrierScope::TEXTURE_FETCH);
        }
    }

    #[inline]
    #[must_use]
    pub fn result(&self) -> TextureId {
        self.texture
    }

    #[inline]
    #[must_use]
    pub fn levels(&self) -> u32 {
        self.levels
    }

    pub fn release(mut self, device: &mut dyn RenderDevice) {
        self.uniforms.release(device);
        device.destroy_texture(self.texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_length_respects_target_size() {
        assert_eq!(mip_levels(UVec2::new(1920, 1080), 6), 6);
        assert_eq!(mip_levels(UVec2::new(8, 64), 6), 4);
        assert_eq!(mip_levels(UVec2::ONE, 6), 1);
    }
}
