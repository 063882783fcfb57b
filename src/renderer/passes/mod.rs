//! Render passes
//!
//! Each pass owns its settings, a [`UniformSlot`](crate::resources::uniform_slot::UniformSlot)
//! that `apply()` uploads, and the targets it writes. Passes never hold the
//! device; every operation borrows it.
//!
//! ```text
//! Raster effects (render resolution)     Post (presentation resolution)
//! ├─ voxel_gi      voxelize + cone trace  ├─ bloom         downsample / upsample chain
//! ├─ ssao                                 └─ tone_mapping  exposure, gamma, dithering
//! ├─ shading_rate  VRS classification
//! ├─ volumetric
//! └─ ssr
//! ```

pub mod bloom;
pub mod shading_rate;
pub mod ssao;
pub mod ssr;
pub mod tone_mapping;
pub mod volumetric;
pub mod voxel_gi;

use glam::UVec2;

use crate::renderer::core::device::{RenderDevice, SCREEN_TARGET_USAGE, TextureDesc, TextureId};

/// Workgroup size of every screen-space compute pass.
pub const COMPUTE_LOCAL_SIZE: UVec2 = UVec2::new(8, 8);

/// A single-mip 2D target that is reallocated whenever its size changes.
#[derive(Debug)]
pub struct ScreenTarget {
    texture: TextureId,
    size: UVec2,
    format: wgpu::TextureFormat,
    label: &'static str,
}

impl ScreenTarget {
    pub fn new(
        device: &mut dyn RenderDevice,
        label: &'static str,
        size: UVec2,
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = device.create_texture(&TextureDesc::d2(label, size, format, SCREEN_TARGET_USAGE));
        Self {
            texture,
            size,
            format,
            label,
        }
    }

    /// Returns `false` if `size` matches and nothing was reallocated.
    pub fn resize(&mut self, device: &mut dyn RenderDevice, size: UVec2) -> bool {
        if size == self.size {
            return false;
        }
        device.destroy_texture(self.texture);
        self.texture =
            device.create_texture(&TextureDesc::d2(self.label, size, self.format, SCREEN_TARGET_USAGE));
        self.size = size;
        true
    }

    pub fn release(self, device: &mut dyn RenderDevice) {
        device.destroy_texture(self.texture);
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> TextureId {
        self.texture
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        self.size
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }
}
