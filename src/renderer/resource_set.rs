//! G-buffer resource set
//!
//! Render targets and resident handles for one render resolution. The lighting
//! resolve reads the G-buffer through the handles in [`GpuGBufferData`], which
//! lives in a single payload buffer.
//!
//! Reallocation always releases the previous handles first, in slot order,
//! before their textures are destroyed. A slot therefore never has more than
//! one live handle.

use glam::UVec2;

use crate::renderer::core::device::{
    BindlessHandle, BufferId, RenderDevice, SCREEN_TARGET_USAGE, TextureDesc, TextureId,
};
use crate::resources::uniforms::GpuGBufferData;

/// Format of the lighting result shared by every raster pass.
pub const RESULT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GBufferSlot {
    AlbedoAlpha,
    NormalSpecular,
    EmissiveRoughness,
    Velocity,
    Depth,
}

impl GBufferSlot {
    /// Allocation and release order.
    pub const ALL: [Self; 5] = [
        Self::AlbedoAlpha,
        Self::NormalSpecular,
        Self::EmissiveRoughness,
        Self::Velocity,
        Self::Depth,
    ];

    #[must_use]
    pub fn format(self) -> wgpu::TextureFormat {
        match self {
            Self::AlbedoAlpha => wgpu::TextureFormat::Rgba8Unorm,
            Self::NormalSpecular | Self::EmissiveRoughness => wgpu::TextureFormat::Rgba16Float,
            Self::Velocity => wgpu::TextureFormat::Rg16Float,
            Self::Depth => wgpu::TextureFormat::Depth24Plus,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::AlbedoAlpha => "GBuffer AlbedoAlpha",
            Self::NormalSpecular => "GBuffer NormalSpecular",
            Self::EmissiveRoughness => "GBuffer EmissiveRoughness",
            Self::Velocity => "GBuffer Velocity",
            Self::Depth => "GBuffer Depth",
        }
    }

    fn usage(self) -> wgpu::TextureUsages {
        wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT
    }

    fn write_handle(self, data: &mut GpuGBufferData, handle: BindlessHandle) {
        let raw = handle.raw();
        match self {
            Self::AlbedoAlpha => data.albedo_alpha = raw,
            Self::NormalSpecular => data.normal_specular = raw,
            Self::EmissiveRoughness => data.emissive_roughness = raw,
            Self::Velocity => data.velocity = raw,
            Self::Depth => data.depth = raw,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SlotTarget {
    texture: TextureId,
    handle: BindlessHandle,
}

pub struct GBufferResources {
    size: UVec2,
    result: TextureId,
    slots: [SlotTarget; 5],
    data: GpuGBufferData,
    payload: BufferId,
}

impl GBufferResources {
    pub fn new(device: &mut dyn RenderDevice, size: UVec2) -> Self {
        let payload = device.create_buffer(
            "GBuffer Payload",
            std::mem::size_of::<GpuGBufferData>() as u64,
            wgpu::BufferUsages::UNIFORM,
        );
        let (result, slots, data) = Self::allocate(device, size);
        device.write_buffer(payload, 0, data.as_bytes());
        log::debug!("G-buffer allocated at {}x{}", size.x, size.y);

        Self {
            size,
            result,
            slots,
            data,
            payload,
        }
    }

    fn allocate(
        device: &mut dyn RenderDevice,
        size: UVec2,
    ) -> (TextureId, [SlotTarget; 5], GpuGBufferData) {
        let result = device.create_texture(&TextureDesc::d2(
            "Raster Result",
            size,
            RESULT_FORMAT,
            SCREEN_TARGET_USAGE,
        ));

        let mut data = GpuGBufferData::default();
        let slots = GBufferSlot::ALL.map(|slot| {
            let texture =
                device.create_texture(&TextureDesc::d2(slot.label(), size, slot.format(), slot.usage()));
            let handle = device.make_resident(texture).unwrap_or_else(|| {
                log::error!("G-buffer slot {slot:?} is not resident; lighting reads a null handle");
                BindlessHandle::default()
            });
            slot.write_handle(&mut data, handle);
            SlotTarget { texture, handle }
        });

        (result, slots, data)
    }

    fn free_targets(&self, device: &mut dyn RenderDevice) {
        for target in &self.slots {
            if !target.handle.is_null() {
                device.make_non_resident(target.handle);
            }
        }
        for target in &self.slots {
            device.destroy_texture(target.texture);
        }
        device.destroy_texture(self.result);
    }

    /// Reallocates every target at `size`. Returns `false` when the size is
    /// unchanged and nothing was touched.
    pub fn resize(&mut self, device: &mut dyn RenderDevice, size: UVec2) -> bool {
        if size == self.size {
            return false;
        }
        self.free_targets(device);

        let (result, slots, data) = Self::allocate(device, size);
        self.result = result;
        self.slots = slots;
        self.data = data;
        self.size = size;
        device.write_buffer(self.payload, 0, self.data.as_bytes());

        log::debug!("G-buffer resized to {}x{}", size.x, size.y);
        true
    }

    /// Releases handles, targets and the payload buffer.
    pub fn release(self, device: &mut dyn RenderDevice) {
        self.free_targets(device);
        device.destroy_buffer(self.payload);
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        self.size
    }

    /// HDR lighting result every raster pass composes into.
    #[inline]
    #[must_use]
    pub fn result(&self) -> TextureId {
        self.result
    }

    #[must_use]
    pub fn texture(&self, slot: GBufferSlot) -> TextureId {
        self.slots[slot as usize].texture
    }

    #[must_use]
    pub fn handle(&self, slot: GBufferSlot) -> BindlessHandle {
        self.slots[slot as usize].handle
    }

    /// Every slot received a bindless handle.
    #[must_use]
    pub fn is_fully_resident(&self) -> bool {
        self.slots.iter().all(|target| !target.handle.is_null())
    }

    /// Color attachments of the G-buffer pass: result first, then the slots.
    #[must_use]
    pub fn color_targets(&self) -> [TextureId; 5] {
        [
            self.result,
            self.texture(GBufferSlot::AlbedoAlpha),
            self.texture(GBufferSlot::NormalSpecular),
            self.texture(GBufferSlot::EmissiveRoughness),
            self.texture(GBufferSlot::Velocity),
        ]
    }

    #[inline]
    #[must_use]
    pub fn depth(&self) -> TextureId {
        self.texture(GBufferSlot::Depth)
    }

    #[inline]
    #[must_use]
    pub fn payload(&self) -> BufferId {
        self.payload
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &GpuGBufferData {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::core::HeadlessDevice;

    #[test]
    fn full_bindless_table_leaves_null_handles() {
        let mut device = HeadlessDevice::default().with_residency_limit(3);
        let gbuffer = GBufferResources::new(&mut device, UVec2::new(64, 64));

        assert!(!gbuffer.is_fully_resident());
        assert!(!gbuffer.handle(GBufferSlot::AlbedoAlpha).is_null());
        assert!(gbuffer.handle(GBufferSlot::Velocity).is_null());
        assert!(gbuffer.handle(GBufferSlot::Depth).is_null());
        assert_eq!(gbuffer.data().depth, BindlessHandle::default().raw());
        assert_eq!(device.resident_handle_count(), 3);

        gbuffer.release(&mut device);
        assert_eq!(device.resident_handle_count(), 0);
        assert_eq!(device.texture_count(), 0);
        assert_eq!(device.misuse_count(), 0);
    }

    #[test]
    fn resize_keeps_one_handle_per_slot() {
        let mut device = HeadlessDevice::default();
        let mut gbuffer = GBufferResources::new(&mut device, UVec2::new(64, 64));
        assert!(gbuffer.is_fully_resident());

        assert!(gbuffer.resize(&mut device, UVec2::new(32, 16)));
        assert!(!gbuffer.resize(&mut device, UVec2::new(32, 16)));
        assert!(gbuffer.is_fully_resident());
        assert_eq!(device.resident_handle_count(), GBufferSlot::ALL.len());
        assert_eq!(device.texture_desc(gbuffer.depth()).map(TextureDesc::size), Some(UVec2::new(32, 16)));
        assert_eq!(device.misuse_count(), 0);
    }
}
