//! Versioned uniform block
//!
//! [`UniformSlot`] holds a small `Pod` block inline together with the device
//! buffer it is uploaded to. Writes bump a version; [`UniformSlot::apply`]
//! uploads only when the version moved since the last upload, so callers can
//! apply every frame without redundant transfers.

use bytemuck::Pod;

use crate::renderer::core::device::{BufferId, RenderDevice};

/// Write access to a slot's block. The slot becomes dirty when the guard
/// drops, whether or not anything was written.
pub struct SlotWriteGuard<'a, T> {
    data: &'a mut T,
    version: &'a mut u64,
}

impl<T> std::ops::Deref for SlotWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.data
    }
}

impl<T> std::ops::DerefMut for SlotWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.data
    }
}

impl<T> Drop for SlotWriteGuard<'_, T> {
    fn drop(&mut self) {
        *self.version = self.version.wrapping_add(1);
    }
}

#[derive(Debug)]
pub struct UniformSlot<T: Pod> {
    data: T,
    version: u64,
    uploaded_version: Option<u64>,
    buffer: Option<BufferId>,
    label: &'static str,
}

impl<T: Pod> UniformSlot<T> {
    pub fn new(data: T, label: &'static str) -> Self {
        Self {
            data,
            version: 0,
            uploaded_version: None,
            buffer: None,
            label,
        }
    }

    #[inline]
    pub fn get(&self) -> &T {
        &self.data
    }

    /// Replaces the whole block.
    pub fn set(&mut self, data: T) {
        self.data = data;
        self.version = self.version.wrapping_add(1);
    }

    /// Mutable access; the version is bumped when the guard drops.
    pub fn write(&mut self) -> SlotWriteGuard<'_, T> {
        SlotWriteGuard {
            data: &mut self.data,
            version: &mut self.version,
        }
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether the block changed since the last upload.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.uploaded_version != Some(self.version)
    }

    /// Device buffer, once [`apply`](Self::apply) created it.
    #[inline]
    pub fn buffer(&self) -> Option<BufferId> {
        self.buffer
    }

    /// Creates the buffer on first use and uploads pending changes.
    pub fn apply(&mut self, device: &mut dyn RenderDevice) -> BufferId {
        let label = self.label;
        let buffer = *self.buffer.get_or_insert_with(|| {
            device.create_buffer(
                label,
                std::mem::size_of::<T>() as u64,
                wgpu::BufferUsages::UNIFORM,
            )
        });
        if self.is_dirty() {
            device.write_buffer(buffer, 0, bytemuck::bytes_of(&self.data));
            self.uploaded_version = Some(self.version);
        }
        buffer
    }

    /// Destroys the device buffer. A later `apply` recreates it.
    pub fn release(&mut self, device: &mut dyn RenderDevice) {
        if let Some(buffer) = self.buffer.take() {
            device.destroy_buffer(buffer);
        }
        self.uploaded_version = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::core::HeadlessDevice;
    use crate::resources::uniforms::GpuTemporalData;

    #[test]
    fn apply_uploads_only_after_changes() {
        let mut device = HeadlessDevice::default();
        let mut slot = UniformSlot::new(GpuTemporalData::default(), "Temporal");

        let buffer = slot.apply(&mut device);
        assert!(!slot.is_dirty());
        assert_eq!(slot.apply(&mut device), buffer);

        slot.write().sample_count = 8;
        assert!(slot.is_dirty());
        slot.apply(&mut device);

        let uploaded: GpuTemporalData =
            bytemuck::pod_read_unaligned(device.buffer_contents(buffer).unwrap());
        assert_eq!(uploaded.sample_count, 8);
    }
}
