//! Per-frame GPU data
//!
//! [`FrameState`] owns the [`GpuBasicData`] block every pass binds first.
//! It is refreshed once per frame after the camera moved and before any pass
//! is recorded.
//!
//! [`InstanceBuffer`] holds the instance transforms of one draw list, in the
//! order the provider's draw batches index them.

use glam::{Mat4, Vec2, Vec3};

use crate::renderer::core::device::{BufferId, RenderDevice};
use crate::resources::uniform_slot::UniformSlot;
use crate::resources::uniforms::{GpuBasicData, GpuMeshInstance};
use crate::scene::camera::Camera;
use crate::scene::model_system::GeometryProvider;

/// Low 32 bits of the host frame counter.
#[inline]
#[must_use]
pub fn gpu_frame_index(frame: u64) -> u32 {
    (frame & u64::from(u32::MAX)) as u32
}

#[derive(Debug)]
pub struct FrameState {
    data: UniformSlot<GpuBasicData>,
    elapsed: f32,
    primed: bool,
}

impl Default for FrameState {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: UniformSlot::new(GpuBasicData::default(), "Basic Data"),
            elapsed: 0.0,
            primed: false,
        }
    }

    /// Rolls the current matrices into the `prev_*` slots and writes the new
    /// camera state.
    ///
    /// `jitter` is a clip-space offset applied to `projection` only. The
    /// `proj_view` pair stays unjittered so that a static camera keeps
    /// identical matrices from frame to frame.
    ///
    /// The GPU sees `frame` modulo 2^32. Shaders only use it for parity and
    /// noise seeds, so the wrap is harmless.
    pub fn update(&mut self, camera: &Camera, jitter: Vec2, delta_time: f32, frame: u64) {
        self.elapsed += delta_time;

        let view = camera.view_matrix();
        let proj_view = camera.view_projection();
        let projection = Mat4::from_translation(Vec3::new(jitter.x, jitter.y, 0.0))
            * camera.projection_matrix();

        let first = !self.primed;
        self.primed = true;

        let mut guard = self.data.write();
        let data = &mut *guard;
        if first {
            data.prev_view = view;
            data.prev_proj_view = proj_view;
        } else {
            data.prev_view = data.view;
            data.prev_proj_view = data.proj_view;
        }
        data.view = view;
        data.inv_view = view.inverse();
        data.proj_view = proj_view;
        data.inv_proj_view = proj_view.inverse();
        data.projection = projection;
        data.inv_projection = projection.inverse();
        data.camera_pos = camera.position;
        data.near_plane = camera.near;
        data.far_plane = camera.far;
        data.time = self.elapsed;
        data.delta_time = delta_time;
        data.frame_count = gpu_frame_index(frame);
    }

    /// Uploads the block if it changed. Returns the buffer passes bind.
    pub fn upload(&mut self, device: &mut dyn RenderDevice) -> BufferId {
        self.data.apply(device)
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &GpuBasicData {
        self.data.get()
    }

    #[inline]
    #[must_use]
    pub fn buffer(&self) -> Option<BufferId> {
        self.data.buffer()
    }

    /// Whether the unjittered view-projection changed since the previous frame.
    #[must_use]
    pub fn camera_moved(&self) -> bool {
        let data = self.data.get();
        data.proj_view != data.prev_proj_view
    }

    pub fn release(&mut self, device: &mut dyn RenderDevice) {
        self.data.release(device);
    }
}

/// Instance transforms uploaded in draw order. Grows to the next power of two.
#[derive(Debug)]
pub struct InstanceBuffer {
    label: &'static str,
    buffer: Option<BufferId>,
    capacity: usize,
    staging: Vec<GpuMeshInstance>,
}

impl InstanceBuffer {
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            buffer: None,
            capacity: 0,
            staging: Vec::new(),
        }
    }

    /// Writes the provider's visible instances and returns the buffer.
    pub fn upload<S: GeometryProvider>(&mut self, device: &mut dyn RenderDevice, scene: &S) -> BufferId {
        let instances = scene.instances();
        self.staging.clear();
        self.staging.extend(
            scene
                .visible_instances()
                .iter()
                .filter_map(|&i| instances.get(i as usize))
                .map(|instance| instance.to_gpu()),
        );

        let needed = self.staging.len().max(1);
        let buffer = match self.buffer {
            Some(buffer) if needed <= self.capacity => buffer,
            current => {
                if let Some(old) = current {
                    device.destroy_buffer(old);
                }
                self.capacity = needed.next_power_of_two();
                let size = (self.capacity * std::mem::size_of::<GpuMeshInstance>()) as u64;
                let buffer = device.create_buffer(self.label, size, wgpu::BufferUsages::STORAGE);
                self.buffer = Some(buffer);
                log::debug!("{} grown to {} instances", self.label, self.capacity);
                buffer
            }
        };

        if !self.staging.is_empty() {
            device.write_buffer(buffer, 0, bytemuck::cast_slice(&self.staging));
        }
        buffer
    }

    #[inline]
    #[must_use]
    pub fn buffer(&self) -> Option<BufferId> {
        self.buffer
    }

    pub fn release(&mut self, device: &mut dyn RenderDevice) {
        if let Some(buffer) = self.buffer.take() {
            device.destroy_buffer(buffer);
        }
        self.capacity = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::settings::CameraSettings;

    #[test]
    fn frame_index_wraps_and_keeps_parity() {
        assert_eq!(gpu_frame_index(7), 7);
        assert_eq!(gpu_frame_index(u64::from(u32::MAX)), u32::MAX);
        assert_eq!(gpu_frame_index(u64::from(u32::MAX) + 1), 0);
        let late = (1_u64 << 33) + 5;
        assert_eq!(gpu_frame_index(late) % 2, (late % 2) as u32);

        let camera = Camera::from_settings(&CameraSettings::default(), 16.0 / 9.0);
        let mut state = FrameState::new();
        state.update(&camera, Vec2::ZERO, 0.016, late);
        assert_eq!(state.data().frame_count, 5);
    }

    #[test]
    fn static_camera_keeps_matrices_and_jitter_stays_out_of_proj_view() {
        let camera = Camera::from_settings(&CameraSettings::default(), 16.0 / 9.0);
        let mut state = FrameState::new();

        state.update(&camera, Vec2::ZERO, 0.016, 0);
        assert!(!state.camera_moved());

        state.update(&camera, Vec2::new(0.001, -0.002), 0.016, 1);
        assert!(!state.camera_moved());
        assert_ne!(state.data().projection, camera.projection_matrix());
        assert_eq!(state.data().proj_view, camera.view_projection());
        assert_eq!(state.data().frame_count, 1);
    }
}
