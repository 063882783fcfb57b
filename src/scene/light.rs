use glam::UVec2;

use crate::renderer::core::device::{
    BufferId, DepthState, DrawDesc, DrawGeometry, PassKind, RenderDevice, TextureId,
};
use crate::resources::uniforms::GpuLight;

/// Where light sources are drawn: the lighting result with the G-buffer depth.
#[derive(Debug, Clone, Copy)]
pub struct LightDrawTarget {
    pub color: TextureId,
    pub depth: TextureId,
    pub frame_data: BufferId,
    pub viewport: UVec2,
}

/// Owner of the scene's lights and their GPU buffer.
pub trait LightManager {
    /// Uploads pending light changes.
    fn update_gpu_buffers(&mut self, device: &mut dyn RenderDevice);
    /// Draws the visible light sources into `target`.
    fn draw(&self, device: &mut dyn RenderDevice, target: &LightDrawTarget);
    fn light(&self, index: usize) -> Option<&GpuLight>;
    fn len(&self) -> usize;
    /// Storage buffer holding every light, once uploaded.
    fn buffer(&self) -> Option<BufferId>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroys GPU buffers.
    fn release(&mut self, device: &mut dyn RenderDevice);
}

/// Light spheres are an icosahedron expanded in the vertex stage.
const LIGHT_SPHERE_VERTICES: u32 = 60;

/// Point lights stored in one storage buffer, drawn as instanced spheres.
#[derive(Default)]
pub struct PointLights {
    lights: Vec<GpuLight>,
    buffer: Option<BufferId>,
    capacity: usize,
    dirty: bool,
}

impl PointLights {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, light: GpuLight) -> usize {
        self.lights.push(light);
        self.dirty = true;
        self.lights.len() - 1
    }

    /// Replaces light `index`. Returns `false` when out of range.
    pub fn set(&mut self, index: usize, light: GpuLight) -> bool {
        match self.lights.get_mut(index) {
            Some(slot) => {
                *slot = light;
                self.dirty = true;
                true
            }
            None => false,
        }
    }
}

impl LightManager for PointLights {
    fn update_gpu_buffers(&mut self, device: &mut dyn RenderDevice) {
        if !self.dirty || self.lights.is_empty() {
            return;
        }

        if self.buffer.is_none() || self.lights.len() > self.capacity {
            if let Some(old) = self.buffer.take() {
                device.destroy_buffer(old);
            }
            self.capacity = self.lights.len().next_power_of_two();
            let size = (self.capacity * std::mem::size_of::<GpuLight>()) as u64;
            self.buffer = Some(device.create_buffer(
                "Point Lights",
                size,
                wgpu::BufferUsages::STORAGE,
            ));
            log::debug!("Point light buffer grown to {} lights", self.capacity);
        }

        if let Some(buffer) = self.buffer {
            device.write_buffer(buffer, 0, bytemuck::cast_slice(&self.lights));
        }
        self.dirty = false;
    }

    fn draw(&self, device: &mut dyn RenderDevice, target: &LightDrawTarget) {
        let Some(buffer) = self.buffer else {
            return;
        };
        if self.lights.is_empty() {
            return;
        }

        let color = [target.color];
        let uniforms = [target.frame_data, buffer];
        device.draw(&DrawDesc {
            depth_target: Some(target.depth),
            depth: Some(DepthState::OPAQUE),
            geometry: DrawGeometry::Procedural {
                vertex_count: LIGHT_SPHERE_VERTICES,
                instance_count: self.lights.len() as u32,
            },
            uniforms: &uniforms,
            ..DrawDesc::fullscreen(PassKind::LightSources, &color, target.viewport)
        });
    }

    fn light(&self, index: usize) -> Option<&GpuLight> {
        self.lights.get(index)
    }

    fn len(&self) -> usize {
        self.lights.len()
    }

    fn buffer(&self) -> Option<BufferId> {
        self.buffer
    }

    fn release(&mut self, device: &mut dyn RenderDevice) {
        if let Some(buffer) = self.buffer.take() {
            device.destroy_buffer(buffer);
        }
        self.capacity = 0;
        self.dirty = true;
    }
}
