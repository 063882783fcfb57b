//! Voxel Global Illumination
//!
//! Two stages sharing one 3D albedo grid:
//!
//! ```text
//!  all instances ──► Voxelize (indirect draw) ──► voxel grid (RGBA16F, N³)
//!                                                      │
//!  GBuffer (payload) ──► Cone Trace (compute) ◄────────┘
//!                              │
//!                              └──► indirect light (render resolution, merge unit 1)
//! ```
//!
//! The grid covers a fixed world-space box and does not depend on the render
//! resolution; only the cone-trace result is resized.

use glam::{UVec2, UVec3, Vec3};
use serde::{Deserialize, Serialize};

use super::{COMPUTE_LOCAL_SIZE, ScreenTarget};
use crate::define_gpu_data_struct;
use crate::renderer::core::device::{
    BarrierScope, BufferId, DispatchDesc, DrawBatch, DrawDesc, DrawGeometry, ImageAccess,
    ImageBinding, PassKind, RenderDevice, TextureBinding, TextureDesc, TextureId, workgroups_2d,
};
use crate::renderer::resource_set::{GBufferResources, GBufferSlot, RESULT_FORMAT};
use crate::resources::uniform_slot::UniformSlot;

const VOXEL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelGiSettings {
    /// Voxels per axis.
    pub grid_resolution: u32,
    pub grid_min: Vec3,
    pub grid_max: Vec3,
    /// Cone samples per pixel.
    pub max_samples: u32,
    pub step_multiplier: f32,
    pub gi_boost: f32,
    /// Start offset along the surface normal, in voxels.
    pub normal_ray_offset: f32,
}

impl Default for VoxelGiSettings {
    fn default() -> Self {
        Self {
            grid_resolution: 256,
            grid_min: Vec3::new(-28.0, -3.0, -17.0),
            grid_max: Vec3::new(28.0, 20.0, 17.0),
            max_samples: 4,
            step_multiplier: 0.16,
            gi_boost: 1.3,
            normal_ray_offset: 1.0,
        }
    }
}

define_gpu_data_struct!(
    struct GpuVoxelizerData {
        pub grid_min: Vec3,
        pub grid_resolution: u32 = 256,
        pub grid_max: Vec3,
        pub(crate) __pad: u32,
    }
);

define_gpu_data_struct!(
    struct GpuConeTraceData {
        pub max_samples: u32 = 4,
        pub step_multiplier: f32 = 0.16,
        pub gi_boost: f32 = 1.3,
        pub normal_ray_offset: f32 = 1.0,
    }
);

impl From<&VoxelGiSettings> for GpuVoxelizerData {
    fn from(s: &VoxelGiSettings) -> Self {
        Self {
            grid_min: s.grid_min,
            grid_resolution: s.grid_resolution,
            grid_max: s.grid_max,
            ..Default::default()
        }
    }
}

impl From<&VoxelGiSettings> for GpuConeTraceData {
    fn from(s: &VoxelGiSettings) -> Self {
        Self {
            max_samples: s.max_samples,
            step_multiplier: s.step_multiplier,
            gi_boost: s.gi_boost,
            normal_ray_offset: s.normal_ray_offset,
        }
    }
}

fn create_grid(device: &mut dyn RenderDevice, resolution: u32) -> TextureId {
    device.create_texture(&TextureDesc::d3(
        "Voxel Albedo",
        UVec3::splat(resolution.max(1)),
        VOXEL_FORMAT,
        wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::STORAGE_BINDING,
    ))
}

pub struct VoxelGi {
    grid: TextureId,
    grid_resolution: u32,
    voxelizer: UniformSlot<GpuVoxelizerData>,
    cone_tracer: UniformSlot<GpuConeTraceData>,
    result: ScreenTarget,
}

impl VoxelGi {
    pub fn new(device: &mut dyn RenderDevice, size: UVec2, settings: &VoxelGiSettings) -> Self {
        let mut voxelizer = UniformSlot::new(GpuVoxelizerData::from(settings), "Voxelizer Uniforms");
        let mut cone_tracer = UniformSlot::new(GpuConeTraceData::from(settings), "Cone Trace Uniforms");
        voxelizer.apply(device);
        cone_tracer.apply(device);

        log::debug!("Voxel grid allocated at {}³", settings.grid_resolution);
        Self {
            grid: create_grid(device, settings.grid_resolution),
            grid_resolution: settings.grid_resolution,
            voxelizer,
            cone_tracer,
            result: ScreenTarget::new(device, "Cone Trace Result", size, RESULT_FORMAT),
        }
    }

    pub fn set_settings(&mut self, settings: &VoxelGiSettings) {
        let voxelizer = GpuVoxelizerData::from(settings);
        if voxelizer != *self.voxelizer.get() {
            self.voxelizer.set(voxelizer);
        }
        let cone = GpuConeTraceData::from(settings);
        if cone != *self.cone_tracer.get() {
            self.cone_tracer.set(cone);
        }
    }

    /// Uploads staged parameters and reallocates the grid if its resolution changed.
    pub fn apply(&mut self, device: &mut dyn RenderDevice) {
        let resolution = self.voxelizer.get().grid_resolution;
        if resolution != self.grid_resolution {
            device.destroy_texture(self.grid);
            self.grid = create_grid(device, resolution);
            self.grid_resolution = resolution;
            log::debug!("Voxel grid reallocated at {resolution}³");
        }
        self.voxelizer.apply(device);
        self.cone_tracer.apply(device);
    }

    pub fn resize(&mut self, device: &mut dyn RenderDevice, size: UVec2) -> bool {
        self.result.resize(device, size)
    }

    /// Rasterizes every batch into the voxel grid.
    pub fn voxelize(
        &self,
        device: &mut dyn RenderDevice,
        batches: &[DrawBatch],
        frame_data: BufferId,
        instances: BufferId,
    ) {
        let Some(params) = self.voxelizer.buffer() else {
            return;
        };
        let images = [ImageBinding::new(0, self.grid, ImageAccess::ReadWrite)];
        let uniforms = [frame_data, instances, params];

        device.draw(&DrawDesc {
            clear: true,
            geometry: DrawGeometry::Indirect(batches),
            images: &images,
            uniforms: &uniforms,
            ..DrawDesc::fullscreen(PassKind::Voxelize, &[], UVec2::splat(self.grid_resolution))
        });
        device.barrier(BarrierScope::TEXTURE_FETCH | BarrierScope::SHADER_IMAGE_ACCESS);
    }

    pub fn cone_trace(&self, device: &mut dyn RenderDevice, gbuffer: &GBufferResources, frame_data: BufferId) {
        let Some(params) = self.cone_tracer.buffer() else {
            return;
        };
        let textures = [
            TextureBinding::new(0, self.grid),
            TextureBinding::new(1, gbuffer.texture(GBufferSlot::Depth)),
        ];
        let images = [ImageBinding::new(0, self.result.id(), ImageAccess::WriteOnly)];
        let uniforms = [frame_data, gbuffer.payload(), params];

        device.dispatch(&DispatchDesc {
            textures: &textures,
            images: &images,
            uniforms: &uniforms,
            ..DispatchDesc::new(
                PassKind::ConeTrace,
                workgroups_2d(self.result.size(), COMPUTE_LOCAL_SIZE),
            )
        });
        device.barrier(BarrierScope::TEXTURE_FETCH);
    }

    /// Ray-marches the grid straight into `target` for inspection.
    pub fn debug_render(&self, device: &mut dyn RenderDevice, target: TextureId, viewport: UVec2, frame_data: BufferId) {
        let Some(params) = self.voxelizer.buffer() else {
            return;
        };
        let color = [target];
        let textures = [TextureBinding::new(0, self.grid)];
        let uniforms = [frame_data, params];
        device.draw(&DrawDesc {
            textures: &textures,
            uniforms: &uniforms,
            ..DrawDesc::fullscreen(PassKind::VoxelDebug, &color, viewport)
        });
    }

    #[inline]
    #[must_use]
    pub fn grid(&self) -> TextureId {
        self.grid
    }

    #[inline]
    #[must_use]
    pub fn result(&self) -> TextureId {
        self.result.id()
    }

    pub fn release(mut self, device: &mut dyn RenderDevice) {
        self.voxelizer.release(device);
        self.cone_tracer.release(device);
        device.destroy_texture(self.grid);
        self.result.release(device);
    }
}
