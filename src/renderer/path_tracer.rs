//! Accumulation Path Tracer
//!
//! One compute dispatch per frame blends a new sample per pixel into an
//! RGBA32F radiance target. The sample index travels in the uniform block;
//! the shader weights the new sample by `1 / (samples + 1)`.
//!
//! Accumulation restarts when [`reset`](AccumulationPathTracer::reset) is
//! called: on camera or instance motion, resize and mode activation.

use glam::UVec2;

use crate::define_gpu_data_struct;
use crate::renderer::core::device::{
    BarrierScope, BufferId, DispatchDesc, ImageAccess, ImageBinding, PassKind, RenderDevice,
    TextureId, workgroups_2d,
};
use crate::renderer::passes::{COMPUTE_LOCAL_SIZE, ScreenTarget};
use crate::renderer::settings::PathTracerSettings;
use crate::resources::uniform_slot::UniformSlot;

const RADIANCE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

define_gpu_data_struct!(
    struct GpuPathTracerData {
        pub ray_depth: u32 = 6,
        pub focal_length: f32 = 10.0,
        pub lens_radius: f32,
        pub accumulated_samples: u32,
    }
);

pub struct AccumulationPathTracer {
    uniforms: UniformSlot<GpuPathTracerData>,
    result: ScreenTarget,
    settings: PathTracerSettings,
    samples: u32,
    /// An accumulated image was discarded since the last `take_restart`.
    restarted: bool,
}

impl AccumulationPathTracer {
    pub fn new(device: &mut dyn RenderDevice, size: UVec2, settings: &PathTracerSettings) -> Self {
        let mut tracer = Self {
            uniforms: UniformSlot::new(
                GpuPathTracerData {
                    ray_depth: settings.ray_depth,
                    focal_length: settings.focal_length,
                    lens_radius: settings.lens_radius,
                    accumulated_samples: 0,
                },
                "Path Tracer Uniforms",
            ),
            result: ScreenTarget::new(device, "Path Tracer Result", size, RADIANCE_FORMAT),
            settings: settings.clone(),
            samples: 0,
            restarted: false,
        };
        tracer.uniforms.apply(device);
        log::debug!("Path tracer created at {}x{}", size.x, size.y);
        tracer
    }

    /// Stages new parameters. A different camera model or ray depth restarts
    /// accumulation; the sample bound alone does not.
    pub fn set_settings(&mut self, settings: &PathTracerSettings) {
        let camera_model = |s: &PathTracerSettings| (s.ray_depth, s.focal_length, s.lens_radius);
        let restart = camera_model(settings) != camera_model(&self.settings);
        self.settings = settings.clone();
        if restart {
            let mut data = self.uniforms.write();
            data.ray_depth = settings.ray_depth;
            data.focal_length = settings.focal_length;
            data.lens_radius = settings.lens_radius;
            drop(data);
            self.reset();
        }
    }

    pub fn apply(&mut self, device: &mut dyn RenderDevice) {
        self.uniforms.apply(device);
    }

    /// Discards the accumulated image.
    pub fn reset(&mut self) {
        if self.samples != 0 {
            log::trace!("Path tracer reset after {} samples", self.samples);
            self.restarted = true;
        }
        self.samples = 0;
    }

    /// Whether accumulated samples were discarded since the previous call.
    pub fn take_restart(&mut self) -> bool {
        std::mem::take(&mut self.restarted)
    }

    /// Whether the per-pixel sample bound was reached.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        let bound = self.settings.max_samples_per_pixel;
        bound != 0 && self.samples >= bound
    }

    /// Adds one sample per pixel unless the image already converged.
    pub fn compute(&mut self, device: &mut dyn RenderDevice, frame_data: BufferId) {
        if self.is_converged() {
            return;
        }
        if self.uniforms.get().accumulated_samples != self.samples {
            self.uniforms.write().accumulated_samples = self.samples;
        }
        let params = self.uniforms.apply(device);

        let images = [ImageBinding::new(0, self.result.id(), ImageAccess::ReadWrite)];
        let uniforms = [frame_data, params];
        device.dispatch(&DispatchDesc {
            images: &images,
            uniforms: &uniforms,
            ..DispatchDesc::new(
                PassKind::PathTrace,
                workgroups_2d(self.result.size(), COMPUTE_LOCAL_SIZE),
            )
        });
        device.barrier(BarrierScope::TEXTURE_FETCH);
        self.samples += 1;
    }

    /// Reallocates the radiance target and restarts accumulation.
    pub fn resize(&mut self, device: &mut dyn RenderDevice, size: UVec2) -> bool {
        if !self.result.resize(device, size) {
            return false;
        }
        self.reset();
        true
    }

    #[inline]
    #[must_use]
    pub fn result(&self) -> TextureId {
        self.result.id()
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        self.result.size()
    }

    /// Samples per pixel in the current image.
    #[inline]
    #[must_use]
    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn release(mut self, device: &mut dyn RenderDevice) {
        self.uniforms.release(device);
        self.result.release(device);
        log::debug!("Path tracer released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::core::HeadlessDevice;

    #[test]
    fn sample_bound_stops_dispatches() {
        let mut device = HeadlessDevice::default();
        let settings = PathTracerSettings {
            max_samples_per_pixel: 2,
            ..Default::default()
        };
        let frame_data = device.create_buffer("Basic Data", 64, wgpu::BufferUsages::UNIFORM);
        let mut tracer = AccumulationPathTracer::new(&mut device, UVec2::new(64, 32), &settings);

        for _ in 0..4 {
            tracer.compute(&mut device, frame_data);
        }
        assert_eq!(tracer.samples(), 2);
        assert!(tracer.is_converged());
        let dispatches = device
            .recorded_passes()
            .into_iter()
            .filter(|p| *p == PassKind::PathTrace)
            .count();
        assert_eq!(dispatches, 2);

        tracer.reset();
        assert!(!tracer.is_converged());
    }

    #[test]
    fn identical_settings_keep_accumulating() {
        let mut device = HeadlessDevice::default();
        let settings = PathTracerSettings::default();
        let frame_data = device.create_buffer("Basic Data", 64, wgpu::BufferUsages::UNIFORM);
        let mut tracer = AccumulationPathTracer::new(&mut device, UVec2::new(64, 32), &settings);

        for _ in 0..4 {
            tracer.compute(&mut device, frame_data);
        }
        tracer.set_settings(&settings);
        tracer.set_settings(&PathTracerSettings {
            max_samples_per_pixel: 16,
            ..settings.clone()
        });
        assert_eq!(tracer.samples(), 4);
        assert!(!tracer.take_restart());

        tracer.set_settings(&PathTracerSettings {
            lens_radius: 0.05,
            ..settings
        });
        assert_eq!(tracer.samples(), 0);
        assert!(tracer.take_restart());
        assert!(!tracer.take_restart());
    }
}
