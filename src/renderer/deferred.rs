//! Deferred Pipeline
//!
//! The rasterized frame, recorded in a fixed order:
//!
//! ```text
//!  1. Voxelize ............ GI only, every instance forced visible
//!  2. Frustum cull ........ draw batches for the camera
//!  3. G-buffer ............ Result + albedo / normal / emissive / velocity / depth
//!  4. SSAO ................ optional
//!  5. Cone trace .......... GI only
//!  6. Lighting resolve .... fullscreen, reads the G-buffer through bindless handles
//!  7. VRS classification .. optional (Apply feeds step 6 next frame, Debug overlays)
//!  8. Light sources, sky .. sky with LessEqual and no depth writes
//!  9. Volumetric, SSR ..... optional
//! 10. Merge ............... Result (image 0) + GI / AO / SSR / volumetric (units 1-4)
//! ```
//!
//! Disabled merge inputs are bound to a 1×1 sentinel so the merge program
//! never samples a stale or missing target; the enable mask travels as the
//! dispatch constant.

use bitflags::bitflags;
use glam::{Mat4, UVec2};

use crate::renderer::core::device::{
    BarrierScope, BufferId, DepthState, DispatchDesc, DrawDesc, DrawGeometry, ImageAccess,
    ImageBinding, PassKind, RenderDevice, TextureBinding, TextureDesc, TextureId, workgroups_2d,
};
use crate::renderer::frame_state::InstanceBuffer;
use crate::renderer::passes::COMPUTE_LOCAL_SIZE;
use crate::renderer::passes::shading_rate::ShadingRateClassifier;
use crate::renderer::passes::ssao::SsaoPass;
use crate::renderer::passes::ssr::SsrPass;
use crate::renderer::passes::volumetric::VolumetricPass;
use crate::renderer::passes::voxel_gi::VoxelGi;
use crate::renderer::resource_set::{GBufferResources, RESULT_FORMAT};
use crate::renderer::settings::{RasterSettings, VrsMode};
use crate::scene::light::{LightDrawTarget, LightManager};
use crate::scene::model_system::GeometryProvider;

/// Vertices of the unit sky cube (12 triangles).
const SKY_CUBE_VERTICES: u32 = 36;

bitflags! {
    /// Merge inputs carrying real data this frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MergeInputs: u32 {
        const GI         = 1 << 0;
        const AO         = 1 << 1;
        const SSR        = 1 << 2;
        const VOLUMETRIC = 1 << 3;
    }
}

/// Texture units of the merge dispatch.
pub mod merge_unit {
    pub const RESULT: u32 = 0;
    pub const GI: u32 = 1;
    pub const AO: u32 = 2;
    pub const SSR: u32 = 3;
    pub const VOLUMETRIC: u32 = 4;
}

/// Per-frame inputs of [`DeferredPipeline::render`].
#[derive(Debug, Clone, Copy)]
pub struct RasterFrame {
    pub frame_data: BufferId,
    pub temporal_data: BufferId,
    /// Matrix the provider culls against (unjittered view-projection).
    pub cull_matrix: Mat4,
}

pub struct DeferredPipeline {
    gbuffer: GBufferResources,
    sentinel: TextureId,
    settings: RasterSettings,

    ssao: SsaoPass,
    ssr: SsrPass,
    volumetric: VolumetricPass,
    shading_rate: ShadingRateClassifier,
    /// Allocated the first time GI or the grid view is enabled; kept afterwards.
    voxel_gi: Option<VoxelGi>,

    instances: InstanceBuffer,
    voxel_instances: InstanceBuffer,
}

impl DeferredPipeline {
    pub fn new(device: &mut dyn RenderDevice, size: UVec2, settings: &RasterSettings) -> Self {
        let sentinel = device.create_texture(&TextureDesc::d2(
            "Merge Sentinel",
            UVec2::ONE,
            RESULT_FORMAT,
            wgpu::TextureUsages::TEXTURE_BINDING,
        ));

        let mut pipeline = Self {
            gbuffer: GBufferResources::new(device, size),
            sentinel,
            settings: settings.clone(),
            ssao: SsaoPass::new(device, size, &settings.ssao_params),
            ssr: SsrPass::new(device, size, &settings.ssr_params),
            volumetric: VolumetricPass::new(device, size, &settings.volumetric_params),
            shading_rate: ShadingRateClassifier::new(device, size, &settings.vrs_params),
            voxel_gi: None,
            instances: InstanceBuffer::new("Raster Instances"),
            voxel_instances: InstanceBuffer::new("Voxelizer Instances"),
        };
        pipeline.ensure_voxel_gi(device);
        log::debug!("Deferred pipeline created at {}x{}", size.x, size.y);
        pipeline
    }

    fn wants_voxel_grid(&self) -> bool {
        self.settings.gi || self.settings.render_voxel_grid
    }

    fn ensure_voxel_gi(&mut self, device: &mut dyn RenderDevice) {
        if self.voxel_gi.is_none() && self.wants_voxel_grid() {
            self.voxel_gi = Some(VoxelGi::new(device, self.gbuffer.size(), &self.settings.gi_params));
        }
    }

    /// Stages toggles and effect parameters. Nothing is allocated or uploaded
    /// until [`apply`](Self::apply).
    pub fn set_settings(&mut self, settings: &RasterSettings) {
        self.ssao.set_settings(&settings.ssao_params);
        self.ssr.set_settings(&settings.ssr_params);
        self.volumetric.set_settings(&settings.volumetric_params);
        self.shading_rate.set_settings(&settings.vrs_params);
        if let Some(gi) = &mut self.voxel_gi {
            gi.set_settings(&settings.gi_params);
        }
        self.settings = settings.clone();
    }

    pub fn apply(&mut self, device: &mut dyn RenderDevice) {
        self.ensure_voxel_gi(device);
        self.ssao.apply(device);
        self.ssr.apply(device);
        self.volumetric.apply(device);
        self.shading_rate.apply(device);
        if let Some(gi) = &mut self.voxel_gi {
            gi.apply(device);
        }
    }

    /// Resizes every render-resolution target. Returns `false` when `size`
    /// already matches.
    pub fn resize(&mut self, device: &mut dyn RenderDevice, size: UVec2) -> bool {
        if !self.gbuffer.resize(device, size) {
            return false;
        }
        self.ssao.resize(device, size);
        self.ssr.resize(device, size);
        self.volumetric.resize(device, size);
        self.shading_rate.resize(device, size);
        if let Some(gi) = &mut self.voxel_gi {
            gi.resize(device, size);
        }
        true
    }

    /// Records the whole raster sequence.
    pub fn render<S: GeometryProvider>(
        &mut self,
        device: &mut dyn RenderDevice,
        scene: &mut S,
        lights: &dyn LightManager,
        frame: &RasterFrame,
    ) {
        let size = self.gbuffer.size();
        let result = self.gbuffer.result();
        let gi_active = self.settings.gi;

        if gi_active && let Some(gi) = &self.voxel_gi {
            scene.force_all_visible();
            let instances = self.voxel_instances.upload(device, scene);
            gi.voxelize(device, scene.draw_batches(), frame.frame_data, instances);
        }

        if self.settings.render_voxel_grid {
            if let Some(gi) = &self.voxel_gi {
                gi.debug_render(device, result, size, frame.frame_data);
            }
            return;
        }

        // G-buffer
        scene.cull(&frame.cull_matrix);
        {
            let instances = self.instances.upload(device, scene);
            let color_targets = self.gbuffer.color_targets();
            let uniforms = [frame.frame_data, instances, frame.temporal_data];
            device.draw(&DrawDesc {
                depth_target: Some(self.gbuffer.depth()),
                depth: Some(DepthState::OPAQUE),
                clear: true,
                geometry: DrawGeometry::Indirect(scene.draw_batches()),
                uniforms: &uniforms,
                polygon_mode: if self.settings.wireframe {
                    wgpu::PolygonMode::Line
                } else {
                    wgpu::PolygonMode::Fill
                },
                ..DrawDesc::fullscreen(PassKind::GBuffer, &color_targets, size)
            });
        }

        if self.settings.ssao {
            self.ssao.compute(device, &self.gbuffer, frame.frame_data);
        }

        if gi_active && let Some(gi) = &self.voxel_gi {
            gi.cone_trace(device, &self.gbuffer, frame.frame_data);
        }

        // Lighting resolve
        {
            let color = [result];
            let mut uniforms: smallvec::SmallVec<[BufferId; 3]> =
                smallvec::smallvec![frame.frame_data, self.gbuffer.payload()];
            uniforms.extend(lights.buffer());
            let shading_rate_image =
                (self.settings.vrs == VrsMode::Apply).then(|| self.shading_rate.rate_image());
            device.draw(&DrawDesc {
                uniforms: &uniforms,
                shading_rate_image,
                ..DrawDesc::fullscreen(PassKind::Lighting, &color, size)
            });
        }

        self.shading_rate
            .compute(device, &self.gbuffer, self.settings.vrs, frame.frame_data);

        lights.draw(
            device,
            &LightDrawTarget {
                color: result,
                depth: self.gbuffer.depth(),
                frame_data: frame.frame_data,
                viewport: size,
            },
        );

        // Sky fills only where nothing was drawn.
        {
            let color = [result];
            let uniforms = [frame.frame_data];
            device.draw(&DrawDesc {
                depth_target: Some(self.gbuffer.depth()),
                depth: Some(DepthState::BACKGROUND),
                geometry: DrawGeometry::Procedural {
                    vertex_count: SKY_CUBE_VERTICES,
                    instance_count: 1,
                },
                uniforms: &uniforms,
                ..DrawDesc::fullscreen(PassKind::Sky, &color, size)
            });
        }

        if self.settings.volumetric {
            self.volumetric
                .compute(device, &self.gbuffer, frame.frame_data, lights.buffer());
        }

        if self.settings.ssr {
            self.ssr.compute(device, &self.gbuffer, frame.frame_data);
        }

        self.merge(device, frame.frame_data);
    }

    /// Enabled merge inputs for the current toggles.
    #[must_use]
    pub fn merge_inputs(&self) -> MergeInputs {
        let mut inputs = MergeInputs::empty();
        inputs.set(MergeInputs::GI, self.settings.gi && self.voxel_gi.is_some());
        inputs.set(MergeInputs::AO, self.settings.ssao);
        inputs.set(MergeInputs::SSR, self.settings.ssr);
        inputs.set(MergeInputs::VOLUMETRIC, self.settings.volumetric);
        inputs
    }

    fn merge(&self, device: &mut dyn RenderDevice, frame_data: BufferId) {
        let inputs = self.merge_inputs();
        let pick = |flag: MergeInputs, texture: TextureId| {
            if inputs.contains(flag) { texture } else { self.sentinel }
        };
        let gi = self
            .voxel_gi
            .as_ref()
            .map_or(self.sentinel, |gi| pick(MergeInputs::GI, gi.result()));

        let textures = [
            TextureBinding::new(merge_unit::GI, gi),
            TextureBinding::new(merge_unit::AO, pick(MergeInputs::AO, self.ssao.result())),
            TextureBinding::new(merge_unit::SSR, pick(MergeInputs::SSR, self.ssr.result())),
            TextureBinding::new(
                merge_unit::VOLUMETRIC,
                pick(MergeInputs::VOLUMETRIC, self.volumetric.result()),
            ),
        ];
        let images = [ImageBinding::new(
            merge_unit::RESULT,
            self.gbuffer.result(),
            ImageAccess::ReadWrite,
        )];
        let uniforms = [frame_data];

        device.dispatch(&DispatchDesc {
            textures: &textures,
            images: &images,
            uniforms: &uniforms,
            constants: inputs.bits(),
            ..DispatchDesc::new(
                PassKind::Merge,
                workgroups_2d(self.gbuffer.size(), COMPUTE_LOCAL_SIZE),
            )
        });
        device.barrier(BarrierScope::TEXTURE_FETCH);
    }

    /// HDR result of the last recorded frame.
    #[inline]
    #[must_use]
    pub fn result(&self) -> TextureId {
        self.gbuffer.result()
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        self.gbuffer.size()
    }

    #[inline]
    #[must_use]
    pub fn gbuffer(&self) -> &GBufferResources {
        &self.gbuffer
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &RasterSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn sentinel(&self) -> TextureId {
        self.sentinel
    }

    #[must_use]
    pub fn voxel_gi(&self) -> Option<&VoxelGi> {
        self.voxel_gi.as_ref()
    }

    #[must_use]
    pub fn ssao(&self) -> &SsaoPass {
        &self.ssao
    }

    #[must_use]
    pub fn ssr(&self) -> &SsrPass {
        &self.ssr
    }

    #[must_use]
    pub fn volumetric(&self) -> &VolumetricPass {
        &self.volumetric
    }

    #[must_use]
    pub fn shading_rate(&self) -> &ShadingRateClassifier {
        &self.shading_rate
    }

    /// Releases every target, handle and buffer. Resident handles go first.
    pub fn release(mut self, device: &mut dyn RenderDevice) {
        self.gbuffer.release(device);
        self.ssao.release(device);
        self.ssr.release(device);
        self.volumetric.release(device);
        self.shading_rate.release(device);
        if let Some(gi) = self.voxel_gi.take() {
            gi.release(device);
        }
        self.instances.release(device);
        self.voxel_instances.release(device);
        device.destroy_texture(self.sentinel);
        log::debug!("Deferred pipeline released");
    }
}
