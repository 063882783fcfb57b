//! wgpu Device
//!
//! [`WgpuDevice`] backs the [`RenderDevice`] contract with real wgpu
//! textures and buffers. Bindless residency is a table of texture views that
//! pass programs bind as a texture binding array.
//!
//! Shader loading lives outside this crate, so pass execution is delegated to
//! [`PassProgram`]s registered per [`PassKind`]. A pass without a program is
//! skipped with a one-time warning.

use glam::UVec2;
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::{SecondaryMap, SlotMap};

use super::context::{DeviceSettings, WgpuContext};
use super::device::{
    BarrierScope, BindlessHandle, BufferId, Capabilities, DispatchDesc, DrawDesc, PassKind,
    RenderDevice, ResidentKey, TextureBinding, TextureDesc, TextureId,
};
use crate::errors::Result;

// ============================================================================
// GPU resource wrappers
// ============================================================================

pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub desc: TextureDesc,
}

pub struct GpuBuffer {
    pub buffer: wgpu::Buffer,
    pub size: u64,
    pub usage: wgpu::BufferUsages,
    pub label: &'static str,
}

/// Resource tables visible to pass programs.
#[derive(Default)]
pub struct WgpuResources {
    textures: SlotMap<TextureId, GpuTexture>,
    buffers: SlotMap<BufferId, GpuBuffer>,
    residency: SecondaryMap<TextureId, BindlessHandle>,
    resident: SlotMap<ResidentKey, TextureId>,
}

impl WgpuResources {
    #[must_use]
    pub fn texture(&self, id: TextureId) -> Option<&GpuTexture> {
        self.textures.get(id)
    }

    #[must_use]
    pub fn buffer(&self, id: BufferId) -> Option<&GpuBuffer> {
        self.buffers.get(id)
    }

    /// Texture behind a resident handle.
    #[must_use]
    pub fn resolve(&self, handle: BindlessHandle) -> Option<&GpuTexture> {
        let texture = *self.resident.get(handle.key())?;
        self.textures.get(texture)
    }

    /// Views of every resident texture, paired with their handles.
    pub fn resident_views(&self) -> impl Iterator<Item = (BindlessHandle, &wgpu::TextureView)> {
        self.resident.iter().filter_map(|(key, texture)| {
            self.textures
                .get(*texture)
                .map(|t| (BindlessHandle::from_key(key), &t.view))
        })
    }

    /// Views for a binding list, in binding order. Stale ids are skipped.
    pub fn views<'a>(
        &'a self,
        bindings: &'a [TextureBinding],
    ) -> impl Iterator<Item = (u32, &'a wgpu::TextureView)> + 'a {
        bindings
            .iter()
            .filter_map(|b| self.textures.get(b.texture).map(|t| (b.unit, &t.view)))
    }
}

// ============================================================================
// Pass programs
// ============================================================================

/// Everything a program needs to encode its pass.
pub struct PassContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub resources: &'a WgpuResources,
}

/// Executable for one [`PassKind`], supplied by the shader-loading layer.
pub trait PassProgram {
    fn draw(&mut self, _ctx: &mut PassContext<'_>, _desc: &DrawDesc<'_>) {}
    fn dispatch(&mut self, _ctx: &mut PassContext<'_>, _desc: &DispatchDesc<'_>) {}
}

// ============================================================================
// Device
// ============================================================================

pub struct WgpuDevice {
    context: WgpuContext,
    capabilities: Capabilities,
    resources: WgpuResources,
    programs: FxHashMap<PassKind, Box<dyn PassProgram>>,
    warned_missing: FxHashSet<PassKind>,
    encoder: Option<wgpu::CommandEncoder>,
    last_presented: Option<(TextureId, UVec2)>,
}

impl WgpuDevice {
    /// Requests an adapter and device. Fails with
    /// [`RenderError::MissingCapability`](crate::errors::RenderError::MissingCapability)
    /// when the adapter lacks a required feature.
    pub async fn request(settings: &DeviceSettings) -> Result<Self> {
        let context = WgpuContext::new(settings).await?;
        Ok(Self::from_context(context))
    }

    /// Blocking variant of [`request`](Self::request).
    pub fn request_blocking(settings: &DeviceSettings) -> Result<Self> {
        pollster::block_on(Self::request(settings))
    }

    #[must_use]
    pub fn from_context(context: WgpuContext) -> Self {
        let capabilities = context.capabilities;
        Self {
            context,
            capabilities,
            resources: WgpuResources::default(),
            programs: FxHashMap::default(),
            warned_missing: FxHashSet::default(),
            encoder: None,
            last_presented: None,
        }
    }

    /// Installs the executable for `pass`, replacing any previous one.
    /// Registering an [`PassKind::Upscale`] program enables
    /// [`Capabilities::SPATIAL_UPSCALER`].
    pub fn register_program(&mut self, pass: PassKind, program: Box<dyn PassProgram>) {
        if pass == PassKind::Upscale {
            self.capabilities |= Capabilities::SPATIAL_UPSCALER;
        }
        self.warned_missing.remove(&pass);
        self.programs.insert(pass, program);
    }

    #[must_use]
    pub fn context(&self) -> &WgpuContext {
        &self.context
    }

    #[must_use]
    pub fn resources(&self) -> &WgpuResources {
        &self.resources
    }

    /// Image and viewport handed to the last [`RenderDevice::present`] call.
    #[must_use]
    pub fn last_presented(&self) -> Option<(TextureId, UVec2)> {
        self.last_presented
    }

    fn run_program(
        &mut self,
        pass: PassKind,
        run: impl FnOnce(&mut dyn PassProgram, &mut PassContext<'_>),
    ) {
        let Some(program) = self.programs.get_mut(&pass) else {
            if self.warned_missing.insert(pass) {
                log::warn!("No program registered for pass '{}'; skipping", pass.label());
            }
            return;
        };

        let device = &self.context.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            })
        });

        encoder.push_debug_group(pass.label());
        let mut ctx = PassContext {
            device,
            queue: &self.context.queue,
            encoder,
            resources: &self.resources,
        };
        run(program.as_mut(), &mut ctx);
        ctx.encoder.pop_debug_group();
    }
}

impl RenderDevice for WgpuDevice {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId {
        let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: desc.depth_or_array_layers,
            },
            mip_level_count: desc.mip_level_count,
            sample_count: 1,
            dimension: desc.dimension,
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::debug!(
            "Allocated texture '{}' {}x{} {:?}",
            desc.label,
            desc.width,
            desc.height,
            desc.format
        );
        self.resources.textures.insert(GpuTexture {
            texture,
            view,
            desc: desc.clone(),
        })
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if let Some(handle) = self.resources.residency.remove(texture) {
            log::error!("Texture {texture:?} destroyed while still resident");
            self.resources.resident.remove(handle.key());
        }
        match self.resources.textures.remove(texture) {
            Some(gpu) => gpu.texture.destroy(),
            None => log::error!("Destroy of unknown texture {texture:?}"),
        }
    }

    fn texture_desc(&self, texture: TextureId) -> Option<&TextureDesc> {
        self.resources.textures.get(texture).map(|t| &t.desc)
    }

    fn make_resident(&mut self, texture: TextureId) -> Option<BindlessHandle> {
        if !self.resources.textures.contains_key(texture) {
            log::error!("make_resident on unknown texture {texture:?}");
            return None;
        }
        if let Some(handle) = self.resources.residency.get(texture) {
            return Some(*handle);
        }
        let handle = BindlessHandle::from_key(self.resources.resident.insert(texture));
        self.resources.residency.insert(texture, handle);
        Some(handle)
    }

    fn make_non_resident(&mut self, handle: BindlessHandle) {
        match self.resources.resident.remove(handle.key()) {
            Some(texture) => {
                self.resources.residency.remove(texture);
            }
            None => log::error!("make_non_resident on stale handle {handle:?}"),
        }
    }

    fn resident_handle_count(&self) -> usize {
        self.resources.resident.len()
    }

    fn create_buffer(&mut self, label: &'static str, size: u64, usage: wgpu::BufferUsages) -> BufferId {
        let usage = usage | wgpu::BufferUsages::COPY_DST;
        let size = size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT).max(wgpu::COPY_BUFFER_ALIGNMENT);
        let buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        });
        self.resources.buffers.insert(GpuBuffer {
            buffer,
            size,
            usage,
            label,
        })
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        let Some(gpu) = self.resources.buffers.get(buffer) else {
            log::error!("Write to unknown buffer {buffer:?}");
            return;
        };
        if offset + data.len() as u64 > gpu.size {
            log::error!(
                "Write of {} bytes at {offset} overflows buffer '{}'",
                data.len(),
                gpu.label
            );
            return;
        }
        self.context.queue.write_buffer(&gpu.buffer, offset, data);
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        match self.resources.buffers.remove(buffer) {
            Some(gpu) => gpu.buffer.destroy(),
            None => log::error!("Destroy of unknown buffer {buffer:?}"),
        }
    }

    fn buffer_size(&self, buffer: BufferId) -> Option<u64> {
        self.resources.buffers.get(buffer).map(|b| b.size)
    }

    fn draw(&mut self, desc: &DrawDesc<'_>) {
        self.run_program(desc.pass, |program, ctx| program.draw(ctx, desc));
    }

    fn dispatch(&mut self, desc: &DispatchDesc<'_>) {
        self.run_program(desc.pass, |program, ctx| program.dispatch(ctx, desc));
    }

    fn barrier(&mut self, scope: BarrierScope) {
        // wgpu tracks hazards itself; the marker keeps captures readable.
        if let Some(encoder) = self.encoder.as_mut() {
            encoder.insert_debug_marker(&format!("barrier {scope:?}"));
        }
    }

    fn present(&mut self, image: TextureId, viewport: UVec2) {
        self.last_presented = Some((image, viewport));
        let textures = [TextureBinding::new(0, image)];
        let desc = DrawDesc {
            textures: &textures,
            ..DrawDesc::fullscreen(PassKind::Present, &[], viewport)
        };
        self.run_program(PassKind::Present, |program, ctx| program.draw(ctx, &desc));
    }

    fn end_frame(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.context.queue.submit(std::iter::once(encoder.finish()));
        }
    }
}
