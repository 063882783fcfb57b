//! Headless Device
//!
//! A CPU-side [`RenderDevice`] that keeps its texture, buffer and resident
//! handle tables in slot maps and records every submitted pass instead of
//! executing it. Offline tooling and the test-suite drive the orchestrator
//! through it and then inspect the command stream.
//!
//! Misuse (stale ids, destroying a still-resident texture, out-of-range
//! writes) is logged and counted in [`HeadlessDevice::misuse_count`], never
//! panicked on.

use glam::UVec2;
use slotmap::{SecondaryMap, SlotMap};
use smallvec::SmallVec;

use super::device::{
    BarrierScope, BindlessHandle, BufferId, Capabilities, DepthState, DispatchDesc, DrawDesc,
    DrawGeometry, ImageBinding, PassKind, RenderDevice, ResidentKey, TextureBinding, TextureDesc,
    TextureId,
};

// ============================================================================
// Recorded commands
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedGeometry {
    FullscreenTriangle,
    Procedural { vertex_count: u32, instance_count: u32 },
    Indirect { batch_count: u32, instance_count: u32 },
}

#[derive(Debug, Clone)]
pub struct RecordedDraw {
    pub pass: PassKind,
    pub color_targets: SmallVec<[TextureId; 4]>,
    pub depth_target: Option<TextureId>,
    pub depth: Option<DepthState>,
    pub clear: bool,
    pub geometry: RecordedGeometry,
    pub textures: SmallVec<[TextureBinding; 8]>,
    pub images: SmallVec<[ImageBinding; 4]>,
    pub shading_rate_image: Option<TextureId>,
    pub polygon_mode: wgpu::PolygonMode,
    pub viewport: UVec2,
}

#[derive(Debug, Clone)]
pub struct RecordedDispatch {
    pub pass: PassKind,
    pub workgroups: [u32; 3],
    pub textures: SmallVec<[TextureBinding; 8]>,
    pub images: SmallVec<[ImageBinding; 4]>,
    pub constants: u32,
}

impl RecordedDispatch {
    /// Texture bound to `unit`, if any.
    #[must_use]
    pub fn texture_at(&self, unit: u32) -> Option<TextureId> {
        self.textures.iter().find(|b| b.unit == unit).map(|b| b.texture)
    }

    #[must_use]
    pub fn image_at(&self, unit: u32) -> Option<&ImageBinding> {
        self.images.iter().find(|b| b.unit == unit)
    }
}

#[derive(Debug, Clone)]
pub enum RecordedCommand {
    Draw(RecordedDraw),
    Dispatch(RecordedDispatch),
    Barrier(BarrierScope),
    Present { image: TextureId, viewport: UVec2 },
    EndFrame,
}

impl RecordedCommand {
    /// Pass kind for draws and dispatches.
    #[must_use]
    pub fn pass(&self) -> Option<PassKind> {
        match self {
            Self::Draw(d) => Some(d.pass),
            Self::Dispatch(d) => Some(d.pass),
            _ => None,
        }
    }
}

// ============================================================================
// Device
// ============================================================================

struct HeadlessBuffer {
    label: &'static str,
    data: Vec<u8>,
}

pub struct HeadlessDevice {
    capabilities: Capabilities,

    textures: SlotMap<TextureId, TextureDesc>,
    textures_created: usize,
    peak_textures: usize,
    /// Texture → its live resident handle. At most one per texture.
    residency: SecondaryMap<TextureId, BindlessHandle>,
    resident: SlotMap<ResidentKey, TextureId>,
    residency_limit: usize,

    buffers: SlotMap<BufferId, HeadlessBuffer>,

    commands: Vec<RecordedCommand>,
    frames_submitted: u64,
    misuse_count: usize,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(Capabilities::all())
    }
}

impl HeadlessDevice {
    #[must_use]
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            textures: SlotMap::with_key(),
            textures_created: 0,
            peak_textures: 0,
            residency: SecondaryMap::new(),
            resident: SlotMap::with_key(),
            residency_limit: usize::MAX,
            buffers: SlotMap::with_key(),
            commands: Vec::new(),
            frames_submitted: 0,
            misuse_count: 0,
        }
    }

    /// Caps the bindless table at `limit` live handles. Further
    /// `make_resident` calls fail.
    #[must_use]
    pub fn with_residency_limit(mut self, limit: usize) -> Self {
        self.residency_limit = limit;
        self
    }

    /// Every command recorded since creation or the last [`take_commands`](Self::take_commands).
    #[must_use]
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<RecordedCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Pass kinds of recorded draws and dispatches, in submission order.
    #[must_use]
    pub fn recorded_passes(&self) -> Vec<PassKind> {
        self.commands.iter().filter_map(RecordedCommand::pass).collect()
    }

    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Textures created over the device's lifetime.
    #[must_use]
    pub fn textures_created(&self) -> usize {
        self.textures_created
    }

    /// Most textures alive at once since creation or the last
    /// [`reset_peak_texture_count`](Self::reset_peak_texture_count).
    #[must_use]
    pub fn peak_texture_count(&self) -> usize {
        self.peak_textures
    }

    pub fn reset_peak_texture_count(&mut self) {
        self.peak_textures = self.textures.len();
    }

    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Live textures created with `label`.
    pub fn textures_labeled<'a>(
        &'a self,
        label: &'a str,
    ) -> impl Iterator<Item = (TextureId, &'a TextureDesc)> + 'a {
        self.textures.iter().filter(move |(_, desc)| desc.label == label)
    }

    #[must_use]
    pub fn is_resident(&self, texture: TextureId) -> bool {
        self.residency.contains_key(texture)
    }

    #[must_use]
    pub fn buffer_contents(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(buffer).map(|b| b.data.as_slice())
    }

    #[must_use]
    pub fn buffer_label(&self, buffer: BufferId) -> Option<&'static str> {
        self.buffers.get(buffer).map(|b| b.label)
    }

    #[must_use]
    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    /// Number of lifecycle violations observed so far.
    #[must_use]
    pub fn misuse_count(&self) -> usize {
        self.misuse_count
    }

    fn misuse(&mut self, what: std::fmt::Arguments<'_>) {
        log::error!("HeadlessDevice misuse: {what}");
        self.misuse_count += 1;
    }

    fn check_texture(&mut self, texture: TextureId, pass: PassKind) {
        if !self.textures.contains_key(texture) {
            self.misuse(format_args!("{} references destroyed texture {texture:?}", pass.label()));
        }
    }

    fn check_bindings(&mut self, pass: PassKind, textures: &[TextureBinding], images: &[ImageBinding]) {
        for binding in textures {
            self.check_texture(binding.texture, pass);
        }
        for binding in images {
            self.check_texture(binding.texture, pass);
        }
    }
}

impl RenderDevice for HeadlessDevice {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId {
        log::trace!(
            "create texture '{}' {}x{}x{} {:?}",
            desc.label,
            desc.width,
            desc.height,
            desc.depth_or_array_layers,
            desc.format
        );
        let texture = self.textures.insert(desc.clone());
        self.textures_created += 1;
        self.peak_textures = self.peak_textures.max(self.textures.len());
        texture
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if let Some(handle) = self.residency.remove(texture) {
            self.resident.remove(handle.key());
            self.misuse(format_args!("texture {texture:?} destroyed while still resident"));
        }
        if self.textures.remove(texture).is_none() {
            self.misuse(format_args!("destroy of unknown texture {texture:?}"));
        }
    }

    fn texture_desc(&self, texture: TextureId) -> Option<&TextureDesc> {
        self.textures.get(texture)
    }

    fn make_resident(&mut self, texture: TextureId) -> Option<BindlessHandle> {
        if !self.textures.contains_key(texture) {
            self.misuse(format_args!("make_resident on unknown texture {texture:?}"));
            return None;
        }
        if let Some(handle) = self.residency.get(texture) {
            return Some(*handle);
        }
        if self.resident.len() >= self.residency_limit {
            log::warn!(
                "bindless table full ({} handles), {texture:?} stays non-resident",
                self.residency_limit
            );
            return None;
        }
        let handle = BindlessHandle::from_key(self.resident.insert(texture));
        self.residency.insert(texture, handle);
        Some(handle)
    }

    fn make_non_resident(&mut self, handle: BindlessHandle) {
        match self.resident.remove(handle.key()) {
            Some(texture) => {
                self.residency.remove(texture);
            }
            None => self.misuse(format_args!("make_non_resident on stale handle {handle:?}")),
        }
    }

    fn resident_handle_count(&self) -> usize {
        self.resident.len()
    }

    fn create_buffer(&mut self, label: &'static str, size: u64, _usage: wgpu::BufferUsages) -> BufferId {
        let len = usize::try_from(size).unwrap_or(usize::MAX);
        self.buffers.insert(HeadlessBuffer {
            label,
            data: vec![0; len],
        })
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        let Some(target) = self.buffers.get_mut(buffer) else {
            self.misuse(format_args!("write to unknown buffer {buffer:?}"));
            return;
        };
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        match start.checked_add(data.len()) {
            Some(end) if end <= target.data.len() => target.data[start..end].copy_from_slice(data),
            _ => {
                let label = target.label;
                self.misuse(format_args!(
                    "write of {} bytes at {offset} overflows buffer '{label}'",
                    data.len()
                ));
            }
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(buffer).is_none() {
            self.misuse(format_args!("destroy of unknown buffer {buffer:?}"));
        }
    }

    fn buffer_size(&self, buffer: BufferId) -> Option<u64> {
        self.buffers.get(buffer).map(|b| b.data.len() as u64)
    }

    fn draw(&mut self, desc: &DrawDesc<'_>) {
        for &target in desc.color_targets.iter().chain(desc.depth_target.iter()) {
            self.check_texture(target, desc.pass);
        }
        self.check_bindings(desc.pass, desc.textures, desc.images);

        let geometry = match desc.geometry {
            DrawGeometry::FullscreenTriangle => RecordedGeometry::FullscreenTriangle,
            DrawGeometry::Procedural {
                vertex_count,
                instance_count,
            } => RecordedGeometry::Procedural {
                vertex_count,
                instance_count,
            },
            DrawGeometry::Indirect(batches) => RecordedGeometry::Indirect {
                batch_count: batches.len() as u32,
                instance_count: batches.iter().map(|b| b.instance_count).sum(),
            },
        };

        log::trace!("draw {}", desc.pass.label());
        self.commands.push(RecordedCommand::Draw(RecordedDraw {
            pass: desc.pass,
            color_targets: desc.color_targets.iter().copied().collect(),
            depth_target: desc.depth_target,
            depth: desc.depth,
            clear: desc.clear,
            geometry,
            textures: desc.textures.iter().copied().collect(),
            images: desc.images.iter().copied().collect(),
            shading_rate_image: desc.shading_rate_image,
            polygon_mode: desc.polygon_mode,
            viewport: desc.viewport,
        }));
    }

    fn dispatch(&mut self, desc: &DispatchDesc<'_>) {
        self.check_bindings(desc.pass, desc.textures, desc.images);
        log::trace!("dispatch {} {:?}", desc.pass.label(), desc.workgroups);
        self.commands.push(RecordedCommand::Dispatch(RecordedDispatch {
            pass: desc.pass,
            workgroups: desc.workgroups,
            textures: desc.textures.iter().copied().collect(),
            images: desc.images.iter().copied().collect(),
            constants: desc.constants,
        }));
    }

    fn barrier(&mut self, scope: BarrierScope) {
        self.commands.push(RecordedCommand::Barrier(scope));
    }

    fn present(&mut self, image: TextureId, viewport: UVec2) {
        self.check_texture(image, PassKind::Present);
        self.commands.push(RecordedCommand::Present { image, viewport });
    }

    fn end_frame(&mut self) {
        self.commands.push(RecordedCommand::EndFrame);
        self.frames_submitted += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(device: &mut HeadlessDevice) -> TextureId {
        device.create_texture(&TextureDesc::d2(
            "Test Target",
            UVec2::new(4, 4),
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING,
        ))
    }

    #[test]
    fn residency_is_idempotent_per_texture() {
        let mut device = HeadlessDevice::default();
        let tex = target(&mut device);

        let a = device.make_resident(tex).unwrap();
        let b = device.make_resident(tex).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_null());
        assert_eq!(device.resident_handle_count(), 1);

        device.make_non_resident(a);
        assert_eq!(device.resident_handle_count(), 0);
        device.destroy_texture(tex);
        assert_eq!(device.misuse_count(), 0);
    }

    #[test]
    fn destroying_resident_texture_is_counted() {
        let mut device = HeadlessDevice::default();
        let tex = target(&mut device);
        device.make_resident(tex);
        device.destroy_texture(tex);

        assert_eq!(device.misuse_count(), 1);
        assert_eq!(device.resident_handle_count(), 0);
    }

    #[test]
    fn out_of_range_write_is_ignored() {
        let mut device = HeadlessDevice::default();
        let buf = device.create_buffer("Small", 4, wgpu::BufferUsages::UNIFORM);
        device.write_buffer(buf, 2, &[1, 2, 3]);
        assert_eq!(device.buffer_contents(buf), Some(&[0u8, 0, 0, 0][..]));
        assert_eq!(device.misuse_count(), 1);
    }
}
