//! Render Device Contract
//!
//! [`RenderDevice`] is the only way the frame orchestrator talks to the GPU.
//! It covers exactly what the orchestration core needs:
//!
//! ```text
//!  textures ── create / destroy / describe
//!  residency ─ make_resident → BindlessHandle → make_non_resident
//!  buffers ─── create / write / destroy
//!  passes ──── draw(DrawDesc) · dispatch(DispatchDesc) · barrier(BarrierScope)
//!  frame ───── present(image, viewport) · end_frame()
//! ```
//!
//! Shading programs are not part of the contract: a pass is identified by its
//! [`PassKind`] and the device decides how to execute it.
//!
//! Using an id after it has been destroyed is a programming error. Devices log
//! it and ignore the call rather than panic.

use bitflags::bitflags;
use glam::UVec2;
use slotmap::{Key, KeyData};

slotmap::new_key_type! {
    /// Device-owned texture.
    pub struct TextureId;
    /// Device-owned buffer.
    pub struct BufferId;
    /// Slot in a device's resident-handle table.
    pub struct ResidentKey;
}

// ─── Capabilities ─────────────────────────────────────────────────────────────

bitflags! {
    /// Hardware features the orchestrator relies on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// GPU-resident texture handles.
        const BINDLESS_TEXTURES     = 1 << 0;
        /// Indirect multi-draw with per-draw base instance.
        const MULTI_DRAW_INDIRECT   = 1 << 1;
        /// Read-write storage images in compute passes.
        const STORAGE_IMAGES        = 1 << 2;
        /// Image-based variable rate shading.
        const VARIABLE_RATE_SHADING = 1 << 3;
        /// A spatio-temporal upscaler implementation is available.
        const SPATIAL_UPSCALER      = 1 << 4;
    }
}

impl Capabilities {
    /// Capabilities without which the renderer refuses to start.
    pub const REQUIRED: Self = Self::BINDLESS_TEXTURES
        .union(Self::MULTI_DRAW_INDIRECT)
        .union(Self::STORAGE_IMAGES);

    /// Required capabilities this set lacks.
    #[must_use]
    pub fn missing_required(self) -> Self {
        Self::REQUIRED.difference(self)
    }
}

// ─── Resources ────────────────────────────────────────────────────────────────

/// Opaque GPU-resident texture reference.
///
/// The raw value is what shaders receive; `0` is never a live handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct BindlessHandle(u64);

impl BindlessHandle {
    pub const NULL: Self = Self(0);

    pub(crate) fn from_key(key: ResidentKey) -> Self {
        Self(key.data().as_ffi())
    }

    pub(crate) fn key(self) -> ResidentKey {
        ResidentKey::from(KeyData::from_ffi(self.0))
    }

    #[inline]
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Descriptor for a device texture.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub depth_or_array_layers: u32,
    pub mip_level_count: u32,
    pub dimension: wgpu::TextureDimension,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
}

impl TextureDesc {
    /// Single-mip 2D texture.
    #[must_use]
    pub fn d2(
        label: &'static str,
        size: UVec2,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        Self {
            label,
            width: size.x.max(1),
            height: size.y.max(1),
            depth_or_array_layers: 1,
            mip_level_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
        }
    }

    /// Single-mip 3D texture.
    #[must_use]
    pub fn d3(
        label: &'static str,
        size: glam::UVec3,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        Self {
            label,
            width: size.x.max(1),
            height: size.y.max(1),
            depth_or_array_layers: size.z.max(1),
            mip_level_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format,
            usage,
        }
    }

    #[must_use]
    pub fn with_mips(mut self, mip_level_count: u32) -> Self {
        self.mip_level_count = mip_level_count.max(1);
        self
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }
}

/// Usage shared by every screen-space target written from compute and sampled later.
pub const SCREEN_TARGET_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::STORAGE_BINDING)
    .union(wgpu::TextureUsages::RENDER_ATTACHMENT);

// ─── Pass descriptions ────────────────────────────────────────────────────────

/// Identifies a pass program. Devices map each kind to their own executable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PassKind {
    Voxelize,
    VoxelDebug,
    GBuffer,
    Ssao,
    ConeTrace,
    Lighting,
    ShadingRate,
    LightSources,
    Sky,
    Volumetric,
    Ssr,
    Merge,
    PathTrace,
    TaaResolve,
    Upscale,
    BloomDownsample,
    BloomUpsample,
    ToneMap,
    Present,
}

impl PassKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Voxelize => "Voxelize",
            Self::VoxelDebug => "Voxel Debug",
            Self::GBuffer => "G-Buffer",
            Self::Ssao => "SSAO",
            Self::ConeTrace => "Cone Trace",
            Self::Lighting => "Deferred Lighting",
            Self::ShadingRate => "Shading Rate Classification",
            Self::LightSources => "Light Sources",
            Self::Sky => "Sky",
            Self::Volumetric => "Volumetric Lighting",
            Self::Ssr => "SSR",
            Self::Merge => "Merge Lighting",
            Self::PathTrace => "Path Trace",
            Self::TaaResolve => "TAA Resolve",
            Self::Upscale => "Temporal Upscale",
            Self::BloomDownsample => "Bloom Downsample",
            Self::BloomUpsample => "Bloom Upsample",
            Self::ToneMap => "Tone Map",
            Self::Present => "Present",
        }
    }
}

/// A sampled texture bound to a texture unit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TextureBinding {
    pub unit: u32,
    pub texture: TextureId,
}

impl TextureBinding {
    #[must_use]
    pub fn new(unit: u32, texture: TextureId) -> Self {
        Self { unit, texture }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ImageAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// A storage image bound to an image unit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ImageBinding {
    pub unit: u32,
    pub texture: TextureId,
    pub mip_level: u32,
    pub access: ImageAccess,
}

impl ImageBinding {
    #[must_use]
    pub fn new(unit: u32, texture: TextureId, access: ImageAccess) -> Self {
        Self {
            unit,
            texture,
            mip_level: 0,
            access,
        }
    }

    #[must_use]
    pub fn mip(mut self, mip_level: u32) -> Self {
        self.mip_level = mip_level;
        self
    }
}

/// One indirect draw command: a mesh and its visible instance range.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct DrawBatch {
    pub mesh: u32,
    pub index_count: u32,
    pub first_index: u32,
    pub base_instance: u32,
    pub instance_count: u32,
}

/// What a draw rasterizes.
#[derive(Clone, Copy, Debug)]
pub enum DrawGeometry<'a> {
    /// A single oversized triangle covering the viewport.
    FullscreenTriangle,
    /// Non-indexed procedural vertices (e.g. the sky cube, light spheres).
    Procedural { vertex_count: u32, instance_count: u32 },
    /// Indirect multi-draw over the provider's batches.
    Indirect(&'a [DrawBatch]),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DepthState {
    pub compare: wgpu::CompareFunction,
    pub write: bool,
}

impl DepthState {
    pub const OPAQUE: Self = Self {
        compare: wgpu::CompareFunction::Less,
        write: true,
    };
    /// Passes where nothing has been drawn yet (depth cleared to the far value).
    pub const BACKGROUND: Self = Self {
        compare: wgpu::CompareFunction::LessEqual,
        write: false,
    };
}

/// A rasterization pass.
#[derive(Clone, Copy, Debug)]
pub struct DrawDesc<'a> {
    pub pass: PassKind,
    pub color_targets: &'a [TextureId],
    pub depth_target: Option<TextureId>,
    pub depth: Option<DepthState>,
    /// Clear color and depth targets before drawing.
    pub clear: bool,
    pub geometry: DrawGeometry<'a>,
    pub textures: &'a [TextureBinding],
    pub images: &'a [ImageBinding],
    pub uniforms: &'a [BufferId],
    pub shading_rate_image: Option<TextureId>,
    pub polygon_mode: wgpu::PolygonMode,
    /// Render area; targets may be larger than the area drawn.
    pub viewport: UVec2,
}

impl<'a> DrawDesc<'a> {
    /// Fullscreen draw into `color_targets` with no depth attachment.
    #[must_use]
    pub fn fullscreen(pass: PassKind, color_targets: &'a [TextureId], viewport: UVec2) -> Self {
        Self {
            pass,
            color_targets,
            depth_target: None,
            depth: None,
            clear: false,
            geometry: DrawGeometry::FullscreenTriangle,
            textures: &[],
            images: &[],
            uniforms: &[],
            shading_rate_image: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            viewport,
        }
    }
}

/// A compute dispatch.
#[derive(Clone, Copy, Debug)]
pub struct DispatchDesc<'a> {
    pub pass: PassKind,
    pub workgroups: [u32; 3],
    pub textures: &'a [TextureBinding],
    pub images: &'a [ImageBinding],
    pub uniforms: &'a [BufferId],
    /// Small per-dispatch constant (feature masks, mip indices).
    pub constants: u32,
}

impl<'a> DispatchDesc<'a> {
    #[must_use]
    pub fn new(pass: PassKind, workgroups: [u32; 3]) -> Self {
        Self {
            pass,
            workgroups,
            textures: &[],
            images: &[],
            uniforms: &[],
            constants: 0,
        }
    }
}

/// Number of `local`-sized workgroups covering `size`.
#[inline]
#[must_use]
pub fn workgroups_2d(size: UVec2, local: UVec2) -> [u32; 3] {
    [size.x.div_ceil(local.x), size.y.div_ceil(local.y), 1]
}

bitflags! {
    /// Memory made visible by a barrier.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BarrierScope: u32 {
        /// Sampled reads after image writes.
        const TEXTURE_FETCH       = 1 << 0;
        /// Image loads/stores after image writes.
        const SHADER_IMAGE_ACCESS = 1 << 1;
        /// Indirect command reads after buffer writes.
        const COMMAND             = 1 << 2;
    }
}

// ─── Device trait ─────────────────────────────────────────────────────────────

/// GPU device contract consumed by the orchestration core.
pub trait RenderDevice {
    fn capabilities(&self) -> Capabilities;

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId;
    fn destroy_texture(&mut self, texture: TextureId);
    fn texture_desc(&self, texture: TextureId) -> Option<&TextureDesc>;

    /// Size of mip 0, or `None` for a destroyed texture.
    fn texture_size(&self, texture: TextureId) -> Option<UVec2> {
        self.texture_desc(texture).map(TextureDesc::size)
    }

    /// Makes a texture GPU-resident. A texture that is already resident
    /// returns its existing handle. A destroyed texture or a full bindless
    /// table returns `None`.
    fn make_resident(&mut self, texture: TextureId) -> Option<BindlessHandle>;
    fn make_non_resident(&mut self, handle: BindlessHandle);
    fn resident_handle_count(&self) -> usize;

    fn create_buffer(&mut self, label: &'static str, size: u64, usage: wgpu::BufferUsages) -> BufferId;
    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]);
    fn destroy_buffer(&mut self, buffer: BufferId);
    fn buffer_size(&self, buffer: BufferId) -> Option<u64>;

    fn draw(&mut self, desc: &DrawDesc<'_>);
    fn dispatch(&mut self, desc: &DispatchDesc<'_>);
    fn barrier(&mut self, scope: BarrierScope);

    /// Hands the final image to the presentation surface.
    fn present(&mut self, image: TextureId, viewport: UVec2);
    /// Submits everything recorded since the previous call.
    fn end_frame(&mut self);
}
