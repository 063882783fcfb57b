//! GPU device layer
//!
//! - [`RenderDevice`]: the contract the orchestrator renders through
//! - [`HeadlessDevice`]: recording device for tests and offline tools
//! - [`WgpuDevice`] / [`WgpuContext`]: wgpu-backed implementation

pub mod context;
pub mod device;
pub mod headless;
pub mod wgpu_device;

pub use context::{DeviceSettings, WgpuContext};
pub use device::{
    BarrierScope, BindlessHandle, BufferId, Capabilities, DepthState, DispatchDesc, DrawBatch,
    DrawDesc, DrawGeometry, ImageAccess, ImageBinding, PassKind, RenderDevice, SCREEN_TARGET_USAGE,
    TextureBinding, TextureDesc, TextureId, workgroups_2d,
};
pub use headless::{HeadlessDevice, RecordedCommand, RecordedDispatch, RecordedDraw, RecordedGeometry};
pub use wgpu_device::{PassContext, PassProgram, WgpuDevice, WgpuResources};
