#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod collision;
pub mod errors;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod utils;

pub use collision::{CollisionReport, CollisionResolver, CollisionSettings};
pub use errors::{RenderError, Result};
pub use renderer::core::{Capabilities, HeadlessDevice, RenderDevice, WgpuContext, WgpuDevice};
pub use renderer::{FrameOrchestrator, FrameReport, RenderMode, RendererSettings, TemporalMode, VrsMode};
pub use resources::primitives::*;
pub use resources::{Input, Key, Mesh};
pub use scene::{Camera, GeometryProvider, LightManager, ModelSystem, PointLights};
