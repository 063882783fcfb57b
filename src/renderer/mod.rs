//! Renderer Module
//!
//! Frame orchestration and the two render paths:
//!
//! - [`core`]: the [`RenderDevice`](core::RenderDevice) contract and its headless / wgpu implementations
//! - [`resource_set`]: G-buffer targets and their resident handles
//! - [`passes`]: effect passes (SSAO, SSR, volumetric, voxel GI, VRS, bloom, tone mapping)
//! - [`deferred`]: the rasterized multi-pass pipeline
//! - [`path_tracer`]: progressive accumulation path tracing
//! - [`temporal`]: jitter sequence, TAA and the spatio-temporal upscaler
//! - [`post`]: presentation-resolution post-processing
//! - [`orchestrator`]: the per-frame driver tying everything together

pub mod core;
pub mod deferred;
pub mod frame_state;
pub mod orchestrator;
pub mod passes;
pub mod path_tracer;
pub mod post;
pub mod resource_set;
pub mod settings;
pub mod temporal;

pub use deferred::{DeferredPipeline, MergeInputs};
pub use frame_state::FrameState;
pub use orchestrator::{FrameOrchestrator, FrameReport, ModeResources};
pub use path_tracer::AccumulationPathTracer;
pub use post::PostStack;
pub use resource_set::{GBufferResources, GBufferSlot};
pub use settings::{RenderMode, RendererSettings, TemporalMode, VrsMode};
pub use temporal::TemporalUpscaler;
