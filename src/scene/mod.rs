//! Scene-side collaborators of the orchestrator
//!
//! - [`Camera`]: first-person fly camera with a cached frustum
//! - [`MeshInstance`]: model transform with motion tracking
//! - [`ModelSystem`]: reference [`GeometryProvider`]
//! - [`PointLights`]: reference [`LightManager`]

pub mod camera;
pub mod instance;
pub mod light;
pub mod model_system;

pub use camera::{Camera, Frustum};
pub use instance::MeshInstance;
pub use light::{LightDrawTarget, LightManager, PointLights};
pub use model_system::{GeometryProvider, ModelSystem, OverlapCandidate};
