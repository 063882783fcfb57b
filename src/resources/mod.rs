//! CPU-side resource definitions
//!
//! Data the renderer consumes without depending on a GPU backend:
//! - Geometry primitives and meshes
//! - GPU data blocks and the versioned uniform slot that uploads them
//! - Platform-agnostic input state

pub mod geometry;
pub mod input;
pub mod mesh;
pub mod primitives;
pub mod uniform_slot;
pub mod uniforms;

pub use geometry::{BoundingBox, BoundingSphere, Triangle};
pub use input::{ButtonState, Input, Key};
pub use mesh::Mesh;
pub use uniform_slot::UniformSlot;
