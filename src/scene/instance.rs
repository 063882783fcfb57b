use glam::Mat4;

use crate::resources::uniforms::GpuMeshInstance;

/// Placement of one mesh instance plus the transform it had last frame.
///
/// The inverse is recomputed on every write. `previous_model` moves only on
/// [`commit_motion`](Self::commit_motion), so motion vectors and the
/// accumulation reset see the frame's full displacement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshInstance {
    model: Mat4,
    inverse_model: Mat4,
    previous_model: Mat4,
}

impl Default for MeshInstance {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY)
    }
}

impl MeshInstance {
    #[must_use]
    pub fn new(model: Mat4) -> Self {
        Self {
            model,
            inverse_model: model.inverse(),
            previous_model: model,
        }
    }

    pub fn set_model(&mut self, model: Mat4) {
        self.model = model;
        self.inverse_model = model.inverse();
    }

    #[inline]
    #[must_use]
    pub fn model(&self) -> Mat4 {
        self.model
    }

    #[inline]
    #[must_use]
    pub fn inverse_model(&self) -> Mat4 {
        self.inverse_model
    }

    #[inline]
    #[must_use]
    pub fn previous_model(&self) -> Mat4 {
        self.previous_model
    }

    #[inline]
    #[must_use]
    pub fn did_move(&self) -> bool {
        self.model != self.previous_model
    }

    pub fn commit_motion(&mut self) {
        self.previous_model = self.model;
    }

    #[must_use]
    pub fn to_gpu(&self) -> GpuMeshInstance {
        GpuMeshInstance {
            model: self.model,
            inverse_model: self.inverse_model,
            previous_model: self.previous_model,
        }
    }
}
