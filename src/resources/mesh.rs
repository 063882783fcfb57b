use glam::Vec3;

use crate::resources::geometry::{BoundingBox, Triangle};

/// CPU-side indexed triangle mesh in object space.
///
/// This is what the reference geometry provider culls, draws and queries for
/// collision. Vertex attributes other than position live with the external
/// asset pipeline.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    positions: Vec<Vec3>,
    indices: Vec<u32>,
    bounds: BoundingBox,
}

impl Mesh {
    /// Builds a mesh from positions and a triangle list. Trailing indices that
    /// do not form a whole triangle are dropped.
    #[must_use]
    pub fn new(name: impl Into<String>, positions: Vec<Vec3>, mut indices: Vec<u32>) -> Self {
        indices.truncate(indices.len() - indices.len() % 3);
        let bounds = BoundingBox::from_points(positions.iter().copied());
        Self {
            name: name.into(),
            positions,
            indices,
            bounds,
        }
    }

    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[must_use]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Object-space bounds.
    #[must_use]
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Object-space triangles. Out-of-range indices are skipped.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            let a = *self.positions.get(tri[0] as usize)?;
            let b = *self.positions.get(tri[1] as usize)?;
            let c = *self.positions.get(tri[2] as usize)?;
            Some(Triangle::new(a, b, c))
        })
    }
}
