//! Geometry provider
//!
//! The orchestrator consumes scene geometry through [`GeometryProvider`]:
//! draw batches for the raster passes, instance transforms for motion
//! tracking and a spatial overlap query for collision. [`ModelSystem`] is the
//! reference implementation; it answers overlap queries with a linear scan
//! over instance bounds, which an external BVH can replace.

use std::ops::Range;

use glam::Mat4;

use crate::renderer::core::device::DrawBatch;
use crate::resources::geometry::{BoundingBox, Triangle};
use crate::resources::mesh::Mesh;
use crate::scene::camera::Frustum;
use crate::scene::instance::MeshInstance;

/// A triangle whose bounds overlap the query volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapCandidate {
    /// Object-space triangle.
    pub triangle: Triangle,
    /// Model matrix of the instance it belongs to.
    pub model: Mat4,
}

impl OverlapCandidate {
    #[must_use]
    pub fn world_triangle(&self) -> Triangle {
        self.triangle.transformed(&self.model)
    }
}

pub trait GeometryProvider {
    /// Frustum-culls every instance and rebuilds the draw batches.
    fn cull(&mut self, proj_view: &Mat4);
    /// Marks every instance visible (voxelization needs the whole scene).
    fn force_all_visible(&mut self);
    fn draw_batches(&self) -> &[DrawBatch];
    /// Instance indices in draw order; `DrawBatch::base_instance` indexes this list.
    fn visible_instances(&self) -> &[u32];
    fn instances(&self) -> &[MeshInstance];
    fn instances_mut(&mut self) -> &mut [MeshInstance];
    /// Lazily yields every candidate triangle whose world bounds overlap `bounds`.
    fn query_overlap(&self, bounds: BoundingBox) -> impl Iterator<Item = OverlapCandidate> + '_;
}

struct MeshEntry {
    mesh: Mesh,
    first_index: u32,
    instances: Range<u32>,
}

/// Meshes with contiguous instance ranges, one draw batch per mesh.
#[derive(Default)]
pub struct ModelSystem {
    meshes: Vec<MeshEntry>,
    instances: Vec<MeshInstance>,
    /// Instance indices that survived the last cull, grouped by mesh.
    visible: Vec<u32>,
    batches: Vec<DrawBatch>,
    index_total: u32,
}

impl ModelSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mesh drawn once per transform. Returns the mesh index.
    pub fn add(&mut self, mesh: Mesh, transforms: &[Mat4]) -> u32 {
        let start = self.instances.len() as u32;
        self.instances.extend(transforms.iter().map(|m| MeshInstance::new(*m)));
        let end = self.instances.len() as u32;

        let first_index = self.index_total;
        self.index_total += mesh.index_count();

        self.meshes.push(MeshEntry {
            mesh,
            first_index,
            instances: start..end,
        });
        self.force_all_visible();
        (self.meshes.len() - 1) as u32
    }

    #[must_use]
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    #[must_use]
    pub fn mesh(&self, index: u32) -> Option<&Mesh> {
        self.meshes.get(index as usize).map(|e| &e.mesh)
    }

    fn rebuild(&mut self, mut is_visible: impl FnMut(&Mesh, &MeshInstance) -> bool) {
        self.visible.clear();
        self.batches.clear();

        for (mesh_index, entry) in self.meshes.iter().enumerate() {
            let base_instance = self.visible.len() as u32;
            for i in entry.instances.clone() {
                if is_visible(&entry.mesh, &self.instances[i as usize]) {
                    self.visible.push(i);
                }
            }
            self.batches.push(DrawBatch {
                mesh: mesh_index as u32,
                index_count: entry.mesh.index_count(),
                first_index: entry.first_index,
                base_instance,
                instance_count: self.visible.len() as u32 - base_instance,
            });
        }
    }
}

impl GeometryProvider for ModelSystem {
    fn cull(&mut self, proj_view: &Mat4) {
        let frustum = Frustum::from_matrix(*proj_view);
        self.rebuild(|mesh, instance| {
            frustum.intersects_box(&mesh.bounds().transform(&instance.model()))
        });
    }

    fn force_all_visible(&mut self) {
        self.rebuild(|_, _| true);
    }

    fn draw_batches(&self) -> &[DrawBatch] {
        &self.batches
    }

    fn visible_instances(&self) -> &[u32] {
        &self.visible
    }

    fn instances(&self) -> &[MeshInstance] {
        &self.instances
    }

    fn instances_mut(&mut self) -> &mut [MeshInstance] {
        &mut self.instances
    }

    fn query_overlap(&self, bounds: BoundingBox) -> impl Iterator<Item = OverlapCandidate> + '_ {
        self.meshes.iter().flat_map(move |entry| {
            self.instances[entry.instances.start as usize..entry.instances.end as usize]
                .iter()
                .filter(move |instance| {
                    entry.mesh.bounds().transform(&instance.model()).overlaps(&bounds)
                })
                .flat_map(move |instance| {
                    let model = instance.model();
                    entry
                        .mesh
                        .triangles()
                        .filter(move |tri| tri.transformed(&model).bounds().overlaps(&bounds))
                        .map(move |triangle| OverlapCandidate { triangle, model })
                })
        })
    }
}
