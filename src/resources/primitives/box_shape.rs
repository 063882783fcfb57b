use glam::Vec3;

use crate::resources::mesh::Mesh;

/// Axis-aligned box centred on the origin with outward-facing triangles.
#[must_use]
pub fn create_box(width: f32, height: f32, depth: f32) -> Mesh {
    let w = width / 2.0;
    let h = height / 2.0;
    let d = depth / 2.0;

    // 4 vertices per face, counter-clockwise seen from outside
    let positions = vec![
        // Front face (+Z)
        Vec3::new(-w, -h, d),
        Vec3::new(w, -h, d),
        Vec3::new(w, h, d),
        Vec3::new(-w, h, d),
        // Back face (-Z)
        Vec3::new(-w, -h, -d),
        Vec3::new(-w, h, -d),
        Vec3::new(w, h, -d),
        Vec3::new(w, -h, -d),
        // Top face (+Y)
        Vec3::new(-w, h, -d),
        Vec3::new(-w, h, d),
        Vec3::new(w, h, d),
        Vec3::new(w, h, -d),
        // Bottom face (-Y)
        Vec3::new(-w, -h, -d),
        Vec3::new(w, -h, -d),
        Vec3::new(w, -h, d),
        Vec3::new(-w, -h, d),
        // Right face (+X)
        Vec3::new(w, -h, -d),
        Vec3::new(w, h, -d),
        Vec3::new(w, h, d),
        Vec3::new(w, -h, d),
        // Left face (-X)
        Vec3::new(-w, -h, -d),
        Vec3::new(-w, -h, d),
        Vec3::new(-w, h, d),
        Vec3::new(-w, h, -d),
    ];

    let indices = (0..6u32)
        .flat_map(|face| {
            let base = face * 4;
            [base, base + 1, base + 2, base, base + 2, base + 3]
        })
        .collect();

    Mesh::new("Box", positions, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_normals_point_outwards() {
        let mesh = create_box(2.0, 2.0, 2.0);
        assert_eq!(mesh.triangles().count(), 12);
        for tri in mesh.triangles() {
            let centroid = (tri.a + tri.b + tri.c) / 3.0;
            let normal = tri.normal().unwrap();
            assert!(normal.dot(centroid) > 0.0);
        }
    }
}
