//! Geometric primitives shared by culling, the overlap query and collision.

use glam::{Mat4, Vec3};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    /// An inverted box that any `grow` call replaces.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |mut acc, p| {
            acc.grow(p);
            acc
        })
    }

    pub fn center(&self) -> Vec3 { (self.min + self.max) * 0.5 }
    pub fn size(&self) -> Vec3 { self.max - self.min }

    pub fn grow(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Inclusive overlap test; touching boxes overlap.
    #[must_use]
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    pub fn transform(&self, matrix: &Mat4) -> Self {
        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];

        Self::from_points(corners.into_iter().map(|p| matrix.transform_point3(p)))
    }

    /// Radius of the sphere centred on the box that encloses it.
    pub fn bounding_radius(&self) -> f32 {
        self.size().length() * 0.5
    }
}

/// Sphere used as the camera's collision volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    #[must_use]
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// The smallest axis-aligned box enclosing the sphere.
    #[must_use]
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox {
            min: self.center - Vec3::splat(self.radius),
            max: self.center + Vec3::splat(self.radius),
        }
    }
}

/// A single triangle, in whatever space its owner stores it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

impl Triangle {
    #[must_use]
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { a, b, c }
    }

    #[must_use]
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        Self {
            a: matrix.transform_point3(self.a),
            b: matrix.transform_point3(self.b),
            c: matrix.transform_point3(self.c),
        }
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_points([self.a, self.b, self.c])
    }

    /// Unit face normal (counter-clockwise winding), or `None` for a
    /// zero-area triangle.
    pub fn normal(&self) -> Option<Vec3> {
        (self.b - self.a).cross(self.c - self.a).try_normalize()
    }

    /// Closest point on the triangle to `p`.
    ///
    /// Voronoi-region walk from Ericson, *Real-Time Collision Detection* §5.1.5.
    pub fn closest_point(&self, p: Vec3) -> Vec3 {
        let (a, b, c) = (self.a, self.b, self.c);
        let ab = b - a;
        let ac = c - a;

        let ap = p - a;
        let d1 = ab.dot(ap);
        let d2 = ac.dot(ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return a;
        }

        let bp = p - b;
        let d3 = ab.dot(bp);
        let d4 = ac.dot(bp);
        if d3 >= 0.0 && d4 <= d3 {
            return b;
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v = d1 / (d1 - d3);
            return a + ab * v;
        }

        let cp = p - c;
        let d5 = ab.dot(cp);
        let d6 = ac.dot(cp);
        if d6 >= 0.0 && d5 <= d6 {
            return c;
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return a + ac * w;
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return b + (c - b) * w;
        }

        let denom = 1.0 / (va + vb + vc);
        let v = vb * denom;
        let w = vc * denom;
        a + ab * v + ac * w
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri() -> Triangle {
        Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Y)
    }

    #[test]
    fn closest_point_inside_face_projects_onto_plane() {
        let p = tri().closest_point(Vec3::new(0.25, 0.25, 3.0));
        assert!((p - Vec3::new(0.25, 0.25, 0.0)).length() < 1e-6);
    }

    #[test]
    fn closest_point_clamps_to_vertex_and_edge() {
        assert_eq!(tri().closest_point(Vec3::new(-1.0, -1.0, 0.0)), Vec3::ZERO);
        let on_edge = tri().closest_point(Vec3::new(0.5, -2.0, 0.0));
        assert!((on_edge - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn degenerate_triangle_has_no_normal() {
        let t = Triangle::new(Vec3::ZERO, Vec3::X, Vec3::X * 2.0);
        assert!(t.normal().is_none());
        assert_eq!(tri().normal(), Some(Vec3::Z));
    }

    #[test]
    fn boxes_touching_overlap() {
        let a = BoundingBox::new(Vec3::ZERO, Vec3::ONE);
        let b = BoundingBox::new(Vec3::ONE, Vec3::splat(2.0));
        let c = BoundingBox::new(Vec3::splat(1.5), Vec3::splat(2.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
