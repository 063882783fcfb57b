//! Swept-sphere collision
//!
//! The camera is simulated as a sphere. Each frame the displacement from the
//! previous position is swept in `test_steps` sub-steps against the geometry
//! provider's overlap query. The first sub-step that penetrates something
//! produces a contact; the body's velocity loses its into-surface component,
//! the sphere is pushed out along the contact normal and the body re-advances
//! over the frame delta. This repeats up to `response_steps` times.
//!
//! Residual penetration after the budget is spent is accepted. Zero-length
//! sweeps and zero-area triangles never produce contacts.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::resources::geometry::BoundingSphere;
use crate::scene::model_system::{GeometryProvider, OverlapCandidate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionSettings {
    pub enabled: bool,
    /// Sub-steps per sweep.
    pub test_steps: u32,
    /// Maximum sweep-and-respond iterations per frame.
    pub response_steps: u32,
    /// Extra push-out distance beyond the penetration depth.
    pub normal_epsilon: f32,
    pub sphere_radius: f32,
}

impl Default for CollisionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            test_steps: 3,
            response_steps: 12,
            normal_epsilon: 0.001,
            sphere_radius: 0.5,
        }
    }
}

/// Something the resolver can push around.
pub trait SimulatedBody {
    fn position(&self) -> Vec3;
    fn set_position(&mut self, position: Vec3);
    fn velocity(&self) -> Vec3;
    fn set_velocity(&mut self, velocity: Vec3);
    /// Integrates the body over `dt`.
    fn advance(&mut self, dt: f32);
}

/// Deepest, most head-on contact of one sub-step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionHit {
    /// Unit normal facing the sphere centre.
    pub normal: Vec3,
    /// `radius - distance`, always positive.
    pub depth: f32,
    /// Closest point on the triangle.
    pub point: Vec3,
    /// Cosine between the triangle normal and the centre offset.
    pub cos_theta: f32,
}

impl CollisionHit {
    /// Whether `self` should replace `other` as the best contact.
    fn beats(&self, other: &CollisionHit) -> bool {
        let (a, b) = (self.cos_theta.abs(), other.cos_theta.abs());
        a > b || (a == b && self.depth > other.depth)
    }
}

/// Outcome of one frame of collision resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollisionReport {
    /// Number of contacts responded to.
    pub responses: u32,
    pub last_hit: Option<CollisionHit>,
    /// The response budget ran out before a collision-free sweep.
    pub exhausted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CollisionResolver {
    pub settings: CollisionSettings,
}

impl CollisionResolver {
    #[must_use]
    pub fn new(settings: CollisionSettings) -> Self {
        Self { settings }
    }

    /// Contact of `sphere` with one candidate, if it penetrates.
    #[must_use]
    pub fn contact(sphere: &BoundingSphere, candidate: &OverlapCandidate) -> Option<CollisionHit> {
        let triangle = candidate.world_triangle();
        let mut normal = triangle.normal()?;

        let point = triangle.closest_point(sphere.center);
        let offset = sphere.center - point;
        let distance = offset.length();
        let depth = sphere.radius - distance;
        if depth <= 0.0 {
            return None;
        }

        if normal.dot(offset) < 0.0 {
            normal = -normal;
        }
        let cos_theta = if distance > 0.0 {
            normal.dot(offset / distance)
        } else {
            1.0
        };

        Some(CollisionHit {
            normal,
            depth,
            point,
            cos_theta,
        })
    }

    /// Sweeps `sphere` from its centre to `target`.
    ///
    /// On a hit the sphere is left at the first penetrating sub-step; without
    /// one it ends at `target`.
    pub fn sweep<S: GeometryProvider>(
        &self,
        sphere: &mut BoundingSphere,
        target: Vec3,
        scene: &S,
    ) -> Option<CollisionHit> {
        let start = sphere.center;
        let delta = target - start;
        if delta == Vec3::ZERO {
            return None;
        }

        let steps = self.settings.test_steps.max(1);
        for step in 1..=steps {
            sphere.center = start + delta * (step as f32 / steps as f32);

            let swept = *sphere;
            let best = scene
                .query_overlap(swept.bounds())
                .filter_map(|candidate| Self::contact(&swept, &candidate))
                .fold(None::<CollisionHit>, |best, hit| match best {
                    Some(current) if !hit.beats(&current) => Some(current),
                    _ => Some(hit),
                });

            if best.is_some() {
                return best;
            }
        }

        sphere.center = target;
        None
    }

    /// Resolves the body's motion from `previous` to its current position.
    pub fn resolve<B: SimulatedBody, S: GeometryProvider>(
        &self,
        body: &mut B,
        previous: Vec3,
        dt: f32,
        scene: &S,
    ) -> CollisionReport {
        let mut report = CollisionReport::default();
        if !self.settings.enabled {
            return report;
        }

        let mut from = previous;
        for _ in 0..self.settings.response_steps {
            let mut sphere = BoundingSphere::new(from, self.settings.sphere_radius);
            let Some(hit) = self.sweep(&mut sphere, body.position(), scene) else {
                return report;
            };

            let velocity = body.velocity();
            let into = velocity.dot(hit.normal);
            if into < 0.0 {
                body.set_velocity(velocity - hit.normal * into);
            }

            let resolved = sphere.center + hit.normal * (hit.depth + self.settings.normal_epsilon);
            body.set_position(resolved);
            log::trace!(
                "Collision response {}: depth {:.4}, normal {:?}",
                report.responses,
                hit.depth,
                hit.normal
            );

            report.responses += 1;
            report.last_hit = Some(hit);

            from = resolved;
            body.advance(dt);
        }

        report.exhausted = true;
        report
    }
}
