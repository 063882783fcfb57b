//! Swept-Sphere Collision Tests
//!
//! Tests for:
//! - Single contacts against a triangle (depth, normal orientation)
//! - Degenerate triangles and zero-length sweeps
//! - Best-contact selection among several penetrating triangles
//! - Resolution: push-out, velocity projection, sliding
//! - Camera collision through the frame orchestrator

use glam::{Mat4, Vec3};

use hybrid::collision::SimulatedBody;
use hybrid::resources::geometry::{BoundingSphere, Triangle};
use hybrid::scene::model_system::OverlapCandidate;
use hybrid::{
    CollisionResolver, CollisionSettings, FrameOrchestrator, HeadlessDevice, Input, Mesh,
    ModelSystem, PlaneOptions, PointLights, RendererSettings, create_box, create_plane,
};

const EPSILON: f32 = 1e-4;

fn floor() -> ModelSystem {
    let mut models = ModelSystem::new();
    models.add(
        create_plane(PlaneOptions {
            width: 20.0,
            depth: 20.0,
            ..Default::default()
        }),
        &[Mat4::IDENTITY],
    );
    models
}

/// Minimal body integrating velocity without damping.
#[derive(Debug, Clone, Copy)]
struct Ball {
    position: Vec3,
    velocity: Vec3,
}

impl SimulatedBody for Ball {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    fn advance(&mut self, dt: f32) {
        self.position += self.velocity * dt;
    }
}

/// Moves `ball` one frame and resolves it against `scene`.
fn step(resolver: &CollisionResolver, ball: &mut Ball, dt: f32, scene: &ModelSystem) -> u32 {
    let previous = ball.position;
    ball.advance(dt);
    resolver.resolve(ball, previous, dt, scene).responses
}

fn floor_penetration(position: Vec3, radius: f32) -> f32 {
    (radius - position.y).max(0.0)
}

// ============================================================================
// Contacts
// ============================================================================

#[test]
fn contact_normal_faces_sphere_centre() {
    let triangle = Triangle::new(
        Vec3::new(-1.0, 0.0, -1.0),
        Vec3::new(1.0, 0.0, -1.0),
        Vec3::new(0.0, 0.0, 1.0),
    );
    let candidate = OverlapCandidate {
        triangle,
        model: Mat4::IDENTITY,
    };

    let above = BoundingSphere::new(Vec3::new(0.0, 0.3, 0.0), 0.5);
    let hit = CollisionResolver::contact(&above, &candidate).expect("sphere overlaps");
    assert!((hit.depth - 0.2).abs() < EPSILON);
    assert!((hit.normal - Vec3::Y).length() < EPSILON);

    let below = BoundingSphere::new(Vec3::new(0.0, -0.3, 0.0), 0.5);
    let hit = CollisionResolver::contact(&below, &candidate).expect("sphere overlaps");
    assert!((hit.normal + Vec3::Y).length() < EPSILON);
}

#[test]
fn separated_sphere_has_no_contact() {
    let candidate = OverlapCandidate {
        triangle: Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Z),
        model: Mat4::IDENTITY,
    };
    let sphere = BoundingSphere::new(Vec3::new(0.2, 0.6, 0.2), 0.5);
    assert!(CollisionResolver::contact(&sphere, &candidate).is_none());
}

#[test]
fn degenerate_triangle_never_collides() {
    let candidate = OverlapCandidate {
        triangle: Triangle::new(Vec3::ZERO, Vec3::X, Vec3::X * 2.0),
        model: Mat4::IDENTITY,
    };
    let sphere = BoundingSphere::new(Vec3::new(0.5, 0.0, 0.0), 0.5);
    assert!(CollisionResolver::contact(&sphere, &candidate).is_none());
}

#[test]
fn zero_length_sweep_reports_nothing() {
    let scene = floor();
    let resolver = CollisionResolver::new(CollisionSettings::default());
    // Resting inside the floor: no motion means no sweep.
    let center = Vec3::new(0.0, 0.2, 0.0);
    let mut sphere = BoundingSphere::new(center, 0.5);
    assert!(resolver.sweep(&mut sphere, center, &scene).is_none());
    assert_eq!(sphere.center, center);
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn falling_body_comes_to_rest_on_floor() {
    let scene = floor();
    let settings = CollisionSettings::default();
    let radius = settings.sphere_radius;
    let resolver = CollisionResolver::new(settings);

    let mut ball = Ball {
        position: Vec3::new(0.0, 2.0, 0.0),
        velocity: Vec3::new(0.0, -100.0, 0.0),
    };
    let responses = step(&resolver, &mut ball, 1.0 / 60.0, &scene);

    assert!(responses >= 1);
    assert!(floor_penetration(ball.position, radius) <= EPSILON);
    assert!(ball.velocity.y.abs() < EPSILON, "normal velocity must be removed");
}

#[test]
fn sliding_keeps_tangential_velocity() {
    let scene = floor();
    let settings = CollisionSettings::default();
    let radius = settings.sphere_radius;
    let resolver = CollisionResolver::new(settings);

    let mut ball = Ball {
        position: Vec3::new(-2.0, 0.6, 0.0),
        velocity: Vec3::new(6.0, -6.0, 0.0),
    };
    for _ in 0..10 {
        step(&resolver, &mut ball, 1.0 / 60.0, &scene);
        assert!(floor_penetration(ball.position, radius) <= EPSILON);
    }

    assert!(ball.velocity.y.abs() < EPSILON);
    assert!((ball.velocity.x - 6.0).abs() < EPSILON);
    assert!(ball.position.x > -2.0);
}

#[test]
fn wall_stops_motion_into_it() {
    let mut scene = ModelSystem::new();
    scene.add(
        create_box(1.0, 4.0, 4.0),
        &[Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0))],
    );
    let resolver = CollisionResolver::new(CollisionSettings::default());

    let mut ball = Ball {
        position: Vec3::new(0.0, 0.0, 0.0),
        velocity: Vec3::new(30.0, 0.0, 0.0),
    };
    for _ in 0..8 {
        step(&resolver, &mut ball, 1.0 / 60.0, &scene);
    }

    // Wall face at x = 1.5; the sphere centre stays a radius away.
    assert!(ball.position.x <= 1.0 + EPSILON, "x = {}", ball.position.x);
    assert!(ball.velocity.x.abs() < EPSILON);
}

#[test]
fn disabled_resolver_lets_bodies_pass() {
    let scene = floor();
    let resolver = CollisionResolver::new(CollisionSettings {
        enabled: false,
        ..Default::default()
    });
    let mut ball = Ball {
        position: Vec3::new(0.0, 1.0, 0.0),
        velocity: Vec3::new(0.0, -120.0, 0.0),
    };
    assert_eq!(step(&resolver, &mut ball, 1.0 / 60.0, &scene), 0);
    assert!(ball.position.y < 0.0);
}

#[test]
fn response_budget_bounds_iterations() {
    let scene = floor();
    let resolver = CollisionResolver::new(CollisionSettings {
        response_steps: 1,
        ..Default::default()
    });
    let mut ball = Ball {
        position: Vec3::new(0.0, 0.6, 0.0),
        velocity: Vec3::new(0.0, -30.0, 0.0),
    };
    let previous = ball.position;
    ball.advance(1.0 / 60.0);
    let report = resolver.resolve(&mut ball, previous, 1.0 / 60.0, &scene);
    assert!(report.responses <= 1);
}

// ============================================================================
// Orchestrator
// ============================================================================

#[test]
fn camera_cannot_fall_through_floor() {
    let settings = RendererSettings::default();
    let radius = settings.collision.sphere_radius;
    let Ok(mut orch) = FrameOrchestrator::new(
        HeadlessDevice::default(),
        floor(),
        Box::new(PointLights::new()),
        settings,
    ) else {
        panic!("bring-up failed");
    };

    {
        let camera = orch.camera_mut();
        camera.position = Vec3::new(0.0, 2.0, 0.0);
        camera.velocity = Vec3::new(0.0, -100.0, 0.0);
    }
    let report = orch.render_frame(1.0 / 60.0, &Input::new());

    assert!(report.collision.responses >= 1);
    let hit = report.collision.last_hit.expect("floor contact");
    assert!((hit.normal - Vec3::Y).length() < EPSILON);
    assert!(floor_penetration(orch.camera().position, radius) <= EPSILON);
    assert!(orch.camera().velocity.y.abs() < EPSILON);
}

// ============================================================================
// Contact selection
// ============================================================================

/// Floor face under the origin.
fn floor_face() -> [Vec3; 3] {
    [
        Vec3::new(-2.0, 0.0, -2.0),
        Vec3::new(2.0, 0.0, -2.0),
        Vec3::new(0.0, 0.0, 2.0),
    ]
}

/// Wall in the plane x = 0.2 whose top edge, at y = 0.25, is the closest
/// feature to a sphere centred above the origin.
fn wall_edge() -> [Vec3; 3] {
    [
        Vec3::new(0.2, 0.25, -1.0),
        Vec3::new(0.2, 0.25, 1.0),
        Vec3::new(0.2, -1.0, 0.0),
    ]
}

fn scene_of(triangles: &[[Vec3; 3]]) -> ModelSystem {
    let positions: Vec<Vec3> = triangles.iter().flatten().copied().collect();
    let indices = (0..positions.len() as u32).collect();
    let mut models = ModelSystem::new();
    models.add(Mesh::new("contacts", positions, indices), &[Mat4::IDENTITY]);
    models
}

fn sweep_onto(scene: &ModelSystem, target: Vec3) -> Option<hybrid::collision::CollisionHit> {
    let resolver = CollisionResolver::new(CollisionSettings {
        test_steps: 1,
        ..Default::default()
    });
    let mut sphere = BoundingSphere::new(Vec3::new(0.0, 2.0, 0.0), 0.5);
    resolver.sweep(&mut sphere, target, scene)
}

#[test]
fn head_on_contact_beats_deeper_oblique_one() {
    let target = Vec3::new(0.0, 0.4, 0.0);

    // The edge contact alone: deeper, but hit at an angle.
    let edge = sweep_onto(&scene_of(&[wall_edge()]), target).expect("edge penetrates");
    assert!((edge.depth - 0.25).abs() < EPSILON);
    assert!((edge.cos_theta.abs() - 0.8).abs() < EPSILON);

    for order in [[wall_edge(), floor_face()], [floor_face(), wall_edge()]] {
        let hit = sweep_onto(&scene_of(&order), target).expect("both penetrate");
        assert!((hit.normal - Vec3::Y).length() < EPSILON);
        assert!((hit.depth - 0.1).abs() < EPSILON);
        assert!((hit.cos_theta - 1.0).abs() < EPSILON);
    }
}

#[test]
fn equally_head_on_contacts_prefer_the_deeper() {
    let raised = floor_face().map(|v| v + Vec3::new(0.0, 0.1, 0.0));
    let scene = scene_of(&[floor_face(), raised]);

    let hit = sweep_onto(&scene, Vec3::new(0.0, 0.4, 0.0)).expect("both penetrate");
    assert!((hit.normal - Vec3::Y).length() < EPSILON);
    assert!((hit.depth - 0.2).abs() < EPSILON);
}
