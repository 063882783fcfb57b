use glam::{Mat4, Vec3, Vec4};

use crate::collision::SimulatedBody;
use crate::renderer::settings::CameraSettings;
use crate::resources::geometry::BoundingBox;
use crate::resources::input::{Input, Key};

/// First-person fly camera.
///
/// Input accelerates `velocity`; [`advance`](Self::advance) integrates it and
/// damps it exponentially. Cached matrices are refreshed by `advance` and by
/// any projection change.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Degrees
    pub yaw: f32,
    /// Degrees, clamped to ±89.
    pub pitch: f32,

    // === Projection ===
    /// Vertical field of view in radians.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,

    // === Controls ===
    pub speed: f32,
    pub sprint_multiplier: f32,
    pub sensitivity: f32,
    pub damping: f32,

    view_matrix: Mat4,
    projection_matrix: Mat4,
    view_projection_matrix: Mat4,
    frustum: Frustum,
}

impl Camera {
    #[must_use]
    pub fn from_settings(settings: &CameraSettings, aspect: f32) -> Self {
        let mut cam = Self {
            position: settings.position,
            velocity: Vec3::ZERO,
            yaw: settings.yaw,
            pitch: settings.pitch.clamp(-89.0, 89.0),
            fov: settings.fov.to_radians(),
            aspect,
            near: settings.near,
            far: settings.far,
            speed: settings.speed,
            sprint_multiplier: settings.sprint_multiplier,
            sensitivity: settings.sensitivity,
            damping: settings.damping,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            view_projection_matrix: Mat4::IDENTITY,
            frustum: Frustum::default(),
        };
        cam.update_projection_matrix();
        cam.update_view_matrix();
        cam
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 && aspect != self.aspect {
            self.aspect = aspect;
            self.update_projection_matrix();
        }
    }

    pub fn update_projection_matrix(&mut self) {
        // glam's perspective_rh targets the wgpu/Vulkan [0, 1] depth range.
        self.projection_matrix = Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far);
        self.refresh_view_projection();
    }

    pub fn update_view_matrix(&mut self) {
        self.view_matrix = Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y);
        self.refresh_view_projection();
    }

    fn refresh_view_projection(&mut self) {
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
        self.frustum = Frustum::from_matrix(self.view_projection_matrix);
    }

    #[must_use]
    pub fn forward(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
    }

    #[must_use]
    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize_or_zero()
    }

    /// Applies mouse look and movement keys. Returns whether any input was
    /// consumed this frame.
    pub fn process_input(&mut self, input: &Input, dt: f32) -> bool {
        let mut had_input = false;

        let delta = input.mouse_delta();
        if delta != glam::Vec2::ZERO {
            self.yaw += delta.x * self.sensitivity;
            self.pitch = (self.pitch - delta.y * self.sensitivity).clamp(-89.0, 89.0);
            had_input = true;
        }

        let forward = self.forward();
        let right = self.right();
        let mut direction = Vec3::ZERO;
        for (key, dir) in [
            (Key::W, forward),
            (Key::S, -forward),
            (Key::D, right),
            (Key::A, -right),
            (Key::Space, Vec3::Y),
            (Key::ShiftLeft, -Vec3::Y),
        ] {
            if input.get_key(key) {
                direction += dir;
            }
        }

        if direction != Vec3::ZERO {
            let boost = if input.get_key(Key::ControlLeft) { self.sprint_multiplier } else { 1.0 };
            self.velocity += direction * (self.speed * boost * dt);
            had_input = true;
        }

        had_input
    }

    /// Integrates velocity over `dt` and refreshes the view matrix.
    pub fn advance(&mut self, dt: f32) {
        self.position += self.velocity * dt;
        self.velocity *= self.damping.powf(dt);
        self.update_view_matrix();
    }

    #[inline]
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    #[inline]
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.view_projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }
}

impl SimulatedBody for Camera {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.update_view_matrix();
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    fn advance(&mut self, dt: f32) {
        Camera::advance(self, dt);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Frustum {
    planes: [Vec4; 6], // Left, Right, Bottom, Top, Near, Far
}

impl Frustum {
    /// Gribb-Hartmann plane extraction for a [0, 1] depth range.
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        let mut planes = [
            rows[3] + rows[0],
            rows[3] - rows[0],
            rows[3] + rows[1],
            rows[3] - rows[1],
            rows[2],
            rows[3] - rows[2],
        ];

        for plane in &mut planes {
            let length = plane.truncate().length();
            if length > 0.0 {
                *plane /= length;
            }
        }

        Self { planes }
    }

    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(center) + plane.w >= -radius)
    }

    /// Conservative box test: rejects only boxes fully behind one plane.
    #[must_use]
    pub fn intersects_box(&self, bounds: &BoundingBox) -> bool {
        self.planes.iter().all(|plane| {
            let normal = plane.truncate();
            let positive = Vec3::select(normal.cmpge(Vec3::ZERO), bounds.max, bounds.min);
            normal.dot(positive) + plane.w >= 0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::input::ButtonState;

    fn camera() -> Camera {
        let settings = CameraSettings {
            position: Vec3::ZERO,
            yaw: -90.0,
            pitch: 0.0,
            ..Default::default()
        };
        Camera::from_settings(&settings, 16.0 / 9.0)
    }

    #[test]
    fn yaw_minus_ninety_looks_down_negative_z() {
        let cam = camera();
        assert!((cam.forward() - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn movement_keys_accelerate_and_damping_decays() {
        let mut cam = camera();
        let mut input = Input::new();
        input.inject_key(Key::W, ButtonState::Pressed);

        assert!(cam.process_input(&input, 0.1));
        assert!(cam.velocity.z < 0.0);

        let speed = cam.velocity.length();
        input.inject_key(Key::W, ButtonState::Released);
        assert!(!cam.process_input(&input, 0.1));
        cam.advance(0.1);
        assert!(cam.velocity.length() < speed);
        assert!(cam.position.z < 0.0);
    }

    #[test]
    fn frustum_rejects_box_behind_camera() {
        let cam = camera();
        let behind = BoundingBox::new(Vec3::new(-1.0, -1.0, 5.0), Vec3::new(1.0, 1.0, 6.0));
        let ahead = BoundingBox::new(Vec3::new(-1.0, -1.0, -6.0), Vec3::new(1.0, 1.0, -5.0));
        assert!(!cam.frustum().intersects_box(&behind));
        assert!(cam.frustum().intersects_box(&ahead));
    }
}
