//! Free-flight camera.
//!
//! Velocity-based: keys accelerate along the view basis, friction bleeds the
//! velocity off every frame, so motion eases in and out instead of snapping.
//! Mouse movement steers yaw/pitch while the rotate button is held.

use glam::{Mat4, Vec3};

use crate::input::{Input, Key, MouseButton};

#[derive(Debug, Clone)]
pub struct FlyCamera {
    pub position: Vec3,
    /// Radians around +Y; 0 looks down -Z.
    pub yaw: f32,
    /// Radians; clamped short of the poles.
    pub pitch: f32,

    pub velocity: Vec3,

    /// Acceleration in units/s^2 while a movement key is held.
    pub acceleration: f32,
    /// Per-second velocity retention (0..1); lower stops faster.
    pub friction: f32,
    pub max_speed: f32,
    /// Radians of rotation per pixel of mouse travel.
    pub sensitivity: f32,

    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            velocity: Vec3::ZERO,
            acceleration: 60.0,
            friction: 0.005,
            max_speed: 30.0,
            sensitivity: 0.003,
            fov_y: std::f32::consts::FRAC_PI_3,
            near: 0.1,
            far: 10_000.0,
        }
    }
}

impl FlyCamera {
    /// Unit view direction from yaw/pitch.
    pub fn forward(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        Vec3::new(-sy * cp, sp, -cy * cp).normalize()
    }

    fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    /// Steers and moves the camera from the polled input.
    ///
    /// WASD moves in the view plane, Space/Shift along world Y; the right
    /// mouse button gates rotation so the cursor can be used freely.
    pub fn update(&mut self, input: &Input, dt: f32) {
        if input.button_held(MouseButton::Right) {
            let (dx, dy) = input.mouse_delta();
            self.yaw -= dx * self.sensitivity;
            self.pitch -= dy * self.sensitivity;
        }
        // Wrap yaw so it never accumulates precision loss over a long run.
        self.yaw = self.yaw.rem_euclid(std::f32::consts::TAU);
        let limit = std::f32::consts::FRAC_PI_2 - 0.01;
        self.pitch = self.pitch.clamp(-limit, limit);

        let mut wish = Vec3::ZERO;
        if input.held(Key::W) {
            wish += self.forward();
        }
        if input.held(Key::S) {
            wish -= self.forward();
        }
        if input.held(Key::D) {
            wish += self.right();
        }
        if input.held(Key::A) {
            wish -= self.right();
        }
        if input.held(Key::Space) {
            wish += Vec3::Y;
        }
        if input.held(Key::Shift) {
            wish -= Vec3::Y;
        }

        if wish != Vec3::ZERO {
            self.velocity += wish.normalize() * self.acceleration * dt;
        }
        self.velocity *= self.friction.powf(dt);
        if self.velocity.length() > self.max_speed {
            self.velocity = self.velocity.normalize() * self.max_speed;
        }

        self.position += self.velocity * dt;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), Vec3::Y)
    }

    pub fn proj(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect.max(1e-6), self.near, self.far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_yaw_pitch_looks_down_negative_z() {
        let cam = FlyCamera::default();
        let f = cam.forward();
        assert!((f - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn pitch_never_reaches_the_poles() {
        let mut cam = FlyCamera { pitch: 10.0, ..Default::default() };
        cam.update(&Input::default(), 0.016);
        assert!(cam.pitch < std::f32::consts::FRAC_PI_2);
        assert!(cam.forward().is_finite());
    }

    #[test]
    fn view_matrix_maps_camera_position_to_origin() {
        let cam = FlyCamera {
            position: Vec3::new(3.0, -2.0, 7.0),
            yaw: 1.3,
            pitch: -0.4,
            ..Default::default()
        };
        let eye = cam.view().transform_point3(cam.position);
        assert!(eye.length() < 1e-4);
    }

    #[test]
    fn friction_bleeds_velocity_without_input() {
        let mut cam = FlyCamera { velocity: Vec3::new(5.0, 0.0, 0.0), ..Default::default() };
        let start = cam.velocity.length();
        for _ in 0..60 {
            cam.update(&Input::default(), 0.016);
        }
        assert!(cam.velocity.length() < start * 0.01);
    }
}
