use std::f32::consts::PI;

use bevy::input::mouse::MouseButton;
use bevy::math::{Vec2, Vec3};
use constants::camera::{ORBIT_AUTO_ROTATE_SPEED, ORBIT_MOUSE_ROTATION_SPEED, ORBIT_ZOOM_SCALE};

use super::projector_camera::{Projection, ProjectorCamera};

const POLAR_EPSILON: f32 = 1e-6;
const MIN_ORTHO_ZOOM: f32 = 1e-3;

/// Which mouse button drives which camera gesture. `None` disables the
/// gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseButtonRoles {
    pub orbit: Option<MouseButton>,
    pub pan: Option<MouseButton>,
}

impl MouseButtonRoles {
    pub const ORBIT_LEFT: Self = Self {
        orbit: Some(MouseButton::Left),
        pan: Some(MouseButton::Right),
    };

    /// Ctrl+left orbits on platforms without a right button.
    pub const ORBIT_RIGHT: Self = Self {
        orbit: Some(MouseButton::Right),
        pan: Some(MouseButton::Left),
    };

    pub const PAN_ONLY: Self = Self {
        orbit: None,
        pan: Some(MouseButton::Left),
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Orbit,
    Pan,
}

/// Orbit/pan/dolly state around a target point.
///
/// Input methods only accumulate deltas; [`OrbitControls::update`] applies
/// them to the camera.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    pub min_distance: f32,
    pub max_distance: f32,
    pub enabled: bool,
    pub enable_rotate: bool,
    pub auto_rotate: bool,
    pub auto_rotate_speed: f32,
    pub rotate_speed: f32,
    pub screen_space_panning: bool,
    pub mouse_buttons: MouseButtonRoles,

    pub target0: Vec3,
    pub position0: Vec3,
    pub zoom0: f32,

    theta_delta: f32,
    phi_delta: f32,
    scale: f32,
    pan_offset: Vec3,
}

impl OrbitControls {
    pub fn new(camera: &ProjectorCamera, target: Vec3, zoom: f32, is_3d: bool) -> Self {
        Self {
            target,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            enabled: true,
            enable_rotate: is_3d,
            auto_rotate: false,
            auto_rotate_speed: ORBIT_AUTO_ROTATE_SPEED,
            rotate_speed: ORBIT_MOUSE_ROTATION_SPEED,
            screen_space_panning: true,
            mouse_buttons: if is_3d {
                MouseButtonRoles::ORBIT_LEFT
            } else {
                MouseButtonRoles::PAN_ONLY
            },
            target0: target,
            position0: camera.position,
            zoom0: zoom,
            theta_delta: 0.0,
            phi_delta: 0.0,
            scale: 1.0,
            pan_offset: Vec3::ZERO,
        }
    }

    /// Gesture bound to `button`, if any.
    pub fn gesture_for(&self, button: MouseButton) -> Option<Gesture> {
        if self.mouse_buttons.orbit == Some(button) {
            Some(Gesture::Orbit)
        } else if self.mouse_buttons.pan == Some(button) {
            Some(Gesture::Pan)
        } else {
            None
        }
    }

    /// Angle added per update while auto-rotating; one turn every 30
    /// seconds at 60fps for the default speed.
    pub fn auto_rotation_angle(&self) -> f32 {
        2.0 * PI / 60.0 / 60.0 * self.auto_rotate_speed
    }

    /// Queues a rotation for a pointer drag of `delta` pixels.
    pub fn rotate(&mut self, delta: Vec2, viewport_height: f32) {
        if !self.enabled || !self.enable_rotate {
            return;
        }
        let height = viewport_height.max(1.0);
        self.theta_delta -= 2.0 * PI * delta.x / height * self.rotate_speed;
        self.phi_delta -= 2.0 * PI * delta.y / height * self.rotate_speed;
    }

    /// Queues a pan so the scene follows the pointer.
    pub fn pan(&mut self, delta: Vec2, camera: &ProjectorCamera, viewport: Vec2) {
        if !self.enabled {
            return;
        }
        let (right, up) = camera.screen_axes(self.target);
        let viewport = viewport.max(Vec2::ONE);

        let (dx, dy) = match camera.projection {
            Projection::Perspective { fov, .. } => {
                let distance = (camera.position - self.target).length();
                let target_distance = distance * (fov.to_radians() / 2.0).tan();
                (
                    2.0 * delta.x * target_distance / viewport.y,
                    2.0 * delta.y * target_distance / viewport.y,
                )
            }
            Projection::Orthographic {
                left,
                right: r,
                top,
                bottom,
                ..
            } => (
                delta.x * (r - left) / camera.zoom / viewport.x,
                delta.y * (top - bottom) / camera.zoom / viewport.y,
            ),
        };

        self.pan_offset -= right * dx;
        if self.screen_space_panning {
            self.pan_offset += up * dy;
        } else {
            let forward = up.cross(right);
            self.pan_offset += Vec3::new(forward.x, 0.0, forward.z).normalize_or_zero() * dy;
        }
    }

    /// Wheel zoom. Positive `delta_y` moves away from the target.
    pub fn dolly(&mut self, delta_y: f32, camera: &mut ProjectorCamera) {
        if !self.enabled || delta_y == 0.0 {
            return;
        }
        let zoom_in = delta_y < 0.0;
        match camera.projection {
            Projection::Perspective { .. } => {
                if zoom_in {
                    self.scale *= ORBIT_ZOOM_SCALE;
                } else {
                    self.scale /= ORBIT_ZOOM_SCALE;
                }
            }
            Projection::Orthographic { .. } => {
                let zoom = if zoom_in {
                    camera.zoom / ORBIT_ZOOM_SCALE
                } else {
                    camera.zoom * ORBIT_ZOOM_SCALE
                };
                camera.zoom = zoom.max(MIN_ORTHO_ZOOM);
            }
        }
    }

    /// Applies auto-rotation and the queued deltas, then clamps the distance
    /// to the target. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut ProjectorCamera) -> bool {
        let old_position = camera.position;
        let old_target = self.target;

        let offset = camera.position - self.target;
        let mut radius = offset.length();
        let (mut theta, mut phi) = if radius > 0.0 {
            (
                offset.x.atan2(offset.z),
                (offset.y / radius).clamp(-1.0, 1.0).acos(),
            )
        } else {
            (0.0, PI / 2.0)
        };

        if self.auto_rotate {
            self.theta_delta -= self.auto_rotation_angle();
        }

        theta += self.theta_delta;
        phi = (phi + self.phi_delta).clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);

        self.target += self.pan_offset;

        let sin_phi = phi.sin();
        let new_offset = Vec3::new(
            radius * sin_phi * theta.sin(),
            radius * phi.cos(),
            radius * sin_phi * theta.cos(),
        );
        camera.position = self.target + new_offset;

        self.theta_delta = 0.0;
        self.phi_delta = 0.0;
        self.scale = 1.0;
        self.pan_offset = Vec3::ZERO;

        camera.position.distance_squared(old_position) > f32::EPSILON
            || self.target.distance_squared(old_target) > f32::EPSILON
    }

    /// Restores the state captured at construction.
    pub fn reset(&mut self, camera: &mut ProjectorCamera) {
        self.target = self.target0;
        camera.position = self.position0;
        camera.zoom = self.zoom0;
        self.theta_delta = 0.0;
        self.phi_delta = 0.0;
        self.scale = 1.0;
        self.pan_offset = Vec3::ZERO;
        self.update(camera);
    }
}
