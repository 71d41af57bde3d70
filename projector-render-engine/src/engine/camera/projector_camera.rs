use bevy::math::{Mat4, Vec3};
use constants::camera::{
    ORTHO_CAMERA_FAR_CLIP_PLANE, ORTHO_CAMERA_FRUSTUM_HALF_EXTENT, ORTHO_CAMERA_NEAR_CLIP_PLANE,
    PERSP_CAMERA_FAR_CLIP_PLANE, PERSP_CAMERA_FOV_VERTICAL, PERSP_CAMERA_NEAR_CLIP_PLANE,
};
use serde::{Deserialize, Serialize};

use super::CameraDef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraType {
    Perspective,
    Orthographic,
}

/// Projection parameters of the two camera variants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in degrees, before zoom.
        fov: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    },
}

/// Scene camera. Orientation is not stored: the camera always looks at the
/// orbit controls' target.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectorCamera {
    pub position: Vec3,
    pub up: Vec3,
    pub zoom: f32,
    pub projection: Projection,
}

impl ProjectorCamera {
    /// 3D camera for a `width × height` viewport.
    pub fn perspective(def: &CameraDef, width: f32, height: f32) -> Self {
        Self {
            position: Vec3::from_array(def.position),
            up: Vec3::Y,
            zoom: def.zoom,
            projection: Projection::Perspective {
                fov: PERSP_CAMERA_FOV_VERTICAL,
                aspect: width / height,
                near: PERSP_CAMERA_NEAR_CLIP_PLANE,
                far: PERSP_CAMERA_FAR_CLIP_PLANE,
            },
        }
    }

    /// 2D camera. The larger viewport side is scaled up to match the aspect
    /// ratio so the shorter side always spans the base frustum.
    pub fn orthographic(def: &CameraDef, width: f32, height: f32) -> Self {
        let aspect = width / height;
        let mut left = -ORTHO_CAMERA_FRUSTUM_HALF_EXTENT;
        let mut right = ORTHO_CAMERA_FRUSTUM_HALF_EXTENT;
        let mut bottom = -ORTHO_CAMERA_FRUSTUM_HALF_EXTENT;
        let mut top = ORTHO_CAMERA_FRUSTUM_HALF_EXTENT;
        if aspect > 1.0 {
            left *= aspect;
            right *= aspect;
        } else {
            top /= aspect;
            bottom /= aspect;
        }

        Self {
            position: Vec3::from_array(def.position),
            up: Vec3::Y,
            zoom: def.zoom,
            projection: Projection::Orthographic {
                left,
                right,
                top,
                bottom,
                near: ORTHO_CAMERA_NEAR_CLIP_PLANE,
                far: ORTHO_CAMERA_FAR_CLIP_PLANE,
            },
        }
    }

    pub fn from_def(def: &CameraDef, width: f32, height: f32) -> Self {
        if def.orthographic {
            Self::orthographic(def, width, height)
        } else {
            Self::perspective(def, width, height)
        }
    }

    pub fn camera_type(&self) -> CameraType {
        match self.projection {
            Projection::Perspective { .. } => CameraType::Perspective,
            Projection::Orthographic { .. } => CameraType::Orthographic,
        }
    }

    pub fn view_matrix(&self, target: Vec3) -> Mat4 {
        Mat4::look_at_rh(self.position, target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective {
                fov,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh_gl(self.effective_fov(fov), aspect, near, far),
            Projection::Orthographic {
                left,
                right,
                top,
                bottom,
                near,
                far,
            } => {
                let dx = (right - left) / (2.0 * self.zoom);
                let dy = (top - bottom) / (2.0 * self.zoom);
                let cx = (right + left) / 2.0;
                let cy = (top + bottom) / 2.0;
                Mat4::orthographic_rh_gl(cx - dx, cx + dx, cy - dy, cy + dy, near, far)
            }
        }
    }

    pub fn view_projection(&self, target: Vec3) -> Mat4 {
        self.projection_matrix() * self.view_matrix(target)
    }

    /// Vertical field of view in radians after applying the zoom factor.
    fn effective_fov(&self, fov: f32) -> f32 {
        2.0 * ((fov.to_radians() * 0.5).tan() / self.zoom).atan()
    }

    /// Recomputes the perspective aspect. No-op for orthographic cameras.
    pub fn set_aspect(&mut self, new_aspect: f32) {
        if let Projection::Perspective { aspect, .. } = &mut self.projection {
            *aspect = new_aspect;
        }
    }

    /// Scales the orthographic frustum by the viewport change, keeping it
    /// centred. No-op for perspective cameras.
    pub fn scale_frustum(&mut self, scale_w: f32, scale_h: f32) {
        if let Projection::Orthographic {
            left,
            right,
            top,
            bottom,
            ..
        } = &mut self.projection
        {
            let half_width = (*right - *left) * scale_w / 2.0;
            let half_height = (*top - *bottom) * scale_h / 2.0;
            *top = half_height;
            *bottom = -half_height;
            *left = -half_width;
            *right = half_width;
        }
    }

    /// Orthographic half extents `(width, height)` before zoom.
    pub fn frustum_half_extents(&self) -> Option<(f32, f32)> {
        match self.projection {
            Projection::Orthographic {
                left,
                right,
                top,
                bottom,
                ..
            } => Some(((right - left) / 2.0, (top - bottom) / 2.0)),
            Projection::Perspective { .. } => None,
        }
    }

    /// Right and up axes of the camera in world space.
    pub fn screen_axes(&self, target: Vec3) -> (Vec3, Vec3) {
        let forward = (target - self.position).normalize_or_zero();
        let right = forward.cross(self.up).normalize_or_zero();
        let up = right.cross(forward);
        (right, up)
    }

    /// Depth of a world point along the view direction, negative in front
    /// of the camera as in a right-handed view space.
    pub fn view_depth(&self, target: Vec3, world: Vec3) -> f32 {
        self.view_matrix(target).transform_point3(world).z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(orthographic: bool) -> CameraDef {
        CameraDef {
            orthographic,
            position: [0.0, 0.0, 4.0],
            target: [0.0, 0.0, 0.0],
            zoom: 1.0,
        }
    }

    #[test]
    fn orthographic_scales_the_wider_side() {
        let wide = ProjectorCamera::orthographic(&def(true), 400.0, 200.0);
        assert_eq!(
            wide.frustum_half_extents(),
            Some((2.0 * ORTHO_CAMERA_FRUSTUM_HALF_EXTENT, ORTHO_CAMERA_FRUSTUM_HALF_EXTENT))
        );

        let tall = ProjectorCamera::orthographic(&def(true), 200.0, 400.0);
        assert_eq!(
            tall.frustum_half_extents(),
            Some((ORTHO_CAMERA_FRUSTUM_HALF_EXTENT, 2.0 * ORTHO_CAMERA_FRUSTUM_HALF_EXTENT))
        );
    }

    #[test]
    fn camera_type_follows_definition() {
        assert_eq!(
            ProjectorCamera::from_def(&def(true), 10.0, 10.0).camera_type(),
            CameraType::Orthographic
        );
        assert_eq!(
            ProjectorCamera::from_def(&def(false), 10.0, 10.0).camera_type(),
            CameraType::Perspective
        );
    }

    #[test]
    fn orthographic_zoom_shrinks_the_visible_area() {
        let mut camera = ProjectorCamera::orthographic(&def(true), 100.0, 100.0);
        let edge = Vec3::new(ORTHO_CAMERA_FRUSTUM_HALF_EXTENT, 0.0, 0.0);
        let ndc = camera.view_projection(Vec3::ZERO).project_point3(edge);
        assert!((ndc.x - 1.0).abs() < 1e-5);

        camera.zoom = 2.0;
        let ndc = camera.view_projection(Vec3::ZERO).project_point3(edge);
        assert!((ndc.x - 2.0).abs() < 1e-5);
    }

    #[test]
    fn points_in_front_have_negative_view_depth() {
        let camera = ProjectorCamera::perspective(&def(false), 100.0, 100.0);
        assert!((camera.view_depth(Vec3::ZERO, Vec3::ZERO) + 4.0).abs() < 1e-5);
    }
}
