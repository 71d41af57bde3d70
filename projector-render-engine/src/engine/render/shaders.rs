//! CPU statement of the point shader contract.
//!
//! `assets/shaders/point_sprite.wgsl` runs the same rules on the GPU. These
//! functions fix what every renderer has to honour: the emitted point size,
//! the sprite tile lookup, the circle discard and the fog term.

use std::f32::consts::PI;

use bevy::math::{Mat4, Vec2, Vec3};
use constants::point_shader::{
    IMAGE_SIZE, MIN_POINT_SIZE, NUM_POINTS_FOG_THRESHOLD, POINT_SIZE_2D_DIVISOR,
    POINT_SIZE_LOG_BASE, POINT_SIZE_SCALE, ZOOM_IN_SPEED, ZOOM_MAX_SCALE, ZOOM_MIN_SCALE,
    ZOOM_OFFSET, ZOOM_OUT_SPEED,
};

/// Distance fog mixed into the visible colour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub color: Vec3,
    pub near: f32,
    pub far: f32,
}

impl Fog {
    pub fn from_hex(color: u32, near: f32, far: f32) -> Self {
        Self {
            color: hex_to_rgb(color),
            near,
            far,
        }
    }

    /// Fog weight at `depth` camera-space units from the eye.
    pub fn factor(&self, depth: f32) -> f32 {
        smoothstep(self.near, self.far, depth)
    }

    pub fn apply(&self, rgb: Vec3, depth: f32) -> Vec3 {
        rgb.lerp(self.color, self.factor(depth))
    }
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

pub fn hex_to_rgb(color: u32) -> Vec3 {
    Vec3::new(
        ((color >> 16) & 0xFF) as f32 / 255.0,
        ((color >> 8) & 0xFF) as f32 / 255.0,
        (color & 0xFF) as f32 / 255.0,
    )
}

/// Base point size for a cloud of `point_count` points.
///
/// Shrinks inverse-logarithmically with the count. Clouds of fewer than two
/// points are sized as two so the logarithm stays positive.
pub fn default_point_size(point_count: usize, is_3d: bool, is_image: bool) -> f32 {
    if is_image {
        return IMAGE_SIZE;
    }
    let n = point_count.max(2) as f32;
    let size = POINT_SIZE_SCALE / n.ln() / POINT_SIZE_LOG_BASE.ln();
    if is_3d { size } else { size / POINT_SIZE_2D_DIVISOR }
}

/// Scale of the 2D zoom curve for a projection whose x scale is
/// `projection_x_scale`. Shrinks towards `ZOOM_MIN_SCALE` when zooming out
/// and grows towards `ZOOM_MAX_SCALE` when zooming in.
pub fn zoom_scale_2d(projection_x_scale: f32) -> f32 {
    let out_norm = (1.0 - ZOOM_MIN_SCALE) / ZOOM_OUT_SPEED.atan();
    let zoom = projection_x_scale + ZOOM_OFFSET;
    if zoom < 1.0 {
        1.0 + out_norm * (ZOOM_OUT_SPEED * (zoom - 1.0)).atan()
    } else {
        1.0 + 2.0 / PI * (ZOOM_MAX_SCALE - 1.0) * (ZOOM_IN_SPEED * (zoom - 1.0)).atan()
    }
}

/// Emitted point size in device pixels.
///
/// With attenuation the size falls off with the camera-space depth
/// `camera_space_z` (negative in front of the camera). Otherwise it follows
/// [`zoom_scale_2d`].
pub fn point_size(
    base_size: f32,
    scale_factor: f32,
    size_attenuation: bool,
    camera_space_z: f32,
    projection: &Mat4,
) -> f32 {
    let size = if size_attenuation {
        -base_size / camera_space_z
    } else {
        base_size * zoom_scale_2d(projection.x_axis.x)
    };
    (size * scale_factor).max(MIN_POINT_SIZE)
}

/// Column and row of a sprite in the atlas.
pub fn sprite_tile(sprite_index: f32, sprites_per_row: f32, sprites_per_column: f32) -> Vec2 {
    Vec2::new(
        sprite_index % sprites_per_row,
        (sprite_index / sprites_per_column).floor(),
    )
}

/// Whether a point-sprite coordinate in `0..1` lies inside the inscribed
/// circle. Fragments outside are discarded.
pub fn point_in_unit_circle(sprite_coord: Vec2) -> bool {
    let center_to_p = sprite_coord - Vec2::splat(0.5);
    center_to_p.dot(center_to_p) < 0.5 * 0.5
}

/// Fog range for the visible pass. Grows with the point count up to
/// `NUM_POINTS_FOG_THRESHOLD`. `None` in 2D, where fog is off.
pub fn fog_distances(
    is_3d: bool,
    nearest_point_z: f32,
    farthest_point_z: f32,
    point_count: usize,
) -> Option<(f32, f32)> {
    if !is_3d {
        return None;
    }
    let threshold = NUM_POINTS_FOG_THRESHOLD as f32;
    let multiplier = 2.0 - point_count.min(NUM_POINTS_FOG_THRESHOLD) as f32 / threshold;
    Some((nearest_point_z, farthest_point_z * multiplier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_size_shrinks_with_point_count() {
        let small = default_point_size(10, true, false);
        let large = default_point_size(10_000, true, false);
        assert!(small > large);
        assert!((default_point_size(10, false, false) - small / 1.5).abs() < 1e-4);
        assert_eq!(default_point_size(10, true, true), IMAGE_SIZE);
        assert!(default_point_size(0, true, false).is_finite());
    }

    #[test]
    fn attenuated_size_has_a_floor() {
        let projection = Mat4::IDENTITY;
        assert_eq!(point_size(10.0, 1.0, true, -2.0, &projection), MIN_POINT_SIZE);
        assert_eq!(point_size(100.0, 1.0, true, -2.0, &projection), 50.0);
    }

    #[test]
    fn zoom_curve_is_identity_at_the_pivot() {
        assert!((zoom_scale_2d(1.0 - ZOOM_OFFSET) - 1.0).abs() < 1e-6);
        assert!(zoom_scale_2d(0.0) < 1.0);
        assert!(zoom_scale_2d(10.0) > 1.0);
        assert!(zoom_scale_2d(1e6) < ZOOM_MAX_SCALE);
        assert!((zoom_scale_2d(-ZOOM_OFFSET) - ZOOM_MIN_SCALE).abs() < 1e-5);
    }

    #[test]
    fn circle_test_discards_corners() {
        assert!(point_in_unit_circle(Vec2::splat(0.5)));
        assert!(!point_in_unit_circle(Vec2::new(0.02, 0.02)));
    }

    #[test]
    fn sprite_tiles_wrap_rows() {
        assert_eq!(sprite_tile(5.0, 4.0, 4.0), Vec2::new(1.0, 1.0));
    }

    #[test]
    fn fog_is_off_in_2d_and_widens_for_small_clouds() {
        assert_eq!(fog_distances(false, 1.0, 2.0, 10), None);
        assert_eq!(fog_distances(true, 1.0, 2.0, 10_000), Some((1.0, 2.0)));
        assert_eq!(fog_distances(true, 1.0, 2.0, 0), Some((1.0, 4.0)));
    }

    #[test]
    fn fog_blends_towards_its_colour() {
        let fog = Fog::from_hex(0xFFFFFF, 1.0, 3.0);
        assert_eq!(fog.apply(Vec3::ZERO, 0.5), Vec3::ZERO);
        assert_eq!(fog.apply(Vec3::ZERO, 5.0), Vec3::ONE);
    }
}
