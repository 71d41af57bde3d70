use bevy::math::Vec3;

/// A 3D point, used for serialisable camera positions.
pub type Point3D = [f32; 3];

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Squared L2 norm.
pub fn norm2(a: &[f32]) -> f32 {
    a.iter().map(|v| v * v).sum()
}

pub fn norm(a: &[f32]) -> f32 {
    norm2(a).sqrt()
}

/// Normalises the vector in place. Zero vectors are left untouched.
pub fn unit(a: &mut [f32]) {
    let n = norm(a);
    if n > 0.0 {
        for v in a.iter_mut() {
            *v /= n;
        }
    }
}

/// Squared euclidean distance.
pub fn dist2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

pub fn dist(a: &[f32], b: &[f32]) -> f32 {
    dist2(a, b).sqrt()
}

/// Squared euclidean distance that gives up once the running sum reaches
/// `limit`, returning `-1.0`.
pub fn dist2_with_limit(a: &[f32], b: &[f32], limit: f32) -> f32 {
    let mut result = 0.0;
    for (x, y) in a.iter().zip(b) {
        let diff = x - y;
        result += diff * diff;
        if result >= limit {
            return -1.0;
        }
    }
    result
}

/// Cosine distance between two arbitrary vectors. A zero vector is treated as
/// orthogonal to everything.
pub fn cos_dist(a: &[f32], b: &[f32]) -> f32 {
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        return 1.0;
    }
    1.0 - dot(a, b) / denom
}

/// Cosine distance between two vectors already normalised to unit length.
pub fn cos_dist_norm(a: &[f32], b: &[f32]) -> f32 {
    1.0 - dot(a, b)
}

/// Packs the vectors of every point into one row-major buffer.
pub fn to_flat_array<T, F>(points: &[T], accessor: F) -> Vec<f32>
where
    F: Fn(&T) -> &[f32],
{
    let dim = points.first().map(|p| accessor(p).len()).unwrap_or(0);
    let mut result = Vec::with_capacity(points.len() * dim);
    for point in points {
        result.extend_from_slice(accessor(point));
    }
    result
}

/// Returns the distances of the nearest and farthest points in front of the
/// camera, measured along the camera→target axis.
///
/// `positions` holds packed xyz triplets. When no point lies in front of the
/// camera both extents are zero.
pub fn get_near_far_points(positions: &[f32], camera_pos: Vec3, camera_target: Vec3) -> (f32, f32) {
    let plane_normal = (camera_target - camera_pos).normalize_or_zero();
    let mut shortest = f32::INFINITY;
    let mut furthest = 0.0_f32;

    for xyz in positions.chunks_exact(3) {
        let cam_to_point = Vec3::new(xyz[0], xyz[1], xyz[2]) - camera_pos;
        let d = plane_normal.dot(cam_to_point);
        if d < 0.0 {
            continue;
        }
        furthest = furthest.max(d);
        shortest = shortest.min(d);
    }

    if shortest.is_infinite() {
        return (0.0, 0.0);
    }
    (shortest, furthest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_leaves_zero_vector_alone() {
        let mut v = [0.0, 0.0, 0.0];
        unit(&mut v);
        assert_eq!(v, [0.0, 0.0, 0.0]);

        let mut v = [3.0, 4.0];
        unit(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn limited_distance_bails_out() {
        let a = [0.0, 0.0, 0.0];
        let b = [1.0, 1.0, 1.0];
        assert_eq!(dist2_with_limit(&a, &b, 10.0), 3.0);
        assert_eq!(dist2_with_limit(&a, &b, 2.0), -1.0);
    }

    #[test]
    fn cosine_distances_agree_on_unit_vectors() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!((cos_dist(&a, &b) - 1.0).abs() < 1e-6);
        assert!((cos_dist_norm(&a, &b) - 1.0).abs() < 1e-6);
        assert!(cos_dist(&a, &a).abs() < 1e-6);
        assert_eq!(cos_dist(&a, &[0.0, 0.0]), 1.0);
    }

    #[test]
    fn near_far_ignores_points_behind_camera() {
        let positions = [0.0, 0.0, 0.0, 0.0, 0.0, -2.0, 0.0, 0.0, 10.0];
        let (near, far) =
            get_near_far_points(&positions, Vec3::new(0.0, 0.0, 4.0), Vec3::ZERO);
        assert_eq!(near, 4.0);
        assert_eq!(far, 6.0);

        assert_eq!(get_near_far_points(&[], Vec3::Z, Vec3::ZERO), (0.0, 0.0));
    }
}
