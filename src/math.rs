use glam::{Quat, Vec3};

/// World up axis. Everything "horizontal" in this crate has a zero Z component.
pub const UP: Vec3 = Vec3::Z;

/// Below this a vector is treated as having no direction.
pub const SMALL_NUMBER: f32 = 1.0e-4;

/// Drop the vertical component.
pub fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.y, 0.0)
}

/// Horizontal projection, renormalised. Zero when the input has no
/// meaningful horizontal extent (e.g. a floor or ceiling normal).
pub fn horizontal_normal(v: Vec3) -> Vec3 {
    horizontal(v).normalize_or_zero()
}

/// Rotate `v` about the world up axis. Positive angles turn counter-clockwise
/// when looking down from above.
pub fn rotate_about_up(v: Vec3, degrees: f32) -> Vec3 {
    Quat::from_rotation_z(degrees.to_radians()) * v
}

/// Heading of the horizontal part of `v`, in degrees, counter-clockwise from +X.
pub fn heading_degrees(v: Vec3) -> f32 {
    v.y.atan2(v.x).to_degrees()
}

/// Wrap an angle into (-180, 180].
pub fn unwind_degrees(mut angle: f32) -> f32 {
    while angle > 180.0 {
        angle -= 360.0;
    }
    while angle < -180.0 {
        angle += 360.0;
    }
    angle
}

/// Signed angle from `to`'s heading to `from`'s heading, wrapped to ±180.
/// Positive when `from` points counter-clockwise of `to`.
pub fn signed_heading_delta(from: Vec3, to: Vec3) -> f32 {
    unwind_degrees(heading_degrees(from) - heading_degrees(to))
}

/// Intersect the segment `start..end` with the plane through `plane_origin`.
/// Returns the intersection point only when it lies on the segment.
pub fn segment_plane_intersection(
    start: Vec3,
    end: Vec3,
    plane_origin: Vec3,
    plane_normal: Vec3,
) -> Option<Vec3> {
    let dir = end - start;
    let denom = dir.dot(plane_normal);
    if denom.abs() < f32::EPSILON {
        return None;
    }
    let t = (plane_origin - start).dot(plane_normal) / denom;
    if (0.0..=1.0).contains(&t) {
        Some(start + dir * t)
    } else {
        None
    }
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_normal_is_flat_and_unit() {
        let n = horizontal_normal(Vec3::new(-0.6, 0.3, 0.74));
        assert_eq!(n.z, 0.0);
        assert!((n.length() - 1.0).abs() < 1e-5);
        assert_eq!(horizontal_normal(Vec3::Z), Vec3::ZERO);
    }

    #[test]
    fn rotating_forward_clockwise_points_right() {
        // Facing +Y, the right-hand side is +X.
        let r = rotate_about_up(Vec3::Y, -90.0);
        assert!((r - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn unwind_wraps_into_half_turn() {
        assert_eq!(unwind_degrees(270.0), -90.0);
        assert_eq!(unwind_degrees(-190.0), 170.0);
        assert_eq!(unwind_degrees(180.0), 180.0);
    }

    #[test]
    fn segment_misses_plane_behind_it() {
        let hit = segment_plane_intersection(Vec3::ZERO, Vec3::X * 10.0, Vec3::X * 5.0, -Vec3::X);
        assert!(hit.is_some());
        let miss = segment_plane_intersection(Vec3::ZERO, Vec3::X * 10.0, -Vec3::X * 5.0, Vec3::X);
        assert!(miss.is_none());
    }
}
