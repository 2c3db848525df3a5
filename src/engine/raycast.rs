use glam::Vec3;

/// Nearest blocking hit of a line trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Distance from the trace origin.
    pub distance: f32,
    pub position: Vec3,
    /// Surface normal at the hit, unit length.
    pub normal: Vec3,
}

/// "Cast a ray, return the nearest blocking hit" primitive supplied by the host.
pub trait Raycast {
    /// Trace from `origin` to `destination`. `ignore_self` excludes the
    /// querying character's own collision from the result.
    fn cast(&self, origin: Vec3, destination: Vec3, ignore_self: bool) -> Option<RayHit>;
}

impl<T: Raycast + ?Sized> Raycast for &T {
    fn cast(&self, origin: Vec3, destination: Vec3, ignore_self: bool) -> Option<RayHit> {
        (**self).cast(origin, destination, ignore_self)
    }
}
