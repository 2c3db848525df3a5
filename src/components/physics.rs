use glam::Vec3;

/// World-space position of a piece of level geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position(pub Vec3);

/// Collision shape attached to an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Collider {
    /// Axis-aligned box centred on the entity's `Position`.
    Box { half_extents: Vec3 },
    /// Infinite plane `dot(p, normal) = offset`; `Position` is ignored.
    Plane { normal: Vec3, offset: f32 },
}

/// Marker: entity is immovable level geometry that blocks traces and sweeps.
pub struct Static;

/// Human-readable name, used in trace output.
pub struct Label(pub String);
