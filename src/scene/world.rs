use glam::Vec3;
use hecs::World;
use tracing::trace;

use crate::components::{Collider, Label, Position, Static};
use crate::engine::{RayHit, Raycast};

/// Gap kept between a swept box and whatever it stops against.
pub const SKIN: f32 = 0.05;

const PARALLEL_EPSILON: f32 = 1.0e-8;

/// First blocking contact of a swept box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepHit {
    /// Fraction of the displacement that can be travelled, skin included.
    pub time: f32,
    /// Surface normal, pointing back at the swept box.
    pub normal: Vec3,
    pub start_penetrating: bool,
}

/// Static level geometry stored as hecs entities.
pub struct LevelGeometry {
    world: World,
}

impl Default for LevelGeometry {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelGeometry {
    pub fn new() -> Self {
        Self { world: World::new() }
    }

    /// Axis-aligned box.
    pub fn add_box(&mut self, label: &str, center: Vec3, half_extents: Vec3) {
        self.world.spawn((
            Static,
            Position(center),
            Collider::Box { half_extents },
            Label(label.to_owned()),
        ));
    }

    /// Infinite plane `dot(p, normal) = offset`, solid behind the normal.
    pub fn add_plane(&mut self, label: &str, normal: Vec3, offset: f32) {
        let normal = normal.normalize_or_zero();
        self.world.spawn((
            Static,
            Position(normal * offset),
            Collider::Plane { normal, offset },
            Label(label.to_owned()),
        ));
    }

    pub fn len(&self) -> usize {
        self.world.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.world.len() == 0
    }

    /// Sweep an axis-aligned box centred at `center` by `delta`.
    pub fn sweep(&self, center: Vec3, half_extents: Vec3, delta: Vec3) -> Option<SweepHit> {
        let length = delta.length();
        if length <= PARALLEL_EPSILON {
            return None;
        }
        let mut best: Option<SweepHit> = None;

        for (_, (_, position, collider)) in self.world.query::<(&Static, &Position, &Collider)>().iter() {
            let hit = match *collider {
                Collider::Box { half_extents: half } => {
                    sweep_box(center, delta, position.0, half + half_extents)
                }
                Collider::Plane { normal, offset } => {
                    let support = normal.abs().dot(half_extents);
                    sweep_plane(center, delta, normal, offset + support)
                }
            };
            let Some((t, normal, start_penetrating)) = hit else {
                continue;
            };
            let time = (t - SKIN / length).max(0.0);
            if best.map_or(true, |b| time < b.time) {
                best = Some(SweepHit {
                    time,
                    normal,
                    start_penetrating,
                });
            }
        }
        best
    }
}

impl Raycast for LevelGeometry {
    /// The level holds no characters, so `ignore_self` has nothing to skip.
    fn cast(&self, origin: Vec3, destination: Vec3, _ignore_self: bool) -> Option<RayHit> {
        let dir = destination - origin;
        let length = dir.length();
        if length <= PARALLEL_EPSILON {
            return None;
        }
        let mut best: Option<(f32, Vec3, Option<String>)> = None;

        for (_, (_, position, collider, label)) in self
            .world
            .query::<(&Static, &Position, &Collider, Option<&Label>)>()
            .iter()
        {
            let hit = match *collider {
                Collider::Box { half_extents } => {
                    let (min, max) = (position.0 - half_extents, position.0 + half_extents);
                    // Traces starting inside a box do not see it.
                    slab(origin, dir, min, max)
                        .filter(|s| s.enter >= 0.0 && s.enter <= 1.0)
                        .and_then(|s| s.axis.map(|axis| (s.enter, entry_normal(dir, axis))))
                }
                Collider::Plane { normal, offset } => {
                    let start = origin.dot(normal) - offset;
                    let end = destination.dot(normal) - offset;
                    (start >= 0.0 && end < 0.0).then(|| (start / (start - end), normal))
                }
            };
            if let Some((t, normal)) = hit {
                if best.as_ref().map_or(true, |b| t < b.0) {
                    best = Some((t, normal, label.map(|l| l.0.clone())));
                }
            }
        }

        best.map(|(t, normal, label)| {
            trace!(surface = label.as_deref().unwrap_or("?"), t, "trace hit");
            RayHit {
                distance: t * length,
                position: origin + dir * t,
                normal,
            }
        })
    }
}

struct Slab {
    enter: f32,
    exit: f32,
    /// Axis crossed on entry; `None` when the segment never enters through a face.
    axis: Option<usize>,
}

/// Parametric slab test of `origin + dir * t` against an AABB.
fn slab(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<Slab> {
    let mut enter = f32::NEG_INFINITY;
    let mut exit = f32::INFINITY;
    let mut axis = None;

    for a in 0..3 {
        if dir[a].abs() < PARALLEL_EPSILON {
            if origin[a] < min[a] || origin[a] > max[a] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / dir[a];
        let t1 = (min[a] - origin[a]) * inv;
        let t2 = (max[a] - origin[a]) * inv;
        let (near, far) = if t1 < t2 { (t1, t2) } else { (t2, t1) };
        if near > enter {
            enter = near;
            axis = Some(a);
        }
        exit = exit.min(far);
        if enter > exit {
            return None;
        }
    }
    Some(Slab { enter, exit, axis })
}

fn entry_normal(dir: Vec3, axis: usize) -> Vec3 {
    let mut normal = Vec3::ZERO;
    normal[axis] = -dir[axis].signum();
    normal
}

/// Swept point against a box already grown by the mover's half extents.
fn sweep_box(origin: Vec3, delta: Vec3, center: Vec3, half: Vec3) -> Option<(f32, Vec3, bool)> {
    let (min, max) = (center - half, center + half);
    let s = slab(origin, delta, min, max)?;
    if s.exit < 0.0 || s.enter > 1.0 {
        return None;
    }
    if s.enter >= 0.0 {
        let axis = s.axis?;
        return Some((s.enter, entry_normal(delta, axis), false));
    }

    // Started inside: push out through the shallowest face, but only block
    // moves that go deeper.
    let mut normal = Vec3::ZERO;
    let mut depth = f32::INFINITY;
    for a in 0..3 {
        let below = origin[a] - min[a];
        let above = max[a] - origin[a];
        if below < depth {
            depth = below;
            normal = Vec3::ZERO;
            normal[a] = -1.0;
        }
        if above < depth {
            depth = above;
            normal = Vec3::ZERO;
            normal[a] = 1.0;
        }
    }
    (delta.dot(normal) < 0.0).then_some((0.0, normal, true))
}

/// Swept point against the half-space behind a plane at `offset`.
fn sweep_plane(origin: Vec3, delta: Vec3, normal: Vec3, offset: f32) -> Option<(f32, Vec3, bool)> {
    let start = origin.dot(normal) - offset;
    let approach = delta.dot(normal);
    if approach >= 0.0 {
        return None;
    }
    if start < 0.0 {
        return Some((0.0, normal, true));
    }
    let t = start / -approach;
    (t <= 1.0).then_some((t, normal, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level() -> LevelGeometry {
        let mut level = LevelGeometry::new();
        level.add_plane("floor", Vec3::Z, 0.0);
        level.add_box("wall", Vec3::new(150.0, 0.0, 500.0), Vec3::new(100.0, 5000.0, 500.0));
        level
    }

    #[test]
    fn trace_hits_nearest_face() {
        let level = level();
        assert_eq!(level.len(), 2);
        let hit = level
            .cast(Vec3::new(0.0, 0.0, 300.0), Vec3::new(100.0, 0.0, 300.0), true)
            .expect("wall");
        assert!((hit.distance - 50.0).abs() < 1e-4);
        assert_eq!(hit.normal, Vec3::NEG_X);

        let floor = level
            .cast(Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.0, 0.0, -10.0), true)
            .expect("floor");
        assert_eq!(floor.normal, Vec3::Z);
        assert!((floor.position.z).abs() < 1e-4);
    }

    #[test]
    fn trace_misses_short_or_away() {
        let level = level();
        assert!(level.cast(Vec3::new(0.0, 0.0, 300.0), Vec3::new(40.0, 0.0, 300.0), true).is_none());
        assert!(level.cast(Vec3::new(0.0, 0.0, 300.0), Vec3::new(-400.0, 0.0, 300.0), true).is_none());
        // From inside the wall.
        assert!(level.cast(Vec3::new(150.0, 0.0, 300.0), Vec3::new(400.0, 0.0, 300.0), true).is_none());
    }

    #[test]
    fn sweep_stops_short_of_the_wall() {
        let level = level();
        let half = Vec3::new(34.0, 34.0, 88.0);
        let hit = level
            .sweep(Vec3::new(0.0, 0.0, 300.0), half, Vec3::new(32.0, 0.0, 0.0))
            .expect("wall");
        assert!(!hit.start_penetrating);
        assert_eq!(hit.normal, Vec3::NEG_X);
        assert!((hit.time * 32.0 - (16.0 - SKIN)).abs() < 1e-3);

        // Sliding parallel to the face after stopping is unobstructed.
        let touching = Vec3::new(16.0 - SKIN, 0.0, 300.0);
        assert!(level.sweep(touching, half, Vec3::new(0.0, 50.0, 0.0)).is_none());
    }

    #[test]
    fn sweep_lands_on_plane() {
        let level = level();
        let half = Vec3::new(34.0, 34.0, 88.0);
        let hit = level
            .sweep(Vec3::new(-500.0, 0.0, 98.0), half, Vec3::new(0.0, 0.0, -20.0))
            .expect("floor");
        assert_eq!(hit.normal, Vec3::Z);
        assert!((hit.time - (10.0 - SKIN) / 20.0).abs() < 1e-4);
        assert!(level.sweep(Vec3::new(-500.0, 0.0, 98.0), half, Vec3::Z * 20.0).is_none());
    }

    #[test]
    fn penetrating_start_only_blocks_deeper_moves() {
        let level = level();
        let half = Vec3::new(34.0, 34.0, 88.0);
        let inside = Vec3::new(20.0, 0.0, 300.0);
        let hit = level.sweep(inside, half, Vec3::X * 5.0).expect("deeper");
        assert!(hit.start_penetrating);
        assert_eq!(hit.time, 0.0);
        assert!(level.sweep(inside, half, Vec3::NEG_X * 5.0).is_none());
    }
}
