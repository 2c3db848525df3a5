use glam::Vec3;

use crate::components::{Contact, PawnView, Side};
use crate::config::DetectionConfig;
use crate::engine::{RayHit, Raycast};
use crate::math;

/// Outcome of one fan scan on one side.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProbeReport {
    /// First hit within detect distance, closest angle to pawn-forward first.
    pub contact: Option<Contact>,
    /// A hit within the near-wall distance lies across the current heading.
    pub near_wall: bool,
}

/// Fan-raycast wall detector.
///
/// Rays fan out from pawn-forward toward `side` at the interior angles of an
/// even split of a half turn. Each angle traces at head height first, then
/// optionally at foot height.
pub struct WallProbe<'a> {
    cfg: &'a DetectionConfig,
}

impl<'a> WallProbe<'a> {
    pub fn new(cfg: &'a DetectionConfig) -> Self {
        Self { cfg }
    }

    /// `i * 180 / N` for `i` in `1..N`, ascending. Empty when N < 2.
    pub fn fan_angles(&self) -> impl Iterator<Item = f32> {
        let n = self.cfg.rays_per_side;
        let step = if n > 0 { 180.0 / n as f32 } else { 0.0 };
        (1..n).map(move |i| step * i as f32)
    }

    /// Ray length: long enough for both the detect and near-wall checks.
    fn reach(&self) -> f32 {
        self.cfg.detect_distance.max(self.cfg.near_wall_distance)
    }

    /// Scan one side. A missing pawn yields an empty report.
    pub fn trace(
        &self,
        world: &impl Raycast,
        pawn: Option<&PawnView>,
        velocity: Vec3,
        side: Side,
        fallback_to_feet: bool,
    ) -> ProbeReport {
        let mut report = ProbeReport::default();
        let Some(pawn) = pawn else {
            return report;
        };

        let reach = pawn.forward * self.reach();
        let head = pawn.head(self.cfg.head_offset);
        let feet = pawn.head(self.cfg.foot_offset);

        for angle in self.fan_angles() {
            let offset = math::rotate_about_up(reach, angle * side.turn_sign());

            let mut hit = world.cast(head, head + offset, true);
            if hit.is_none() && fallback_to_feet {
                hit = world.cast(feet, feet + offset, true);
            }
            let Some(hit) = hit else {
                continue;
            };

            if !report.near_wall && self.crosses_heading(pawn.location, velocity, &hit) {
                report.near_wall = true;
            }

            if hit.distance <= self.cfg.detect_distance {
                report.contact = Some(Contact::new(side, hit.normal, hit.position));
                return report;
            }
        }
        report
    }

    /// Near-wall test: close enough, and the horizontal velocity ray meets the hit plane.
    fn crosses_heading(&self, location: Vec3, velocity: Vec3, hit: &RayHit) -> bool {
        if hit.distance > self.cfg.near_wall_distance {
            return false;
        }
        let heading = math::horizontal_normal(velocity) * self.cfg.near_wall_velocity_reach;
        math::segment_plane_intersection(location, location + heading, hit.position, hit.normal)
            .is_some()
    }
}
