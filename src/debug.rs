//! Visualisation hooks. Shapes go to a [`DebugSink`]; nothing here feeds back
//! into the simulation.

use glam::Vec3;

use crate::components::Phase;
use crate::config::DebugFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const RED: Color = Color(255, 0, 0);
    pub const GREEN: Color = Color(0, 255, 0);
    pub const BLUE: Color = Color(0, 0, 255);
    pub const YELLOW: Color = Color(255, 255, 0);
    pub const CYAN: Color = Color(0, 255, 255);
    pub const ORANGE: Color = Color(243, 156, 18);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DebugShape {
    Arrow { from: Vec3, to: Vec3, color: Color },
    Point { at: Vec3, size: f32, color: Color },
    Capsule { center: Vec3, half_height: f32, radius: f32, color: Color },
}

pub trait DebugSink {
    fn draw(&mut self, shape: DebugShape);
}

/// Discards everything.
pub struct NullSink;

impl DebugSink for NullSink {
    fn draw(&mut self, _shape: DebugShape) {}
}

/// Keeps every shape in order, for tests and offline inspection.
#[derive(Debug, Default)]
pub struct ShapeLog {
    pub shapes: Vec<DebugShape>,
}

impl DebugSink for ShapeLog {
    fn draw(&mut self, shape: DebugShape) {
        self.shapes.push(shape);
    }
}

/// Capsule tint per run phase when state display is on.
pub fn phase_color(phase: Phase) -> Color {
    match phase {
        Phase::Start => Color::GREEN,
        Phase::Mid => Color::YELLOW,
        Phase::End => Color::RED,
    }
}

impl DebugFlags {
    pub fn capsule(&self) -> bool {
        self.show_all || self.show_capsule || self.show_state
    }
    pub fn jumps(&self) -> bool {
        self.show_all || self.show_jumps
    }
    pub fn run_forward(&self) -> bool {
        self.show_all || self.show_run_forward
    }
    pub fn gravity(&self) -> bool {
        self.show_all || self.show_gravity
    }
    pub fn wall_push(&self) -> bool {
        self.show_all || self.show_wall_push
    }
    pub fn wall_normal(&self) -> bool {
        self.show_all || self.show_wall_normal
    }
    pub fn acceleration(&self) -> bool {
        self.show_all || self.show_acceleration
    }
}

/// Arrow of fixed length from `from` along `dir`. Nothing for a zero direction.
pub fn arrow(sink: &mut dyn DebugSink, from: Vec3, dir: Vec3, length: f32, color: Color) {
    let dir = dir.normalize_or_zero();
    if dir != Vec3::ZERO {
        sink.draw(DebugShape::Arrow {
            from,
            to: from + dir * length,
            color,
        });
    }
}
