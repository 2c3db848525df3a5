use glam::Vec3;

use super::LevelGeometry;

/// Where the corridor's runner starts: airborne, 50 units left of the wall face.
pub const SPAWN: Vec3 = Vec3::new(0.0, 0.0, 300.0);

/// X of the wall face the runner meets on its right when facing +Y.
pub const WALL_FACE_X: f32 = 50.0;

/// Floor plus one long wall along +Y, facing -X.
pub fn wall_corridor() -> LevelGeometry {
    let mut level = LevelGeometry::new();
    level.add_plane("floor", Vec3::Z, 0.0);
    level.add_box(
        "right wall",
        Vec3::new(WALL_FACE_X + 100.0, 0.0, 500.0),
        Vec3::new(100.0, 5000.0, 500.0),
    );
    level
}

/// The corridor plus a left wall whose face is at x = -250, for side-to-side wall jumps.
pub fn double_wall() -> LevelGeometry {
    let mut level = wall_corridor();
    level.add_box(
        "left wall",
        Vec3::new(-WALL_FACE_X - 300.0, 0.0, 500.0),
        Vec3::new(100.0, 5000.0, 500.0),
    );
    level
}
