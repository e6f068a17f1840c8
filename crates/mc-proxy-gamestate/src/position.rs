//! Coordinates used by the game state.

use std::fmt;

/// Width and depth of a chunk column, in blocks.
pub const CHUNK_SIZE: i32 = 16;

/// Block state id of air.
pub const AIR: i32 = 0;

/// A point in the world.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// Where the player is looking. Players never roll, so `roll` stays 0 for them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotation {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl Rotation {
    pub fn new(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self { yaw, pitch, roll }
    }

    pub fn player(yaw: f32, pitch: f32) -> Self {
        Self::new(yaw as f64, pitch as f64, 0.0)
    }
}

/// A chunk column, addressed by its minimum world X and Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPosition {
    pub x: i32,
    pub z: i32,
}

impl ChunkPosition {
    /// `x` and `z` must already be multiples of [`CHUNK_SIZE`].
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The column holding world column `(x, z)`.
    pub fn for_world(x: i32, z: i32) -> Self {
        Self::new(chunk_origin(x), chunk_origin(z))
    }

    /// The column with chunk indices `(chunk_x, chunk_z)` as used on the wire.
    pub fn from_chunk_coords(chunk_x: i32, chunk_z: i32) -> Self {
        Self::new(chunk_x * CHUNK_SIZE, chunk_z * CHUNK_SIZE)
    }
}

impl fmt::Display for ChunkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// Minimum world coordinate of the chunk holding `coord`. Rounds toward
/// negative infinity, so -100 lands in the chunk starting at -112.
pub fn chunk_origin(coord: i32) -> i32 {
    coord.div_euclid(CHUNK_SIZE) * CHUNK_SIZE
}

/// A block inside a chunk column: X and Z relative to the column, Y absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockChunkPosition {
    pub x: u8,
    pub y: i32,
    pub z: u8,
}

impl BlockChunkPosition {
    /// Position of world block `(x, y, z)` inside its column.
    pub fn of_world(x: i32, y: i32, z: i32) -> Self {
        Self {
            x: x.rem_euclid(CHUNK_SIZE) as u8,
            y,
            z: z.rem_euclid(CHUNK_SIZE) as u8,
        }
    }
}
