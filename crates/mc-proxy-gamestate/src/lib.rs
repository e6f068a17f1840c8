//! What the proxy knows about the player and the world around it.
//!
//! Every snapshot is immutable. Mutators hand back a new snapshot that shares
//! whatever did not change with the old one, or the old one itself when the
//! update changes nothing.

pub mod chunk;
pub mod interceptor;
pub mod position;
pub mod state;
pub mod tracker;
pub mod world;

pub use chunk::{BlockSection, ChunkBlockState};
pub use interceptor::{GameStateTrackingInterceptor, GameStateTrackingSessionInterceptor};
pub use position::{BlockChunkPosition, ChunkPosition, Position, Rotation, AIR, CHUNK_SIZE};
pub use state::MinecraftGameState;
pub use tracker::{GameStateListener, GameStateTracker};
pub use world::WorldBlockState;
