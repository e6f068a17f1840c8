//! Loaded chunks of the world the player is in.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::chunk::ChunkBlockState;
use crate::position::{BlockChunkPosition, ChunkPosition, AIR};

/// Immutable map of loaded chunk columns.
///
/// Mutators take `self: &Arc<Self>` and return either that same `Arc`, when
/// nothing changed, or a new state with a fresh map whose untouched entries
/// are shared with this one.
#[derive(Debug, Clone, Default)]
pub struct WorldBlockState {
    min_y: i32,
    chunks: HashMap<ChunkPosition, Arc<ChunkBlockState>>,
}

impl WorldBlockState {
    pub fn new(min_y: i32) -> Self {
        Self {
            min_y,
            chunks: HashMap::new(),
        }
    }

    /// Lowest block Y of the current world.
    pub fn min_y(&self) -> i32 {
        self.min_y
    }

    pub fn chunk(&self, position: ChunkPosition) -> Option<&Arc<ChunkBlockState>> {
        self.chunks.get(&position)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Block at world coordinates. Unloaded chunks read as air.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> i32 {
        self.chunks
            .get(&ChunkPosition::for_world(x, z))
            .map_or(AIR, |chunk| chunk.get_block(x, y, z))
    }

    /// Replace the column at `position` wholesale. Blocks changed before the
    /// load are forgotten.
    pub fn place_chunk(self: &Arc<Self>, position: ChunkPosition, chunk: ChunkBlockState) -> Arc<Self> {
        self.with_chunk(position, Arc::new(chunk))
    }

    pub fn unload_chunk(self: &Arc<Self>, position: ChunkPosition) -> Arc<Self> {
        if !self.chunks.contains_key(&position) {
            return Arc::clone(self);
        }
        let mut chunks = self.chunks.clone();
        chunks.remove(&position);
        Arc::new(Self {
            min_y: self.min_y,
            chunks,
        })
    }

    pub fn clear_chunks(self: &Arc<Self>) -> Arc<Self> {
        if self.chunks.is_empty() {
            return Arc::clone(self);
        }
        Arc::new(Self::new(self.min_y))
    }

    /// Chunks loaded afterwards use `min_y`; already loaded ones keep theirs.
    pub fn set_min_y(self: &Arc<Self>, min_y: i32) -> Arc<Self> {
        if self.min_y == min_y {
            return Arc::clone(self);
        }
        Arc::new(Self {
            min_y,
            chunks: self.chunks.clone(),
        })
    }

    /// Change one block. Returns `self` when the block already has that state.
    pub fn update_block(self: &Arc<Self>, x: i32, y: i32, z: i32, state: i32) -> Arc<Self> {
        let position = ChunkPosition::for_world(x, z);
        let chunk = self.chunk_for_update(position);
        if chunk.get_block(x, y, z) == state {
            return Arc::clone(self);
        }
        let updated = chunk.with_changes([(BlockChunkPosition::of_world(x, y, z), state)]);
        self.with_chunk(position, Arc::new(updated))
    }

    /// Change several blocks of one column in a single step. Each change is
    /// `((x, y, z), state)` in world coordinates; later entries win.
    /// A batch that changes nothing returns this same world.
    pub fn update_multiple_blocks(
        self: &Arc<Self>,
        position: ChunkPosition,
        changes: &[((i32, i32, i32), i32)],
    ) -> Arc<Self> {
        if changes
            .iter()
            .all(|&((x, y, z), state)| self.get_block(x, y, z) == state)
        {
            return Arc::clone(self);
        }
        let chunk = self.chunk_for_update(position);
        let updated = chunk.with_changes(
            changes
                .iter()
                .map(|&((x, y, z), state)| (BlockChunkPosition::of_world(x, y, z), state)),
        );
        self.with_chunk(position, Arc::new(updated))
    }

    fn chunk_for_update(&self, position: ChunkPosition) -> Arc<ChunkBlockState> {
        match self.chunks.get(&position) {
            Some(chunk) => Arc::clone(chunk),
            None => {
                // The load is probably still in flight; keep the change anyway.
                warn!("Block update for chunk {position}, which is not loaded");
                Arc::new(ChunkBlockState::empty(position, self.min_y))
            }
        }
    }

    fn with_chunk(&self, position: ChunkPosition, chunk: Arc<ChunkBlockState>) -> Arc<Self> {
        let mut chunks = self.chunks.clone();
        chunks.insert(position, chunk);
        Arc::new(Self {
            min_y: self.min_y,
            chunks,
        })
    }
}
