//! Block contents of one chunk column.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use mc_proxy_proto::section::ChunkSection;

use crate::position::{BlockChunkPosition, ChunkPosition, AIR, CHUNK_SIZE};

/// Read access to a 16x16x16 section, coordinates local to the section.
pub trait BlockSection: fmt::Debug + Send + Sync {
    fn block_at(&self, x: usize, y: usize, z: usize) -> i32;
}

impl BlockSection for ChunkSection {
    fn block_at(&self, x: usize, y: usize, z: usize) -> i32 {
        self.get(x, y, z)
    }
}

/// Sections of a column, bottom first. `None` marks a section that never arrived.
pub type Sections = Arc<[Option<Arc<dyn BlockSection>>]>;

/// One loaded chunk column: the sections it arrived with plus every block
/// changed since.
#[derive(Debug, Clone)]
pub struct ChunkBlockState {
    position: ChunkPosition,
    min_y: i32,
    sections: Sections,
    overrides: HashMap<BlockChunkPosition, i32>,
}

impl ChunkBlockState {
    pub fn new(position: ChunkPosition, min_y: i32, sections: Sections) -> Self {
        Self {
            position,
            min_y,
            sections,
            overrides: HashMap::new(),
        }
    }

    /// A column without any section data. Everything reads as air until changed.
    pub fn empty(position: ChunkPosition, min_y: i32) -> Self {
        Self::new(position, min_y, Arc::from(Vec::new()))
    }

    /// Build from decoded wire sections.
    pub fn from_sections(position: ChunkPosition, min_y: i32, sections: Vec<ChunkSection>) -> Self {
        let sections: Vec<Option<Arc<dyn BlockSection>>> = sections
            .into_iter()
            .map(|section| Some(Arc::new(section) as Arc<dyn BlockSection>))
            .collect();
        Self::new(position, min_y, Arc::from(sections))
    }

    pub fn position(&self) -> ChunkPosition {
        self.position
    }

    pub fn min_y(&self) -> i32 {
        self.min_y
    }

    pub fn sections(&self) -> &Sections {
        &self.sections
    }

    pub fn overrides(&self) -> &HashMap<BlockChunkPosition, i32> {
        &self.overrides
    }

    /// Block at world coordinates. `x` and `z` must fall inside this column.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> i32 {
        if y < self.min_y {
            return AIR;
        }
        let relative = BlockChunkPosition::of_world(x, y, z);
        if let Some(&state) = self.overrides.get(&relative) {
            return state;
        }

        let above_min = (y - self.min_y) as usize;
        let size = CHUNK_SIZE as usize;
        match self.sections.get(above_min / size) {
            Some(Some(section)) => section.block_at(
                relative.x as usize,
                above_min % size,
                relative.z as usize,
            ),
            _ => AIR,
        }
    }

    /// Copy of this column with `changes` recorded on top, later entries
    /// winning. Sections are shared, not copied.
    pub fn with_changes(&self, changes: impl IntoIterator<Item = (BlockChunkPosition, i32)>) -> Self {
        let mut overrides = self.overrides.clone();
        overrides.extend(changes);
        Self {
            position: self.position,
            min_y: self.min_y,
            sections: Arc::clone(&self.sections),
            overrides,
        }
    }
}
