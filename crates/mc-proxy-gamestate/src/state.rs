use std::sync::Arc;

use mc_proxy_proto::Uuid;

use crate::chunk::ChunkBlockState;
use crate::position::{ChunkPosition, Position, Rotation};
use crate::world::WorldBlockState;

/// Immutable snapshot of the player and the loaded world.
///
/// Every `with_*`/world method returns `Arc<Self>`: the same `Arc` when the
/// update changes nothing, otherwise a new snapshot sharing all untouched
/// parts, the world included.
#[derive(Debug, Clone)]
pub struct MinecraftGameState {
    player_name: Option<String>,
    player_uuid: Option<Uuid>,
    entity_id: i32,
    position: Option<Position>,
    on_ground: bool,
    rotation: Option<Rotation>,
    health: f32,
    saturation: f32,
    food: i32,
    world: Arc<WorldBlockState>,
}

impl Default for MinecraftGameState {
    fn default() -> Self {
        Self {
            player_name: None,
            player_uuid: None,
            entity_id: -1,
            position: None,
            on_ground: true,
            rotation: None,
            health: 20.0,
            saturation: 0.0,
            food: 20,
            world: Arc::new(WorldBlockState::default()),
        }
    }
}

impl MinecraftGameState {
    pub fn initial() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn player_name(&self) -> Option<&str> {
        self.player_name.as_deref()
    }

    pub fn player_uuid(&self) -> Option<Uuid> {
        self.player_uuid
    }

    pub fn entity_id(&self) -> i32 {
        self.entity_id
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn on_ground(&self) -> bool {
        self.on_ground
    }

    pub fn rotation(&self) -> Option<Rotation> {
        self.rotation
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn saturation(&self) -> f32 {
        self.saturation
    }

    pub fn food(&self) -> i32 {
        self.food
    }

    pub fn world(&self) -> &Arc<WorldBlockState> {
        &self.world
    }

    pub fn with_profile(self: &Arc<Self>, name: &str, uuid: Uuid) -> Arc<Self> {
        if self.player_name.as_deref() == Some(name) && self.player_uuid == Some(uuid) {
            return Arc::clone(self);
        }
        self.modify(|state| {
            state.player_name = Some(name.to_owned());
            state.player_uuid = Some(uuid);
        })
    }

    pub fn with_entity_id(self: &Arc<Self>, entity_id: i32) -> Arc<Self> {
        if self.entity_id == entity_id {
            return Arc::clone(self);
        }
        self.modify(|state| state.entity_id = entity_id)
    }

    /// `on_ground` of `None` keeps the current flag.
    pub fn with_position(self: &Arc<Self>, position: Position, on_ground: Option<bool>) -> Arc<Self> {
        if self.position == Some(position) && !self.on_ground_changes(on_ground) {
            return Arc::clone(self);
        }
        self.modify(|state| {
            state.position = Some(position);
            state.on_ground = on_ground.unwrap_or(state.on_ground);
        })
    }

    pub fn with_rotation(self: &Arc<Self>, rotation: Rotation, on_ground: Option<bool>) -> Arc<Self> {
        if self.rotation == Some(rotation) && !self.on_ground_changes(on_ground) {
            return Arc::clone(self);
        }
        self.modify(|state| {
            state.rotation = Some(rotation);
            state.on_ground = on_ground.unwrap_or(state.on_ground);
        })
    }

    pub fn with_position_rotation(
        self: &Arc<Self>,
        position: Position,
        rotation: Rotation,
        on_ground: Option<bool>,
    ) -> Arc<Self> {
        self.with_position(position, on_ground)
            .with_rotation(rotation, None)
    }

    pub fn with_on_ground(self: &Arc<Self>, on_ground: bool) -> Arc<Self> {
        if self.on_ground == on_ground {
            return Arc::clone(self);
        }
        self.modify(|state| state.on_ground = on_ground)
    }

    pub fn with_health(self: &Arc<Self>, health: f32, saturation: f32, food: i32) -> Arc<Self> {
        if self.health == health && self.saturation == saturation && self.food == food {
            return Arc::clone(self);
        }
        self.modify(|state| {
            state.health = health;
            state.saturation = saturation;
            state.food = food;
        })
    }

    pub fn with_min_y(self: &Arc<Self>, min_y: i32) -> Arc<Self> {
        self.with_world(self.world.set_min_y(min_y))
    }

    /// Load a chunk using the world's current minimum Y.
    pub fn chunk_loaded(self: &Arc<Self>, chunk: ChunkBlockState) -> Arc<Self> {
        self.with_world(self.world.place_chunk(chunk.position(), chunk))
    }

    pub fn chunk_unloaded(self: &Arc<Self>, position: ChunkPosition) -> Arc<Self> {
        self.with_world(self.world.unload_chunk(position))
    }

    pub fn clear_chunks(self: &Arc<Self>) -> Arc<Self> {
        self.with_world(self.world.clear_chunks())
    }

    pub fn block_changed(self: &Arc<Self>, x: i32, y: i32, z: i32, state: i32) -> Arc<Self> {
        self.with_world(self.world.update_block(x, y, z, state))
    }

    pub fn blocks_changed(
        self: &Arc<Self>,
        position: ChunkPosition,
        changes: &[((i32, i32, i32), i32)],
    ) -> Arc<Self> {
        self.with_world(self.world.update_multiple_blocks(position, changes))
    }

    fn with_world(self: &Arc<Self>, world: Arc<WorldBlockState>) -> Arc<Self> {
        if Arc::ptr_eq(&self.world, &world) {
            return Arc::clone(self);
        }
        self.modify(|state| state.world = world)
    }

    fn on_ground_changes(&self, on_ground: Option<bool>) -> bool {
        on_ground.is_some_and(|value| value != self.on_ground)
    }

    /// Shallow copy with one change applied; the world and strings are shared
    /// or cheaply cloned.
    fn modify(self: &Arc<Self>, change: impl FnOnce(&mut Self)) -> Arc<Self> {
        let mut next = (**self).clone();
        change(&mut next);
        Arc::new(next)
    }
}
