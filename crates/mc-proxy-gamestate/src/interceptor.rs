//! Interceptors that keep a session's game state up to date from its traffic.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use mc_proxy_api::{
    ClientSession, GameProfileAware, InterceptorError, PacketControl, PacketInterceptor,
    PacketInterceptorRegistry, SessionInterceptor,
};
use mc_proxy_proto::packets::movement::relative;
use mc_proxy_proto::packets::PlayerPosition;
use mc_proxy_proto::{GameProfile, Packet};
use tracing::debug;

use crate::chunk::ChunkBlockState;
use crate::position::{ChunkPosition, Position, Rotation};
use crate::tracker::{GameStateListener, GameStateTracker};

/// Feeds one session's packets into a [`GameStateTracker`]. Never alters traffic.
pub struct GameStateTrackingInterceptor {
    tracker: Arc<GameStateTracker>,
}

impl GameStateTrackingInterceptor {
    pub fn new(tracker: Arc<GameStateTracker>) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &Arc<GameStateTracker> {
        &self.tracker
    }

    fn position_synced(&self, sync: &PlayerPosition) {
        self.tracker.update(|state| {
            let old_position = state.position().unwrap_or_default();
            let old_rotation = state.rotation().unwrap_or_default();
            let axis = |flag, old: f64, new: f64| {
                if sync.is_relative(flag) {
                    old + new
                } else {
                    new
                }
            };
            let position = Position::new(
                axis(relative::X, old_position.x, sync.x),
                axis(relative::Y, old_position.y, sync.y),
                axis(relative::Z, old_position.z, sync.z),
            );
            let rotation = Rotation::new(
                axis(relative::Y_ROT, old_rotation.yaw, sync.yaw as f64),
                axis(relative::X_ROT, old_rotation.pitch, sync.pitch as f64),
                0.0,
            );
            state.with_position_rotation(position, rotation, None)
        });
    }
}

impl PacketInterceptor for GameStateTrackingInterceptor {
    fn on_client_packet_received(
        &self,
        packet: &Packet,
        _control: &mut PacketControl,
    ) -> Result<(), InterceptorError> {
        match packet {
            Packet::MovePlayerPos(moved) => {
                let position = Position::new(moved.x, moved.y, moved.z);
                self.tracker
                    .update(|state| state.with_position(position, Some(moved.on_ground)));
            }
            Packet::MovePlayerRot(turned) => {
                let rotation = Rotation::player(turned.yaw, turned.pitch);
                self.tracker
                    .update(|state| state.with_rotation(rotation, Some(turned.on_ground)));
            }
            Packet::MovePlayerPosRot(moved) => {
                let position = Position::new(moved.x, moved.y, moved.z);
                let rotation = Rotation::player(moved.yaw, moved.pitch);
                self.tracker.update(|state| {
                    state.with_position_rotation(position, rotation, Some(moved.on_ground))
                });
            }
            Packet::MovePlayerStatusOnly(status) => {
                self.tracker
                    .update(|state| state.with_on_ground(status.on_ground));
            }
            _ => {}
        }
        Ok(())
    }

    fn on_server_packet_received(
        &self,
        packet: &Packet,
        _control: &mut PacketControl,
    ) -> Result<(), InterceptorError> {
        match packet {
            Packet::PlayerPosition(sync) => self.position_synced(sync),
            Packet::JoinGame(join) => {
                debug!(
                    "Joined {} as entity {} (min y {}, height {})",
                    join.dimension, join.entity_id, join.min_y, join.height
                );
                self.tracker.update(|state| {
                    state.with_entity_id(join.entity_id).with_min_y(join.min_y)
                });
            }
            Packet::Respawn(respawn) => {
                debug!("Respawn into {}", respawn.dimension);
                self.tracker
                    .update(|state| state.clear_chunks().with_min_y(respawn.min_y));
            }
            Packet::SetHealth(health) => {
                self.tracker.update(|state| {
                    state.with_health(health.health, health.saturation, health.food)
                });
            }
            Packet::LevelChunk(chunk) => {
                let sections = chunk.sections()?;
                let position = ChunkPosition::from_chunk_coords(chunk.chunk_x, chunk.chunk_z);
                self.tracker.update(|state| {
                    let min_y = state.world().min_y();
                    state.chunk_loaded(ChunkBlockState::from_sections(position, min_y, sections))
                });
            }
            Packet::ForgetLevelChunk(forget) => {
                let position = ChunkPosition::from_chunk_coords(forget.chunk_x, forget.chunk_z);
                self.tracker.update(|state| state.chunk_unloaded(position));
            }
            Packet::BlockUpdate(update) => {
                let pos = update.position;
                self.tracker
                    .update(|state| state.block_changed(pos.x, pos.y, pos.z, update.state));
            }
            Packet::SectionBlocksUpdate(update) => {
                let position = ChunkPosition::from_chunk_coords(update.section.x, update.section.z);
                let changes: Vec<_> = update
                    .changes
                    .iter()
                    .map(|change| {
                        let pos = change.position;
                        ((pos.x, pos.y, pos.z), change.state)
                    })
                    .collect();
                self.tracker
                    .update(|state| state.blocks_changed(position, &changes));
            }
            _ => {}
        }
        Ok(())
    }

    fn as_game_profile_aware(&self) -> Option<&dyn GameProfileAware> {
        Some(self)
    }
}

impl GameProfileAware for GameStateTrackingInterceptor {
    fn inject_game_profile(&self, profile: &GameProfile) {
        self.tracker
            .update(|state| state.with_profile(&profile.name, profile.id));
    }
}

/// Adds a [`GameStateTrackingInterceptor`] to every new session and keeps
/// its tracker reachable by the client's address while the session lives.
#[derive(Default)]
pub struct GameStateTrackingSessionInterceptor {
    listener: Option<Arc<dyn GameStateListener>>,
    trackers: Mutex<HashMap<SocketAddr, Arc<GameStateTracker>>>,
}

impl GameStateTrackingSessionInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every session's tracker reports to `listener`.
    pub fn with_listener(listener: Arc<dyn GameStateListener>) -> Self {
        Self {
            listener: Some(listener),
            trackers: Mutex::default(),
        }
    }

    pub fn tracker_for(&self, client: SocketAddr) -> Option<Arc<GameStateTracker>> {
        self.trackers().get(&client).cloned()
    }

    fn trackers(&self) -> std::sync::MutexGuard<'_, HashMap<SocketAddr, Arc<GameStateTracker>>> {
        self.trackers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionInterceptor for GameStateTrackingSessionInterceptor {
    fn on_session_added(&self, session: &ClientSession, interceptors: &PacketInterceptorRegistry) {
        let tracker = Arc::new(match &self.listener {
            Some(listener) => GameStateTracker::with_listener(Arc::clone(listener)),
            None => GameStateTracker::new(),
        });
        self.trackers()
            .insert(session.remote_addr(), Arc::clone(&tracker));
        interceptors.add_at_end(Arc::new(GameStateTrackingInterceptor::new(tracker)));
    }

    fn on_session_removed(&self, session: &ClientSession) {
        self.trackers().remove(&session.remote_addr());
    }
}
