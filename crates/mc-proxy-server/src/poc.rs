//! Proof of concept: a bee nobody else can see.
//!
//! Typing a chat message containing `BEE` spawns a bee next to the player, on
//! that player's client only. The server never hears of it.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use mc_proxy_api::{
    ClientSession, DirectPacketControl, DirectPacketControlAware, InterceptorError, PacketControl,
    PacketInterceptor, PacketInterceptorRegistry, SessionInterceptor,
};
use mc_proxy_proto::packets::add_entity::entity_type;
use mc_proxy_proto::packets::{AddEntity, SystemChat};
use mc_proxy_proto::{Packet, Uuid};
use tracing::{debug, info};

/// Entity ids handed to phantom bees, far above what a small server allocates.
pub const FIRST_PHANTOM_ENTITY_ID: i32 = 777_000;

const TRIGGER: &str = "BEE";

pub struct PhantomBeeInterceptor {
    position: Mutex<(f64, f64, f64)>,
    next_entity_id: AtomicI32,
    direct: OnceLock<DirectPacketControl>,
}

impl PhantomBeeInterceptor {
    pub fn new() -> Self {
        Self {
            position: Mutex::new((0.0, 0.0, 0.0)),
            next_entity_id: AtomicI32::new(FIRST_PHANTOM_ENTITY_ID),
            direct: OnceLock::new(),
        }
    }

    fn set_position(&self, x: f64, y: f64, z: f64) {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner) = (x, y, z);
    }

    fn spawn_bee(&self) -> AddEntity {
        let (x, y, z) = *self.position.lock().unwrap_or_else(PoisonError::into_inner);
        let entity_id = self.next_entity_id.fetch_add(1, Ordering::Relaxed);
        AddEntity::at(
            entity_id,
            random_uuid(),
            entity_type::BEE,
            x + 2.0,
            y + 1.0,
            z + 2.0,
        )
    }
}

impl Default for PhantomBeeInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

/// Version 4 UUID.
fn random_uuid() -> Uuid {
    let bits: u128 = rand::random();
    let bits = (bits & !(0xf << 76)) | (0x4 << 76);
    let bits = (bits & !(0x3 << 62)) | (0x2 << 62);
    Uuid(bits)
}

impl PacketInterceptor for PhantomBeeInterceptor {
    fn on_client_packet_received(
        &self,
        packet: &Packet,
        control: &mut PacketControl,
    ) -> Result<(), InterceptorError> {
        match packet {
            Packet::MovePlayerPos(p) => self.set_position(p.x, p.y, p.z),
            Packet::MovePlayerPosRot(p) => self.set_position(p.x, p.y, p.z),
            Packet::ChatMessage(chat) if chat.message.contains(TRIGGER) => {
                let bee = self.spawn_bee();
                debug!(
                    "Spawning phantom bee {} at ({:.1}, {:.1}, {:.1})",
                    bee.entity_id, bee.x, bee.y, bee.z
                );
                control.add_packet_to_client(Packet::AddEntity(bee));
            }
            _ => {}
        }
        Ok(())
    }

    fn on_packet_sent_to_client(&self, packet: &Packet) {
        let Packet::AddEntity(entity) = packet else {
            return;
        };
        if entity.entity_type != entity_type::BEE {
            return;
        }
        info!("BEE SPAWN sent to client: entity {}", entity.entity_id);
        if let Some(direct) = self.direct.get() {
            direct.direct_send_packet_to_client(Packet::SystemChat(SystemChat::text(&format!(
                "A bee appeared at ({:.1}, {:.1}, {:.1})",
                entity.x, entity.y, entity.z
            ))));
        }
    }

    fn as_direct_control_aware(&self) -> Option<&dyn DirectPacketControlAware> {
        Some(self)
    }
}

impl DirectPacketControlAware for PhantomBeeInterceptor {
    fn inject_direct_packet_control(&self, control: DirectPacketControl) {
        let _ = self.direct.set(control);
    }
}

/// Gives every session its own [`PhantomBeeInterceptor`], first in the chain.
#[derive(Debug, Default)]
pub struct PhantomBeeSessionInterceptor;

impl SessionInterceptor for PhantomBeeSessionInterceptor {
    fn on_session_added(&self, session: &ClientSession, interceptors: &PacketInterceptorRegistry) {
        debug!("Phantom bees enabled for {}", session.remote_addr());
        interceptors.insert_first(Arc::new(PhantomBeeInterceptor::new()));
    }
}
