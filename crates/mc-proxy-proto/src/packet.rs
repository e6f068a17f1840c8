//! The packet catalog: id tables per phase and direction, and the [`Packet`]
//! value that channels produce and consume.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::packets::{
    AddEntity, BlockUpdate, ChatMessage, Disconnect, ForgetLevelChunk, Handshake, JoinGame,
    KeepAlive, LevelChunk, LoginDisconnect, LoginStart, LoginSuccess, MovePlayerPos,
    MovePlayerPosRot, MovePlayerRot, MovePlayerStatusOnly, PingPayload, PlayerPosition, Respawn,
    SectionBlocksUpdate, SetCompression, SetHealth, StatusResponse, SystemChat,
};
use crate::phase::{PacketDirection, ProtocolPhase};

/// Packet ids, grouped by phase and direction.
pub mod id {
    pub mod handshake {
        pub const HANDSHAKE: i32 = 0x00;
    }

    pub mod status {
        pub const REQUEST: i32 = 0x00;
        pub const PING: i32 = 0x01;
        pub const RESPONSE: i32 = 0x00;
        pub const PONG: i32 = 0x01;
    }

    pub mod login {
        pub const DISCONNECT: i32 = 0x00;
        pub const ENCRYPTION_REQUEST: i32 = 0x01;
        pub const SUCCESS: i32 = 0x02;
        pub const SET_COMPRESSION: i32 = 0x03;
        pub const PLUGIN_REQUEST: i32 = 0x04;

        pub const START: i32 = 0x00;
        pub const ENCRYPTION_RESPONSE: i32 = 0x01;
        pub const PLUGIN_RESPONSE: i32 = 0x02;
    }

    pub mod game {
        pub const ADD_ENTITY: i32 = 0x01;
        pub const BLOCK_UPDATE: i32 = 0x0A;
        pub const DISCONNECT: i32 = 0x1A;
        pub const FORGET_LEVEL_CHUNK: i32 = 0x1E;
        pub const CLIENTBOUND_KEEP_ALIVE: i32 = 0x23;
        pub const LEVEL_CHUNK: i32 = 0x24;
        pub const JOIN_GAME: i32 = 0x28;
        pub const PLAYER_POSITION: i32 = 0x3C;
        pub const RESPAWN: i32 = 0x41;
        pub const SECTION_BLOCKS_UPDATE: i32 = 0x43;
        pub const SET_HEALTH: i32 = 0x57;
        pub const SYSTEM_CHAT: i32 = 0x64;

        pub const CHAT: i32 = 0x05;
        pub const SERVERBOUND_KEEP_ALIVE: i32 = 0x12;
        pub const MOVE_PLAYER_POS: i32 = 0x14;
        pub const MOVE_PLAYER_POS_ROT: i32 = 0x15;
        pub const MOVE_PLAYER_ROT: i32 = 0x16;
        pub const MOVE_PLAYER_STATUS_ONLY: i32 = 0x17;
    }
}

/// A packet the proxy does not interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaquePacket {
    pub phase: ProtocolPhase,
    pub direction: PacketDirection,
    pub id: i32,
    pub body: Bytes,
}

/// Every packet a channel can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    // -- handshake --
    Handshake(Handshake),

    // -- status --
    StatusRequest,
    StatusResponse(StatusResponse),
    PingRequest(PingPayload),
    PongResponse(PingPayload),

    // -- login --
    LoginStart(LoginStart),
    LoginEncryptionRequest(Bytes),
    LoginEncryptionResponse(Bytes),
    LoginPluginRequest(Bytes),
    LoginPluginResponse(Bytes),
    LoginSuccess(LoginSuccess),
    LoginDisconnect(LoginDisconnect),
    SetCompression(SetCompression),

    // -- game, clientbound --
    AddEntity(AddEntity),
    BlockUpdate(BlockUpdate),
    Disconnect(Disconnect),
    ForgetLevelChunk(ForgetLevelChunk),
    ClientboundKeepAlive(KeepAlive),
    LevelChunk(LevelChunk),
    JoinGame(JoinGame),
    PlayerPosition(PlayerPosition),
    Respawn(Respawn),
    SectionBlocksUpdate(SectionBlocksUpdate),
    SetHealth(SetHealth),
    SystemChat(SystemChat),

    // -- game, serverbound --
    ChatMessage(ChatMessage),
    ServerboundKeepAlive(KeepAlive),
    MovePlayerPos(MovePlayerPos),
    MovePlayerPosRot(MovePlayerPosRot),
    MovePlayerRot(MovePlayerRot),
    MovePlayerStatusOnly(MovePlayerStatusOnly),

    Opaque(OpaquePacket),
}

impl Packet {
    /// Decode a packet body received in `phase`, travelling in `direction`.
    ///
    /// Game packets whose typed body fails to parse fall back to
    /// [`Packet::Opaque`] so they can still be forwarded untouched.
    pub fn decode(
        phase: ProtocolPhase,
        direction: PacketDirection,
        packet_id: i32,
        body: Bytes,
    ) -> Result<Self, ProtoError> {
        use PacketDirection::{Clientbound, Serverbound};
        use ProtocolPhase::{Game, Login, Status};

        let mut buf = body.clone();
        let buf = &mut buf;
        let opaque = |body: Bytes| {
            Packet::Opaque(OpaquePacket {
                phase,
                direction,
                id: packet_id,
                body,
            })
        };

        let packet = match (phase, direction, packet_id) {
            (ProtocolPhase::Handshake, Serverbound, id::handshake::HANDSHAKE) => {
                Packet::Handshake(Handshake::proto_decode(buf)?)
            }

            (Status, Serverbound, id::status::REQUEST) => Packet::StatusRequest,
            (Status, Serverbound, id::status::PING) => {
                Packet::PingRequest(PingPayload::proto_decode(buf)?)
            }
            (Status, Clientbound, id::status::RESPONSE) => {
                Packet::StatusResponse(StatusResponse::proto_decode(buf)?)
            }
            (Status, Clientbound, id::status::PONG) => {
                Packet::PongResponse(PingPayload::proto_decode(buf)?)
            }

            (Login, Serverbound, id::login::START) => {
                Packet::LoginStart(LoginStart::proto_decode(buf)?)
            }
            (Login, Serverbound, id::login::ENCRYPTION_RESPONSE) => {
                Packet::LoginEncryptionResponse(body)
            }
            (Login, Serverbound, id::login::PLUGIN_RESPONSE) => Packet::LoginPluginResponse(body),
            (Login, Clientbound, id::login::DISCONNECT) => {
                Packet::LoginDisconnect(LoginDisconnect::proto_decode(buf)?)
            }
            (Login, Clientbound, id::login::ENCRYPTION_REQUEST) => {
                Packet::LoginEncryptionRequest(body)
            }
            (Login, Clientbound, id::login::SUCCESS) => {
                Packet::LoginSuccess(LoginSuccess::proto_decode(buf)?)
            }
            (Login, Clientbound, id::login::SET_COMPRESSION) => {
                Packet::SetCompression(SetCompression::proto_decode(buf)?)
            }
            (Login, Clientbound, id::login::PLUGIN_REQUEST) => Packet::LoginPluginRequest(body),

            (Game, _, _) => match decode_game(direction, packet_id, buf) {
                Ok(Some(packet)) => packet,
                Ok(None) => opaque(body),
                Err(e) => {
                    debug!("Carrying {direction:?} game packet 0x{packet_id:02X} opaquely: {e}");
                    opaque(body)
                }
            },

            _ => opaque(body),
        };
        Ok(packet)
    }

    /// Wire id of this packet within its phase and direction.
    pub fn id(&self) -> i32 {
        match self {
            Packet::Handshake(_) => id::handshake::HANDSHAKE,
            Packet::StatusRequest => id::status::REQUEST,
            Packet::StatusResponse(_) => id::status::RESPONSE,
            Packet::PingRequest(_) => id::status::PING,
            Packet::PongResponse(_) => id::status::PONG,
            Packet::LoginStart(_) => id::login::START,
            Packet::LoginEncryptionRequest(_) => id::login::ENCRYPTION_REQUEST,
            Packet::LoginEncryptionResponse(_) => id::login::ENCRYPTION_RESPONSE,
            Packet::LoginPluginRequest(_) => id::login::PLUGIN_REQUEST,
            Packet::LoginPluginResponse(_) => id::login::PLUGIN_RESPONSE,
            Packet::LoginSuccess(_) => id::login::SUCCESS,
            Packet::LoginDisconnect(_) => id::login::DISCONNECT,
            Packet::SetCompression(_) => id::login::SET_COMPRESSION,
            Packet::AddEntity(_) => id::game::ADD_ENTITY,
            Packet::BlockUpdate(_) => id::game::BLOCK_UPDATE,
            Packet::Disconnect(_) => id::game::DISCONNECT,
            Packet::ForgetLevelChunk(_) => id::game::FORGET_LEVEL_CHUNK,
            Packet::ClientboundKeepAlive(_) => id::game::CLIENTBOUND_KEEP_ALIVE,
            Packet::LevelChunk(_) => id::game::LEVEL_CHUNK,
            Packet::JoinGame(_) => id::game::JOIN_GAME,
            Packet::PlayerPosition(_) => id::game::PLAYER_POSITION,
            Packet::Respawn(_) => id::game::RESPAWN,
            Packet::SectionBlocksUpdate(_) => id::game::SECTION_BLOCKS_UPDATE,
            Packet::SetHealth(_) => id::game::SET_HEALTH,
            Packet::SystemChat(_) => id::game::SYSTEM_CHAT,
            Packet::ChatMessage(_) => id::game::CHAT,
            Packet::ServerboundKeepAlive(_) => id::game::SERVERBOUND_KEEP_ALIVE,
            Packet::MovePlayerPos(_) => id::game::MOVE_PLAYER_POS,
            Packet::MovePlayerPosRot(_) => id::game::MOVE_PLAYER_POS_ROT,
            Packet::MovePlayerRot(_) => id::game::MOVE_PLAYER_ROT,
            Packet::MovePlayerStatusOnly(_) => id::game::MOVE_PLAYER_STATUS_ONLY,
            Packet::Opaque(p) => p.id,
        }
    }

    /// Phase this packet belongs to.
    pub fn phase(&self) -> ProtocolPhase {
        match self {
            Packet::Handshake(_) => ProtocolPhase::Handshake,
            Packet::StatusRequest
            | Packet::StatusResponse(_)
            | Packet::PingRequest(_)
            | Packet::PongResponse(_) => ProtocolPhase::Status,
            Packet::LoginStart(_)
            | Packet::LoginEncryptionRequest(_)
            | Packet::LoginEncryptionResponse(_)
            | Packet::LoginPluginRequest(_)
            | Packet::LoginPluginResponse(_)
            | Packet::LoginSuccess(_)
            | Packet::LoginDisconnect(_)
            | Packet::SetCompression(_) => ProtocolPhase::Login,
            Packet::Opaque(p) => p.phase,
            _ => ProtocolPhase::Game,
        }
    }

    /// Direction this packet travels.
    pub fn direction(&self) -> PacketDirection {
        match self {
            Packet::Handshake(_)
            | Packet::StatusRequest
            | Packet::PingRequest(_)
            | Packet::LoginStart(_)
            | Packet::LoginEncryptionResponse(_)
            | Packet::LoginPluginResponse(_)
            | Packet::ChatMessage(_)
            | Packet::ServerboundKeepAlive(_)
            | Packet::MovePlayerPos(_)
            | Packet::MovePlayerPosRot(_)
            | Packet::MovePlayerRot(_)
            | Packet::MovePlayerStatusOnly(_) => PacketDirection::Serverbound,
            Packet::Opaque(p) => p.direction,
            _ => PacketDirection::Clientbound,
        }
    }

    /// Handshake, status and login packets. These never cross the proxy.
    pub fn is_login_phase(&self) -> bool {
        self.phase() != ProtocolPhase::Game
    }

    /// Short name for logs and traces.
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Handshake(_) => "Handshake",
            Packet::StatusRequest => "StatusRequest",
            Packet::StatusResponse(_) => "StatusResponse",
            Packet::PingRequest(_) => "PingRequest",
            Packet::PongResponse(_) => "PongResponse",
            Packet::LoginStart(_) => "LoginStart",
            Packet::LoginEncryptionRequest(_) => "LoginEncryptionRequest",
            Packet::LoginEncryptionResponse(_) => "LoginEncryptionResponse",
            Packet::LoginPluginRequest(_) => "LoginPluginRequest",
            Packet::LoginPluginResponse(_) => "LoginPluginResponse",
            Packet::LoginSuccess(_) => "LoginSuccess",
            Packet::LoginDisconnect(_) => "LoginDisconnect",
            Packet::SetCompression(_) => "SetCompression",
            Packet::AddEntity(_) => "AddEntity",
            Packet::BlockUpdate(_) => "BlockUpdate",
            Packet::Disconnect(_) => "Disconnect",
            Packet::ForgetLevelChunk(_) => "ForgetLevelChunk",
            Packet::ClientboundKeepAlive(_) => "ClientboundKeepAlive",
            Packet::LevelChunk(_) => "LevelChunk",
            Packet::JoinGame(_) => "JoinGame",
            Packet::PlayerPosition(_) => "PlayerPosition",
            Packet::Respawn(_) => "Respawn",
            Packet::SectionBlocksUpdate(_) => "SectionBlocksUpdate",
            Packet::SetHealth(_) => "SetHealth",
            Packet::SystemChat(_) => "SystemChat",
            Packet::ChatMessage(_) => "ChatMessage",
            Packet::ServerboundKeepAlive(_) => "ServerboundKeepAlive",
            Packet::MovePlayerPos(_) => "MovePlayerPos",
            Packet::MovePlayerPosRot(_) => "MovePlayerPosRot",
            Packet::MovePlayerRot(_) => "MovePlayerRot",
            Packet::MovePlayerStatusOnly(_) => "MovePlayerStatusOnly",
            Packet::Opaque(_) => "Opaque",
        }
    }

    /// Write the packet body (without id) to `buf`.
    pub fn encode_body(&self, buf: &mut impl BufMut) {
        match self {
            Packet::Handshake(p) => p.proto_encode(buf),
            Packet::StatusRequest => {}
            Packet::StatusResponse(p) => p.proto_encode(buf),
            Packet::PingRequest(p) | Packet::PongResponse(p) => p.proto_encode(buf),
            Packet::LoginStart(p) => p.proto_encode(buf),
            Packet::LoginEncryptionRequest(body)
            | Packet::LoginEncryptionResponse(body)
            | Packet::LoginPluginRequest(body)
            | Packet::LoginPluginResponse(body) => buf.put_slice(body),
            Packet::LoginSuccess(p) => p.proto_encode(buf),
            Packet::LoginDisconnect(p) => p.proto_encode(buf),
            Packet::SetCompression(p) => p.proto_encode(buf),
            Packet::AddEntity(p) => p.proto_encode(buf),
            Packet::BlockUpdate(p) => p.proto_encode(buf),
            Packet::Disconnect(p) => p.proto_encode(buf),
            Packet::ForgetLevelChunk(p) => p.proto_encode(buf),
            Packet::ClientboundKeepAlive(p) | Packet::ServerboundKeepAlive(p) => {
                p.proto_encode(buf)
            }
            Packet::LevelChunk(p) => p.proto_encode(buf),
            Packet::JoinGame(p) => p.proto_encode(buf),
            Packet::PlayerPosition(p) => p.proto_encode(buf),
            Packet::Respawn(p) => p.proto_encode(buf),
            Packet::SectionBlocksUpdate(p) => p.proto_encode(buf),
            Packet::SetHealth(p) => p.proto_encode(buf),
            Packet::SystemChat(p) => p.proto_encode(buf),
            Packet::ChatMessage(p) => p.proto_encode(buf),
            Packet::MovePlayerPos(p) => p.proto_encode(buf),
            Packet::MovePlayerPosRot(p) => p.proto_encode(buf),
            Packet::MovePlayerRot(p) => p.proto_encode(buf),
            Packet::MovePlayerStatusOnly(p) => p.proto_encode(buf),
            Packet::Opaque(p) => buf.put_slice(&p.body),
        }
    }

    /// Encoded body as an owned buffer.
    pub fn body_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode_body(&mut buf);
        buf.freeze()
    }
}

fn decode_game(
    direction: PacketDirection,
    packet_id: i32,
    buf: &mut Bytes,
) -> Result<Option<Packet>, ProtoError> {
    use id::game::*;
    let packet = match (direction, packet_id) {
        (PacketDirection::Clientbound, ADD_ENTITY) => {
            Packet::AddEntity(AddEntity::proto_decode(buf)?)
        }
        (PacketDirection::Clientbound, BLOCK_UPDATE) => {
            Packet::BlockUpdate(BlockUpdate::proto_decode(buf)?)
        }
        (PacketDirection::Clientbound, DISCONNECT) => {
            Packet::Disconnect(Disconnect::proto_decode(buf)?)
        }
        (PacketDirection::Clientbound, FORGET_LEVEL_CHUNK) => {
            Packet::ForgetLevelChunk(ForgetLevelChunk::proto_decode(buf)?)
        }
        (PacketDirection::Clientbound, CLIENTBOUND_KEEP_ALIVE) => {
            Packet::ClientboundKeepAlive(KeepAlive::proto_decode(buf)?)
        }
        (PacketDirection::Clientbound, LEVEL_CHUNK) => {
            Packet::LevelChunk(LevelChunk::proto_decode(buf)?)
        }
        (PacketDirection::Clientbound, JOIN_GAME) => Packet::JoinGame(JoinGame::proto_decode(buf)?),
        (PacketDirection::Clientbound, PLAYER_POSITION) => {
            Packet::PlayerPosition(PlayerPosition::proto_decode(buf)?)
        }
        (PacketDirection::Clientbound, RESPAWN) => Packet::Respawn(Respawn::proto_decode(buf)?),
        (PacketDirection::Clientbound, SECTION_BLOCKS_UPDATE) => {
            Packet::SectionBlocksUpdate(SectionBlocksUpdate::proto_decode(buf)?)
        }
        (PacketDirection::Clientbound, SET_HEALTH) => {
            Packet::SetHealth(SetHealth::proto_decode(buf)?)
        }
        (PacketDirection::Clientbound, SYSTEM_CHAT) => {
            Packet::SystemChat(SystemChat::proto_decode(buf)?)
        }
        (PacketDirection::Serverbound, CHAT) => {
            Packet::ChatMessage(ChatMessage::proto_decode(buf)?)
        }
        (PacketDirection::Serverbound, SERVERBOUND_KEEP_ALIVE) => {
            Packet::ServerboundKeepAlive(KeepAlive::proto_decode(buf)?)
        }
        (PacketDirection::Serverbound, MOVE_PLAYER_POS) => {
            Packet::MovePlayerPos(MovePlayerPos::proto_decode(buf)?)
        }
        (PacketDirection::Serverbound, MOVE_PLAYER_POS_ROT) => {
            Packet::MovePlayerPosRot(MovePlayerPosRot::proto_decode(buf)?)
        }
        (PacketDirection::Serverbound, MOVE_PLAYER_ROT) => {
            Packet::MovePlayerRot(MovePlayerRot::proto_decode(buf)?)
        }
        (PacketDirection::Serverbound, MOVE_PLAYER_STATUS_ONLY) => {
            Packet::MovePlayerStatusOnly(MovePlayerStatusOnly::proto_decode(buf)?)
        }
        _ => return Ok(None),
    };
    Ok(Some(packet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::GameProfile;
    use crate::types::BlockPos;

    fn reparse(packet: &Packet) -> Packet {
        Packet::decode(
            packet.phase(),
            packet.direction(),
            packet.id(),
            packet.body_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn login_packets_are_classified() {
        let success = Packet::LoginSuccess(LoginSuccess {
            profile: GameProfile::offline("Steve"),
        });
        assert!(success.is_login_phase());
        assert_eq!(success.direction(), PacketDirection::Clientbound);
        assert!(Packet::SetCompression(SetCompression { threshold: 100 }).is_login_phase());
        assert!(Packet::LoginEncryptionRequest(Bytes::new()).is_login_phase());

        let join = Packet::JoinGame(JoinGame {
            entity_id: 1,
            dimension: "minecraft:overworld".into(),
            min_y: -64,
            height: 384,
            trailing: Bytes::new(),
        });
        assert!(!join.is_login_phase());
    }

    #[test]
    fn same_id_means_different_packets_per_phase() {
        let login = Packet::decode(
            ProtocolPhase::Login,
            PacketDirection::Clientbound,
            0x00,
            Packet::LoginDisconnect(LoginDisconnect::with_message("bye")).body_bytes(),
        )
        .unwrap();
        assert!(matches!(login, Packet::LoginDisconnect(_)));

        let status = Packet::decode(
            ProtocolPhase::Status,
            PacketDirection::Serverbound,
            0x00,
            Bytes::new(),
        )
        .unwrap();
        assert_eq!(status, Packet::StatusRequest);
    }

    #[test]
    fn unknown_game_packets_are_opaque() {
        let body = Bytes::from_static(&[1, 2, 3, 4]);
        let packet = Packet::decode(
            ProtocolPhase::Game,
            PacketDirection::Clientbound,
            0x7F,
            body.clone(),
        )
        .unwrap();
        match &packet {
            Packet::Opaque(p) => {
                assert_eq!(p.id, 0x7F);
                assert_eq!(p.body, body);
            }
            other => panic!("expected opaque, got {other:?}"),
        }
        assert_eq!(packet.body_bytes(), body);
        assert!(!packet.is_login_phase());
    }

    #[test]
    fn malformed_game_packet_falls_back_to_opaque() {
        let body = Bytes::from_static(&[0x01]);
        let packet = Packet::decode(
            ProtocolPhase::Game,
            PacketDirection::Clientbound,
            id::game::SET_HEALTH,
            body.clone(),
        )
        .unwrap();
        assert!(matches!(packet, Packet::Opaque(ref p) if p.body == body));
    }

    #[test]
    fn malformed_login_packet_is_an_error() {
        let result = Packet::decode(
            ProtocolPhase::Login,
            PacketDirection::Serverbound,
            id::login::START,
            Bytes::from_static(&[0x05, b'a']),
        );
        assert!(result.is_err());
    }

    #[test]
    fn typed_game_packets_reparse() {
        let packets = [
            Packet::BlockUpdate(BlockUpdate {
                position: BlockPos::new(100, 60, 100),
                state: 22,
            }),
            Packet::ChatMessage(ChatMessage::new("BEE please")),
            Packet::ServerboundKeepAlive(KeepAlive { id: 42 }),
            Packet::SetHealth(SetHealth {
                health: 18.5,
                food: 17,
                saturation: 2.0,
            }),
        ];
        for packet in packets {
            assert_eq!(reparse(&packet), packet);
        }
    }

    #[test]
    fn keep_alive_ids_differ_by_direction() {
        let cb = Packet::ClientboundKeepAlive(KeepAlive { id: 1 });
        let sb = Packet::ServerboundKeepAlive(KeepAlive { id: 1 });
        assert_ne!(cb.id(), sb.id());
        assert_eq!(cb.direction(), PacketDirection::Clientbound);
        assert_eq!(sb.direction(), PacketDirection::Serverbound);
    }
}
