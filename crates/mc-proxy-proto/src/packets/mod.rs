//! Packet bodies, one module per packet family.

pub mod add_entity;
pub mod block_update;
pub mod chat;
pub mod disconnect;
pub mod handshake;
pub mod join_game;
pub mod keep_alive;
pub mod level_chunk;
pub mod login;
pub mod movement;
pub mod respawn;
pub mod set_health;
pub mod status;

pub use add_entity::AddEntity;
pub use block_update::{BlockChange, BlockUpdate, SectionBlocksUpdate};
pub use chat::{ChatMessage, SystemChat};
pub use disconnect::Disconnect;
pub use handshake::{Handshake, HandshakeIntent};
pub use join_game::JoinGame;
pub use keep_alive::KeepAlive;
pub use level_chunk::{ForgetLevelChunk, LevelChunk};
pub use login::{LoginDisconnect, LoginStart, LoginSuccess, SetCompression};
pub use movement::{MovePlayerPos, MovePlayerPosRot, MovePlayerRot, MovePlayerStatusOnly, PlayerPosition};
pub use respawn::Respawn;
pub use set_health::SetHealth;
pub use status::{PingPayload, StatusResponse};
