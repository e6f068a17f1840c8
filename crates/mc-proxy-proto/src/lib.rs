//! Minecraft Java Edition packet types and the framing codec used by the proxy.
//!
//! Only the packets the proxy inspects are decoded into typed values; every
//! other game packet travels as [`packet::Packet::Opaque`] and is re-encoded
//! byte for byte.

pub mod codec;
pub mod compression;
pub mod error;
pub mod frame;
pub mod packet;
pub mod packets;
pub mod phase;
pub mod profile;
pub mod section;
pub mod types;

pub use error::ProtoError;
pub use packet::Packet;
pub use phase::{PacketDirection, ProtocolPhase};
pub use profile::GameProfile;
pub use types::{BlockPos, SectionPos, Uuid, VarInt, VarLong};

/// Protocol version spoken by the bundled packet catalog (1.20.1).
pub const PROTOCOL_VERSION: i32 = 763;

/// Human readable game version matching [`PROTOCOL_VERSION`].
pub const GAME_VERSION: &str = "1.20.1";
