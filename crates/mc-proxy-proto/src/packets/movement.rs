//! Player movement packets.
//!
//! Client → Server: position (0x14), position + rotation (0x15), rotation
//! (0x16), on-ground only (0x17). Server → Client: synchronize player
//! position (0x3C).

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarInt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovePlayerPos {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub on_ground: bool,
}

impl ProtoEncode for MovePlayerPos {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_f64(self.x);
        buf.put_f64(self.y);
        buf.put_f64(self.z);
        buf.put_u8(self.on_ground as u8);
    }
}

impl ProtoDecode for MovePlayerPos {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            x: codec::read_f64(buf)?,
            y: codec::read_f64(buf)?,
            z: codec::read_f64(buf)?,
            on_ground: codec::read_bool(buf)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovePlayerPosRot {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,
}

impl ProtoEncode for MovePlayerPosRot {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_f64(self.x);
        buf.put_f64(self.y);
        buf.put_f64(self.z);
        buf.put_f32(self.yaw);
        buf.put_f32(self.pitch);
        buf.put_u8(self.on_ground as u8);
    }
}

impl ProtoDecode for MovePlayerPosRot {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            x: codec::read_f64(buf)?,
            y: codec::read_f64(buf)?,
            z: codec::read_f64(buf)?,
            yaw: codec::read_f32(buf)?,
            pitch: codec::read_f32(buf)?,
            on_ground: codec::read_bool(buf)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovePlayerRot {
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,
}

impl ProtoEncode for MovePlayerRot {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_f32(self.yaw);
        buf.put_f32(self.pitch);
        buf.put_u8(self.on_ground as u8);
    }
}

impl ProtoDecode for MovePlayerRot {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            yaw: codec::read_f32(buf)?,
            pitch: codec::read_f32(buf)?,
            on_ground: codec::read_bool(buf)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePlayerStatusOnly {
    pub on_ground: bool,
}

impl ProtoEncode for MovePlayerStatusOnly {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.on_ground as u8);
    }
}

impl ProtoDecode for MovePlayerStatusOnly {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            on_ground: codec::read_bool(buf)?,
        })
    }
}

/// Relative-movement flags of [`PlayerPosition`].
pub mod relative {
    pub const X: u8 = 0x01;
    pub const Y: u8 = 0x02;
    pub const Z: u8 = 0x04;
    pub const Y_ROT: u8 = 0x08;
    pub const X_ROT: u8 = 0x10;
}

/// Synchronize player position, Server → Client. Teleports the player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    /// Bit set of [`relative`] flags; set bits are offsets, not absolutes.
    pub relative: u8,
    pub teleport_id: i32,
}

impl PlayerPosition {
    pub fn is_relative(&self, flag: u8) -> bool {
        self.relative & flag != 0
    }
}

impl ProtoEncode for PlayerPosition {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_f64(self.x);
        buf.put_f64(self.y);
        buf.put_f64(self.z);
        buf.put_f32(self.yaw);
        buf.put_f32(self.pitch);
        buf.put_u8(self.relative);
        VarInt(self.teleport_id).proto_encode(buf);
    }
}

impl ProtoDecode for PlayerPosition {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            x: codec::read_f64(buf)?,
            y: codec::read_f64(buf)?,
            z: codec::read_f64(buf)?,
            yaw: codec::read_f32(buf)?,
            pitch: codec::read_f32(buf)?,
            relative: codec::read_u8(buf)?,
            teleport_id: VarInt::proto_decode(buf)?.0,
        })
    }
}
