//! Add entity (0x01), Server → Client. Spawns a non-player entity.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::{Uuid, VarInt};

/// Entity type registry ids used by the proxy.
pub mod entity_type {
    pub const BEE: i32 = 8;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AddEntity {
    pub entity_id: i32,
    pub uuid: Uuid,
    pub entity_type: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Angles in 1/256ths of a full turn.
    pub pitch: i8,
    pub yaw: i8,
    pub head_yaw: i8,
    pub data: i32,
    pub velocity_x: i16,
    pub velocity_y: i16,
    pub velocity_z: i16,
}

impl AddEntity {
    /// A motionless entity facing south.
    pub fn at(entity_id: i32, uuid: Uuid, entity_type: i32, x: f64, y: f64, z: f64) -> Self {
        Self {
            entity_id,
            uuid,
            entity_type,
            x,
            y,
            z,
            pitch: 0,
            yaw: 0,
            head_yaw: 0,
            data: 0,
            velocity_x: 0,
            velocity_y: 0,
            velocity_z: 0,
        }
    }
}

impl ProtoEncode for AddEntity {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.entity_id).proto_encode(buf);
        self.uuid.proto_encode(buf);
        VarInt(self.entity_type).proto_encode(buf);
        buf.put_f64(self.x);
        buf.put_f64(self.y);
        buf.put_f64(self.z);
        buf.put_i8(self.pitch);
        buf.put_i8(self.yaw);
        buf.put_i8(self.head_yaw);
        VarInt(self.data).proto_encode(buf);
        buf.put_i16(self.velocity_x);
        buf.put_i16(self.velocity_y);
        buf.put_i16(self.velocity_z);
    }
}

impl ProtoDecode for AddEntity {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            entity_id: VarInt::proto_decode(buf)?.0,
            uuid: Uuid::proto_decode(buf)?,
            entity_type: VarInt::proto_decode(buf)?.0,
            x: codec::read_f64(buf)?,
            y: codec::read_f64(buf)?,
            z: codec::read_f64(buf)?,
            pitch: codec::read_i8(buf)?,
            yaw: codec::read_i8(buf)?,
            head_yaw: codec::read_i8(buf)?,
            data: VarInt::proto_decode(buf)?.0,
            velocity_x: codec::read_i16(buf)?,
            velocity_y: codec::read_i16(buf)?,
            velocity_z: codec::read_i16(buf)?,
        })
    }
}
