//! Set health (0x57), Server → Client.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarInt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetHealth {
    pub health: f32,
    pub food: i32,
    pub saturation: f32,
}

impl ProtoEncode for SetHealth {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_f32(self.health);
        VarInt(self.food).proto_encode(buf);
        buf.put_f32(self.saturation);
    }
}

impl ProtoDecode for SetHealth {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            health: codec::read_f32(buf)?,
            food: VarInt::proto_decode(buf)?.0,
            saturation: codec::read_f32(buf)?,
        })
    }
}
