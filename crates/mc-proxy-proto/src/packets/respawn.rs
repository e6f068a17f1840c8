//! Respawn (0x41), Server → Client. Sent on death and dimension change.

use bytes::{Buf, BufMut, Bytes};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarInt;

#[derive(Debug, Clone, PartialEq)]
pub struct Respawn {
    pub dimension: String,
    pub min_y: i32,
    pub height: i32,
    pub trailing: Bytes,
}

impl ProtoEncode for Respawn {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.dimension);
        VarInt(self.min_y).proto_encode(buf);
        VarInt(self.height).proto_encode(buf);
        buf.put_slice(&self.trailing);
    }
}

impl ProtoDecode for Respawn {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            dimension: codec::read_string(buf)?,
            min_y: VarInt::proto_decode(buf)?.0,
            height: VarInt::proto_decode(buf)?.0,
            trailing: codec::read_remaining(buf),
        })
    }
}
