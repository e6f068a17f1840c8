//! Join game (0x28), Server → Client. First game phase packet.
//!
//! Only the fields the proxy tracks are decoded; the remainder of the body
//! is carried verbatim in `trailing`.

use bytes::{Buf, BufMut, Bytes};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarInt;

#[derive(Debug, Clone, PartialEq)]
pub struct JoinGame {
    pub entity_id: i32,
    pub dimension: String,
    /// Lowest block Y of the dimension.
    pub min_y: i32,
    /// Build height of the dimension, in blocks.
    pub height: i32,
    pub trailing: Bytes,
}

impl ProtoEncode for JoinGame {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i32(self.entity_id);
        codec::write_string(buf, &self.dimension);
        VarInt(self.min_y).proto_encode(buf);
        VarInt(self.height).proto_encode(buf);
        buf.put_slice(&self.trailing);
    }
}

impl ProtoDecode for JoinGame {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            entity_id: codec::read_i32(buf)?,
            dimension: codec::read_string(buf)?,
            min_y: VarInt::proto_decode(buf)?.0,
            height: VarInt::proto_decode(buf)?.0,
            trailing: codec::read_remaining(buf),
        })
    }
}
