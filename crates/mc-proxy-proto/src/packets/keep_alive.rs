//! Keep alive, Server → Client (0x23) and Client → Server (0x12), game phase.
//!
//! The server sends an id; the client must echo it back.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlive {
    pub id: i64,
}

impl ProtoEncode for KeepAlive {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i64(self.id);
    }
}

impl ProtoDecode for KeepAlive {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            id: codec::read_i64(buf)?,
        })
    }
}
