//! Disconnect (0x1A), Server → Client, game phase.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::packets::chat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    /// JSON text component.
    pub reason: String,
}

impl Disconnect {
    pub fn with_message(message: &str) -> Self {
        Self {
            reason: chat::text_component(message),
        }
    }
}

impl ProtoEncode for Disconnect {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.reason);
    }
}

impl ProtoDecode for Disconnect {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            reason: codec::read_string(buf)?,
        })
    }
}
