//! Handshake (0x00), Client → Server, handshake phase.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::phase::ProtocolPhase;
use crate::types::VarInt;

/// What the client wants to do after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeIntent {
    Status,
    Login,
}

impl HandshakeIntent {
    pub fn next_phase(self) -> ProtocolPhase {
        match self {
            Self::Status => ProtocolPhase::Status,
            Self::Login => ProtocolPhase::Login,
        }
    }
}

/// First packet on every connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Handshake {
    pub protocol_version: i32,
    pub server_address: String,
    pub server_port: u16,
    pub intent: HandshakeIntent,
}

impl ProtoEncode for Handshake {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.protocol_version).proto_encode(buf);
        codec::write_string(buf, &self.server_address);
        buf.put_u16(self.server_port);
        let intent = match self.intent {
            HandshakeIntent::Status => 1,
            HandshakeIntent::Login => 2,
        };
        VarInt(intent).proto_encode(buf);
    }
}

impl ProtoDecode for Handshake {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let protocol_version = VarInt::proto_decode(buf)?.0;
        let server_address = codec::read_string(buf)?;
        let server_port = codec::read_u16(buf)?;
        let intent = match VarInt::proto_decode(buf)?.0 {
            1 => HandshakeIntent::Status,
            2 => HandshakeIntent::Login,
            other => return Err(ProtoError::UnknownIntent(other)),
        };
        Ok(Self {
            protocol_version,
            server_address,
            server_port,
            intent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn unknown_intent_rejected() {
        let mut buf = BytesMut::new();
        VarInt(763).proto_encode(&mut buf);
        codec::write_string(&mut buf, "localhost");
        buf.put_u16(25565);
        VarInt(3).proto_encode(&mut buf);
        assert!(matches!(
            Handshake::proto_decode(&mut buf.freeze()),
            Err(ProtoError::UnknownIntent(3))
        ));
    }
}
