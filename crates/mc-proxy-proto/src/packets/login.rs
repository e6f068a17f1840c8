//! Login phase packets.
//!
//! Encryption and plugin messages are not interpreted; they travel as raw
//! bodies so the login filter can still recognise them.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::packets::chat;
use crate::profile::{GameProfile, ProfileProperty};
use crate::types::{Uuid, VarInt};

/// Login start (0x00), Client → Server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginStart {
    pub name: String,
    pub profile_id: Option<Uuid>,
}

impl ProtoEncode for LoginStart {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.name);
        match self.profile_id {
            Some(id) => {
                buf.put_u8(1);
                id.proto_encode(buf);
            }
            None => buf.put_u8(0),
        }
    }
}

impl ProtoDecode for LoginStart {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let name = codec::read_string(buf)?;
        let profile_id = if codec::read_bool(buf)? {
            Some(Uuid::proto_decode(buf)?)
        } else {
            None
        };
        Ok(Self { name, profile_id })
    }
}

/// Login success (0x02), Server → Client. Ends the login phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    pub profile: GameProfile,
}

impl ProtoEncode for LoginSuccess {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        self.profile.id.proto_encode(buf);
        codec::write_string(buf, &self.profile.name);
        VarInt(self.profile.properties.len() as i32).proto_encode(buf);
        for property in &self.profile.properties {
            codec::write_string(buf, &property.name);
            codec::write_string(buf, &property.value);
            match &property.signature {
                Some(signature) => {
                    buf.put_u8(1);
                    codec::write_string(buf, signature);
                }
                None => buf.put_u8(0),
            }
        }
    }
}

impl ProtoDecode for LoginSuccess {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let id = Uuid::proto_decode(buf)?;
        let name = codec::read_string(buf)?;
        let count = codec::read_length(buf)?;
        let mut properties = Vec::with_capacity(count.min(16));
        for _ in 0..count {
            let name = codec::read_string(buf)?;
            let value = codec::read_string(buf)?;
            let signature = if codec::read_bool(buf)? {
                Some(codec::read_string(buf)?)
            } else {
                None
            };
            properties.push(ProfileProperty {
                name,
                value,
                signature,
            });
        }
        Ok(Self {
            profile: GameProfile {
                id,
                name,
                properties,
            },
        })
    }
}

/// Login disconnect (0x00), Server → Client. Reason is a JSON text component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginDisconnect {
    pub reason: String,
}

impl LoginDisconnect {
    pub fn with_message(message: &str) -> Self {
        Self {
            reason: chat::text_component(message),
        }
    }
}

impl ProtoEncode for LoginDisconnect {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.reason);
    }
}

impl ProtoDecode for LoginDisconnect {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            reason: codec::read_string(buf)?,
        })
    }
}

/// Set compression (0x03), Server → Client. Negative threshold disables compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetCompression {
    pub threshold: i32,
}

impl ProtoEncode for SetCompression {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.threshold).proto_encode(buf);
    }
}

impl ProtoDecode for SetCompression {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            threshold: VarInt::proto_decode(buf)?.0,
        })
    }
}
