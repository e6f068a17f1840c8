//! Status phase packets: server list ping.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

/// Status response (0x00), Server → Client. Carries the server list JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    pub json: String,
}

impl StatusResponse {
    /// Build the JSON document shown in the client's server list.
    pub fn describe(version_name: &str, protocol: i32, motd: &str, online: u32, max: u32) -> Self {
        let json = serde_json::json!({
            "version": { "name": version_name, "protocol": protocol },
            "players": { "max": max, "online": online },
            "description": { "text": motd },
        });
        Self {
            json: json.to_string(),
        }
    }
}

impl ProtoEncode for StatusResponse {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.json);
    }
}

impl ProtoDecode for StatusResponse {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            json: codec::read_string(buf)?,
        })
    }
}

/// Ping request (0x01, Client → Server) and pong response (0x01, Server → Client).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPayload {
    pub payload: i64,
}

impl ProtoEncode for PingPayload {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i64(self.payload);
    }
}

impl ProtoDecode for PingPayload {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            payload: codec::read_i64(buf)?,
        })
    }
}
