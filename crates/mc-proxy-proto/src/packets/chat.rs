//! Chat packets and JSON text component helpers.

use bytes::{Buf, BufMut, Bytes};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

/// Wrap plain text into a JSON text component.
pub fn text_component(text: &str) -> String {
    serde_json::json!({ "text": text }).to_string()
}

/// Flatten a JSON text component into plain text. Non-JSON input is returned as-is.
pub fn plain_text(component: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(component) {
        Ok(value) => {
            let mut out = String::new();
            collect_text(&value, &mut out);
            out
        }
        Err(_) => component.to_string(),
    }
}

fn collect_text(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::String(s) => out.push_str(s),
        serde_json::Value::Array(parts) => parts.iter().for_each(|p| collect_text(p, out)),
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(text)) = map.get("text") {
                out.push_str(text);
            }
            if let Some(extra) = map.get("extra") {
                collect_text(extra, out);
            }
        }
        _ => {}
    }
}

/// Chat message (0x05), Client → Server.
///
/// Signature data following the message is carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub message: String,
    pub trailing: Bytes,
}

impl ChatMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trailing: Bytes::new(),
        }
    }
}

impl ProtoEncode for ChatMessage {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.message);
        buf.put_slice(&self.trailing);
    }
}

impl ProtoDecode for ChatMessage {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            message: codec::read_string(buf)?,
            trailing: codec::read_remaining(buf),
        })
    }
}

/// System chat (0x64), Server → Client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemChat {
    /// JSON text component.
    pub content: String,
    /// Shown above the hotbar instead of in the chat window.
    pub overlay: bool,
}

impl SystemChat {
    pub fn text(message: &str) -> Self {
        Self {
            content: text_component(message),
            overlay: false,
        }
    }
}

impl ProtoEncode for SystemChat {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_string(buf, &self.content);
        buf.put_u8(self.overlay as u8);
    }
}

impl ProtoDecode for SystemChat {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            content: codec::read_string(buf)?,
            overlay: codec::read_bool(buf)?,
        })
    }
}
