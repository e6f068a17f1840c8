//! Player game profiles.

use sha2::{Digest, Sha256};

use crate::types::Uuid;

/// A signed or unsigned profile property such as `textures`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileProperty {
    pub name: String,
    pub value: String,
    pub signature: Option<String>,
}

/// Identity of a player as announced in login success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameProfile {
    pub id: Uuid,
    pub name: String,
    pub properties: Vec<ProfileProperty>,
}

impl GameProfile {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// Profile for a player logging in without authentication.
    pub fn offline(name: &str) -> Self {
        Self::new(offline_uuid(name), name)
    }
}

/// Deterministic id for an unauthenticated player name.
///
/// Name-based: hash of `OfflinePlayer:<name>` with RFC 4122 version 3 and
/// variant bits applied.
pub fn offline_uuid(name: &str) -> Uuid {
    let digest = Sha256::digest(format!("OfflinePlayer:{name}").as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    bytes[6] = (bytes[6] & 0x0F) | 0x30;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;
    Uuid::from_bytes(bytes)
}
