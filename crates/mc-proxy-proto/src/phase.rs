//! Connection phases and packet directions.

use std::fmt;

/// Phase of a connection; packet ids are only meaningful within one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolPhase {
    Handshake,
    Status,
    Login,
    Game,
}

impl ProtocolPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Handshake => "handshake",
            Self::Status => "status",
            Self::Login => "login",
            Self::Game => "game",
        }
    }
}

impl fmt::Display for ProtocolPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which way a packet travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketDirection {
    /// Server → client.
    Clientbound,
    /// Client → server.
    Serverbound,
}

impl PacketDirection {
    pub fn opposite(self) -> Self {
        match self {
            Self::Clientbound => Self::Serverbound,
            Self::Serverbound => Self::Clientbound,
        }
    }
}
