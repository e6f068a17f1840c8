//! Protocol-level errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("buffer too short: need {needed} more bytes, have {remaining}")]
    BufferTooShort { needed: usize, remaining: usize },

    #[error("VarInt encoding error: {0}")]
    VarInt(#[from] crate::types::VarIntError),

    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    #[error("string too long: {len} bytes (max {max})")]
    StringTooLong { len: usize, max: usize },

    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("decompression error: {0}")]
    DecompressError(String),

    #[error("compression error: {0}")]
    CompressError(String),

    #[error("unknown handshake intent: {0}")]
    UnknownIntent(i32),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
