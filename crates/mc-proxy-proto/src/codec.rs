//! Protocol encoding/decoding traits and helpers.

use bytes::{Buf, BufMut, Bytes};

use crate::error::ProtoError;
use crate::types::VarInt;

/// Longest string the protocol allows, in bytes.
pub const MAX_STRING_LEN: usize = 32767 * 3;

/// Encode a value onto a buffer.
pub trait ProtoEncode {
    fn proto_encode(&self, buf: &mut impl BufMut);
}

/// Decode a value from a buffer.
pub trait ProtoDecode: Sized {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError>;
}

/// Fail with `BufferTooShort` unless `needed` bytes remain.
pub fn ensure_remaining(buf: &impl Buf, needed: usize) -> Result<(), ProtoError> {
    if buf.remaining() < needed {
        return Err(ProtoError::BufferTooShort {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

/// Write a protocol string (VarInt length + UTF-8).
pub fn write_string(buf: &mut impl BufMut, s: &str) {
    VarInt(s.len() as i32).proto_encode(buf);
    buf.put_slice(s.as_bytes());
}

/// Read a protocol string (VarInt length + UTF-8).
pub fn read_string(buf: &mut impl Buf) -> Result<String, ProtoError> {
    let len = read_length(buf)?;
    if len > MAX_STRING_LEN {
        return Err(ProtoError::StringTooLong {
            len,
            max: MAX_STRING_LEN,
        });
    }
    ensure_remaining(buf, len)?;
    let data = buf.copy_to_bytes(len);
    String::from_utf8(data.to_vec()).map_err(|_| ProtoError::InvalidUtf8)
}

/// Read a non-negative VarInt length prefix.
pub fn read_length(buf: &mut impl Buf) -> Result<usize, ProtoError> {
    let len = VarInt::proto_decode(buf)?.0;
    if len < 0 {
        return Err(ProtoError::InvalidData(format!("negative length {len}")));
    }
    Ok(len as usize)
}

/// Write a byte array (VarInt length + bytes).
pub fn write_byte_array(buf: &mut impl BufMut, data: &[u8]) {
    VarInt(data.len() as i32).proto_encode(buf);
    buf.put_slice(data);
}

/// Read a byte array (VarInt length + bytes).
pub fn read_byte_array(buf: &mut impl Buf) -> Result<Bytes, ProtoError> {
    let len = read_length(buf)?;
    ensure_remaining(buf, len)?;
    Ok(buf.copy_to_bytes(len))
}

pub fn read_bool(buf: &mut impl Buf) -> Result<bool, ProtoError> {
    ensure_remaining(buf, 1)?;
    Ok(buf.get_u8() != 0)
}

pub fn read_i8(buf: &mut impl Buf) -> Result<i8, ProtoError> {
    ensure_remaining(buf, 1)?;
    Ok(buf.get_i8())
}

pub fn read_u8(buf: &mut impl Buf) -> Result<u8, ProtoError> {
    ensure_remaining(buf, 1)?;
    Ok(buf.get_u8())
}

pub fn read_i16(buf: &mut impl Buf) -> Result<i16, ProtoError> {
    ensure_remaining(buf, 2)?;
    Ok(buf.get_i16())
}

pub fn read_u16(buf: &mut impl Buf) -> Result<u16, ProtoError> {
    ensure_remaining(buf, 2)?;
    Ok(buf.get_u16())
}

pub fn read_i32(buf: &mut impl Buf) -> Result<i32, ProtoError> {
    ensure_remaining(buf, 4)?;
    Ok(buf.get_i32())
}

pub fn read_i64(buf: &mut impl Buf) -> Result<i64, ProtoError> {
    ensure_remaining(buf, 8)?;
    Ok(buf.get_i64())
}

pub fn read_f32(buf: &mut impl Buf) -> Result<f32, ProtoError> {
    ensure_remaining(buf, 4)?;
    Ok(buf.get_f32())
}

pub fn read_f64(buf: &mut impl Buf) -> Result<f64, ProtoError> {
    ensure_remaining(buf, 8)?;
    Ok(buf.get_f64())
}

/// Take whatever is left in the buffer.
pub fn read_remaining(buf: &mut impl Buf) -> Bytes {
    buf.copy_to_bytes(buf.remaining())
}
