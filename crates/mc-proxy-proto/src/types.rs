//! Base data types used throughout the Java Edition protocol.

use std::fmt;

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{ensure_remaining, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum VarIntError {
    #[error("buffer too short")]
    BufferTooShort,
    #[error("VarInt is too long (more than {max_bytes} bytes)")]
    TooManyBytes { max_bytes: usize },
}

// ---------------------------------------------------------------------------
// VarInt (i32, two's complement LEB128, no ZigZag)
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VarInt(pub i32);

impl VarInt {
    /// Maximum bytes a VarInt can occupy.
    pub const MAX_BYTES: usize = 5;

    /// Number of bytes `value` occupies on the wire.
    pub fn encoded_len(value: i32) -> usize {
        let mut value = value as u32;
        let mut len = 1;
        while value & !0x7F != 0 {
            value >>= 7;
            len += 1;
        }
        len
    }

    /// Decode from a byte slice. Returns the value and the number of bytes consumed.
    ///
    /// `BufferTooShort` means the slice ends before the final byte, which the
    /// frame reader uses to wait for more input.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), VarIntError> {
        let mut result: u32 = 0;
        for (i, &byte) in buf.iter().enumerate() {
            if i >= Self::MAX_BYTES {
                return Err(VarIntError::TooManyBytes {
                    max_bytes: Self::MAX_BYTES,
                });
            }
            result |= ((byte & 0x7F) as u32) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok((VarInt(result as i32), i + 1));
            }
        }
        if buf.len() >= Self::MAX_BYTES {
            return Err(VarIntError::TooManyBytes {
                max_bytes: Self::MAX_BYTES,
            });
        }
        Err(VarIntError::BufferTooShort)
    }
}

impl ProtoEncode for VarInt {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        let mut value = self.0 as u32;
        loop {
            if value & !0x7F == 0 {
                buf.put_u8(value as u8);
                return;
            }
            buf.put_u8((value & 0x7F | 0x80) as u8);
            value >>= 7;
        }
    }
}

impl ProtoDecode for VarInt {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let mut result: u32 = 0;
        for i in 0..Self::MAX_BYTES {
            if !buf.has_remaining() {
                return Err(VarIntError::BufferTooShort.into());
            }
            let byte = buf.get_u8();
            result |= ((byte & 0x7F) as u32) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(VarInt(result as i32));
            }
        }
        Err(VarIntError::TooManyBytes {
            max_bytes: Self::MAX_BYTES,
        }
        .into())
    }
}

impl From<i32> for VarInt {
    fn from(v: i32) -> Self {
        VarInt(v)
    }
}

impl From<VarInt> for i32 {
    fn from(v: VarInt) -> Self {
        v.0
    }
}

impl fmt::Debug for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarInt({})", self.0)
    }
}

impl fmt::Display for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// VarLong (i64, two's complement LEB128, no ZigZag)
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VarLong(pub i64);

impl VarLong {
    /// Maximum bytes a VarLong can occupy.
    pub const MAX_BYTES: usize = 10;
}

impl ProtoEncode for VarLong {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        let mut value = self.0 as u64;
        loop {
            if value & !0x7F == 0 {
                buf.put_u8(value as u8);
                return;
            }
            buf.put_u8((value & 0x7F | 0x80) as u8);
            value >>= 7;
        }
    }
}

impl ProtoDecode for VarLong {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let mut result: u64 = 0;
        for i in 0..Self::MAX_BYTES {
            if !buf.has_remaining() {
                return Err(VarIntError::BufferTooShort.into());
            }
            let byte = buf.get_u8();
            result |= ((byte & 0x7F) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(VarLong(result as i64));
            }
        }
        Err(VarIntError::TooManyBytes {
            max_bytes: Self::MAX_BYTES,
        }
        .into())
    }
}

impl From<i64> for VarLong {
    fn from(v: i64) -> Self {
        VarLong(v)
    }
}

impl fmt::Debug for VarLong {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarLong({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// BlockPos (packed i64: x 26 bits, z 26 bits, y 12 bits)
// ---------------------------------------------------------------------------

/// Absolute block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn to_packed(self) -> i64 {
        ((self.x as i64 & 0x3FF_FFFF) << 38)
            | ((self.z as i64 & 0x3FF_FFFF) << 12)
            | (self.y as i64 & 0xFFF)
    }

    pub fn from_packed(v: i64) -> Self {
        Self {
            x: (v >> 38) as i32,
            y: ((v << 52) >> 52) as i32,
            z: ((v << 26) >> 38) as i32,
        }
    }
}

impl ProtoEncode for BlockPos {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i64(self.to_packed());
    }
}

impl ProtoDecode for BlockPos {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 8)?;
        Ok(Self::from_packed(buf.get_i64()))
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// SectionPos (packed i64: x 22 bits, z 22 bits, y 20 bits)
// ---------------------------------------------------------------------------

/// Coordinates of a 16x16x16 chunk section, in section units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SectionPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl SectionPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Section containing the given block.
    pub fn of_block(pos: BlockPos) -> Self {
        Self {
            x: pos.x >> 4,
            y: pos.y >> 4,
            z: pos.z >> 4,
        }
    }

    pub fn to_packed(self) -> i64 {
        ((self.x as i64 & 0x3F_FFFF) << 42)
            | ((self.z as i64 & 0x3F_FFFF) << 20)
            | (self.y as i64 & 0xF_FFFF)
    }

    pub fn from_packed(v: i64) -> Self {
        Self {
            x: (v >> 42) as i32,
            y: ((v << 44) >> 44) as i32,
            z: ((v << 22) >> 42) as i32,
        }
    }
}

impl ProtoEncode for SectionPos {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i64(self.to_packed());
    }
}

impl ProtoDecode for SectionPos {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 8)?;
        Ok(Self::from_packed(buf.get_i64()))
    }
}

// ---------------------------------------------------------------------------
// Uuid (128-bit, big-endian on the wire)
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Uuid(pub u128);

impl Uuid {
    pub const NIL: Uuid = Uuid(0);

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Uuid(u128::from_be_bytes(bytes))
    }

    pub fn as_bytes(&self) -> [u8; 16] {
        self.0.to_be_bytes()
    }
}

impl ProtoEncode for Uuid {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_u128(self.0);
    }
}

impl ProtoDecode for Uuid {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 16)?;
        Ok(Uuid(buf.get_u128()))
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = format!("{:032x}", self.0);
        write!(
            f,
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uuid({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn varint_known_encodings() {
        let cases: [(i32, &[u8]); 6] = [
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7F]),
            (128, &[0x80, 0x01]),
            (25565, &[0xDD, 0xC7, 0x01]),
            (-1, &[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]),
        ];
        for (value, expected) in cases {
            let mut buf = BytesMut::new();
            VarInt(value).proto_encode(&mut buf);
            assert_eq!(&buf[..], expected, "encoding {value}");
            assert_eq!(VarInt::encoded_len(value), expected.len());
            assert_eq!(VarInt::proto_decode(&mut buf.freeze()).unwrap().0, value);
        }
    }

    #[test]
    fn varint_slice_decode_reports_short_input() {
        assert!(matches!(
            VarInt::decode(&[0x80, 0x80]),
            Err(VarIntError::BufferTooShort)
        ));
        assert_eq!(VarInt::decode(&[0xDD, 0xC7, 0x01, 0x55]).unwrap(), (VarInt(25565), 3));
    }

    #[test]
    fn varint_too_long() {
        let mut buf: &[u8] = &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        assert!(VarInt::proto_decode(&mut buf).is_err());
        assert!(matches!(
            VarInt::decode(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
            Err(VarIntError::TooManyBytes { .. })
        ));
    }

    #[test]
    fn varlong_negative() {
        let mut buf = BytesMut::new();
        VarLong(-2).proto_encode(&mut buf);
        assert_eq!(buf.len(), 10);
        assert_eq!(VarLong::proto_decode(&mut buf.freeze()).unwrap().0, -2);
    }

    #[test]
    fn block_pos_packing_handles_negative_coordinates() {
        let pos = BlockPos::new(-100, -64, 33_554_431);
        assert_eq!(BlockPos::from_packed(pos.to_packed()), pos);
        let pos = BlockPos::new(18_357_644, 831, -20_882_616);
        assert_eq!(BlockPos::from_packed(pos.to_packed()), pos);
    }

    #[test]
    fn section_pos_of_block_floors() {
        assert_eq!(
            SectionPos::of_block(BlockPos::new(-1, -1, 17)),
            SectionPos::new(-1, -1, 1)
        );
        let pos = SectionPos::new(-7, -4, 6);
        assert_eq!(SectionPos::from_packed(pos.to_packed()), pos);
    }

    #[test]
    fn uuid_display_is_hyphenated() {
        let id = Uuid(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
        assert_eq!(id.to_string(), "01234567-89ab-cdef-0123-456789abcdef");
    }
}
