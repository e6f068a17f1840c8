//! Paletted 16x16x16 chunk sections as carried inside level chunk packets.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::{ensure_remaining, read_i16, read_length, read_u8, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarInt;

/// Blocks in one section.
pub const SECTION_VOLUME: usize = 16 * 16 * 16;

/// Bits per entry used when a block palette overflows the indirect form.
pub const DIRECT_BLOCK_BITS: u8 = 15;

/// Widest entry a packed array may use; state ids are 32-bit.
const MAX_PACKED_BITS: u8 = 32;

/// Largest indirect palette width for block states.
const MAX_INDIRECT_BLOCK_BITS: u8 = 8;

/// Largest indirect palette width for biomes.
const MAX_INDIRECT_BIOME_BITS: u8 = 3;

/// Single-valued biome container (biome id 0).
const DEFAULT_BIOMES: [u8; 3] = [0, 0, 0];

/// One section of a chunk column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSection {
    /// Number of non-air blocks, as reported on the wire.
    pub block_count: i16,
    /// Block state ids referenced by `indices`.
    palette: Vec<i32>,
    /// Palette index per block, YZX order: `(y * 16 + z) * 16 + x`.
    indices: Box<[u16]>,
    /// Biome container, passed through untouched.
    biomes: Bytes,
}

impl ChunkSection {
    /// Create a section filled with one block state.
    pub fn new_single(state: i32) -> Self {
        Self {
            block_count: if state == 0 { 0 } else { SECTION_VOLUME as i16 },
            palette: vec![state],
            indices: vec![0u16; SECTION_VOLUME].into_boxed_slice(),
            biomes: Bytes::from_static(&DEFAULT_BIOMES),
        }
    }

    /// Block state at section-local coordinates, each in `[0, 15]`.
    pub fn get(&self, x: usize, y: usize, z: usize) -> i32 {
        debug_assert!(x < 16 && y < 16 && z < 16);
        self.palette[self.indices[index(x, y, z)] as usize]
    }

    /// Set the block state at section-local coordinates.
    pub fn set(&mut self, x: usize, y: usize, z: usize, state: i32) {
        debug_assert!(x < 16 && y < 16 && z < 16);
        let previous = self.get(x, y, z);
        let palette_index = match self.palette.iter().position(|&id| id == state) {
            Some(idx) => idx,
            None => {
                self.palette.push(state);
                self.palette.len() - 1
            }
        };
        self.indices[index(x, y, z)] = palette_index as u16;
        if previous == 0 && state != 0 {
            self.block_count += 1;
        } else if previous != 0 && state == 0 {
            self.block_count -= 1;
        }
    }

    pub fn palette(&self) -> &[i32] {
        &self.palette
    }

    /// Decode one section from a chunk data cursor.
    pub fn decode(buf: &mut Bytes) -> Result<Self, ProtoError> {
        let block_count = read_i16(buf)?;
        let (palette, indices) = decode_block_states(buf)?;
        let start = buf.clone();
        skip_paletted(buf, MAX_INDIRECT_BIOME_BITS)?;
        let consumed = start.len() - buf.len();
        Ok(Self {
            block_count,
            palette,
            indices,
            biomes: start.slice(..consumed),
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_i16(self.block_count);
        self.encode_block_states(buf);
        buf.put_slice(&self.biomes);
    }

    fn encode_block_states(&self, buf: &mut impl BufMut) {
        if self.palette.len() == 1 {
            buf.put_u8(0);
            VarInt(self.palette[0]).proto_encode(buf);
            VarInt(0).proto_encode(buf);
            return;
        }

        let needed = bits_for(self.palette.len());
        if needed <= MAX_INDIRECT_BLOCK_BITS {
            let bits = needed.max(4);
            buf.put_u8(bits);
            VarInt(self.palette.len() as i32).proto_encode(buf);
            for &state in &self.palette {
                VarInt(state).proto_encode(buf);
            }
            let values: Vec<u64> = self.indices.iter().map(|&i| i as u64).collect();
            write_packed(buf, bits, &values);
        } else {
            buf.put_u8(DIRECT_BLOCK_BITS);
            let values: Vec<u64> = self
                .indices
                .iter()
                .map(|&i| self.palette[i as usize] as u64)
                .collect();
            write_packed(buf, DIRECT_BLOCK_BITS, &values);
        }
    }
}

/// Decode every section present in a level chunk data array.
pub fn decode_sections(data: &Bytes) -> Result<Vec<ChunkSection>, ProtoError> {
    let mut cursor = data.clone();
    let mut sections = Vec::new();
    while cursor.has_remaining() {
        sections.push(ChunkSection::decode(&mut cursor)?);
    }
    Ok(sections)
}

/// Encode sections into a level chunk data array.
pub fn encode_sections(sections: &[ChunkSection]) -> Bytes {
    let mut buf = BytesMut::new();
    for section in sections {
        section.encode(&mut buf);
    }
    buf.freeze()
}

fn index(x: usize, y: usize, z: usize) -> usize {
    (y * 16 + z) * 16 + x
}

fn bits_for(palette_len: usize) -> u8 {
    let mut bits = 0u8;
    while (1usize << bits) < palette_len {
        bits += 1;
    }
    bits
}

fn decode_block_states(buf: &mut Bytes) -> Result<(Vec<i32>, Box<[u16]>), ProtoError> {
    let bits = read_u8(buf)?;
    if bits == 0 {
        let state = VarInt::proto_decode(buf)?.0;
        skip_longs(buf)?;
        return Ok((vec![state], vec![0u16; SECTION_VOLUME].into_boxed_slice()));
    }

    if bits > MAX_PACKED_BITS {
        return Err(ProtoError::InvalidData(format!(
            "{bits} bits per entry exceeds {MAX_PACKED_BITS}"
        )));
    }

    if bits <= MAX_INDIRECT_BLOCK_BITS {
        let len = read_length(buf)?;
        if len > 1usize << bits {
            return Err(ProtoError::InvalidData(format!(
                "palette of {len} entries does not fit {bits} bits"
            )));
        }
        // Every entry takes at least one byte.
        ensure_remaining(buf, len)?;
        let mut palette = Vec::with_capacity(len);
        for _ in 0..len {
            palette.push(VarInt::proto_decode(buf)?.0);
        }
        let values = read_packed(buf, bits)?;
        let mut indices = Vec::with_capacity(SECTION_VOLUME);
        for value in values {
            if value as usize >= palette.len() {
                return Err(ProtoError::InvalidData(format!(
                    "palette index {value} out of range ({})",
                    palette.len()
                )));
            }
            indices.push(value as u16);
        }
        return Ok((palette, indices.into_boxed_slice()));
    }

    // Direct: values are global state ids; rebuild a local palette.
    let values = read_packed(buf, bits)?;
    let mut palette: Vec<i32> = Vec::new();
    let mut indices = Vec::with_capacity(SECTION_VOLUME);
    for value in values {
        let state = value as i32;
        let idx = match palette.iter().position(|&s| s == state) {
            Some(idx) => idx,
            None => {
                palette.push(state);
                palette.len() - 1
            }
        };
        indices.push(idx as u16);
    }
    Ok((palette, indices.into_boxed_slice()))
}

fn skip_paletted(buf: &mut Bytes, max_indirect_bits: u8) -> Result<(), ProtoError> {
    let bits = read_u8(buf)?;
    if bits == 0 {
        VarInt::proto_decode(buf)?;
    } else if bits <= max_indirect_bits {
        let len = read_length(buf)?;
        for _ in 0..len {
            VarInt::proto_decode(buf)?;
        }
    }
    skip_longs(buf)
}

/// Skip a length-prefixed array of longs.
fn skip_longs(buf: &mut Bytes) -> Result<(), ProtoError> {
    let longs = read_length(buf)?;
    let bytes = longs
        .checked_mul(8)
        .ok_or_else(|| ProtoError::InvalidData(format!("{longs} longs is too many")))?;
    ensure_remaining(buf, bytes)?;
    buf.advance(bytes);
    Ok(())
}

/// Entries never straddle two longs.
fn read_packed(buf: &mut Bytes, bits: u8) -> Result<Vec<u64>, ProtoError> {
    if !(1..=MAX_PACKED_BITS).contains(&bits) {
        return Err(ProtoError::InvalidData(format!(
            "{bits} bits per entry is out of range"
        )));
    }
    let per_long = 64 / bits as usize;
    let expected = SECTION_VOLUME.div_ceil(per_long);
    let longs = read_length(buf)?;
    if longs != expected {
        return Err(ProtoError::InvalidData(format!(
            "expected {expected} longs for {bits} bits per entry, got {longs}"
        )));
    }
    ensure_remaining(buf, longs * 8)?;
    let mask = (1u64 << bits) - 1;
    let mut values = Vec::with_capacity(SECTION_VOLUME);
    for _ in 0..longs {
        let word = buf.get_u64();
        for slot in 0..per_long {
            if values.len() == SECTION_VOLUME {
                break;
            }
            values.push((word >> (slot * bits as usize)) & mask);
        }
    }
    Ok(values)
}

fn write_packed(buf: &mut impl BufMut, bits: u8, values: &[u64]) {
    let per_long = 64 / bits as usize;
    let mask = (1u64 << bits) - 1;
    let chunks = values.chunks(per_long);
    VarInt(chunks.len() as i32).proto_encode(buf);
    for chunk in chunks {
        let mut word = 0u64;
        for (slot, &value) in chunk.iter().enumerate() {
            word |= (value & mask) << (slot * bits as usize);
        }
        buf.put_u64(word);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_value_section() {
        let section = ChunkSection::new_single(1);
        assert_eq!(section.get(0, 0, 0), 1);
        assert_eq!(section.get(15, 15, 15), 1);
        assert_eq!(section.block_count, 4096);

        let mut buf = BytesMut::new();
        section.encode(&mut buf);
        // block count, bits 0, value, no longs, biomes
        assert_eq!(&buf[..], &[0x10, 0x00, 0, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn set_grows_palette_and_tracks_block_count() {
        let mut section = ChunkSection::new_single(0);
        section.set(0, 0, 0, 100);
        section.set(1, 1, 1, 111);
        section.set(2, 2, 2, 100);
        assert_eq!(section.palette(), &[0, 100, 111]);
        assert_eq!(section.block_count, 3);
        section.set(2, 2, 2, 0);
        assert_eq!(section.block_count, 2);
    }

    #[test]
    fn indirect_section_survives_encoding() {
        let mut section = ChunkSection::new_single(0);
        section.set(0, 0, 0, 100);
        section.set(1, 1, 1, 111);
        section.set(15, 15, 15, 9);

        let data = encode_sections(std::slice::from_ref(&section));
        let decoded = decode_sections(&data).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].get(0, 0, 0), 100);
        assert_eq!(decoded[0].get(1, 1, 1), 111);
        assert_eq!(decoded[0].get(15, 15, 15), 9);
        assert_eq!(decoded[0].get(3, 4, 5), 0);
        assert_eq!(decoded[0].block_count, 3);
    }

    #[test]
    fn wide_palette_switches_to_direct() {
        let mut section = ChunkSection::new_single(0);
        for i in 0..300 {
            section.set(i % 16, i / 256, (i / 16) % 16, 1000 + i as i32);
        }
        let mut buf = BytesMut::new();
        section.encode(&mut buf);
        assert_eq!(buf[2], DIRECT_BLOCK_BITS);

        let decoded = decode_sections(&buf.freeze()).unwrap();
        assert_eq!(decoded[0].get(5, 0, 0), 1005);
        assert_eq!(decoded[0].get(0, 1, 2), 1000 + 288);
    }

    #[test]
    fn multiple_sections_decode_in_order() {
        let data = encode_sections(&[ChunkSection::new_single(1), ChunkSection::new_single(2)]);
        let decoded = decode_sections(&data).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1].get(7, 7, 7), 2);
    }

    #[test]
    fn truncated_section_is_an_error() {
        let mut section = ChunkSection::new_single(0);
        section.set(0, 0, 0, 5);
        let data = encode_sections(&[section]);
        assert!(decode_sections(&data.slice(..data.len() - 10)).is_err());
    }

    #[test]
    fn oversized_entry_width_is_rejected() {
        for bits in [33u8, 64, 65, 255] {
            let data = Bytes::from(vec![0x00, 0x01, bits, 0x00]);
            assert!(
                matches!(decode_sections(&data), Err(ProtoError::InvalidData(_))),
                "{bits} bits accepted"
            );
        }
    }

    #[test]
    fn palette_longer_than_the_payload_is_rejected() {
        // Palette length i32::MAX with nothing behind it.
        let data = Bytes::from_static(&[0x00, 0x01, 4, 0xFF, 0xFF, 0xFF, 0xFF, 0x07]);
        assert!(decode_sections(&data).is_err());

        // Sixteen entries claimed, three present.
        let data = Bytes::from_static(&[0x00, 0x01, 4, 16, 1, 2, 3]);
        assert!(matches!(
            decode_sections(&data),
            Err(ProtoError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn huge_single_value_array_is_rejected() {
        let data = Bytes::from_static(&[0x00, 0x00, 0, 1, 0xFF, 0xFF, 0xFF, 0xFF, 0x07]);
        assert!(decode_sections(&data).is_err());
    }
}
