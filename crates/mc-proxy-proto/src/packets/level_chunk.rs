//! Chunk load (0x24) and unload (0x1E), Server → Client.

use bytes::{Buf, BufMut, Bytes};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::section::{self, ChunkSection};

/// A full chunk column. Section data is kept raw and decoded on demand so
/// forwarding never re-encodes it.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelChunk {
    /// Chunk X in chunk units.
    pub chunk_x: i32,
    /// Chunk Z in chunk units.
    pub chunk_z: i32,
    /// Concatenated sections, bottom to top.
    pub data: Bytes,
    /// Block entities and light data, not interpreted.
    pub trailing: Bytes,
}

impl LevelChunk {
    pub fn from_sections(chunk_x: i32, chunk_z: i32, sections: &[ChunkSection]) -> Self {
        Self {
            chunk_x,
            chunk_z,
            data: section::encode_sections(sections),
            trailing: Bytes::new(),
        }
    }

    /// Decode the section payload.
    pub fn sections(&self) -> Result<Vec<ChunkSection>, ProtoError> {
        section::decode_sections(&self.data)
    }
}

impl ProtoEncode for LevelChunk {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i32(self.chunk_x);
        buf.put_i32(self.chunk_z);
        codec::write_byte_array(buf, &self.data);
        buf.put_slice(&self.trailing);
    }
}

impl ProtoDecode for LevelChunk {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            chunk_x: codec::read_i32(buf)?,
            chunk_z: codec::read_i32(buf)?,
            data: codec::read_byte_array(buf)?,
            trailing: codec::read_remaining(buf),
        })
    }
}

/// Unload a chunk column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForgetLevelChunk {
    pub chunk_x: i32,
    pub chunk_z: i32,
}

impl ProtoEncode for ForgetLevelChunk {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i32(self.chunk_x);
        buf.put_i32(self.chunk_z);
    }
}

impl ProtoDecode for ForgetLevelChunk {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            chunk_x: codec::read_i32(buf)?,
            chunk_z: codec::read_i32(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn sections_survive_the_packet() {
        let mut bottom = ChunkSection::new_single(0);
        bottom.set(0, 0, 0, 100);
        let pkt = LevelChunk::from_sections(6, -7, &[bottom, ChunkSection::new_single(1)]);

        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        let decoded = LevelChunk::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.chunk_x, 6);
        assert_eq!(decoded.chunk_z, -7);
        let sections = decoded.sections().unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].get(0, 0, 0), 100);
        assert_eq!(sections[1].get(3, 3, 3), 1);
    }
}
