//! Block update (0x0A) and section blocks update (0x43), Server → Client.

use bytes::{Buf, BufMut};

use crate::codec::{self, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::{BlockPos, SectionPos, VarInt, VarLong};

/// A single block changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockUpdate {
    pub position: BlockPos,
    pub state: i32,
}

impl ProtoEncode for BlockUpdate {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        self.position.proto_encode(buf);
        VarInt(self.state).proto_encode(buf);
    }
}

impl ProtoDecode for BlockUpdate {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            position: BlockPos::proto_decode(buf)?,
            state: VarInt::proto_decode(buf)?.0,
        })
    }
}

/// One entry of a [`SectionBlocksUpdate`], in absolute coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockChange {
    pub position: BlockPos,
    pub state: i32,
}

/// Several blocks within one 16x16x16 section changed.
///
/// On the wire each entry is `state << 12 | x << 8 | z << 4 | y` relative to
/// the section; decoding resolves entries to absolute positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionBlocksUpdate {
    pub section: SectionPos,
    pub changes: Vec<BlockChange>,
}

impl ProtoEncode for SectionBlocksUpdate {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        self.section.proto_encode(buf);
        VarInt(self.changes.len() as i32).proto_encode(buf);
        for change in &self.changes {
            let x = (change.position.x & 0xF) as i64;
            let y = (change.position.y & 0xF) as i64;
            let z = (change.position.z & 0xF) as i64;
            VarLong(((change.state as i64) << 12) | (x << 8) | (z << 4) | y).proto_encode(buf);
        }
    }
}

impl ProtoDecode for SectionBlocksUpdate {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let section = SectionPos::proto_decode(buf)?;
        let count = codec::read_length(buf)?;
        let mut changes = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let entry = VarLong::proto_decode(buf)?.0;
            let position = BlockPos::new(
                section.x * 16 + ((entry >> 8) & 0xF) as i32,
                section.y * 16 + (entry & 0xF) as i32,
                section.z * 16 + ((entry >> 4) & 0xF) as i32,
            );
            changes.push(BlockChange {
                position,
                state: (entry >> 12) as i32,
            });
        }
        Ok(Self { section, changes })
    }
}
