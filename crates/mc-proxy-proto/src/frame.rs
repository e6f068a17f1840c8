//! Length-prefixed frames with optional zlib compression.
//!
//! Uncompressed frame: `VarInt length | VarInt id | body`.
//! Compressed frame:   `VarInt length | VarInt data_length | zlib(VarInt id | body)`,
//! where `data_length == 0` marks a payload below the threshold sent raw.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::compression;
use crate::error::ProtoError;
use crate::types::{VarInt, VarIntError};

/// Largest frame the length prefix can describe (3-byte VarInt).
pub const MAX_FRAME_LEN: usize = 2_097_151;

/// Zlib level used for outgoing frames.
const COMPRESSION_LEVEL: u32 = 6;

/// Encode one packet into a complete frame.
///
/// `threshold` is `None` until compression has been negotiated.
pub fn encode_frame(id: i32, body: &[u8], threshold: Option<usize>) -> Result<Bytes, ProtoError> {
    let mut payload = BytesMut::with_capacity(body.len() + VarInt::MAX_BYTES);
    VarInt(id).proto_encode(&mut payload);
    payload.put_slice(body);

    let mut inner = BytesMut::with_capacity(payload.len() + VarInt::MAX_BYTES);
    match threshold {
        None => inner.put_slice(&payload),
        Some(threshold) if payload.len() >= threshold => {
            VarInt(payload.len() as i32).proto_encode(&mut inner);
            inner.put_slice(&compression::compress(&payload, COMPRESSION_LEVEL)?);
        }
        Some(_) => {
            VarInt(0).proto_encode(&mut inner);
            inner.put_slice(&payload);
        }
    }

    if inner.len() > MAX_FRAME_LEN {
        return Err(ProtoError::FrameTooLarge(inner.len()));
    }
    let mut frame = BytesMut::with_capacity(inner.len() + 3);
    VarInt(inner.len() as i32).proto_encode(&mut frame);
    frame.put_slice(&inner);
    Ok(frame.freeze())
}

/// Split the next complete frame body off `buf`, if one has fully arrived.
pub fn split_frame(buf: &mut BytesMut) -> Result<Option<Bytes>, ProtoError> {
    let (len, prefix) = match VarInt::decode(&buf[..]) {
        Ok((len, prefix)) => (len.0, prefix),
        Err(VarIntError::BufferTooShort) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len < 0 || len as usize > MAX_FRAME_LEN {
        return Err(ProtoError::FrameTooLarge(len.max(0) as usize));
    }
    let len = len as usize;
    if buf.len() < prefix + len {
        return Ok(None);
    }
    buf.advance(prefix);
    Ok(Some(buf.split_to(len).freeze()))
}

/// Turn a frame body into `(packet id, packet body)`.
pub fn decode_payload(mut frame: Bytes, compressed: bool) -> Result<(i32, Bytes), ProtoError> {
    if compressed {
        let data_len = VarInt::proto_decode(&mut frame)?.0;
        if data_len < 0 || data_len as usize > MAX_FRAME_LEN * 4 {
            return Err(ProtoError::InvalidData(format!(
                "bad uncompressed length {data_len}"
            )));
        }
        if data_len > 0 {
            frame = Bytes::from(compression::decompress(&frame, data_len as usize)?);
        }
    }
    let id = VarInt::proto_decode(&mut frame)?.0;
    Ok((id, frame))
}
