use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Wire header: a single 4-byte little-endian body length.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Maximum frame body size: 128 KiB.
///
/// A length prefix beyond this bound means the stream is malformed (or
/// adversarial) and the session must abort instead of buffering further.
pub const MAX_FRAME_SIZE: usize = 128 * 1024;

/// Encode one frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────────┬──────────────────┐
/// │ Length (4B LE) │ Body (N bytes)   │
/// └────────────────┴──────────────────┘
/// ```
///
/// The body is an already-serialized frame; this layer treats it as opaque.
pub fn encode_frame(body: &[u8], dst: &mut BytesMut) -> Result<()> {
    if body.len() > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: body.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    dst.reserve(LENGTH_PREFIX_SIZE + body.len());
    dst.put_u32_le(body.len() as u32);
    dst.put_slice(body);
    Ok(())
}

/// Interpret the first 4 bytes of `buf` as an unsigned little-endian length.
///
/// Callers must not invoke this with fewer than [`LENGTH_PREFIX_SIZE`] bytes
/// available.
pub fn read_length_prefix(buf: &[u8]) -> u32 {
    debug_assert!(buf.len() >= LENGTH_PREFIX_SIZE);
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}
