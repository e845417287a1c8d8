use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::methods::TraceSlice;

/// Record tag for one packet in the delimited output stream: field 1,
/// length-delimited.
pub const PACKET_TAG: u8 = 0x0A;

/// Accumulates ordered trace slices into whole packets and serializes each
/// completed packet into a length-delimited output stream.
///
/// Slices must be ingested in the order the protocol delivered them; there
/// is no reordering buffer. Each packet in the output stream is written as
/// the tag byte, a varint payload length, then the payload bytes.
pub struct SliceReassembler {
    partial: BytesMut,
    out: BytesMut,
}

impl SliceReassembler {
    pub fn new() -> Self {
        Self {
            partial: BytesMut::new(),
            out: BytesMut::new(),
        }
    }

    /// Append one slice to the packet under assembly.
    ///
    /// A slice marked `last_slice_for_packet` finalizes the packet: the
    /// buffered payloads are concatenated in arrival order and appended to
    /// the output stream, and the partial state is cleared.
    pub fn ingest(&mut self, slice: &TraceSlice) {
        self.partial.extend_from_slice(&slice.data);
        if slice.last_slice_for_packet {
            let packet = self.partial.split();
            trace!(bytes = packet.len(), "trace packet complete");
            self.out.put_u8(PACKET_TAG);
            put_varint(&mut self.out, packet.len() as u64);
            self.out.extend_from_slice(&packet);
        }
    }

    /// Take the output stream assembled so far and reset the writer.
    pub fn flush(&mut self) -> Bytes {
        self.out.split().freeze()
    }

    /// Whether a packet is still under assembly.
    pub fn has_partial(&self) -> bool {
        !self.partial.is_empty()
    }

    /// Drop partial and assembled state. Used when the session closes with a
    /// streaming read still in flight.
    pub fn clear(&mut self) {
        self.partial.clear();
        self.out.clear();
    }
}

impl Default for SliceReassembler {
    fn default() -> Self {
        Self::new()
    }
}

fn put_varint(buf: &mut BytesMut, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.put_u8(byte);
            return;
        }
        buf.put_u8(byte | 0x80);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(data: &[u8], last: bool) -> TraceSlice {
        TraceSlice {
            data: data.to_vec(),
            last_slice_for_packet: last,
        }
    }

    #[test]
    fn two_slices_form_one_packet() {
        let mut reassembler = SliceReassembler::new();
        reassembler.ingest(&slice(&[1, 2], false));
        reassembler.ingest(&slice(&[3, 4], true));

        let out = reassembler.flush();
        assert_eq!(out.as_ref(), &[PACKET_TAG, 4, 1, 2, 3, 4]);
    }

    #[test]
    fn single_slice_packet() {
        let mut reassembler = SliceReassembler::new();
        reassembler.ingest(&slice(&[9], true));

        let out = reassembler.flush();
        assert_eq!(out.as_ref(), &[PACKET_TAG, 1, 9]);
    }

    #[test]
    fn packets_append_in_order() {
        let mut reassembler = SliceReassembler::new();
        reassembler.ingest(&slice(&[0xAA], true));
        reassembler.ingest(&slice(&[0xBB, 0xCC], false));
        reassembler.ingest(&slice(&[0xDD], true));

        let out = reassembler.flush();
        assert_eq!(
            out.as_ref(),
            &[PACKET_TAG, 1, 0xAA, PACKET_TAG, 3, 0xBB, 0xCC, 0xDD]
        );
    }

    #[test]
    fn flush_resets_the_writer() {
        let mut reassembler = SliceReassembler::new();
        reassembler.ingest(&slice(&[1], true));
        assert!(!reassembler.flush().is_empty());
        assert!(reassembler.flush().is_empty());
    }

    #[test]
    fn large_packet_uses_multi_byte_varint() {
        let payload = vec![0x55; 300];
        let mut reassembler = SliceReassembler::new();
        reassembler.ingest(&slice(&payload, true));

        let out = reassembler.flush();
        // 300 = 0b10_0101100 → varint [0xAC, 0x02]
        assert_eq!(&out[..3], &[PACKET_TAG, 0xAC, 0x02]);
        assert_eq!(out.len(), 3 + 300);
        assert_eq!(&out[3..], payload.as_slice());
    }

    #[test]
    fn partial_state_tracked_and_clearable() {
        let mut reassembler = SliceReassembler::new();
        reassembler.ingest(&slice(&[1, 2], false));
        assert!(reassembler.has_partial());

        reassembler.clear();
        assert!(!reassembler.has_partial());
        assert!(reassembler.flush().is_empty());

        // The next packet starts from scratch.
        reassembler.ingest(&slice(&[7], true));
        assert_eq!(reassembler.flush().as_ref(), &[PACKET_TAG, 1, 7]);
    }

    #[test]
    fn empty_final_slice_still_closes_packet() {
        let mut reassembler = SliceReassembler::new();
        reassembler.ingest(&slice(&[5, 6], false));
        reassembler.ingest(&slice(&[], true));

        let out = reassembler.flush();
        assert_eq!(out.as_ref(), &[PACKET_TAG, 2, 5, 6]);
    }
}
