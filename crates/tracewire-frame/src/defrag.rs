use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::codec::{read_length_prefix, LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Parsing state for the incoming stream.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Fewer than 4 header bytes buffered.
    AwaitingLength,
    /// Length prefix parsed; accumulating the frame body.
    AwaitingBody { expected: usize },
}

/// Reassembles complete frame bodies from an arbitrarily chunked byte stream.
///
/// The transport may split a frame across many reads or coalesce several
/// frames into one. `push` consumes whatever arrived and returns every frame
/// body that completed, in arrival order. Partial data stays buffered for the
/// next push.
///
/// The buffer is bounded by [`MAX_FRAME_SIZE`]; a length prefix beyond that
/// bound is a fatal protocol error and the defragmenter must not be fed
/// again afterwards.
pub struct StreamDefragmenter {
    buf: BytesMut,
    state: State,
    max_frame_size: usize,
}

impl StreamDefragmenter {
    /// Create a defragmenter with the default 128 KiB frame bound.
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    /// Create a defragmenter with an explicit frame bound.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: State::AwaitingLength,
            max_frame_size,
        }
    }

    /// Consume one chunk of incoming bytes, returning every completed frame.
    ///
    /// Returns an empty vec while a frame is still incomplete. Returns
    /// `FrameError::FrameTooLarge` when a length prefix exceeds the bound;
    /// the stream is desynchronized at that point and the session must close.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.buf.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(body) = self.try_take_one()? {
            frames.push(body);
        }
        if !frames.is_empty() {
            trace!(frames = frames.len(), buffered = self.buf.len(), "defragmented");
        }
        Ok(frames)
    }

    fn try_take_one(&mut self) -> Result<Option<Bytes>> {
        match self.state {
            State::AwaitingLength => {
                if self.buf.len() < LENGTH_PREFIX_SIZE {
                    return Ok(None);
                }

                let expected = read_length_prefix(&self.buf) as usize;
                if expected > self.max_frame_size {
                    return Err(FrameError::FrameTooLarge {
                        size: expected,
                        max: self.max_frame_size,
                    });
                }

                let _ = self.buf.split_to(LENGTH_PREFIX_SIZE);
                self.state = State::AwaitingBody { expected };
                self.try_take_one()
            }
            State::AwaitingBody { expected } => {
                if self.buf.len() < expected {
                    return Ok(None);
                }

                let body = self.buf.split_to(expected).freeze();
                self.state = State::AwaitingLength;
                Ok(Some(body))
            }
        }
    }

    /// Number of bytes buffered for the next incomplete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl Default for StreamDefragmenter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_frame;

    fn frame_bytes(body: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(body, &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn single_complete_frame() {
        let mut defrag = StreamDefragmenter::new();
        let frames = defrag.push(&frame_bytes(b"hello")).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), b"hello");
        assert_eq!(defrag.buffered(), 0);
    }

    #[test]
    fn multiple_frames_in_one_chunk() {
        let mut chunk = frame_bytes(b"first");
        chunk.extend_from_slice(&frame_bytes(b"second"));
        chunk.extend_from_slice(&frame_bytes(b"third"));

        let mut defrag = StreamDefragmenter::new();
        let frames = defrag.push(&chunk).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].as_ref(), b"first");
        assert_eq!(frames[1].as_ref(), b"second");
        assert_eq!(frames[2].as_ref(), b"third");
        assert_eq!(defrag.buffered(), 0);
    }

    #[test]
    fn header_split_across_chunks() {
        let wire = frame_bytes(b"split-header");
        let mut defrag = StreamDefragmenter::new();

        assert!(defrag.push(&wire[..2]).unwrap().is_empty());
        let frames = defrag.push(&wire[2..]).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), b"split-header");
    }

    #[test]
    fn body_split_across_chunks() {
        // Header [0x0A,0,0,0] (length 10) plus 6 body bytes, then the last 4.
        let body: Vec<u8> = (1..=10).collect();
        let wire = frame_bytes(&body);

        let mut defrag = StreamDefragmenter::new();
        assert!(defrag.push(&wire[..LENGTH_PREFIX_SIZE + 6]).unwrap().is_empty());
        let frames = defrag.push(&wire[LENGTH_PREFIX_SIZE + 6..]).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), body.as_slice());
    }

    #[test]
    fn chunk_ending_exactly_on_frame_boundary() {
        let wire = frame_bytes(b"exact");
        let mut defrag = StreamDefragmenter::new();

        let frames = defrag.push(&wire).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(defrag.buffered(), 0);

        // The next frame starts clean.
        let frames = defrag.push(&frame_bytes(b"next")).unwrap();
        assert_eq!(frames[0].as_ref(), b"next");
    }

    #[test]
    fn byte_at_a_time_feed() {
        let wire = frame_bytes(b"one byte at a time");
        let mut defrag = StreamDefragmenter::new();

        let mut collected = Vec::new();
        for byte in &wire {
            collected.extend(defrag.push(&[*byte]).unwrap());
        }

        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].as_ref(), b"one byte at a time");
    }

    #[test]
    fn every_split_point_yields_the_same_frame() {
        let body = b"fragmentation-idempotent";
        let wire = frame_bytes(body);

        for split in 1..wire.len() {
            let mut defrag = StreamDefragmenter::new();
            let mut frames = defrag.push(&wire[..split]).unwrap();
            frames.extend(defrag.push(&wire[split..]).unwrap());

            assert_eq!(frames.len(), 1, "split at {split}");
            assert_eq!(frames[0].as_ref(), body, "split at {split}");
        }
    }

    #[test]
    fn complete_frame_followed_by_partial() {
        let first = frame_bytes(b"done");
        let second = frame_bytes(b"pending");

        let mut chunk = first.clone();
        chunk.extend_from_slice(&second[..3]);

        let mut defrag = StreamDefragmenter::new();
        let frames = defrag.push(&chunk).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), b"done");

        let frames = defrag.push(&second[3..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), b"pending");
    }

    #[test]
    fn empty_body_frame() {
        let mut defrag = StreamDefragmenter::new();
        let frames = defrag.push(&frame_bytes(b"")).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_empty());
    }

    #[test]
    fn oversized_length_prefix_is_fatal() {
        let mut defrag = StreamDefragmenter::new();
        let huge = ((MAX_FRAME_SIZE + 1) as u32).to_le_bytes();

        let err = defrag.push(&huge).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { .. }));
    }

    #[test]
    fn frame_at_exactly_the_bound_is_accepted() {
        let body = vec![0xAB; 512];
        let wire = frame_bytes(&body);

        let mut defrag = StreamDefragmenter::with_max_frame_size(512);
        let frames = defrag.push(&wire).unwrap();
        assert_eq!(frames[0].len(), 512);
    }
}
