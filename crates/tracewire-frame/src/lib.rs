//! Length-prefixed frame codec and stream defragmentation.
//!
//! Every protocol message on the wire is:
//! - A 4-byte little-endian body length
//! - Exactly that many bytes of serialized frame body
//!
//! No magic number, no padding, no version byte at this layer. The transport
//! may split or coalesce frames arbitrarily; [`StreamDefragmenter`] turns
//! that chunked stream back into complete, opaque frame bodies.

pub mod codec;
pub mod defrag;
pub mod error;

pub use codec::{encode_frame, read_length_prefix, LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE};
pub use defrag::StreamDefragmenter;
pub use error::{FrameError, Result};
