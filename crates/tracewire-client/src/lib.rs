//! Client session for a remote tracing service.
//!
//! This is the dispatch layer between a byte-oriented transport and typed
//! RPC traffic: it binds a named service once per connection, correlates
//! asynchronous replies to outstanding requests, and reassembles the
//! fragmented slices of a streaming buffer read into one contiguous trace
//! stream.
//!
//! A session is single-owner state. All mutation happens through
//! [`Session::invoke`], [`Session::handle_data`] and [`Session::handle_close`]
//! on whatever task owns the session; nothing here is shared or locked.

pub mod connector;
pub mod correlator;
pub mod error;
pub mod methods;
pub mod proto;
pub mod reassembly;
pub mod session;

pub use connector::{connect, connect_with_config};
pub use correlator::RequestCorrelator;
pub use error::{ClientError, Result};
pub use methods::{
    BufferStats, DecodeError, DisableTracingReply, EnableTracingReply, FlushReply,
    FreeBuffersReply, Method, MethodReply, MethodTable, ReadBuffersReply, ReplyDecoders,
    TraceConfig, TraceSlice, TraceStatsReply,
};
pub use proto::{decode_wire_frame, encode_wire_frame, FrameBody, MethodInfo, WireFrame};
pub use reassembly::SliceReassembler;
pub use session::{Session, SessionConfig, SessionHandler, SessionState};
