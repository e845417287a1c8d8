//! Byte-stream transport to a local tracing service.
//!
//! The protocol layers above only require an ordered, reliable byte stream
//! with `Read + Write`. This crate provides the Unix-domain-socket flavor of
//! that stream: `connect` for clients, and a `ServiceSocket` listener used by
//! local services and the integration test harness.

pub mod error;
pub mod socket;
pub mod stream;

pub use error::{Result, TransportError};
pub use socket::ServiceSocket;
pub use stream::{connect, TraceStream};
