use std::path::Path;

use tracewire_transport::TraceStream;

use crate::error::Result;
use crate::session::{Session, SessionConfig, SessionHandler};

/// Connect to a tracing service and build a session over the stream.
///
/// Returns the session (which owns the write half) and a cloned read half.
/// The caller drives the session by reading from the returned stream and
/// feeding the bytes into [`Session::handle_data`]; a read of zero bytes
/// means the transport closed and should be forwarded to
/// [`Session::handle_close`].
pub fn connect<H: SessionHandler>(
    path: impl AsRef<Path>,
    handler: H,
) -> Result<(Session<TraceStream, H>, TraceStream)> {
    connect_with_config(path, handler, SessionConfig::default())
}

/// Connect with explicit session configuration.
pub fn connect_with_config<H: SessionHandler>(
    path: impl AsRef<Path>,
    handler: H,
    config: SessionConfig,
) -> Result<(Session<TraceStream, H>, TraceStream)> {
    let stream = tracewire_transport::connect(path)?;
    let reader = stream.try_clone()?;
    Ok((Session::with_config(stream, handler, config), reader))
}
