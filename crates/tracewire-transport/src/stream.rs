use std::io::{Read, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{Result, TransportError};

/// A connected byte stream to a tracing service — implements Read + Write.
///
/// Wraps a Unix domain socket stream. The session layer never sees the
/// concrete socket type, only this wrapper.
pub struct TraceStream {
    inner: TraceStreamInner,
}

enum TraceStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for TraceStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            TraceStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for TraceStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            TraceStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            TraceStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl TraceStream {
    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: TraceStreamInner::Unix(stream),
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            TraceStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            TraceStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    ///
    /// Sessions clone once: one half feeds incoming data to the session, the
    /// other is owned by the session for writes.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            TraceStreamInner::Unix(stream) => {
                let cloned = stream.try_clone()?;
                Ok(Self::from_unix(cloned))
            }
        }
    }

    /// Shut down both directions of the stream.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            TraceStreamInner::Unix(stream) => stream
                .shutdown(std::net::Shutdown::Both)
                .map_err(Into::into),
        }
    }
}

impl std::fmt::Debug for TraceStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            #[cfg(unix)]
            TraceStreamInner::Unix(_) => f
                .debug_struct("TraceStream")
                .field("type", &"unix")
                .finish(),
        }
    }
}

/// Connect to a tracing service listening on a Unix domain socket (blocking).
pub fn connect(path: impl AsRef<Path>) -> Result<TraceStream> {
    let path = path.as_ref();
    let stream =
        std::os::unix::net::UnixStream::connect(path).map_err(|e| TransportError::Connect {
            path: path.to_path_buf(),
            source: e,
        })?;
    debug!(?path, "connected to tracing service socket");
    Ok(TraceStream::from_unix(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    fn pair() -> (TraceStream, TraceStream) {
        let (a, b) = std::os::unix::net::UnixStream::pair().unwrap();
        (TraceStream::from_unix(a), TraceStream::from_unix(b))
    }

    #[test]
    fn read_write_roundtrip() {
        let (mut left, mut right) = pair();
        left.write_all(b"probe").unwrap();
        let mut buf = [0u8; 5];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"probe");
    }

    #[test]
    fn try_clone_shares_the_connection() {
        let (mut left, right) = pair();
        let mut reader = right.try_clone().unwrap();
        drop(right);

        left.write_all(b"x").unwrap();
        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf[0], b'x');
    }

    #[test]
    fn connect_missing_socket_fails() {
        let result = connect("/tmp/tracewire-definitely-missing.sock");
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[test]
    fn timeouts_apply() {
        let (left, _right) = pair();
        left.set_read_timeout(Some(std::time::Duration::from_millis(10)))
            .unwrap();
        left.set_write_timeout(Some(std::time::Duration::from_millis(10)))
            .unwrap();
    }
}
