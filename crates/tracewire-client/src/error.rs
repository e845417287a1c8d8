/// Errors that can occur in client session operations.
///
/// Everything here is fatal for the session. Capability-level conditions
/// (an unsupported method, a reply with no local decoder) are handled inside
/// the session with a logged warning and never surface as errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] tracewire_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] tracewire_frame::FrameError),

    /// An I/O error occurred while writing to the transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame body serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A reply referenced a request id that was never issued, or was already
    /// completed. The stream is desynchronized; further parsing is unsafe.
    #[error("reply references unknown request id {0}")]
    UnknownRequest(u32),

    /// The service rejected the bind handshake.
    #[error("service binding failed: {0}")]
    BindFailed(String),

    /// A frame arrived that the client side never expects to receive.
    #[error("unexpected frame for request id {0}")]
    UnexpectedFrame(u32),
}

pub type Result<T> = std::result::Result<T, ClientError>;
