/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A length prefix (or outgoing body) exceeds the frame size bound.
    ///
    /// On the receive path this is fatal: the stream is malformed or
    /// adversarial and the session must close rather than keep allocating.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
