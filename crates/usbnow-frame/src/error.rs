/// Errors that can occur while writing or reading frames.
///
/// Corrupted input never shows up here: the deframer drops bad frames and
/// counts them in [`DeframerStats`](crate::DeframerStats) instead.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame body exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The transport failed while reading or writing.
    #[error("transport error: {0}")]
    Transport(#[from] usbnow_transport::TransportError),

    /// An I/O error occurred in a stream adapter.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
