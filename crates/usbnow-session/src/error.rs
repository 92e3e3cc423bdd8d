use std::time::Duration;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Malformed device address input.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Argument rejected before anything was written to the device.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No terminal response within the configured window.
    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    /// The firmware answered `ERROR`.
    #[error("device error: {0}")]
    Device(String),

    /// The firmware rejected the command or replied with the wrong data.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The transport closed while a command was pending, or the session is closed.
    #[error("channel closed")]
    ChannelClosed,

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] usbnow_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] usbnow_frame::FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error outside the transport (peer files, thread spawn).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
