/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the named port.
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the byte stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport is closed (locally or by the other end).
    #[error("transport closed")]
    Closed,

    /// The serial driver rejected a configuration or query.
    #[cfg(feature = "serial")]
    #[error("serial port error: {0}")]
    Serial(String),
}

#[cfg(feature = "serial")]
impl From<serialport::Error> for TransportError {
    fn from(err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::Io(kind) => {
                TransportError::Io(std::io::Error::new(kind, err.description))
            }
            _ => TransportError::Serial(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
