use std::fmt;
use std::io;

use usbnow_frame::FrameError;
use usbnow_session::SessionError;
use usbnow_transport::TransportError;

pub const SUCCESS: i32 = 0;
/// Command failed, including errors reported by the device.
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
/// Malformed or unexpected data: protocol errors, bad peer files.
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Local file errors (payload and peer files).
pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => USAGE,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) if source.kind() == io::ErrorKind::TimedOut => {
            CliError::new(TIMEOUT, format!("{context}: {source}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Transport(err) => transport_error(context, err),
        FrameError::Io(source) => CliError::new(TRANSPORT_ERROR, format!("{context}: {source}")),
        FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::Io(err) => io_error(context, err),
        SessionError::InvalidAddress(_) | SessionError::InvalidArgument(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        SessionError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        SessionError::Device(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        SessionError::Protocol(_) | SessionError::Json(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        SessionError::ChannelClosed => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn session_errors_map_to_exit_codes() {
        let cases = [
            (SessionError::InvalidAddress("x".into()), USAGE),
            (SessionError::InvalidArgument("x".into()), USAGE),
            (SessionError::Timeout(Duration::from_secs(1)), TIMEOUT),
            (SessionError::Device("no peer".into()), FAILURE),
            (SessionError::Protocol("mismatch".into()), DATA_INVALID),
            (SessionError::ChannelClosed, TRANSPORT_ERROR),
            (SessionError::Transport(TransportError::Closed), TRANSPORT_ERROR),
            (
                SessionError::Frame(FrameError::PayloadTooLarge { size: 9, max: 8 }),
                DATA_INVALID,
            ),
        ];
        for (err, code) in cases {
            assert_eq!(session_error("ctx", err).code, code);
        }
    }

    #[test]
    fn open_failure_is_transport_error() {
        let err = TransportError::Open {
            port: "/dev/missing".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        let cli = transport_error("open failed", err);
        assert_eq!(cli.code, TRANSPORT_ERROR);
        assert!(cli.message.starts_with("open failed: "));
    }

    #[test]
    fn missing_local_file_is_usage() {
        let err = io_error("read payload", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.code, USAGE);
    }
}
