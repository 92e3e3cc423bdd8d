use std::time::Duration;

use crate::error::Result;

/// Default serial bit rate used by the firmware.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default I/O timeout for blocking writes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Transport tuning shared by every adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Bit rate for serial links. Ignored by in-memory transports.
    pub baud_rate: u32,
    /// Timeout applied to blocking writes.
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// A duplex byte stream to the device.
///
/// `read_available` must never block: it copies whatever bytes are already
/// buffered and returns `Ok(0)` when the line is idle. The session drives a
/// single reader that polls this method with a short idle backoff, while
/// command writers call `write_all` from other threads under a lock.
pub trait Transport: Send {
    /// Open the underlying stream. Opening an open transport is a no-op.
    fn open(&mut self) -> Result<()>;

    /// Close the underlying stream. Closing a closed transport is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Whether the stream is currently open.
    fn is_open(&self) -> bool;

    /// Copy currently buffered bytes into `buf` without blocking.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write the whole buffer.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Flush buffered output to the device.
    fn flush(&mut self) -> Result<()>;

    /// Current configuration.
    fn config(&self) -> &TransportConfig;

    /// Update the write timeout.
    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Update the bit rate.
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()>;

    /// Name used in diagnostics.
    fn name(&self) -> &str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_available(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_all(data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn config(&self) -> &TransportConfig {
        (**self).config()
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        (**self).set_timeout(timeout)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        (**self).set_baud_rate(baud_rate)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
