use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Transport, TransportConfig};

/// One direction of an in-memory link.
#[derive(Debug, Default)]
struct Pipe {
    bytes: Mutex<VecDeque<u8>>,
    closed: AtomicBool,
}

impl Pipe {
    fn push(&self, data: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let mut bytes = self.bytes.lock().map_err(|_| TransportError::Closed)?;
        bytes.extend(data);
        Ok(())
    }

    fn drain_into(&self, buf: &mut [u8]) -> Result<usize> {
        let mut bytes = self.bytes.lock().map_err(|_| TransportError::Closed)?;
        if bytes.is_empty() {
            if self.closed.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            return Ok(0);
        }
        let n = bytes.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(bytes.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn len(&self) -> usize {
        self.bytes.lock().map(|bytes| bytes.len()).unwrap_or(0)
    }
}

/// In-memory duplex byte stream.
///
/// Created in cross-connected pairs: bytes written on one endpoint become
/// readable on the other. Closing either endpoint closes both directions;
/// the other endpoint can still drain bytes already in flight, then reads
/// fail with [`TransportError::Closed`].
#[derive(Debug)]
pub struct MemoryTransport {
    rx: Arc<Pipe>,
    tx: Arc<Pipe>,
    open: bool,
    config: TransportConfig,
    name: String,
}

impl MemoryTransport {
    /// Create a connected pair of endpoints `(host, device)`.
    pub fn pair() -> (Self, Self) {
        let a_to_b = Arc::new(Pipe::default());
        let b_to_a = Arc::new(Pipe::default());

        let host = Self {
            rx: Arc::clone(&b_to_a),
            tx: Arc::clone(&a_to_b),
            open: true,
            config: TransportConfig::default(),
            name: "memory:host".to_string(),
        };
        let device = Self {
            rx: a_to_b,
            tx: b_to_a,
            open: true,
            config: TransportConfig::default(),
            name: "memory:device".to_string(),
        };
        (host, device)
    }

    /// Number of bytes waiting to be read on this endpoint.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    fn links_closed(&self) -> bool {
        self.rx.closed.load(Ordering::SeqCst) || self.tx.closed.load(Ordering::SeqCst)
    }
}

impl Transport for MemoryTransport {
    fn open(&mut self) -> Result<()> {
        if self.links_closed() {
            return Err(TransportError::Closed);
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            debug!(name = %self.name, "closing memory transport");
        }
        self.open = false;
        self.rx.closed.store(true, Ordering::SeqCst);
        self.tx.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open && !self.links_closed()
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        self.rx.drain_into(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        self.tx.push(data)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.config.timeout = timeout;
        Ok(())
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.config.baud_rate = baud_rate;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
