use usbnow_transport::Transport;

use crate::codec::{Frame, FrameConfig};
use crate::deframer::{Deframer, DeframerStats};
use crate::error::Result;

/// Pulls available bytes from a transport and yields complete frames.
///
/// Never blocks: each [`poll`](Self::poll) drains at most one chunk of what
/// the transport already has buffered. Partial frames stay buffered across
/// polls.
#[derive(Debug)]
pub struct FrameReader {
    deframer: Deframer,
    chunk: Vec<u8>,
    config: FrameConfig,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    /// Create a frame reader with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a frame reader with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            deframer: Deframer::with_max_frame_len(config.max_frame_len),
            chunk: vec![0u8; config.read_chunk_size.max(1)],
            config,
        }
    }

    /// Read whatever is available and append completed frames to `out`.
    ///
    /// Returns the number of bytes read; `0` means the line was idle.
    pub fn poll<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        out: &mut Vec<Frame>,
    ) -> Result<usize> {
        let read = transport.read_available(&mut self.chunk)?;
        out.extend(self.deframer.feed(&self.chunk[..read]));
        Ok(read)
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.deframer.reset();
    }

    /// Deframer counters.
    pub fn stats(&self) -> DeframerStats {
        self.deframer.stats()
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
