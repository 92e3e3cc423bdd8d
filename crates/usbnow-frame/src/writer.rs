use bytes::BytesMut;
use usbnow_transport::Transport;

use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 512;

/// Encodes frames and writes them to a transport.
#[derive(Debug)]
pub struct FrameWriter {
    buf: BytesMut,
    config: FrameConfig,
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameWriter {
    /// Create a new frame writer with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame.
    pub fn write_frame<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        frame: &Frame,
    ) -> Result<()> {
        self.send(transport, frame.opcode, frame.payload.as_ref())
    }

    /// Encode `opcode ‖ payload` and write it in one transport call.
    pub fn send<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        opcode: u8,
        payload: &[u8],
    ) -> Result<()> {
        let body_len = 1 + payload.len();
        if body_len > self.config.max_frame_len {
            return Err(FrameError::PayloadTooLarge {
                size: body_len,
                max: self.config.max_frame_len,
            });
        }

        self.buf.clear();
        encode_frame(opcode, payload, &mut self.buf);
        transport.write_all(&self.buf)?;
        transport.flush()?;
        Ok(())
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
