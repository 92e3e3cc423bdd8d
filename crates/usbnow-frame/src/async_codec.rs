//! `tokio_util::codec` adapter for async byte streams.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::deframer::{Deframer, DeframerStats};
use crate::error::FrameError;

/// SLIP codec for use with `FramedRead`/`FramedWrite`.
///
/// Decoding shares the [`Deframer`] state machine, so corrupted frames are
/// dropped and counted exactly as on the blocking path.
#[derive(Debug)]
pub struct SlipCodec {
    deframer: Deframer,
    max_frame_len: usize,
}

impl Default for SlipCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl SlipCodec {
    /// Create a codec with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a codec with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            deframer: Deframer::with_max_frame_len(config.max_frame_len),
            max_frame_len: config.max_frame_len,
        }
    }

    /// Deframer counters.
    pub fn stats(&self) -> DeframerStats {
        self.deframer.stats()
    }
}

impl Decoder for SlipCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        let mut consumed = 0;
        let mut decoded = None;
        for &byte in src.iter() {
            consumed += 1;
            if let Some(frame) = self.deframer.push(byte) {
                decoded = Some(frame);
                break;
            }
        }
        src.advance(consumed);
        Ok(decoded)
    }
}

impl Encoder<Frame> for SlipCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        if frame.body_len() > self.max_frame_len {
            return Err(FrameError::PayloadTooLarge {
                size: frame.body_len(),
                max: self.max_frame_len,
            });
        }
        encode_frame(frame.opcode, &frame.payload, dst);
        Ok(())
    }
}
