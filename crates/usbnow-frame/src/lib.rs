//! SLIP framing with additive checksums for the USB-Now serial protocol.
//!
//! Every message on the wire is:
//! - a body (`opcode` byte followed by the payload)
//! - a 4-byte little-endian checksum: the sum of `byte + 1` over the body
//! - byte-stuffed (`0xC0` → `0xDB 0xDC`, `0xDB` → `0xDB 0xDD`)
//! - terminated by a single `0xC0`
//!
//! Corrupted frames are dropped silently by the [`Deframer`]; callers only
//! ever see complete, checksum-validated frames.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod deframer;
pub mod error;
pub mod opcode;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::SlipCodec;
pub use codec::{
    checksum, encode_frame, stuff, unstuff_step, Frame, FrameConfig, UnstuffState, Unstuffed,
    CHECKSUM_LEN, DEFAULT_MAX_FRAME_LEN, END, ESC, ESC_END, ESC_ESC,
};
pub use deframer::{Deframer, DeframerStats, Frames};
pub use error::{FrameError, Result};
pub use opcode::{response_name, CommandOpcode, ResponseOpcode};
pub use reader::FrameReader;
pub use writer::FrameWriter;
