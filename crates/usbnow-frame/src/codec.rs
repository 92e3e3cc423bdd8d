use bytes::{BufMut, Bytes, BytesMut};

/// Frame terminator.
pub const END: u8 = 0xC0;
/// Escape introducer.
pub const ESC: u8 = 0xDB;
/// Escaped form of [`END`] (follows [`ESC`]).
pub const ESC_END: u8 = 0xDC;
/// Escaped form of [`ESC`] (follows [`ESC`]).
pub const ESC_ESC: u8 = 0xDD;

/// Trailing checksum size in bytes.
pub const CHECKSUM_LEN: usize = 4;

/// Default maximum body size (opcode + payload): the firmware receive buffer.
pub const DEFAULT_MAX_FRAME_LEN: usize = 2048;

/// A decoded frame: one opcode byte plus its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Leading opcode byte (command or response, depending on direction).
    pub opcode: u8,
    /// Bytes following the opcode.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(opcode: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }

    /// Split a body into opcode and payload. Returns `None` for an empty body.
    pub fn from_body(mut body: Bytes) -> Option<Self> {
        if body.is_empty() {
            return None;
        }
        let rest = body.split_off(1);
        Some(Self {
            opcode: body[0],
            payload: rest,
        })
    }

    /// The logical body (opcode followed by payload).
    pub fn body(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(1 + self.payload.len());
        body.push(self.opcode);
        body.extend_from_slice(&self.payload);
        body
    }

    /// Body length (opcode + payload).
    pub fn body_len(&self) -> usize {
        1 + self.payload.len()
    }
}

/// Configuration shared by the frame reader and writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum body size in bytes. Default: 2048.
    pub max_frame_len: usize,
    /// Bytes pulled from the transport per poll. Default: 256.
    pub read_chunk_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            read_chunk_size: 256,
        }
    }
}

/// Additive checksum: sum of `byte + 1` over `bytes`, modulo 2^32.
pub fn checksum(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, &b| acc.wrapping_add(u32::from(b) + 1))
}

/// Byte-stuff `bytes` so that neither [`END`] nor [`ESC`] appears literally.
pub fn stuff(bytes: &[u8]) -> Vec<u8> {
    let mut out = BytesMut::with_capacity(bytes.len() + bytes.len() / 8);
    stuff_into(bytes, &mut out);
    out.to_vec()
}

pub(crate) fn stuff_into(bytes: &[u8], dst: &mut BytesMut) {
    for &b in bytes {
        match b {
            END => dst.put_slice(&[ESC, ESC_END]),
            ESC => dst.put_slice(&[ESC, ESC_ESC]),
            _ => dst.put_u8(b),
        }
    }
}

/// Unstuffing state between two input bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnstuffState {
    #[default]
    Normal,
    /// The previous byte was [`ESC`].
    Escaped,
}

/// What a single input byte produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unstuffed {
    /// A literal body byte.
    Byte(u8),
    /// An [`ESC`] was consumed; the next byte decides.
    Pending,
    /// An unescaped [`END`]: the frame is complete.
    End,
    /// [`ESC`] followed by something other than [`ESC_END`]/[`ESC_ESC`].
    Malformed(u8),
}

/// Advance the unstuffing state machine by one byte.
pub fn unstuff_step(state: UnstuffState, byte: u8) -> (UnstuffState, Unstuffed) {
    match state {
        UnstuffState::Normal => match byte {
            ESC => (UnstuffState::Escaped, Unstuffed::Pending),
            END => (UnstuffState::Normal, Unstuffed::End),
            b => (UnstuffState::Normal, Unstuffed::Byte(b)),
        },
        UnstuffState::Escaped => match byte {
            ESC_END => (UnstuffState::Normal, Unstuffed::Byte(END)),
            ESC_ESC => (UnstuffState::Normal, Unstuffed::Byte(ESC)),
            other => (UnstuffState::Normal, Unstuffed::Malformed(other)),
        },
    }
}

/// Encode one frame into wire format.
///
/// Wire format:
/// ```text
/// ┌─────────────────────────────────────────────────┬──────┐
/// │ STUFF( opcode ‖ payload ‖ checksum (4B LE) )    │ 0xC0 │
/// └─────────────────────────────────────────────────┴──────┘
/// ```
pub fn encode_frame(opcode: u8, payload: &[u8], dst: &mut BytesMut) {
    let sum = checksum(payload).wrapping_add(u32::from(opcode) + 1);

    dst.reserve(payload.len() + CHECKSUM_LEN + 4);
    stuff_into(&[opcode], dst);
    stuff_into(payload, dst);
    stuff_into(&sum.to_le_bytes(), dst);
    dst.put_u8(END);
}
