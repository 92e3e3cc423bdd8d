use bytes::{BufMut, BytesMut};
use tracing::debug;

use crate::codec::{
    unstuff_step, Frame, UnstuffState, Unstuffed, CHECKSUM_LEN, DEFAULT_MAX_FRAME_LEN, END,
};

/// Counters for frames emitted and dropped by a [`Deframer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeframerStats {
    /// Frames that passed validation and were emitted.
    pub frames: u64,
    /// Frames whose transmitted checksum did not match the body.
    pub checksum_mismatch: u64,
    /// Frames containing an escape byte followed by an invalid byte.
    pub malformed_escape: u64,
    /// Frames too short to hold a checksum and an opcode.
    pub too_short: u64,
    /// Frames longer than the configured maximum.
    pub overflow: u64,
}

impl DeframerStats {
    /// Total number of dropped frames.
    pub fn dropped(&self) -> u64 {
        self.checksum_mismatch + self.malformed_escape + self.too_short + self.overflow
    }
}

/// Push parser turning a byte stream into checksum-validated frames.
///
/// Bytes are fed one at a time; a frame is returned when its terminator
/// arrives and the trailing checksum matches. Invalid frames are counted and
/// dropped, and the parser resynchronizes on the next `END`.
#[derive(Debug)]
pub struct Deframer {
    buf: BytesMut,
    state: UnstuffState,
    checksum: u32,
    discarding: bool,
    max_frame_len: usize,
    stats: DeframerStats,
}

impl Default for Deframer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deframer {
    /// Create a deframer with the default frame size limit.
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    /// Create a deframer accepting bodies of at most `max_frame_len` bytes.
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
            state: UnstuffState::Normal,
            checksum: 0,
            discarding: false,
            max_frame_len,
            stats: DeframerStats::default(),
        }
    }

    /// Feed one byte. Returns a frame when `byte` completes a valid one.
    pub fn push(&mut self, byte: u8) -> Option<Frame> {
        if self.discarding {
            if byte == END {
                self.reset();
            }
            return None;
        }

        let (next, out) = unstuff_step(self.state, byte);
        self.state = next;

        match out {
            Unstuffed::Pending => None,
            Unstuffed::Byte(b) => {
                if self.buf.len() >= self.max_frame_len + CHECKSUM_LEN {
                    self.stats.overflow += 1;
                    debug!(max = self.max_frame_len, "dropping oversized frame");
                    self.discard_until_end();
                    return None;
                }
                self.buf.put_u8(b);
                self.checksum = self.checksum.wrapping_add(u32::from(b) + 1);
                None
            }
            Unstuffed::End => self.close_frame(),
            Unstuffed::Malformed(b) => {
                self.stats.malformed_escape += 1;
                debug!(byte = b, "dropping frame with malformed escape");
                if b == END {
                    self.reset();
                } else {
                    self.discard_until_end();
                }
                None
            }
        }
    }

    /// Lazily deframe `data`, yielding frames in arrival order.
    ///
    /// Bytes are consumed only as the iterator advances; bytes not reached
    /// before the iterator is dropped are not fed.
    pub fn feed<'a>(&'a mut self, data: &'a [u8]) -> Frames<'a> {
        Frames {
            deframer: self,
            data: data.iter(),
        }
    }

    /// Feed all of `data` and collect the completed frames.
    pub fn push_slice(&mut self, data: &[u8]) -> Vec<Frame> {
        self.feed(data).collect()
    }

    /// Discard any partial frame and return to the start state.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = UnstuffState::Normal;
        self.checksum = 0;
        self.discarding = false;
    }

    /// Whether no partial frame is buffered.
    pub fn is_idle(&self) -> bool {
        self.buf.is_empty() && self.state == UnstuffState::Normal && !self.discarding
    }

    /// Emitted/dropped counters since creation.
    pub fn stats(&self) -> DeframerStats {
        self.stats
    }

    /// Maximum accepted body size.
    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    fn discard_until_end(&mut self) {
        self.buf.clear();
        self.checksum = 0;
        self.state = UnstuffState::Normal;
        self.discarding = true;
    }

    fn close_frame(&mut self) -> Option<Frame> {
        let len = self.buf.len();

        // Back-to-back terminators carry no frame.
        if len == 0 {
            self.reset();
            return None;
        }

        if len < CHECKSUM_LEN + 1 {
            self.stats.too_short += 1;
            debug!(len, "dropping frame too short for opcode and checksum");
            self.reset();
            return None;
        }

        let split = len - CHECKSUM_LEN;
        let tail = &self.buf[split..];
        let transmitted = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
        let computed = tail.iter().fold(self.checksum, |acc, &b| {
            acc.wrapping_sub(u32::from(b) + 1)
        });

        if transmitted != computed {
            self.stats.checksum_mismatch += 1;
            debug!(transmitted, computed, len, "dropping frame with bad checksum");
            self.reset();
            return None;
        }

        let body = self.buf.split_to(split).freeze();
        self.reset();
        self.stats.frames += 1;
        Frame::from_body(body)
    }
}

/// Iterator returned by [`Deframer::feed`].
pub struct Frames<'a> {
    deframer: &'a mut Deframer,
    data: std::slice::Iter<'a, u8>,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        for &byte in self.data.by_ref() {
            if let Some(frame) = self.deframer.push(byte) {
                return Some(frame);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::codec::{encode_frame, stuff, ESC, ESC_END, ESC_ESC};

    fn wire(opcode: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(opcode, payload, &mut buf);
        buf.to_vec()
    }

    #[test]
    fn decodes_single_frame() {
        let mut deframer = Deframer::new();
        let frames = deframer.push_slice(&wire(0x02, &[1, 0, 0, 0]));

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].opcode, 0x02);
        assert_eq!(frames[0].payload.as_ref(), &[1, 0, 0, 0]);
        assert!(deframer.is_idle());
        assert_eq!(deframer.stats().frames, 1);
    }

    #[test]
    fn roundtrip_bodies_with_reserved_bytes() {
        let payloads: Vec<Vec<u8>> = vec![
            vec![],
            vec![END],
            vec![ESC],
            vec![ESC, ESC_END],
            vec![ESC, ESC_ESC],
            vec![END, END, ESC, ESC],
            (0..=255u8).collect(),
            (0..=255u8).rev().cycle().take(1000).collect(),
        ];

        let mut deframer = Deframer::new();
        for opcode in [0x00, 0x07, END, ESC, 0xFF] {
            for payload in &payloads {
                let frames = deframer.push_slice(&wire(opcode, payload));
                assert_eq!(frames.len(), 1, "opcode {opcode:#x} payload {payload:?}");
                assert_eq!(frames[0].opcode, opcode);
                assert_eq!(frames[0].payload.as_ref(), payload.as_slice());
            }
        }
        assert_eq!(deframer.stats().dropped(), 0);
    }

    #[test]
    fn frames_split_across_pushes() {
        let bytes = wire(0x07, b"hello radio");
        let mut deframer = Deframer::new();

        let mut out = Vec::new();
        for chunk in bytes.chunks(3) {
            out.extend(deframer.push_slice(chunk));
        }
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].payload.as_ref(), b"hello radio");
    }

    #[test]
    fn multiple_frames_in_order() {
        let mut bytes = wire(0x05, &[1]);
        bytes.extend(wire(0x00, &[]));
        bytes.extend(wire(0x06, &[3, 0, 0, 0]));

        let mut deframer = Deframer::new();
        let opcodes: Vec<u8> = deframer.feed(&bytes).map(|f| f.opcode).collect();
        assert_eq!(opcodes, vec![0x05, 0x00, 0x06]);
    }

    #[test]
    fn feed_is_lazy() {
        let mut bytes = wire(0x05, &[1]);
        let first_len = bytes.len();
        bytes.extend(wire(0x06, &[2]));

        let mut deframer = Deframer::new();
        {
            let mut frames = deframer.feed(&bytes);
            assert_eq!(frames.next().map(|f| f.opcode), Some(0x05));
        }
        assert!(deframer.is_idle());
        let rest = deframer.push_slice(&bytes[first_len..]);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].opcode, 0x06);
    }

    #[test]
    fn single_bit_flips_are_rejected() {
        // Body chosen so no single flip can forge END or ESC in the stream.
        let body_payload = [0x01, END, 0x10, ESC, 0x20, 0x33];
        let bytes = wire(0x02, &body_payload);
        assert_eq!(
            &bytes[bytes.len() - 5..],
            &[0x08, 0x02, 0x00, 0x00, END],
            "checksum layout changed; revisit the chosen body"
        );

        let terminator = bytes.len() - 1;
        for index in 0..terminator {
            for bit in 0..8 {
                let mut corrupted = bytes.clone();
                corrupted[index] ^= 1 << bit;

                let mut deframer = Deframer::new();
                let frames = deframer.push_slice(&corrupted);
                assert!(
                    frames.is_empty(),
                    "flip of bit {bit} at byte {index} produced {frames:?}"
                );
                assert!(deframer.stats().dropped() >= 1);
                assert!(deframer.is_idle());
            }
        }
    }

    #[test]
    fn checksum_mismatch_is_counted() {
        let mut bytes = wire(0x02, &[1, 0, 0, 0]);
        bytes[1] = 0x09;

        let mut deframer = Deframer::new();
        assert!(deframer.push_slice(&bytes).is_empty());
        assert_eq!(deframer.stats().checksum_mismatch, 1);
    }

    #[test]
    fn short_frames_are_dropped() {
        let mut deframer = Deframer::new();
        assert!(deframer.push_slice(&[0x01, 0x02, END]).is_empty());
        // Exactly a checksum with no opcode.
        assert!(deframer.push_slice(&[0x00, 0x00, 0x00, 0x00, END]).is_empty());
        assert_eq!(deframer.stats().too_short, 2);
    }

    #[test]
    fn bare_terminators_are_ignored() {
        let mut deframer = Deframer::new();
        let mut bytes = vec![END, END];
        bytes.extend(wire(0x00, &[]));

        let frames = deframer.push_slice(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(deframer.stats().dropped(), 0);
    }

    #[test]
    fn malformed_escape_discards_until_terminator() {
        let mut bytes = vec![0x00, ESC, 0x41, 0x01, 0x00, 0x00, 0x00, END];
        bytes.extend(wire(0x00, &[]));

        let mut deframer = Deframer::new();
        let frames = deframer.push_slice(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].opcode, 0x00);
        assert_eq!(deframer.stats().malformed_escape, 1);
    }

    #[test]
    fn escape_followed_by_end_drops_frame() {
        let mut bytes = vec![0x00, 0x01, 0x00, 0x00, 0x00, ESC, END];
        bytes.extend(wire(0x04, &[1, 2, 3, 4, 5, 6]));

        let mut deframer = Deframer::new();
        let frames = deframer.push_slice(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].opcode, 0x04);
        assert_eq!(deframer.stats().malformed_escape, 1);
    }

    #[test]
    fn oversized_frame_is_dropped_and_parser_recovers() {
        let mut deframer = Deframer::with_max_frame_len(8);
        let mut bytes = wire(0x07, &[0xAA; 32]);
        bytes.extend(wire(0x00, &[]));

        let frames = deframer.push_slice(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].opcode, 0x00);
        assert_eq!(deframer.stats().overflow, 1);
    }

    #[test]
    fn max_sized_frame_is_accepted() {
        let mut deframer = Deframer::with_max_frame_len(8);
        let frames = deframer.push_slice(&wire(0x07, &[0x11; 7]));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].body_len(), 8);
    }

    #[test]
    fn stuffed_body_never_contains_terminator() {
        let body: Vec<u8> = (0..=255u8).collect();
        assert!(stuff(&body).iter().all(|&b| b != END));
    }
}
