use usbnow_frame::Frame;

/// Number of informational replies kept.
pub const RESULT_RING_CAPACITY: usize = 10;

/// Fixed-capacity history of informational replies.
///
/// Pushing into a full ring evicts the oldest entry.
#[derive(Debug, Default)]
pub struct ResultRing {
    slots: [Option<Frame>; RESULT_RING_CAPACITY],
    // Next slot to write.
    head: usize,
    len: usize,
}

impl ResultRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame. Returns the evicted frame when the ring was full.
    pub fn push(&mut self, frame: Frame) -> Option<Frame> {
        let evicted = self.slots[self.head].replace(frame);
        self.head = (self.head + 1) % RESULT_RING_CAPACITY;
        if self.len < RESULT_RING_CAPACITY {
            self.len += 1;
            None
        } else {
            evicted
        }
    }

    /// Remove and return the most recent frame.
    pub fn pop_newest(&mut self) -> Option<Frame> {
        if self.len == 0 {
            return None;
        }
        self.head = (self.head + RESULT_RING_CAPACITY - 1) % RESULT_RING_CAPACITY;
        self.len -= 1;
        self.slots[self.head].take()
    }

    pub fn newest(&self) -> Option<&Frame> {
        if self.len == 0 {
            return None;
        }
        self.slots[(self.head + RESULT_RING_CAPACITY - 1) % RESULT_RING_CAPACITY].as_ref()
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Frame> + '_ {
        let start = (self.head + RESULT_RING_CAPACITY - self.len) % RESULT_RING_CAPACITY;
        (0..self.len).filter_map(move |i| self.slots[(start + i) % RESULT_RING_CAPACITY].as_ref())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.len = 0;
    }
}
