//! Raw intake buffer for serial bytes.
//!
//! Accumulates bytes between boundary declarations. The buffer has a hard
//! capacity: writes beyond it are dropped without surfacing an error
//! (overflow reporting is a non-goal), though a counter is kept for stats.

/// Fixed-capacity accumulator for one in-progress serial message.
#[derive(Debug)]
pub struct IntakeBuffer {
    buf: Vec<u8>,
    capacity: usize,
    dropped: u64,
}

impl IntakeBuffer {
    /// Create a buffer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        IntakeBuffer {
            buf: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append one byte at the next free offset.
    ///
    /// Returns `false` if the buffer is full and the byte was dropped.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.buf.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        self.buf.push(byte);
        true
    }

    /// Bytes accumulated so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Number of bytes accumulated.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Buffer capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes dropped past capacity since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Reset to empty, keeping the allocation.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
