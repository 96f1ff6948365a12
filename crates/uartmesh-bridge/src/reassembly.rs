//! Reassembly of mesh fragments into the original serial message.
//!
//! There is no message ID on the wire: the receiver keys everything off
//! "the single active transfer". Fragment data lands at `position *
//! fragment_capacity`, and a fragment flagged last completes the message.
//!
//! A lost final fragment leaves the receiver stuck in a partially filled
//! state until the next transfer's data lands on top of it; the protocol
//! provides no timeout or recovery for that case.

use tracing::trace;
use uartmesh_fragment::Fragment;

/// Accumulator for the single in-progress inbound transfer.
#[derive(Debug)]
pub struct Reassembler {
    buf: Vec<u8>,
    fragment_capacity: usize,
    position: usize,
    received: usize,
}

impl Reassembler {
    /// Create a reassembler with the given assembled-message capacity and
    /// per-fragment data capacity.
    pub fn new(capacity: usize, fragment_capacity: usize) -> Self {
        Reassembler {
            buf: vec![0; capacity],
            fragment_capacity,
            position: 0,
            received: 0,
        }
    }

    /// Consume one fragment.
    ///
    /// Returns the assembled message when the fragment was flagged last;
    /// counters reset before returning. Data past the buffer capacity is
    /// dropped, consistent with the intake side's overflow policy.
    pub fn accept(&mut self, fragment: &Fragment) -> Option<Vec<u8>> {
        let offset = self.position * self.fragment_capacity;
        let room = self.buf.len().saturating_sub(offset);
        let copied = fragment.data.len().min(room);
        if copied > 0 {
            self.buf[offset..offset + copied].copy_from_slice(&fragment.data[..copied]);
            self.received += copied;
        }

        trace!(
            position = self.position,
            bytes = copied,
            is_last = fragment.is_last,
            "fragment accepted"
        );

        if fragment.is_last {
            let message = self.buf[..self.received].to_vec();
            self.position = 0;
            self.received = 0;
            Some(message)
        } else {
            // A stranded transfer (lost final fragment) can leave the
            // position past capacity; saturate there instead of walking
            // the offset out of the buffer.
            if offset < self.buf.len() {
                self.position += 1;
            }
            None
        }
    }

    /// Bytes accumulated for the in-progress transfer.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Fragment-position counter for the in-progress transfer.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Whether a transfer is partially assembled.
    pub fn in_progress(&self) -> bool {
        self.received > 0 || self.position > 0
    }
}
