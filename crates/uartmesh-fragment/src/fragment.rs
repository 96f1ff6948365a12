//! Fragment encoding, decoding, and message splitting.

use bytes::BufMut;
use log::trace;

use crate::{FragmentError, FLAG_LAST, FLAG_MORE, FLAG_SIZE, MAX_FRAGMENT_DATA, MAX_MESH_PAYLOAD};

/// One bounded-size chunk of a larger message.
///
/// A fragment's position in its transfer is implicit: it is never carried on
/// the wire, and the receiver recomputes it from arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Whether this is the final fragment of the message.
    pub is_last: bool,
    /// The data bytes carried by this fragment.
    pub data: Vec<u8>,
}

impl Fragment {
    /// Create a fragment, validating the data length against the capacity.
    pub fn new(data: Vec<u8>, is_last: bool) -> Result<Self, FragmentError> {
        if data.len() > MAX_FRAGMENT_DATA {
            return Err(FragmentError::DataTooLarge {
                max: MAX_FRAGMENT_DATA,
                actual: data.len(),
            });
        }
        Ok(Fragment { is_last, data })
    }

    /// Encode the fragment to its wire form: flag byte + data.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FLAG_SIZE + self.data.len());
        buf.put_u8(if self.is_last { FLAG_LAST } else { FLAG_MORE });
        buf.extend_from_slice(&self.data);
        buf
    }

    /// Decode a fragment from its wire form.
    pub fn decode(frame: &[u8]) -> Result<Self, FragmentError> {
        if frame.len() < FLAG_SIZE {
            return Err(FragmentError::too_short(frame.len()));
        }
        if frame.len() > MAX_MESH_PAYLOAD {
            return Err(FragmentError::FrameTooLong {
                max: MAX_MESH_PAYLOAD,
                actual: frame.len(),
            });
        }
        let is_last = match frame[0] {
            FLAG_MORE => false,
            FLAG_LAST => true,
            other => return Err(FragmentError::InvalidFlag(other)),
        };
        Ok(Fragment {
            is_last,
            data: frame[FLAG_SIZE..].to_vec(),
        })
    }

    /// Total wire length of this fragment (flag byte + data).
    pub fn wire_len(&self) -> usize {
        FLAG_SIZE + self.data.len()
    }
}

/// Number of fragments a message of `len` bytes splits into at `capacity`
/// data bytes per fragment. A zero-length message still occupies one
/// (empty, final) fragment so the receiver always sees a terminator.
pub fn fragment_count(len: usize, capacity: usize) -> usize {
    if len == 0 {
        1
    } else {
        len.div_ceil(capacity)
    }
}

/// Split a message into in-order fragments of at most `capacity` data bytes.
///
/// Exactly the final fragment has `is_last` set. Concatenating the fragment
/// data in order reproduces the message byte-for-byte.
pub fn split_message(message: &[u8], capacity: usize) -> Vec<Fragment> {
    debug_assert!(capacity > 0 && capacity <= MAX_FRAGMENT_DATA);

    if message.is_empty() {
        // Degenerate case: a bare terminator so the peer resets cleanly.
        return vec![Fragment {
            is_last: true,
            data: Vec::new(),
        }];
    }

    let count = fragment_count(message.len(), capacity);
    let mut fragments = Vec::with_capacity(count);
    for (index, chunk) in message.chunks(capacity).enumerate() {
        fragments.push(Fragment {
            is_last: index + 1 == count,
            data: chunk.to_vec(),
        });
    }

    trace!(
        "split {} bytes into {} fragments (capacity {})",
        message.len(),
        fragments.len(),
        capacity
    );
    fragments
}
