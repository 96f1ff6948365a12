//! Fragment error types.

use thiserror::Error;

/// Errors that can occur when encoding or decoding fragments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FragmentError {
    /// Frame is too short to carry the flag byte.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Frame exceeds the mesh transport's maximum payload.
    #[error("frame too long: maximum {max} bytes, got {actual}")]
    FrameTooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Fragment data exceeds the per-fragment capacity.
    #[error("fragment data too large: maximum {max} bytes, got {actual}")]
    DataTooLarge {
        /// Maximum allowed data bytes.
        max: usize,
        /// Actual data length.
        actual: usize,
    },

    /// Flag byte is neither `FLAG_MORE` nor `FLAG_LAST`.
    #[error("invalid flag byte: 0x{0:02X}")]
    InvalidFlag(u8),
}

impl FragmentError {
    /// Create a too-short error with the protocol's minimum frame size.
    pub fn too_short(actual: usize) -> Self {
        FragmentError::FrameTooShort {
            expected: crate::FLAG_SIZE,
            actual,
        }
    }
}
