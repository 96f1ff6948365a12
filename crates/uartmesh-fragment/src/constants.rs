//! Protocol constants.
//!
//! These mirror the limits of the underlying mesh transport: one flag byte
//! of framing overhead is taken out of the transport's maximum usable
//! payload, and everything that remains carries message data.

/// Flag value for a non-final fragment (more fragments follow).
pub const FLAG_MORE: u8 = 0;
/// Flag value for the final fragment of a message.
pub const FLAG_LAST: u8 = 1;

/// Size of the flag prefix, in bytes.
pub const FLAG_SIZE: usize = 1;

/// Maximum payload the mesh transport will accept in a single send.
pub const MAX_MESH_PAYLOAD: usize = 95;

/// Maximum data bytes per fragment (mesh payload minus the flag byte).
pub const MAX_FRAGMENT_DATA: usize = MAX_MESH_PAYLOAD - FLAG_SIZE;
