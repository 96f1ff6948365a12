//! Fragment wire format for the uartmesh bridge.
//!
//! Serial messages captured by the bridge can be larger than the mesh
//! transport's maximum usable payload, so they are carried as a sequence of
//! fragments. Each fragment is a single flag byte followed by up to
//! [`MAX_FRAGMENT_DATA`] data bytes:
//!
//! ```text
//! +---------+---------------------+
//! | is_last | data[0..len]        |
//! +---------+---------------------+
//! ```
//!
//! The flag byte is `1` on exactly the final fragment of a message and `0`
//! on every other fragment. No sequence number is carried on the wire; the
//! protocol relies on the transport delivering fragments of a single
//! transfer in order, and on the sender never interleaving transfers.

mod constants;
mod error;
mod fragment;

pub use constants::*;
pub use error::*;
pub use fragment::*;
