//! Test traffic generation.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Build the classic smoke-test message: `len` bytes of an incrementing
/// ramp, with byte 0 overwritten by `address` when given so the message
/// passes a destination filter.
pub fn ramp_message(len: usize, address: Option<u8>) -> Vec<u8> {
    let mut message: Vec<u8> = (0..len).map(|i| i as u8).collect();
    if let (Some(address), Some(first)) = (address, message.first_mut()) {
        *first = address;
    }
    message
}

/// Seeded random message generator for reproducible runs.
pub struct TrafficGenerator {
    rng: ChaCha8Rng,
    address: Option<u8>,
}

impl TrafficGenerator {
    /// Create a generator. `address` is stamped into byte 0 of every
    /// message when set.
    pub fn new(seed: u64, address: Option<u8>) -> Self {
        TrafficGenerator {
            rng: ChaCha8Rng::seed_from_u64(seed),
            address,
        }
    }

    /// Produce one random message of 1..=`max_len` bytes.
    pub fn message(&mut self, max_len: usize) -> Vec<u8> {
        let len = self.rng.gen_range(1..=max_len.max(1));
        let mut message: Vec<u8> = (0..len).map(|_| self.rng.gen()).collect();
        if let (Some(address), Some(first)) = (self.address, message.first_mut()) {
            *first = address;
        }
        message
    }
}
