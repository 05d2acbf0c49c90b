use std::sync::atomic::{AtomicU64, Ordering};

use rand::RngCore;

/// Number of random bytes in a generated id (hex-encoded, so twice as many
/// characters in the final id).
pub const DEFAULT_RANDOM_BYTES: usize = 16;

/// Generates globally-unique, unpredictable ticket ids of the form
/// `<PREFIX>-<sequence>-<random>`.
///
/// The sequence is an explicitly-owned per-instance counter; guess
/// resistance comes entirely from the random component, which is drawn
/// from the thread-local CSPRNG.
pub struct TicketIdGenerator {
    random_bytes: usize,
    sequence: AtomicU64,
    wrap_on_overflow: bool,
}

impl Default for TicketIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketIdGenerator {
    pub fn new() -> Self {
        Self::with_options(DEFAULT_RANDOM_BYTES, true)
    }

    /// `wrap_on_overflow = false` makes sequence exhaustion fatal: the
    /// generator panics rather than silently reusing sequence numbers.
    pub fn with_options(random_bytes: usize, wrap_on_overflow: bool) -> Self {
        Self {
            random_bytes,
            sequence: AtomicU64::new(0),
            wrap_on_overflow,
        }
    }

    /// Produce a new id: `"<prefix>-<sequence>-<random>"`.
    pub fn new_id(&self, prefix: &str) -> String {
        let sequence = self.next_sequence();
        let mut bytes = vec![0u8; self.random_bytes];
        rand::thread_rng().fill_bytes(&mut bytes);
        format!("{prefix}-{sequence}-{}", hex::encode(bytes))
    }

    fn next_sequence(&self) -> u64 {
        let previous = self.sequence.fetch_add(1, Ordering::Relaxed);
        if previous == u64::MAX && !self.wrap_on_overflow {
            panic!("ticket id sequence exhausted and wrap-on-overflow is disabled");
        }
        previous.wrapping_add(1)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_id_format() {
        let generator = TicketIdGenerator::new();
        let id = generator.new_id("TGT");
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TGT");
        assert_eq!(parts[1], "1");
        assert_eq!(parts[2].len(), DEFAULT_RANDOM_BYTES * 2);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_sequence_increments() {
        let generator = TicketIdGenerator::new();
        let first = generator.new_id("ST");
        let second = generator.new_id("ST");
        assert!(first.starts_with("ST-1-"));
        assert!(second.starts_with("ST-2-"));
    }

    #[test]
    fn test_uniqueness() {
        let generator = TicketIdGenerator::new();
        let mut seen = HashSet::new();
        for _ in 0..100_000 {
            assert!(seen.insert(generator.new_id("TGT")));
        }
    }

    #[test]
    fn test_wrap_on_overflow() {
        let generator = TicketIdGenerator::with_options(4, true);
        generator.sequence.store(u64::MAX, Ordering::Relaxed);
        let id = generator.new_id("ST");
        assert!(id.starts_with("ST-0-"));
    }

    #[test]
    #[should_panic(expected = "sequence exhausted")]
    fn test_exhaustion_without_wrap_panics() {
        let generator = TicketIdGenerator::with_options(4, false);
        generator.sequence.store(u64::MAX, Ordering::Relaxed);
        generator.new_id("ST");
    }
}
