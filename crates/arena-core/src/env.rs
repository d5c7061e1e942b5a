//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples coordinator logic from system resources
//! (time and randomness). Production code runs on the system clock and OS
//! entropy; the harness substitutes a seeded RNG and a virtual clock so a
//! failing run can be replayed from its seed.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use std::time::Instant;

/// Abstract environment providing time and randomness.
///
/// Implementations MUST guarantee:
///
/// 1. Time monotonicity: `now()` never goes backwards
/// 2. RNG quality: `random_bytes()` uses OS entropy in production
/// 3. Minimal panics: Methods are infallible
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current time.
    ///
    /// Subsequent calls must return times >= previous calls.
    fn now(&self) -> Instant;

    /// Fills the provided buffer with random bytes.
    ///
    /// Invite codes are drawn from here, so simulation implementations MUST
    /// be seeded and log their seed for reproducibility.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u32`.
    fn random_u32(&self) -> u32 {
        let mut bytes = [0u8; 4];
        self.random_bytes(&mut bytes);
        u32::from_be_bytes(bytes)
    }

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct CountingEnv;

    impl Environment for CountingEnv {
        fn now(&self) -> Instant {
            Instant::now()
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = i as u8 + 1;
            }
        }
    }

    #[test]
    fn random_helpers_are_big_endian() {
        let env = CountingEnv;
        assert_eq!(env.random_u32(), 0x0102_0304);
        assert_eq!(env.random_u64(), 0x0102_0304_0506_0708);
    }
}
