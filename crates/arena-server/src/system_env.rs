//! Wall-clock time and OS entropy.

use std::time::Instant;

use arena_core::Environment;

/// Production [`Environment`].
///
/// Invite codes are drawn from `getrandom`, so a client cannot predict the
/// code of a room it was not invited to.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        if let Err(e) = getrandom::fill(buffer) {
            // Zeroed codes collide in the catalog and room creation fails
            // with a storage error after its retries.
            tracing::error!(error = %e, "no entropy source, invite codes will collide");
            buffer.fill(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use arena_core::InviteCode;

    use super::*;

    #[test]
    fn clock_is_monotonic() {
        let env = SystemEnv::new();
        let t1 = env.now();
        let t2 = env.now();
        assert!(t2 >= t1);
    }

    #[test]
    fn invite_codes_are_hex_and_spread() {
        let env = SystemEnv::new();
        let codes: HashSet<_> = (0..64).map(|_| InviteCode::generate(&env)).collect();

        assert!(codes.len() > 60, "codes should rarely repeat");
        for code in &codes {
            assert_eq!(code.as_str().len(), 8);
            assert!(
                code.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
            );
        }
    }
}
