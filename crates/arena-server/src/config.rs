//! Coordinator configuration.

/// Tunables for [`MembershipCoordinator`](crate::MembershipCoordinator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// How many times a check-and-insert is attempted when the store reports
    /// a transient conflict. At least one attempt is always made.
    pub max_admission_attempts: u32,
    /// How many invite codes are drawn before room creation gives up on
    /// catalog collisions.
    pub invite_code_attempts: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self { max_admission_attempts: 3, invite_code_attempts: 8 }
    }
}
