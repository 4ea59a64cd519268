//! Cooperative cancellation for the planner.
//!
//! **What**: [`CancelToken`], a cheap, cloneable flag the planner polls
//! before each package so a caller can stop a long-running version-listing
//! pass early and still get back a partial, valid plan.
//!
//! **How**: `Arc<AtomicBool>`, nothing more — spec §4.4/§5 only requires
//! "check before each package," not a full cancellation-token hierarchy with
//! linked children or drop guards.
//!
//! **Why**: the executor does not check cancellation mid-group (spec §5: "a
//! group either completes or rolls back atomically"), so this type is
//! deliberately planner-only and has no timeout or callback machinery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative cancellation flag, cheap to clone and share.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the token as cancelled. Visible to every clone.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether [`CancelToken::cancel`] has been called on this token or any clone of it.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_visible_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());

        clone.cancel();

        assert!(token.is_cancelled());
    }
}
