//! # Session status and its transition table.
//!
//! ```text
//!                 ensure_loaded()
//! Uninitialized ───────────────► Loading ──── ok ────► Ready ◄──────────┐
//!                                 ▲   │                  │              │
//!                  ensure_loaded()│   │ LoadError        │ execute()    │ done / raised /
//!                                 │   ▼                  ▼              │ timeout / cancel
//!                                Errored ◄── broken ── Executing ───────┘
//! ```
//!
//! ## Rules
//! - Submissions are only accepted in `Ready`.
//! - A user-code exception returns `Executing` to `Ready`; only an
//!   infrastructure failure moves it to `Errored`.
//! - `Errored` is left only through a new `ensure_loaded()`.

use std::fmt;

/// Lifecycle status of one [`Session`](crate::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionStatus {
    /// No load has been requested by this session yet.
    #[default]
    Uninitialized,
    /// Waiting on the loader.
    Loading,
    /// Holding a runtime handle and idle.
    Ready,
    /// An execution is in flight.
    Executing,
    /// The last load failed, or the runtime broke during an execution.
    Errored,
}

impl SessionStatus {
    /// Returns `true` if moving from `self` to `next` is a defined transition.
    ///
    /// # Example
    /// ```
    /// use replvisor::SessionStatus;
    ///
    /// assert!(SessionStatus::Ready.can_transition_to(SessionStatus::Executing));
    /// assert!(SessionStatus::Errored.can_transition_to(SessionStatus::Loading));
    /// assert!(!SessionStatus::Errored.can_transition_to(SessionStatus::Executing));
    /// ```
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Uninitialized, Loading)
                | (Loading, Ready)
                | (Loading, Errored)
                | (Ready, Executing)
                | (Executing, Ready)
                | (Executing, Errored)
                | (Errored, Loading)
        )
    }

    /// Returns `true` if the session accepts a new execution request.
    #[inline]
    pub fn accepts_execution(self) -> bool {
        matches!(self, SessionStatus::Ready)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            SessionStatus::Uninitialized => "uninitialized",
            SessionStatus::Loading => "loading",
            SessionStatus::Ready => "ready",
            SessionStatus::Executing => "executing",
            SessionStatus::Errored => "errored",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

#[cfg(test)]
mod tests {
    use super::SessionStatus::{self, *};

    const ALL: [SessionStatus; 5] = [Uninitialized, Loading, Ready, Executing, Errored];

    #[test]
    fn test_errored_only_leaves_through_loading() {
        for next in ALL {
            assert_eq!(Errored.can_transition_to(next), next == Loading, "Errored -> {next}");
        }
    }

    #[test]
    fn test_only_ready_accepts_execution() {
        for status in ALL {
            assert_eq!(status.accepts_execution(), status == Ready, "{status}");
        }
    }

    #[test]
    fn test_executing_returns_to_ready_or_errored() {
        let allowed: Vec<_> = ALL
            .into_iter()
            .filter(|s| Executing.can_transition_to(*s))
            .collect();
        assert_eq!(allowed, vec![Ready, Errored]);
    }

    #[test]
    fn test_no_self_transitions() {
        for status in ALL {
            assert!(!status.can_transition_to(status), "{status} -> {status}");
        }
    }
}
