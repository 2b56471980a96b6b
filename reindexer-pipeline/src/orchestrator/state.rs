//! Reindex pass state machine.

use std::fmt;

/// Step a reindex pass is in.
///
/// A pass moves `Idle → Listing → Loading → Purging → Ingesting → Committing
/// → Done`, or to `Aborted` from any step before `Done`. Loading continues
/// while earlier chunks are ingested, so a large pass spends most of its
/// time in `Ingesting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassState {
    Idle,
    Listing,
    Loading,
    Purging,
    Ingesting,
    Committing,
    Done,
    Aborted,
}

impl PassState {
    /// Whether the pass has finished, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Whether the writer may hold unpublished changes in this state.
    pub fn has_mutated_index(self) -> bool {
        matches!(self, Self::Purging | Self::Ingesting | Self::Committing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listing => "listing",
            Self::Loading => "loading",
            Self::Purging => "purging",
            Self::Ingesting => "ingesting",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for PassState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(PassState::Done.is_terminal());
        assert!(PassState::Aborted.is_terminal());
        assert!(!PassState::Committing.is_terminal());
        assert!(!PassState::Idle.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(PassState::Ingesting.to_string(), "ingesting");
    }
}
