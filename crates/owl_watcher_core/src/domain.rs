//! crates/owl_watcher_core/src/domain.rs
//!
//! Defines the pure, core data structures for the watcher.
//! These structs are independent of the schedule API's wire format.

use chrono::{DateTime, Utc};

/// The lifecycle state of a match as reported by the schedule source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    Pending,
    InProgress,
    Concluded,
    /// Any state the source reports that the watcher does not care about.
    Other,
}

/// A single time-boxed match, immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub state: MatchState,
}

impl MatchRecord {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, state: MatchState) -> Self {
        Self { start, end, state }
    }

    pub fn is_pending(&self) -> bool {
        self.state == MatchState::Pending
    }
}

/// A merged viewing period built from one or more pending matches.
///
/// Margins are not applied here; the scheduler adds them when deciding when
/// to open and close the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewingWindow {
    pub open: DateTime<Utc>,
    pub close: DateTime<Utc>,
}

impl ViewingWindow {
    pub fn new(open: DateTime<Utc>, close: DateTime<Utc>) -> Self {
        Self { open, close }
    }
}

// Mirrors whether the external viewer is currently showing the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Closed,
    Open,
}
