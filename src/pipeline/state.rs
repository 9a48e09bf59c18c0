//! Run states and the transitions between them.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Detecting,
    Chunking,
    SingleUnit,
    Extracting,
    Merging,
    Persisting,
    Done,
    PartialFailure,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::PartialFailure)
    }

    /// Whether `next` may follow `self`.
    pub fn can_advance_to(&self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Detecting, Chunking)
                | (Detecting, SingleUnit)
                | (Chunking, SingleUnit)
                | (Chunking, Extracting)
                | (SingleUnit, Extracting)
                | (Extracting, Merging)
                | (Extracting, PartialFailure)
                | (Merging, Persisting)
                | (Persisting, Done)
                | (Persisting, PartialFailure)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Detecting => "detecting",
            RunState::Chunking => "chunking",
            RunState::SingleUnit => "single_unit",
            RunState::Extracting => "extracting",
            RunState::Merging => "merging",
            RunState::Persisting => "persisting",
            RunState::Done => "done",
            RunState::PartialFailure => "partial_failure",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state of one run, with its history.
#[derive(Debug, Clone)]
pub struct RunTracker {
    run_id: Uuid,
    state: RunState,
    history: Vec<RunState>,
}

impl RunTracker {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            state: RunState::Detecting,
            history: vec![RunState::Detecting],
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// States visited so far, starting with `Detecting`.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Move to `next`. An illegal transition is a defect: it is logged
    /// and asserted in debug builds, and the state still moves.
    pub fn advance(&mut self, next: RunState) {
        if !self.state.can_advance_to(next) {
            error!(run_id = %self.run_id, from = %self.state, to = %next, "Illegal run state transition");
            debug_assert!(false, "illegal transition {} -> {}", self.state, next);
        }
        debug!(run_id = %self.run_id, from = %self.state, to = %next, "Run state");
        self.state = next;
        self.history.push(next);
    }
}
