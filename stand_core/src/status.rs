//! Outcome of one loop tick.

use crate::state::TestState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandStatus {
    /// Keep ticking; the sequence is in the given live state.
    Running(TestState),
    /// Burn finished and the data-safe window expired.
    Complete,
    /// Operator (or tick limit) abort; igniter is low and logging is closed.
    Aborted,
}

impl StandStatus {
    pub fn is_finished(self) -> bool {
        !matches!(self, Self::Running(_))
    }
}
