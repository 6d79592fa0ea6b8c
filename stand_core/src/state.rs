//! Test sequence states.

use std::fmt;

/// Exactly one is active at a time; owned by the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestState {
    Standby,
    Countdown,
    Ignition,
    Burn,
    /// Thrust fell below threshold; still logging in case the burn resumes.
    BurnDataSafe,
    PostBurnStandby,
    Abort,
}

impl TestState {
    pub const ALL: [Self; 7] = [
        Self::Standby,
        Self::Countdown,
        Self::Ignition,
        Self::Burn,
        Self::BurnDataSafe,
        Self::PostBurnStandby,
        Self::Abort,
    ];

    /// Stable label used in data files and log fields.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Standby => "STANDBY",
            Self::Countdown => "COUNTDOWN",
            Self::Ignition => "IGNITION",
            Self::Burn => "BURN",
            Self::BurnDataSafe => "BURN_DATA_SAFE",
            Self::PostBurnStandby => "POST_BURN_STANDBY",
            Self::Abort => "ABORT",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::PostBurnStandby | Self::Abort)
    }

    /// States logged at the fast cadence.
    pub const fn is_fast_logging(self) -> bool {
        matches!(self, Self::Ignition | Self::Burn)
    }
}

impl fmt::Display for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
