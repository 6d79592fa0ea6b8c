//! Test sequence state machine: arming, countdown, ignition, burn detection
//! and safe shutdown.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::sampler::SensorReading;
use crate::state::TestState;

/// Everything the sequencer decides with. Fixed for the run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequencerSettings {
    pub countdown_length: Duration,
    /// Filtered force separating burning from not burning; comparisons are strict.
    pub motor_load_threshold: f32,
    pub data_safe_length: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerContext {
    pub state: TestState,
    pub armed: bool,
    /// T-0. Set once when armed and kept for test-time reporting.
    pub countdown_deadline: Option<Instant>,
    /// Set on each entry into `BurnDataSafe`, cleared when that state exits.
    pub data_safe_deadline: Option<Instant>,
}

impl SequencerContext {
    pub fn new() -> Self {
        Self {
            state: TestState::Standby,
            armed: false,
            countdown_deadline: None,
            data_safe_deadline: None,
        }
    }
}

impl Default for SequencerContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct Sequencer {
    ctx: SequencerContext,
    settings: SequencerSettings,
    entered_at: Instant,
    igniter_fired: bool,
    fire_now: bool,
    transitions: u32,
}

impl Sequencer {
    pub fn new(settings: SequencerSettings, now: Instant) -> Self {
        Self {
            ctx: SequencerContext::new(),
            settings,
            entered_at: now,
            igniter_fired: false,
            fire_now: false,
            transitions: 0,
        }
    }

    pub fn context(&self) -> &SequencerContext {
        &self.ctx
    }

    pub fn state(&self) -> TestState {
        self.ctx.state
    }

    pub fn settings(&self) -> &SequencerSettings {
        &self.settings
    }

    /// Milliseconds since the current state was entered.
    pub fn phase_ms(&self, now: Instant) -> u64 {
        u64::try_from(now.saturating_duration_since(self.entered_at).as_millis())
            .unwrap_or(u64::MAX)
    }

    pub fn transitions(&self) -> u32 {
        self.transitions
    }

    /// Igniter level for this tick: high only on the tick Ignition was
    /// entered, and only the first time.
    pub fn igniter_command(&self) -> bool {
        self.fire_now
    }

    /// Evaluate one tick. `reading` is the latest filtered reading, if any.
    pub fn advance(
        &mut self,
        reading: Option<&SensorReading>,
        now: Instant,
        arm_signal: bool,
        abort_signal: bool,
    ) -> TestState {
        self.fire_now = false;
        let state = self.ctx.state;

        if abort_signal && state != TestState::Abort {
            self.ctx.data_safe_deadline = None;
            self.enter(TestState::Abort, now);
            return self.ctx.state;
        }

        if arm_signal {
            if state == TestState::Standby {
                self.ctx.armed = true;
            } else {
                warn!(state = state.label(), "arm ignored outside standby");
            }
        }

        let threshold = self.settings.motor_load_threshold;
        let filtered = reading.map(|r| r.filtered);
        let above = filtered.is_some_and(|f| f > threshold);
        let below = filtered.is_some_and(|f| f < threshold);

        match state {
            TestState::Standby => {
                if self.ctx.armed {
                    let deadline = now + self.settings.countdown_length;
                    self.ctx.countdown_deadline = Some(deadline);
                    info!(
                        countdown_s = self.settings.countdown_length.as_secs_f32(),
                        "armed"
                    );
                    self.enter(TestState::Countdown, now);
                }
            }
            TestState::Countdown => {
                if self.ctx.countdown_deadline.is_some_and(|d| now >= d) {
                    self.enter(TestState::Ignition, now);
                    if !self.igniter_fired {
                        self.igniter_fired = true;
                        self.fire_now = true;
                        info!("igniter fired");
                    }
                }
            }
            TestState::Ignition => {
                if above {
                    self.enter(TestState::Burn, now);
                }
            }
            TestState::Burn => {
                if below {
                    self.ctx.data_safe_deadline = Some(now + self.settings.data_safe_length);
                    self.enter(TestState::BurnDataSafe, now);
                }
            }
            TestState::BurnDataSafe => {
                if above {
                    self.ctx.data_safe_deadline = None;
                    self.enter(TestState::Burn, now);
                } else if self.ctx.data_safe_deadline.is_some_and(|d| now >= d) {
                    self.ctx.data_safe_deadline = None;
                    self.enter(TestState::PostBurnStandby, now);
                }
            }
            TestState::PostBurnStandby | TestState::Abort => {}
        }
        self.ctx.state
    }

    fn enter(&mut self, next: TestState, now: Instant) {
        let from = self.ctx.state;
        info!(from = from.label(), to = next.label(), "state");
        self.ctx.state = next;
        self.entered_at = now;
        self.transitions += 1;
    }
}
