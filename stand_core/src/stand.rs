//! The stand loop body (`StandCore`).
//!
//! One `step` is one tick: clocks, sample, sequence, igniter, log,
//! indicators, in that order, run to completion.

use std::sync::Arc;
use std::time::Instant;

use stand_traits::{Annunciator, Clock, Igniter, Storage, Transducer};
use tracing::{debug, error, warn};

use crate::calibration::Calibration;
use crate::commands::Signals;
use crate::data_logger::{DataLogger, LogRecord};
use crate::error::{Result, StandError};
use crate::hw_error::map_hw_error;
use crate::indicator;
use crate::sampler::{Sampler, SensorReading};
use crate::sequencer::Sequencer;
use crate::state::TestState;
use crate::status::StandStatus;
use crate::time_keeper::{Clocks, TimeKeeper};

pub struct StandCore<T: Transducer, I: Igniter, S: Storage, A: Annunciator> {
    pub(crate) transducer: T,
    pub(crate) igniter: I,
    pub(crate) annunciator: A,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) time_keeper: TimeKeeper,
    pub(crate) sampler: Sampler,
    pub(crate) sequencer: Sequencer,
    pub(crate) logger: DataLogger<S>,
    pub(crate) calibration: Calibration,
    pub(crate) buzzer_enabled: bool,

    pub(crate) igniter_energized: bool,
    pub(crate) igniter_pulses: u32,
    pub(crate) peak_filtered: Option<f32>,
    pub(crate) ticks: u64,
    pub(crate) last_clocks: Option<Clocks>,
    pub(crate) last_record: Option<LogRecord>,
}

impl<T: Transducer, I: Igniter, S: Storage, A: Annunciator> core::fmt::Debug
    for StandCore<T, I, S, A>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StandCore")
            .field("state", &self.sequencer.state())
            .field("ticks", &self.ticks)
            .field("calibration", &self.calibration)
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}

impl<T: Transducer, I: Igniter, S: Storage, A: Annunciator> StandCore<T, I, S, A> {
    pub fn state(&self) -> TestState {
        self.sequencer.state()
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn logger(&self) -> &DataLogger<S> {
        &self.logger
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn latest_reading(&self) -> Option<SensorReading> {
        self.sampler.latest()
    }

    pub fn last_clocks(&self) -> Option<Clocks> {
        self.last_clocks
    }

    /// Most recent record written to the data file.
    pub fn last_record(&self) -> Option<&LogRecord> {
        self.last_record.as_ref()
    }

    pub fn igniter_pulses(&self) -> u32 {
        self.igniter_pulses
    }

    pub fn peak_filtered(&self) -> Option<f32> {
        self.peak_filtered
    }

    /// One iteration of the stand loop.
    pub fn step(&mut self, signals: Signals) -> Result<StandStatus> {
        let now = self.clock.now();
        self.ticks += 1;

        let clocks = self
            .time_keeper
            .tick(now, self.sequencer.context().countdown_deadline);
        self.last_clocks = Some(clocks);

        if signals.toggle_diagnostic {
            self.sampler.toggle_diagnostic();
        }
        if let Some(r) = self.sampler.poll(&mut self.transducer, now) {
            self.peak_filtered = Some(self.peak_filtered.map_or(r.filtered, |p| p.max(r.filtered)));
        }
        let latest = self.sampler.latest();

        let state = self
            .sequencer
            .advance(latest.as_ref(), now, signals.arm, signals.abort);

        self.drive_igniter()?;

        if let Some(rec) = self.logger.maybe_emit(state, latest.as_ref(), &clocks, now) {
            self.last_record = Some(rec);
        }

        self.show(state, now);

        Ok(match state {
            TestState::PostBurnStandby => StandStatus::Complete,
            TestState::Abort => StandStatus::Aborted,
            live => StandStatus::Running(live),
        })
    }

    /// Igniter follows the sequencer command every tick: high for the
    /// single firing tick, low on every other.
    fn drive_igniter(&mut self) -> Result<()> {
        let fire = self.sequencer.igniter_command();
        if let Err(e) = self.igniter.set_energized(fire) {
            let err = map_hw_error(e.as_ref());
            error!(error = %err, fire, "igniter output failed");
            if fire {
                let _ = self.igniter.set_energized(false);
                return Err(eyre::Report::new(StandError::HardwareFault(format!(
                    "igniter did not fire: {err}"
                ))));
            }
            warn!("igniter low command failed; retrying next tick");
            return Ok(());
        }
        if fire && !self.igniter_energized {
            self.igniter_pulses += 1;
        }
        self.igniter_energized = fire;
        Ok(())
    }

    fn show(&mut self, state: TestState, now: Instant) {
        let frame = indicator::frame(state, self.sequencer.phase_ms(now), self.buzzer_enabled);
        if let Err(e) = self.annunciator.show(frame) {
            debug!(error = %e, "indicator update failed");
        }
    }

    /// Put outputs in a safe state: igniter low, data log closed.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.igniter.set_energized(false) {
            error!(error = %map_hw_error(e.as_ref()), "igniter low failed during shutdown");
        }
        self.igniter_energized = false;
        self.logger.close();
    }

    /// Show a one-off cue sequence (chimes, alarms) on this stand's annunciator.
    pub fn play(&mut self, cues: &[indicator::Cue]) {
        indicator::play(&mut self.annunciator, self.clock.as_ref(), cues);
    }

    pub fn buzzer_enabled(&self) -> bool {
        self.buzzer_enabled
    }
}
