//! Drive a `StandCore` from power-up standby to a terminal state.

use std::time::Duration;

use stand_traits::{Annunciator, Igniter, Storage, Transducer};
use tracing::{error, info, warn};

use crate::commands::CommandInbox;
use crate::stand::StandCore;
use crate::error::Result;
use crate::state::TestState;
use crate::status::StandStatus;

pub const DEFAULT_TICK: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Sleep between ticks.
    pub tick: Duration,
    /// Abort once this many ticks have run without reaching a terminal state.
    pub max_ticks: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            max_ticks: None,
        }
    }
}

/// What happened during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub final_state: TestState,
    pub ticks: u64,
    pub on_time_s: f64,
    pub samples: u64,
    pub read_errors: u64,
    pub records_written: u64,
    pub write_failures: u64,
    pub igniter_pulses: u32,
    pub transitions: u32,
    pub peak_filtered_g: Option<f32>,
    pub calibration: &'static str,
}

impl RunSummary {
    pub fn completed(&self) -> bool {
        self.final_state == TestState::PostBurnStandby
    }
}

impl<T: Transducer, I: Igniter, S: Storage, A: Annunciator> StandCore<T, I, S, A> {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            final_state: self.state(),
            ticks: self.ticks(),
            on_time_s: self.last_clocks().map_or(0.0, |c| c.on_time_s),
            samples: self.sampler().samples(),
            read_errors: self.sampler().read_errors(),
            records_written: self.logger().records(),
            write_failures: self.logger().write_failures(),
            igniter_pulses: self.igniter_pulses(),
            transitions: self.sequencer().transitions(),
            peak_filtered_g: self.peak_filtered(),
            calibration: self.calibration().source.label(),
        }
    }
}

/// Tick until the sequence completes or aborts. Operator commands come from
/// `inbox`; a fatal error leaves the igniter low and the data log closed.
pub fn run<T, I, S, A>(
    stand: &mut StandCore<T, I, S, A>,
    inbox: &CommandInbox,
    opts: RunOptions,
) -> Result<RunSummary>
where
    T: Transducer,
    I: Igniter,
    S: Storage,
    A: Annunciator,
{
    info!(
        tick_us = opts.tick.as_micros() as u64,
        max_ticks = opts.max_ticks.unwrap_or(0),
        "run start"
    );

    loop {
        let mut signals = inbox.drain();
        if let Some(max) = opts.max_ticks
            && stand.ticks() >= max
            && !signals.abort
        {
            warn!(max_ticks = max, state = stand.state().label(), "tick limit reached; aborting");
            signals.abort = true;
        }

        match stand.step(signals) {
            Ok(StandStatus::Running(_)) => {}
            Ok(StandStatus::Complete) => {
                info!("test complete");
                break;
            }
            Ok(StandStatus::Aborted) => {
                warn!("test aborted");
                break;
            }
            Err(e) => {
                stand.shutdown();
                error!(error = %e, "run failed");
                return Err(e);
            }
        }
        stand.clock().sleep(opts.tick);
    }

    stand.shutdown();
    let summary = stand.summary();
    info!(
        state = summary.final_state.label(),
        records = summary.records_written,
        write_failures = summary.write_failures,
        samples = summary.samples,
        peak_g = summary.peak_filtered_g.unwrap_or(0.0),
        "run summary"
    );
    Ok(summary)
}
