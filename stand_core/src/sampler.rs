//! Load-cell sampling on the loop thread.
//!
//! The sampler pulls at most one conversion per sample period, feeds it
//! through the moving average and keeps the latest reading for the
//! sequencer. Read failures are skipped, never fatal.

use std::time::{Duration, Instant};

use stand_traits::Transducer;
use tracing::{debug, info, warn};

use crate::filter::MovingAverage;
use crate::hw_error::map_hw_error;

pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    /// Calibrated force for this sample, grams-equivalent.
    pub raw: f32,
    /// Moving average including this sample.
    pub filtered: f32,
    pub timestamp: Instant,
}

#[derive(Debug)]
pub struct Sampler {
    filter: MovingAverage,
    period: Duration,
    last_attempt: Option<Instant>,
    latest: Option<SensorReading>,
    diagnostic: bool,
    samples: u64,
    read_errors: u64,
}

impl Sampler {
    pub fn new(period: Duration, window: usize) -> Self {
        Self {
            filter: MovingAverage::new(window),
            period,
            last_attempt: None,
            latest: None,
            diagnostic: false,
            samples: 0,
            read_errors: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether a new pull is allowed at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.last_attempt
            .is_none_or(|prev| now.saturating_duration_since(prev) >= self.period)
    }

    /// Fold one calibrated value into the filter.
    pub fn sample(&mut self, raw: f32, now: Instant) -> SensorReading {
        let filtered = self.filter.push(raw);
        let reading = SensorReading {
            raw,
            filtered,
            timestamp: now,
        };
        self.latest = Some(reading);
        self.samples += 1;
        if self.diagnostic {
            info!(raw_g = raw, filtered_g = filtered, "load cell");
        } else {
            debug!(raw_g = raw, filtered_g = filtered, "sample");
        }
        reading
    }

    /// Gated pull from the transducer. `None` when not due, not ready, or
    /// the read failed.
    pub fn poll<T: Transducer + ?Sized>(
        &mut self,
        transducer: &mut T,
        now: Instant,
    ) -> Option<SensorReading> {
        if !self.is_due(now) {
            return None;
        }
        match transducer.read_raw() {
            Ok(Some(raw)) => {
                self.last_attempt = Some(now);
                Some(self.sample(raw, now))
            }
            // Conversion pending; try again next tick.
            Ok(None) => None,
            Err(e) => {
                self.last_attempt = Some(now);
                self.read_errors += 1;
                let err = map_hw_error(e.as_ref());
                warn!(error = %err, read_errors = self.read_errors, "load cell read skipped");
                None
            }
        }
    }

    pub fn latest(&self) -> Option<SensorReading> {
        self.latest
    }

    /// Flip the per-sample console print; returns the new setting.
    pub fn toggle_diagnostic(&mut self) -> bool {
        self.diagnostic = !self.diagnostic;
        info!(enabled = self.diagnostic, "load cell print");
        self.diagnostic
    }

    pub fn diagnostic(&self) -> bool {
        self.diagnostic
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn read_errors(&self) -> u64 {
        self.read_errors
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_PERIOD, crate::filter::FILTER_WINDOW)
    }
}
