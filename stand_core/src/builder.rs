//! Type-state builder for `Stand`.
//!
//! The builder enforces at compile time that a transducer, an igniter and a
//! storage sink are provided before `build()` is available. `try_build()` is
//! always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use stand_config::Settings;
use stand_traits::{Annunciator, Clock, Igniter, MonotonicClock, Storage, Transducer};
use tracing::info;

use crate::calibration::Calibration;
use crate::stand::StandCore;
use crate::data_logger::{CadenceCfg, DataLogger};
use crate::error::{BuildError, Result, StandError};
use crate::filter::FILTER_WINDOW;
use crate::mocks::NullAnnunciator;
use crate::sampler::{DEFAULT_SAMPLE_PERIOD, Sampler};
use crate::sequencer::{Sequencer, SequencerSettings};
use crate::time_keeper::TimeKeeper;
use crate::util::secs_to_duration;

/// Dynamically dispatched stand, as wired by the CLI.
pub type Stand = StandCore<
    Box<dyn Transducer>,
    Box<dyn Igniter>,
    Box<dyn Storage>,
    Box<dyn Annunciator>,
>;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct StandBuilder<T, I, S> {
    transducer: Option<Box<dyn Transducer>>,
    igniter: Option<Box<dyn Igniter>>,
    storage: Option<Box<dyn Storage>>,
    annunciator: Option<Box<dyn Annunciator>>,
    settings: Option<Settings>,
    calibration: Option<Calibration>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    sample_period: Option<Duration>,
    memory_probe: Option<Box<dyn Fn() -> u64>>,
    _t: PhantomData<T>,
    _i: PhantomData<I>,
    _s: PhantomData<S>,
}

impl Default for StandBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            transducer: None,
            igniter: None,
            storage: None,
            annunciator: None,
            settings: None,
            calibration: None,
            clock: None,
            sample_period: None,
            memory_probe: None,
            _t: PhantomData,
            _i: PhantomData,
            _s: PhantomData,
        }
    }
}

impl Stand {
    pub fn builder() -> StandBuilder<Missing, Missing, Missing> {
        StandBuilder::default()
    }
}

/// Validate inputs and assemble a `StandCore`. Opens the data sink.
///
/// This is the single source of truth for validation and construction.
#[allow(clippy::too_many_arguments)]
pub fn build_stand<T, I, S, A>(
    mut transducer: T,
    igniter: I,
    storage: S,
    annunciator: A,
    settings: &Settings,
    calibration: Calibration,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    sample_period: Option<Duration>,
    memory_probe: Option<Box<dyn Fn() -> u64>>,
) -> Result<StandCore<T, I, S, A>>
where
    T: Transducer,
    I: Igniter,
    S: Storage,
    A: Annunciator,
{
    // ── Validation ───────────────────────────────────────────────────────────
    settings
        .validate()
        .map_err(|e| eyre::Report::new(StandError::Config(e.to_string())))?;
    let sample_period = sample_period.unwrap_or(DEFAULT_SAMPLE_PERIOD);
    if sample_period < Duration::from_millis(1) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "sample period must be >= 1 ms",
        )));
    }
    if !(calibration.scale_factor.is_finite() && calibration.scale_factor != 0.0) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "scale factor must be finite and non-zero",
        )));
    }

    // ── Assemble ─────────────────────────────────────────────────────────────
    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(c) => c,
        None => Arc::new(MonotonicClock::new()),
    };
    let boot = clock.now();

    calibration.apply(&mut transducer);

    let logger = DataLogger::open(
        storage,
        CadenceCfg::from_millis(
            settings.data_log_interval_fast_ms,
            settings.data_log_interval_slow_ms,
        ),
        calibration.source,
        memory_probe.unwrap_or_else(|| -> Box<dyn Fn() -> u64> { Box::new(|| 0) }),
    )?;

    let sequencer = Sequencer::new(
        SequencerSettings {
            countdown_length: secs_to_duration(settings.countdown_length_s),
            motor_load_threshold: settings.motor_load_threshold,
            data_safe_length: secs_to_duration(settings.data_safe_length_s),
        },
        boot,
    );

    info!(
        countdown_s = settings.countdown_length_s,
        threshold = settings.motor_load_threshold,
        data_safe_s = settings.data_safe_length_s,
        sample_ms = sample_period.as_millis() as u64,
        calibration = calibration.source.label(),
        "stand ready"
    );

    Ok(StandCore {
        transducer,
        igniter,
        annunciator,
        clock,
        time_keeper: TimeKeeper::new(boot, settings.countdown_length_s),
        sampler: Sampler::new(sample_period, FILTER_WINDOW),
        sequencer,
        logger,
        calibration,
        buzzer_enabled: settings.buzzer_enabled,
        igniter_energized: false,
        igniter_pulses: 0,
        peak_filtered: None,
        ticks: 0,
        last_clocks: None,
        last_record: None,
    })
}

impl<T, I, S> StandBuilder<T, I, S> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Stand> {
        let transducer = self
            .transducer
            .ok_or_else(|| eyre::Report::new(BuildError::MissingTransducer))?;
        let igniter = self
            .igniter
            .ok_or_else(|| eyre::Report::new(BuildError::MissingIgniter))?;
        let storage = self
            .storage
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStorage))?;
        let annunciator = self
            .annunciator
            .unwrap_or_else(|| -> Box<dyn Annunciator> { Box::new(NullAnnunciator) });

        build_stand(
            transducer,
            igniter,
            storage,
            annunciator,
            &self.settings.unwrap_or_default(),
            self.calibration.unwrap_or_default(),
            self.clock,
            self.sample_period,
            self.memory_probe,
        )
    }
}

/// Chainable setters that do not affect type-state.
impl<T, I, S> StandBuilder<T, I, S> {
    pub fn with_annunciator(mut self, annunciator: impl Annunciator + 'static) -> Self {
        self.annunciator = Some(Box::new(annunciator));
        self
    }
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }
    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = Some(calibration);
        self
    }
    /// Provide a custom clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    pub fn with_sample_period(mut self, period: Duration) -> Self {
        self.sample_period = Some(period);
        self
    }
    /// Source for the free-memory column; defaults to 0.
    pub fn with_memory_probe<F>(mut self, f: F) -> Self
    where
        F: Fn() -> u64 + 'static,
    {
        self.memory_probe = Some(Box::new(f));
        self
    }
}

// Setters that advance type-state
impl<I, S> StandBuilder<Missing, I, S> {
    pub fn with_transducer(
        self,
        transducer: impl Transducer + 'static,
    ) -> StandBuilder<Set, I, S> {
        StandBuilder {
            transducer: Some(Box::new(transducer)),
            igniter: self.igniter,
            storage: self.storage,
            annunciator: self.annunciator,
            settings: self.settings,
            calibration: self.calibration,
            clock: self.clock,
            sample_period: self.sample_period,
            memory_probe: self.memory_probe,
            _t: PhantomData,
            _i: PhantomData,
            _s: PhantomData,
        }
    }
}

impl<T, S> StandBuilder<T, Missing, S> {
    pub fn with_igniter(self, igniter: impl Igniter + 'static) -> StandBuilder<T, Set, S> {
        StandBuilder {
            transducer: self.transducer,
            igniter: Some(Box::new(igniter)),
            storage: self.storage,
            annunciator: self.annunciator,
            settings: self.settings,
            calibration: self.calibration,
            clock: self.clock,
            sample_period: self.sample_period,
            memory_probe: self.memory_probe,
            _t: PhantomData,
            _i: PhantomData,
            _s: PhantomData,
        }
    }
}

impl<T, I> StandBuilder<T, I, Missing> {
    pub fn with_storage(self, storage: impl Storage + 'static) -> StandBuilder<T, I, Set> {
        StandBuilder {
            transducer: self.transducer,
            igniter: self.igniter,
            storage: Some(Box::new(storage)),
            annunciator: self.annunciator,
            settings: self.settings,
            calibration: self.calibration,
            clock: self.clock,
            sample_period: self.sample_period,
            memory_probe: self.memory_probe,
            _t: PhantomData,
            _i: PhantomData,
            _s: PhantomData,
        }
    }
}

impl StandBuilder<Set, Set, Set> {
    /// Validate and build. Only available once transducer, igniter and storage are set.
    pub fn build(self) -> Result<Stand> {
        self.try_build()
    }
}
