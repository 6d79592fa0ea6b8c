//! Simulated test rig: a thrust-curve load cell, an igniter that lights it,
//! and an annunciator that only logs.
//!
//! All parts share one `Clock`, so a `ManualClock` replays a full burn in
//! microseconds of wall time.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use stand_traits::{Annunciator, BoxError, Clock, Igniter, IndicatorFrame, Transducer};
use tracing::{debug, trace};

use crate::error::HwError;
use crate::util::wait_until_ready;

/// ADC counts per gram of the simulated cell before calibration.
pub const SIM_COUNTS_PER_GRAM: f32 = 420.0;
/// Conversion period of the simulated amplifier (HX711 at 80 SPS).
pub const SIM_CONVERSION_PERIOD: Duration = Duration::from_micros(12_500);

/// Piecewise-linear thrust curve measured from the moment of ignition.
#[derive(Debug, Clone)]
pub struct ThrustProfile {
    pub ignition_delay: Duration,
    pub rise: Duration,
    pub burn: Duration,
    pub tail_off: Duration,
    pub peak_g: f32,
    pub sustain_g: f32,
    /// Peak-to-peak noise amplitude in grams.
    pub noise_g: f32,
}

impl Default for ThrustProfile {
    fn default() -> Self {
        Self {
            ignition_delay: Duration::from_millis(300),
            rise: Duration::from_millis(80),
            burn: Duration::from_millis(1800),
            tail_off: Duration::from_millis(250),
            peak_g: 4200.0,
            sustain_g: 2600.0,
            noise_g: 6.0,
        }
    }
}

impl ThrustProfile {
    /// Noise-free force `since` ignition.
    pub fn force_at(&self, since: Duration) -> f32 {
        let Some(t) = since.checked_sub(self.ignition_delay) else {
            return 0.0;
        };
        if t < self.rise {
            return lerp(0.0, self.peak_g, frac(t, self.rise));
        }
        let t = t - self.rise;
        if t < self.burn {
            return lerp(self.peak_g, self.sustain_g, frac(t, self.burn));
        }
        let t = t - self.burn;
        if t < self.tail_off {
            return lerp(self.sustain_g, 0.0, frac(t, self.tail_off));
        }
        0.0
    }

    pub fn total(&self) -> Duration {
        self.ignition_delay + self.rise + self.burn + self.tail_off
    }
}

fn frac(t: Duration, span: Duration) -> f32 {
    if span.is_zero() {
        1.0
    } else {
        (t.as_secs_f32() / span.as_secs_f32()).clamp(0.0, 1.0)
    }
}

fn lerp(a: f32, b: f32, x: f32) -> f32 {
    a + (b - a) * x
}

/// Handles shared between the simulated parts and whoever drives the sim.
#[derive(Debug, Clone, Default)]
pub struct SimHandles {
    /// Set by the igniter on its first energized edge.
    pub ignited_at: Rc<Cell<Option<Instant>>>,
    /// Static mass resting on the cell (calibration weights), grams.
    pub bench_load_g: Rc<Cell<f32>>,
}

pub struct SimulatedTransducer {
    clock: Arc<dyn Clock + Send + Sync>,
    handles: SimHandles,
    profile: ThrustProfile,
    scale_factor: f32,
    tare_counts: f32,
    dead_load_counts: f32,
    rng: u32,
    responsive: bool,
    initialized: bool,
    last_conversion: Option<Instant>,
}

impl SimulatedTransducer {
    pub fn new(
        clock: Arc<dyn Clock + Send + Sync>,
        handles: SimHandles,
        profile: ThrustProfile,
    ) -> Self {
        Self {
            clock,
            handles,
            profile,
            scale_factor: 1.0,
            tare_counts: 0.0,
            // Mount and thrust plate weigh something before tare.
            dead_load_counts: 350.0 * SIM_COUNTS_PER_GRAM,
            rng: 0x2545_f491,
            responsive: true,
            initialized: false,
            last_conversion: None,
        }
    }

    /// A cell whose amplifier never signals data-ready (wiring fault).
    pub fn unresponsive(mut self) -> Self {
        self.responsive = false;
        self
    }

    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    fn noise(&mut self) -> f32 {
        // xorshift32
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        ((x as f32 / u32::MAX as f32) - 0.5) * self.profile.noise_g
    }

    fn counts_now(&mut self) -> f32 {
        let thrust = match self.handles.ignited_at.get() {
            Some(at) => self
                .profile
                .force_at(self.clock.now().saturating_duration_since(at)),
            None => 0.0,
        };
        let grams = thrust + self.handles.bench_load_g.get() + self.noise();
        grams * SIM_COUNTS_PER_GRAM + self.dead_load_counts
    }

    fn averaged_counts(&mut self, n: usize) -> f32 {
        let mut sum = 0.0f32;
        for _ in 0..n {
            sum += self.counts_now();
        }
        sum / n as f32
    }
}

impl Transducer for SimulatedTransducer {
    fn initialize(&mut self, stabilize: Duration) -> Result<(), BoxError> {
        let responsive = self.responsive;
        wait_until_ready(
            || responsive,
            Duration::from_millis(50),
            Duration::from_millis(1),
        )?;
        self.clock.sleep(stabilize);
        self.initialized = true;
        self.tare()?;
        debug!(stabilize_ms = stabilize.as_millis() as u64, "simulated load cell ready");
        Ok(())
    }

    fn tare(&mut self) -> Result<(), BoxError> {
        if !self.initialized {
            return Err(Box::new(HwError::NotInitialized));
        }
        self.tare_counts = self.averaged_counts(16);
        Ok(())
    }

    fn calibrate(&mut self, known_mass_g: f32) -> Result<f32, BoxError> {
        if !self.initialized {
            return Err(Box::new(HwError::NotInitialized));
        }
        if !(known_mass_g.is_finite() && known_mass_g > 0.0) {
            return Err(Box::new(HwError::Calibration(format!(
                "known mass must be > 0, got {known_mass_g}"
            ))));
        }
        let delta = self.averaged_counts(16) - self.tare_counts;
        let factor = delta / known_mass_g;
        if !(factor.is_finite() && factor.abs() > f32::EPSILON) {
            return Err(Box::new(HwError::Calibration(
                "no load change detected".into(),
            )));
        }
        self.scale_factor = factor;
        Ok(factor)
    }

    fn set_scale_factor(&mut self, factor: f32) {
        self.scale_factor = factor;
    }

    fn read_raw(&mut self) -> Result<Option<f32>, BoxError> {
        if !self.initialized {
            return Err(Box::new(HwError::NotInitialized));
        }
        let now = self.clock.now();
        if let Some(prev) = self.last_conversion
            && now.saturating_duration_since(prev) < SIM_CONVERSION_PERIOD
        {
            return Ok(None);
        }
        self.last_conversion = Some(now);
        let counts = self.counts_now();
        let grams = (counts - self.tare_counts) / self.scale_factor;
        trace!(counts, grams, "sim conversion");
        Ok(Some(grams))
    }
}

/// Igniter that lights the simulated motor on its first energized edge.
pub struct SimulatedIgniter {
    clock: Arc<dyn Clock + Send + Sync>,
    ignited_at: Rc<Cell<Option<Instant>>>,
    energized: bool,
    pulses: u32,
}

impl SimulatedIgniter {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>, handles: &SimHandles) -> Self {
        Self {
            clock,
            ignited_at: handles.ignited_at.clone(),
            energized: false,
            pulses: 0,
        }
    }

    pub fn is_energized(&self) -> bool {
        self.energized
    }

    /// Number of rising edges seen.
    pub fn pulses(&self) -> u32 {
        self.pulses
    }
}

impl Igniter for SimulatedIgniter {
    fn set_energized(&mut self, on: bool) -> Result<(), BoxError> {
        if on && !self.energized {
            self.pulses += 1;
            if self.ignited_at.get().is_none() {
                self.ignited_at.set(Some(self.clock.now()));
                debug!("simulated igniter fired");
            }
        }
        self.energized = on;
        Ok(())
    }
}

/// Annunciator without lamps; frame changes go to the trace log.
#[derive(Debug, Default)]
pub struct LogAnnunciator {
    last: Option<IndicatorFrame>,
    changes: u64,
}

impl LogAnnunciator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_frame(&self) -> Option<IndicatorFrame> {
        self.last
    }

    pub fn changes(&self) -> u64 {
        self.changes
    }
}

impl Annunciator for LogAnnunciator {
    fn show(&mut self, frame: IndicatorFrame) -> Result<(), BoxError> {
        if self.last != Some(frame) {
            trace!(
                green = frame.green,
                red = frame.red,
                blue = frame.blue,
                tone_hz = frame.tone_hz.unwrap_or(0),
                "indicator"
            );
            self.last = Some(frame);
            self.changes += 1;
        }
        Ok(())
    }
}

/// Transducer, igniter and the handles that link them.
pub fn simulated_rig(
    clock: Arc<dyn Clock + Send + Sync>,
    profile: ThrustProfile,
) -> (SimulatedTransducer, SimulatedIgniter, SimHandles) {
    let handles = SimHandles::default();
    let transducer = SimulatedTransducer::new(clock.clone(), handles.clone(), profile);
    let igniter = SimulatedIgniter::new(clock, &handles);
    (transducer, igniter, handles)
}
