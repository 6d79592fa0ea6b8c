//! Load-cell bring-up and scale-factor selection.
//!
//! A run uses exactly one calibration, fixed before the loop starts: a fresh
//! interactive one against a known mass, the value saved in the settings
//! file, or none (readings stay in raw counts).

use std::time::Duration;

use stand_traits::Transducer;
use tracing::info;

use crate::error::{Result, StandError};
use crate::hw_error::{map_hw_error, map_startup_error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationSource {
    Uncalibrated,
    Interactive,
    Config,
}

impl CalibrationSource {
    /// Value written to the `CalibState` column. Matches the codes older
    /// data files carry: 0 none, 4 interactive, -1 loaded from settings.
    pub const fn code(self) -> i8 {
        match self {
            Self::Uncalibrated => 0,
            Self::Interactive => 4,
            Self::Config => -1,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Uncalibrated => "uncalibrated",
            Self::Interactive => "interactive",
            Self::Config => "config",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub scale_factor: f32,
    pub source: CalibrationSource,
}

impl Default for Calibration {
    fn default() -> Self {
        Self::uncalibrated()
    }
}

impl Calibration {
    pub const fn uncalibrated() -> Self {
        Self {
            scale_factor: 1.0,
            source: CalibrationSource::Uncalibrated,
        }
    }

    /// Scale factor persisted in the settings file.
    pub fn from_config(value: f32) -> Result<Self> {
        if !(value.is_finite() && value != 0.0) {
            return Err(eyre::Report::new(StandError::Config(format!(
                "calibration value {value} is not usable"
            ))));
        }
        Ok(Self {
            scale_factor: value,
            source: CalibrationSource::Config,
        })
    }

    pub fn is_calibrated(&self) -> bool {
        self.source != CalibrationSource::Uncalibrated
    }

    /// Push the scale factor down to the transducer.
    pub fn apply<T: Transducer + ?Sized>(&self, transducer: &mut T) {
        transducer.set_scale_factor(self.scale_factor);
        info!(
            scale_factor = self.scale_factor,
            source = self.source.label(),
            "calibration applied"
        );
    }
}

/// Power up and tare. Any failure here means the stand cannot run.
pub fn initialize_cell<T: Transducer + ?Sized>(
    transducer: &mut T,
    stabilize: Duration,
) -> Result<()> {
    transducer
        .initialize(stabilize)
        .map_err(|e| eyre::Report::new(map_startup_error(e.as_ref())))?;
    info!(stabilize_ms = stabilize.as_millis() as u64, "load cell ready");
    Ok(())
}

/// Re-zero with the cell unloaded.
pub fn tare_cell<T: Transducer + ?Sized>(transducer: &mut T) -> Result<()> {
    transducer
        .tare()
        .map_err(|e| eyre::Report::new(map_hw_error(e.as_ref())))
}

/// Derive the scale factor with `known_mass_g` resting on a tared cell.
pub fn calibrate_with_mass<T: Transducer + ?Sized>(
    transducer: &mut T,
    known_mass_g: f32,
) -> Result<Calibration> {
    if !(known_mass_g.is_finite() && known_mass_g > 0.0) {
        return Err(eyre::Report::new(StandError::Config(format!(
            "known mass must be > 0 g, got {known_mass_g}"
        ))));
    }
    let factor = transducer
        .calibrate(known_mass_g)
        .map_err(|e| eyre::Report::new(map_hw_error(e.as_ref())))?;
    if !(factor.is_finite() && factor != 0.0) {
        return Err(eyre::Report::new(StandError::HardwareFault(format!(
            "calibration produced unusable factor {factor}"
        ))));
    }
    info!(known_mass_g, scale_factor = factor, "calibrated");
    Ok(Calibration {
        scale_factor: factor,
        source: CalibrationSource::Interactive,
    })
}
