//! Collaborator boundaries for the test stand.
//!
//! The control loop in `stand_core` only talks to hardware through these
//! traits. Errors cross the boundary as `Box<dyn Error + Send + Sync>` and are
//! mapped to typed errors on the core side.
pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Load-cell transducer. Readings are already scaled to grams-equivalent force.
pub trait Transducer {
    /// Power up, wait `stabilize` and tare. Fails when the amplifier does not respond.
    fn initialize(&mut self, stabilize: std::time::Duration) -> Result<(), BoxError>;

    /// Re-zero against the current load.
    fn tare(&mut self) -> Result<(), BoxError>;

    /// Derive and apply a scale factor from a known mass resting on the cell.
    fn calibrate(&mut self, known_mass_g: f32) -> Result<f32, BoxError>;

    fn set_scale_factor(&mut self, factor: f32);

    /// `Ok(None)` means no conversion is ready yet.
    fn read_raw(&mut self) -> Result<Option<f32>, BoxError>;
}

/// Pyrotechnic igniter channel.
pub trait Igniter {
    fn set_energized(&mut self, on: bool) -> Result<(), BoxError>;
}

/// Append-only delimited text sink (one line per record).
pub trait Storage {
    fn open(&mut self, header: &[&str]) -> Result<(), BoxError>;
    fn append(&mut self, fields: &[String]) -> Result<(), BoxError>;
    fn flush(&mut self) -> Result<(), BoxError>;
    fn close(&mut self) -> Result<(), BoxError>;
}

/// One rendered lamp/tone state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndicatorFrame {
    pub green: bool,
    pub red: bool,
    pub blue: bool,
    /// Buzzer tone; `None` is silent.
    pub tone_hz: Option<u16>,
}

impl IndicatorFrame {
    pub const DARK: Self = Self {
        green: false,
        red: false,
        blue: false,
        tone_hz: None,
    };
}

/// Status LEDs and buzzer.
pub trait Annunciator {
    fn show(&mut self, frame: IndicatorFrame) -> Result<(), BoxError>;
}

impl<T: Transducer + ?Sized> Transducer for Box<T> {
    fn initialize(&mut self, stabilize: std::time::Duration) -> Result<(), BoxError> {
        (**self).initialize(stabilize)
    }
    fn tare(&mut self) -> Result<(), BoxError> {
        (**self).tare()
    }
    fn calibrate(&mut self, known_mass_g: f32) -> Result<f32, BoxError> {
        (**self).calibrate(known_mass_g)
    }
    fn set_scale_factor(&mut self, factor: f32) {
        (**self).set_scale_factor(factor);
    }
    fn read_raw(&mut self) -> Result<Option<f32>, BoxError> {
        (**self).read_raw()
    }
}

impl<T: Igniter + ?Sized> Igniter for Box<T> {
    fn set_energized(&mut self, on: bool) -> Result<(), BoxError> {
        (**self).set_energized(on)
    }
}

impl<T: Storage + ?Sized> Storage for Box<T> {
    fn open(&mut self, header: &[&str]) -> Result<(), BoxError> {
        (**self).open(header)
    }
    fn append(&mut self, fields: &[String]) -> Result<(), BoxError> {
        (**self).append(fields)
    }
    fn flush(&mut self) -> Result<(), BoxError> {
        (**self).flush()
    }
    fn close(&mut self) -> Result<(), BoxError> {
        (**self).close()
    }
}

impl<T: Annunciator + ?Sized> Annunciator for Box<T> {
    fn show(&mut self, frame: IndicatorFrame) -> Result<(), BoxError> {
        (**self).show(frame)
    }
}
