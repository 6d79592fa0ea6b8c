//! Test stand hardware: simulated rig, CSV storage, and (behind the
//! `hardware` feature) HX711 load cell and GPIO outputs on a Raspberry Pi.
pub mod error;
pub mod sim;
pub mod storage;
pub mod util;

#[cfg(feature = "hardware")]
pub mod gpio;
#[cfg(feature = "hardware")]
pub mod hx711;

pub use sim::{
    LogAnnunciator, SimHandles, SimulatedIgniter, SimulatedTransducer, ThrustProfile,
    simulated_rig,
};
pub use storage::CsvFileStorage;

#[cfg(feature = "hardware")]
pub use gpio::{GpioAnnunciator, GpioIgniter};
#[cfg(feature = "hardware")]
pub use hx711::Hx711Transducer;
