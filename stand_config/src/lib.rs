#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Configuration for the test stand.
//!
//! - `Settings` come from the stand's `*KEY:value;` text file on the data
//!   card. Unknown keys are warnings; bad values are errors.
//! - `SettingsFile` owns the two persisted mutations: the test number bump
//!   at startup and the calibration value after an interactive calibration.
//! - `RigConfig` is deserialized from TOML and describes pins, loop timing,
//!   storage paths and diagnostic logging.
mod persist;
mod rig;
mod settings;

pub use persist::write_atomic;
pub use rig::{LoggingCfg, Pins, RigConfig, SamplingCfg, StorageCfg, load_toml};
pub use settings::{
    ConfigWarning, ParsedSettings, Settings, SettingsFile, parse_settings, rewrite_key,
};
