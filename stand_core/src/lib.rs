#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Test stand controller core (hardware-agnostic).
//!
//! All hardware goes through the `stand_traits` collaborators: `Transducer`,
//! `Igniter`, `Storage`, `Annunciator` and `Clock`.
//!
//! ## Architecture
//!
//! Each tick runs, in order:
//!
//! - **Time keeping**: time since boot, test time against T-0, loop time (`time_keeper`)
//! - **Sampling**: period-gated load-cell pull through a 50-sample moving average (`sampler`, `filter`)
//! - **Sequencing**: standby → countdown → ignition → burn → data-safe → post-burn, abort from anywhere (`sequencer`)
//! - **Logging**: state-dependent cadence into the data file (`data_logger`)
//! - **Indication**: lamp and tone patterns (`indicator`)
//!
//! Operator commands arrive on a channel (`commands`) and are folded into a
//! per-tick snapshot; nothing outside the loop thread mutates the sequence.

pub mod builder;
pub mod calibration;
pub mod commands;
pub mod data_logger;
pub mod error;
pub mod filter;
pub mod hw_error;
pub mod indicator;
pub mod mocks;
pub mod runner;
pub mod sampler;
pub mod sequencer;
pub mod stand;
pub mod state;
pub mod status;
pub mod time_keeper;
pub mod util;

pub use builder::{Missing, Set, Stand, StandBuilder, build_stand};
pub use calibration::{Calibration, CalibrationSource, calibrate_with_mass, initialize_cell, tare_cell};
pub use commands::{Command, CommandInbox, CommandSender, Signals, command_channel, spawn_console_reader};
pub use data_logger::{CadenceCfg, DataLogger, LOG_HEADER, LogRecord, data_file_name};
pub use error::{BuildError, Result, StandError};
pub use filter::{FILTER_WINDOW, MovingAverage};
pub use runner::{RunOptions, RunSummary, run};
pub use sampler::{Sampler, SensorReading};
pub use sequencer::{Sequencer, SequencerContext, SequencerSettings};
pub use stand::StandCore;
pub use state::TestState;
pub use status::StandStatus;
pub use time_keeper::{Clocks, TimeKeeper};
