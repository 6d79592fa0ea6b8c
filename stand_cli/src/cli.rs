//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Environment variable that makes the simulated load cell unresponsive.
pub const SIM_FAULT_ENV: &str = "STAND_TEST_SIM_FAULT";

#[derive(Parser, Debug)]
#[command(name = "stand", version, about = "Rocket motor static test stand")]
pub struct Cli {
    /// Rig description TOML (pins, timing, storage, logging); stock rig when omitted
    #[arg(long, value_name = "FILE")]
    pub rig: Option<PathBuf>,

    /// Stand settings file (`*KEY:value;` lines); overrides `[storage].settings_file`
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Directory for data files; overrides `[storage].data_dir`
    #[arg(long = "data-dir", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log as JSON lines instead of pretty; summaries and errors are JSON too
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one static test: standby, countdown, ignition, burn, post-burn
    Run {
        /// Arm immediately instead of waiting for `S` on the console
        #[arg(long, action = ArgAction::SetTrue)]
        auto_arm: bool,
        /// Calibrate against this mass (grams) before the run and save the result
        #[arg(long, value_name = "GRAMS")]
        known_mass: Option<f32>,
        /// Drive the simulated rig from a virtual clock (no wall-clock waits)
        #[arg(long, action = ArgAction::SetTrue)]
        virtual_time: bool,
        /// Abort after this many loop ticks if the test has not finished
        #[arg(long, value_name = "N")]
        max_ticks: Option<u64>,
    },
    /// Derive the load-cell scale factor from a known mass and save it
    Calibrate {
        /// Mass placed on the cell, in grams
        #[arg(long, value_name = "GRAMS")]
        known_mass: f32,
        /// Drive the simulated rig from a virtual clock
        #[arg(long, action = ArgAction::SetTrue)]
        virtual_time: bool,
    },
    /// Print the parsed settings and any warnings
    Settings,
    /// Quick health check (load cell responds, data dir writable)
    SelfCheck {
        /// Drive the simulated rig from a virtual clock
        #[arg(long, action = ArgAction::SetTrue)]
        virtual_time: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "stand",
            "--json",
            "--data-dir",
            "/tmp/x",
            "run",
            "--auto-arm",
            "--known-mass",
            "500",
            "--max-ticks",
            "10",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
        match cli.cmd {
            Commands::Run {
                auto_arm,
                known_mass,
                virtual_time,
                max_ticks,
            } => {
                assert!(auto_arm);
                assert_eq!(known_mass, Some(500.0));
                assert!(!virtual_time);
                assert_eq!(max_ticks, Some(10));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn calibrate_requires_known_mass() {
        assert!(Cli::try_parse_from(["stand", "calibrate"]).is_err());
    }
}
