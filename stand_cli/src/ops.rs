//! Subcommand bodies: startup sequence, calibration, run, reporting.

use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Result, WrapErr};
use stand_config::{ParsedSettings, RigConfig, SettingsFile};
use stand_core::error::StandError;
use stand_core::indicator::{self, Cue};
use stand_core::{
    Calibration, Command, RunOptions, RunSummary, Stand, calibrate_with_mass, command_channel,
    data_file_name, initialize_cell, spawn_console_reader, tare_cell,
};
use stand_hardware::CsvFileStorage;
use tracing::{info, warn};

use crate::rig::{Rig, SharedAnnunciator, build_rig, free_memory_bytes};

/// Resolved file locations and rig description for one invocation.
#[derive(Debug, Clone)]
pub struct Context {
    pub rig: RigConfig,
    pub settings_path: PathBuf,
    pub data_dir: PathBuf,
    pub json: bool,
}

fn config_error(e: eyre::Report) -> eyre::Report {
    eyre::Report::new(StandError::Config(e.to_string()))
}

impl Context {
    pub fn new(
        mut rig: RigConfig,
        settings: Option<PathBuf>,
        data_dir: Option<PathBuf>,
        json: bool,
    ) -> Self {
        if let Some(dir) = data_dir {
            rig.storage.data_dir = dir;
        }
        let settings_path = settings.unwrap_or_else(|| rig.storage.settings_path());
        let data_dir = rig.storage.data_dir.clone();
        Self {
            rig,
            settings_path,
            data_dir,
            json,
        }
    }

    fn stabilize(&self) -> Duration {
        Duration::from_millis(self.rig.sampling.stabilize_ms)
    }

    /// Read, parse and validate the settings file. Every failure is a
    /// configuration error.
    pub fn load_settings(&self) -> Result<(SettingsFile, ParsedSettings)> {
        let file = SettingsFile::load(&self.settings_path).map_err(config_error)?;
        let parsed = file.parse().map_err(config_error)?;
        parsed.settings.validate().map_err(config_error)?;
        info!(
            path = %self.settings_path.display(),
            variables = parsed.variables,
            warnings = parsed.warnings.len(),
            "settings loaded"
        );
        Ok((file, parsed))
    }

    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.is_dir() {
            return Err(eyre::Report::new(StandError::StorageFault(format!(
                "data directory {} is not available",
                self.data_dir.display()
            ))));
        }
        Ok(())
    }
}

fn play(rig: &mut Rig, cues: &[Cue]) {
    indicator::play(&mut *rig.annunciator, &*rig.clock, cues);
}

/// Startup chime, then bring the load cell up. A dead cell sounds the
/// alarm and stops here.
fn bring_up(ctx: &Context, rig: &mut Rig, buzzer: bool) -> Result<()> {
    play(rig, &indicator::startup_sequence(buzzer));
    if let Err(e) = initialize_cell(&mut *rig.transducer, ctx.stabilize()) {
        play(rig, &indicator::fatal_alarm(buzzer));
        return Err(e);
    }
    Ok(())
}

/// Tare, load the known mass, derive the factor, unload.
fn calibrate_interactive(rig: &mut Rig, known_mass_g: f32) -> Result<Calibration> {
    tare_cell(&mut *rig.transducer)?;
    (rig.bench)(Some(known_mass_g))?;
    let calibration = calibrate_with_mass(&mut *rig.transducer, known_mass_g);
    (rig.bench)(None)?;
    calibration
}

pub struct RunArgs {
    pub auto_arm: bool,
    pub known_mass: Option<f32>,
    pub virtual_time: bool,
    pub max_ticks: Option<u64>,
}

pub struct RunReport {
    pub test_number: u32,
    pub data_file: PathBuf,
    pub summary: RunSummary,
}

pub fn run_test(ctx: &Context, args: RunArgs) -> Result<RunReport> {
    let (mut settings_file, parsed) = ctx.load_settings()?;
    let mut settings = parsed.settings;
    let buzzer = settings.buzzer_enabled;

    let mut rig = build_rig(&ctx.rig, args.virtual_time)?;
    bring_up(ctx, &mut rig, buzzer)?;

    let calibration = match (args.known_mass, settings.calibration_value) {
        (Some(mass), _) => {
            let cal = calibrate_interactive(&mut rig, mass)?;
            settings_file
                .save_calibration_value(cal.scale_factor)
                .map_err(config_error)?;
            cal
        }
        (None, Some(value)) => Calibration::from_config(value)?,
        (None, None) => {
            warn!("no calibration value; force columns are raw counts");
            Calibration::uncalibrated()
        }
    };

    if let Err(e) = ctx.ensure_data_dir() {
        play(&mut rig, &indicator::fatal_alarm(buzzer));
        return Err(e);
    }
    let test_number = settings_file.next_test_number().map_err(config_error)?;
    settings.test_sequence_number = test_number;
    let data_file = ctx.data_dir.join(data_file_name(test_number));

    let Rig {
        transducer,
        igniter,
        annunciator,
        clock,
        ..
    } = rig;
    let mut lamps = SharedAnnunciator::new(annunciator);
    let built = Stand::builder()
        .with_transducer(transducer)
        .with_igniter(igniter)
        .with_storage(CsvFileStorage::new(&data_file))
        .with_annunciator(lamps.clone())
        .with_settings(settings)
        .with_calibration(calibration)
        .with_clock(clock.clone())
        .with_sample_period(Duration::from_millis(ctx.rig.sampling.sample_period_ms))
        .with_memory_probe(free_memory_bytes)
        .build();
    let mut stand = match built {
        Ok(stand) => stand,
        Err(e) => {
            indicator::play(&mut lamps, &*clock, &indicator::fatal_alarm(buzzer));
            return Err(e);
        }
    };

    // The data file is open; only now is the number spent.
    if let Err(e) = settings_file.bump_test_number() {
        stand.play(&indicator::fatal_alarm(buzzer));
        drop(stand);
        let _ = std::fs::remove_file(&data_file);
        return Err(config_error(e));
    }
    stand.play(&indicator::ready_chime(buzzer));

    let (tx, inbox) = command_channel();
    spawn_console_reader(BufReader::new(std::io::stdin()), tx.clone())
        .wrap_err("start console reader")?;
    let ctrlc_tx = tx.clone();
    ctrlc::set_handler(move || {
        ctrlc_tx.send(Command::Abort);
    })
    .wrap_err("install Ctrl-C handler")?;
    if args.auto_arm {
        tx.send(Command::Arm);
    } else {
        info!("standing by: S arms, A aborts, T toggles load-cell output");
    }

    let opts = RunOptions {
        tick: Duration::from_micros(ctx.rig.sampling.tick_us),
        max_ticks: args.max_ticks,
    };
    let summary = match stand_core::run(&mut stand, &inbox, opts) {
        Ok(s) => s,
        Err(e) => {
            stand.play(&indicator::fatal_alarm(buzzer));
            return Err(e);
        }
    };

    Ok(RunReport {
        test_number,
        data_file,
        summary,
    })
}

pub fn calibrate(ctx: &Context, known_mass: f32, virtual_time: bool) -> Result<f32> {
    let (mut settings_file, parsed) = ctx.load_settings()?;
    let mut rig = build_rig(&ctx.rig, virtual_time)?;
    bring_up(ctx, &mut rig, parsed.settings.buzzer_enabled)?;
    let cal = calibrate_interactive(&mut rig, known_mass)?;
    settings_file
        .save_calibration_value(cal.scale_factor)
        .map_err(config_error)?;
    Ok(cal.scale_factor)
}

pub struct SelfCheckReport {
    pub reading: f32,
    pub calibrated: bool,
}

/// Load cell answers within the read timeout and the data directory exists.
/// Leaves the settings file untouched.
pub fn self_check(ctx: &Context, virtual_time: bool) -> Result<SelfCheckReport> {
    let (_, parsed) = ctx.load_settings()?;
    ctx.ensure_data_dir()?;
    let mut rig = build_rig(&ctx.rig, virtual_time)?;
    initialize_cell(&mut *rig.transducer, ctx.stabilize())?;
    if let Some(v) = parsed.settings.calibration_value {
        Calibration::from_config(v)?.apply(&mut *rig.transducer);
    }

    let timeout = Duration::from_millis(ctx.rig.sampling.read_timeout_ms);
    let start = rig.clock.now();
    loop {
        match rig.transducer.read_raw() {
            Ok(Some(reading)) => {
                return Ok(SelfCheckReport {
                    reading,
                    calibrated: parsed.settings.calibration_value.is_some(),
                });
            }
            Ok(None) => {}
            Err(e) => {
                return Err(eyre::Report::new(StandError::HardwareFault(e.to_string())));
            }
        }
        if rig.clock.now().saturating_duration_since(start) >= timeout {
            return Err(eyre::Report::new(StandError::HardwareFault(format!(
                "no reading within {} ms",
                timeout.as_millis()
            ))));
        }
        rig.clock.sleep(Duration::from_millis(1));
    }
}

// ── Reporting ───────────────────────────────────────────────────────────────

pub fn print_run_report(report: &RunReport, json: bool) {
    let s = &report.summary;
    if json {
        let line = serde_json::json!({
            "test_number": report.test_number,
            "data_file": report.data_file.display().to_string(),
            "final_state": s.final_state.label(),
            "completed": s.completed(),
            "ticks": s.ticks,
            "on_time_s": s.on_time_s,
            "samples": s.samples,
            "read_errors": s.read_errors,
            "records_written": s.records_written,
            "write_failures": s.write_failures,
            "igniter_pulses": s.igniter_pulses,
            "transitions": s.transitions,
            "peak_filtered_g": s.peak_filtered_g,
            "calibration": s.calibration,
        });
        println!("{line}");
        return;
    }
    let outcome = if s.completed() { "complete" } else { "aborted" };
    println!("Test {} {outcome}: {}", report.test_number, s.final_state);
    println!("  data file:      {}", report.data_file.display());
    println!(
        "  records:        {} ({} write failures)",
        s.records_written, s.write_failures
    );
    println!("  samples:        {} ({} read errors)", s.samples, s.read_errors);
    match s.peak_filtered_g {
        Some(peak) => println!("  peak force:     {peak:.2}"),
        None => println!("  peak force:     n/a"),
    }
    println!("  igniter pulses: {}", s.igniter_pulses);
    println!("  calibration:    {}", s.calibration);
    println!("  on time:        {:.3} s", s.on_time_s);
}

pub fn print_settings(path: &Path, parsed: &ParsedSettings, json: bool) {
    let s = &parsed.settings;
    if json {
        let warnings: Vec<String> = parsed.warnings.iter().map(ToString::to_string).collect();
        let line = serde_json::json!({
            "path": path.display().to_string(),
            "countdown_length_s": s.countdown_length_s,
            "motor_load_threshold": s.motor_load_threshold,
            "data_log_interval_fast_ms": s.data_log_interval_fast_ms,
            "data_log_interval_slow_ms": s.data_log_interval_slow_ms,
            "buzzer_enabled": s.buzzer_enabled,
            "data_safe_length_s": s.data_safe_length_s,
            "test_sequence_number": s.test_sequence_number,
            "calibration_value": s.calibration_value,
            "warnings": warnings,
        });
        println!("{line}");
        return;
    }
    println!("Settings from {}", path.display());
    println!("  Countdown Length:   {} s", s.countdown_length_s);
    println!("  Motor Load Thresh.: {}", s.motor_load_threshold);
    println!(
        "  Log Interval:       {} ms fast / {} ms slow",
        s.data_log_interval_fast_ms, s.data_log_interval_slow_ms
    );
    println!("  Buzzer On:          {}", s.buzzer_enabled);
    println!("  Data Safe Length:   {} s", s.data_safe_length_s);
    println!("  Test Number:        {}", s.test_sequence_number);
    match s.calibration_value {
        Some(v) => println!("  Calibration Value:  {v}"),
        None => println!("  Calibration Value:  not set"),
    }
    for w in &parsed.warnings {
        println!("warning: {w}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_override_moves_relative_settings_file() {
        let ctx = Context::new(
            RigConfig::default(),
            None,
            Some(PathBuf::from("/mnt/card")),
            false,
        );
        assert_eq!(ctx.data_dir, PathBuf::from("/mnt/card"));
        assert_eq!(ctx.settings_path, PathBuf::from("/mnt/card/config.txt"));
    }

    #[test]
    fn explicit_settings_path_wins() {
        let ctx = Context::new(
            RigConfig::default(),
            Some(PathBuf::from("/etc/stand.txt")),
            None,
            false,
        );
        assert_eq!(ctx.settings_path, PathBuf::from("/etc/stand.txt"));
        assert_eq!(ctx.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn missing_settings_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(
            RigConfig::default(),
            Some(dir.path().join("absent.txt")),
            Some(dir.path().to_path_buf()),
            false,
        );
        let err = ctx.load_settings().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StandError>(),
            Some(StandError::Config(_))
        ));
    }

    #[test]
    fn missing_data_dir_is_a_storage_fault() {
        let ctx = Context::new(
            RigConfig::default(),
            None,
            Some(PathBuf::from("/definitely/not/here")),
            false,
        );
        let err = ctx.ensure_data_dir().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StandError>(),
            Some(StandError::StorageFault(_))
        ));
    }
}
