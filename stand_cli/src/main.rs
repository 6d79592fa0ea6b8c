mod cli;
mod error_fmt;
mod ops;
mod rig;

use std::path::Path;

use clap::Parser;
use eyre::{Result, WrapErr};
use stand_config::{LoggingCfg, RigConfig};
use stand_core::error::StandError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::ops::{Context, RunArgs};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        tracing::error!(error = ?e, "exiting");
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> Result<()> {
    color_eyre::install()?;

    let rig = load_rig(cli.rig.as_deref())?;
    init_tracing(cli.json, &cli.log_level, &rig.logging)?;
    rig.validate()
        .map_err(|e| config_error(format!("rig config: {e}")))?;

    let ctx = Context::new(rig, cli.settings, cli.data_dir, cli.json);
    match cli.cmd {
        Commands::Run {
            auto_arm,
            known_mass,
            virtual_time,
            max_ticks,
        } => {
            let report = ops::run_test(
                &ctx,
                RunArgs {
                    auto_arm,
                    known_mass,
                    virtual_time,
                    max_ticks,
                },
            )?;
            ops::print_run_report(&report, ctx.json);
        }
        Commands::Calibrate {
            known_mass,
            virtual_time,
        } => {
            let factor = ops::calibrate(&ctx, known_mass, virtual_time)?;
            if ctx.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "scale_factor": factor,
                        "settings": ctx.settings_path.display().to_string(),
                    })
                );
            } else {
                println!(
                    "New calibration value set to: {factor} (saved to {})",
                    ctx.settings_path.display()
                );
            }
        }
        Commands::Settings => {
            let (_, parsed) = ctx.load_settings()?;
            ops::print_settings(&ctx.settings_path, &parsed, ctx.json);
        }
        Commands::SelfCheck { virtual_time } => {
            let report = ops::self_check(&ctx, virtual_time)?;
            if ctx.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "ok": true,
                        "reading": report.reading,
                        "calibrated": report.calibrated,
                    })
                );
            } else {
                println!(
                    "self-check ok: load cell reads {:.2} ({})",
                    report.reading,
                    if report.calibrated { "calibrated" } else { "raw counts" }
                );
            }
        }
    }
    Ok(())
}

/// Rig TOML, or the stock rig when no path is given.
fn load_rig(path: Option<&Path>) -> Result<RigConfig> {
    let Some(path) = path else {
        return Ok(RigConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| config_error(format!("read rig config {}: {e}", path.display())))?;
    stand_config::load_toml(&text)
        .map_err(|e| config_error(format!("parse rig config {}: {e}", path.display())))
}

fn config_error(msg: String) -> eyre::Report {
    eyre::Report::new(StandError::Config(msg))
}

/// Console logs go to stderr (pretty or JSON lines) filtered by `RUST_LOG`
/// or `--log-level`; the rig config may add a JSON log file.
fn init_tracing(json: bool, level: &str, logging: &LoggingCfg) -> Result<()> {
    let console_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(level)
            .wrap_err_with(|| format!("invalid log level '{level}'"))?,
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if json {
        layers.push(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter)
                .boxed(),
        );
    }

    if let Some(file) = logging.file.as_deref() {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("logging.file '{file}' has no file name"))?;
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_level = logging.level.as_deref().unwrap_or("info");
        let file_filter = EnvFilter::try_new(file_level)
            .wrap_err_with(|| format!("invalid logging.level '{file_level}'"))?;
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| eyre::eyre!("init tracing: {e}"))?;
    Ok(())
}
