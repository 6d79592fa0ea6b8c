//! Human-readable error descriptions and structured JSON error formatting.

use stand_core::error::{BuildError, StandError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingTransducer => {
                "What happened: No load cell was provided to the stand.\nLikely causes: The transducer failed to initialize or was not wired into the builder.\nHow to fix: Ensure the HX711 is created successfully and passed via with_transducer(...).".to_string()
            }
            BuildError::MissingIgniter => {
                "What happened: No igniter output was provided to the stand.\nLikely causes: The igniter pin failed to open or was not wired into the builder.\nHow to fix: Check [pins].igniter in the rig config and GPIO permissions.".to_string()
            }
            BuildError::MissingStorage => {
                "What happened: No data sink was provided to the stand.\nLikely causes: The data file could not be prepared.\nHow to fix: Check [storage].data_dir in the rig config or pass --data-dir.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the rig config or settings file.\nHow to fix: Edit the file, then rerun `stand settings` to check it."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<StandError>() {
        return match se {
            StandError::HardwareFault(msg) => format!(
                "What happened: Load cell or output stage is not usable ({msg}).\nLikely causes: HX711 not powered, wrong DT/SCK pins, or loose wiring.\nHow to fix: Check [pins] in the rig config, verify 5V/GND, then power-cycle the stand."
            ),
            StandError::StorageFault(msg) => format!(
                "What happened: The data file could not be opened ({msg}).\nLikely causes: Data directory missing, card not mounted, or no write permission.\nHow to fix: Check [storage].data_dir (or --data-dir) exists and is writable."
            ),
            StandError::Config(msg) => config_hint(msg),
            StandError::Timeout => {
                "What happened: Load cell read timed out.\nLikely causes: HX711 not wired correctly, no power/ground, or timeout too low.\nHow to fix: Verify DT/SCK pins and power, and consider increasing [sampling].read_timeout_ms.".to_string()
            }
            // Fallback to generic for other domain errors
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let msg = err.to_string();

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Rig config problems name a TOML table; everything else is the settings file.
fn config_hint(msg: &str) -> String {
    let lower = msg.to_ascii_lowercase();

    if lower.contains("share pin") || lower.contains("pins.") {
        return format!(
            "What happened: Pin assignment is invalid ({msg}).\nLikely causes: Two outputs on the same BCM pin, or a pin above 27.\nHow to fix: Fix the [pins] table in the rig config."
        );
    }

    if lower.contains("rig config")
        || lower.contains("sampling.")
        || lower.contains("storage.")
        || lower.contains("logging.")
    {
        return format!(
            "What happened: The rig config is invalid ({msg}).\nLikely causes: A typo in a table or key name, a value of the wrong type, or an out-of-range value.\nHow to fix: Edit the rig TOML passed with --rig and try again."
        );
    }

    format!(
        "What happened: Settings are invalid ({msg}).\nLikely causes: A `*KEY:value;` line holds a value that does not parse or is out of range, or the file is missing.\nHow to fix: Fix the named key in the settings file; `stand settings` prints what was parsed."
    )
}

/// Stable exit codes for the faults that stop the stand; everything else is 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(se) = err.downcast_ref::<StandError>() {
        return match se {
            StandError::HardwareFault(_) => 3,
            StandError::StorageFault(_) => 4,
            StandError::Config(_) => 5,
            _ => 1,
        };
    }
    if let Some(BuildError::InvalidConfig(_)) = err.downcast_ref::<BuildError>() {
        return 5;
    }
    1
}

pub fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(se) = err.downcast_ref::<StandError>() {
        return match se {
            StandError::Hardware(_) => "Hardware",
            StandError::HardwareFault(_) => "HardwareFault",
            StandError::StorageFault(_) => "StorageFault",
            StandError::StorageWrite(_) => "StorageWrite",
            StandError::Config(_) => "Config",
            StandError::Timeout => "Timeout",
            StandError::State(_) => "State",
        };
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    "Error"
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
