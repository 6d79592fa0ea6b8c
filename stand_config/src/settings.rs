//! Stand settings in the card's line format.
//!
//! ```text
//! Lines starting with '*' carry a variable, everything else is a comment.
//! *CL:30;
//! *MLT:10;
//! *TN:7;
//! ```

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::persist::write_atomic;

pub const KEY_COUNTDOWN: &str = "CL";
pub const KEY_CALIBRATION: &str = "LCV";
pub const KEY_LOAD_THRESHOLD: &str = "MLT";
pub const KEY_LOG_FAST: &str = "DLF";
pub const KEY_LOG_SLOW: &str = "DLS";
pub const KEY_BUZZER: &str = "BS";
pub const KEY_DATA_SAFE: &str = "DSL";
pub const KEY_TEST_NUMBER: &str = "TN";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub countdown_length_s: f32,
    /// Filtered force (grams) separating "motor burning" from "not burning".
    pub motor_load_threshold: f32,
    pub data_log_interval_fast_ms: u64,
    pub data_log_interval_slow_ms: u64,
    pub buzzer_enabled: bool,
    pub data_safe_length_s: f32,
    pub test_sequence_number: u32,
    /// Scale factor saved by the last interactive calibration.
    pub calibration_value: Option<f32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            countdown_length_s: 30.0,
            motor_load_threshold: 10.0,
            data_log_interval_fast_ms: 10,
            data_log_interval_slow_ms: 100,
            buzzer_enabled: true,
            data_safe_length_s: 5.0,
            test_sequence_number: 0,
            calibration_value: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> eyre::Result<()> {
        if !self.countdown_length_s.is_finite() || self.countdown_length_s < 0.0 {
            eyre::bail!("CL (countdown length) must be >= 0 seconds");
        }
        if self.countdown_length_s > 3600.0 {
            eyre::bail!("CL (countdown length) is unreasonably large (>1h)");
        }
        if !self.motor_load_threshold.is_finite() {
            eyre::bail!("MLT (motor load threshold) must be a finite number");
        }
        if self.motor_load_threshold <= 0.0 {
            warn!(
                threshold = self.motor_load_threshold,
                "MLT <= 0: an unloaded cell may already read as a burning motor"
            );
        }
        if self.data_log_interval_fast_ms == 0 {
            eyre::bail!("DLF (fast log interval) must be >= 1 ms");
        }
        if self.data_log_interval_slow_ms == 0 {
            eyre::bail!("DLS (slow log interval) must be >= 1 ms");
        }
        if !self.data_safe_length_s.is_finite() || self.data_safe_length_s < 0.0 {
            eyre::bail!("DSL (data safe length) must be >= 0 seconds");
        }
        if let Some(v) = self.calibration_value
            && !(v.is_finite() && v != 0.0)
        {
            eyre::bail!("LCV (calibration value) must be finite and non-zero");
        }
        Ok(())
    }
}

/// Non-fatal findings while reading the settings text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    UnknownKey { line: usize, key: String },
    Malformed { line: usize, text: String },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownKey { line, key } => {
                write!(f, "line {line}: '{key}' is not a known setting")
            }
            Self::Malformed { line, text } => {
                write!(f, "line {line}: expected '*KEY:value;', got '{text}'")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedSettings {
    pub settings: Settings,
    pub warnings: Vec<ConfigWarning>,
    /// Variable lines recognised and applied.
    pub variables: usize,
}

/// Split `*KEY:value;rest` into `(KEY, value)`.
fn split_variable(line: &str) -> Option<(&str, &str)> {
    let body = line.strip_prefix('*')?;
    let (key, rest) = body.split_once(':')?;
    let (value, _) = rest.split_once(';')?;
    Some((key.trim(), value.trim()))
}

fn parse_num<T: std::str::FromStr>(key: &str, line: usize, value: &str) -> eyre::Result<T> {
    value
        .parse::<T>()
        .map_err(|_| eyre::eyre!("invalid value for {key} on line {line}: '{value}'"))
}

/// Parse the settings text. Defaults cover missing keys.
pub fn parse_settings(text: &str) -> eyre::Result<ParsedSettings> {
    let mut settings = Settings::default();
    let mut warnings = Vec::new();
    let mut variables = 0usize;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end_matches('\r');
        if !line.starts_with('*') {
            continue;
        }
        let Some((key, value)) = split_variable(line) else {
            warnings.push(ConfigWarning::Malformed {
                line: line_no,
                text: line.to_string(),
            });
            continue;
        };
        match key {
            KEY_COUNTDOWN => settings.countdown_length_s = parse_num(key, line_no, value)?,
            KEY_CALIBRATION => {
                settings.calibration_value = Some(parse_num(key, line_no, value)?);
            }
            KEY_LOAD_THRESHOLD => {
                settings.motor_load_threshold = parse_num(key, line_no, value)?;
            }
            KEY_LOG_FAST => settings.data_log_interval_fast_ms = parse_num(key, line_no, value)?,
            KEY_LOG_SLOW => settings.data_log_interval_slow_ms = parse_num(key, line_no, value)?,
            KEY_BUZZER => settings.buzzer_enabled = parse_num::<i64>(key, line_no, value)? != 0,
            KEY_DATA_SAFE => settings.data_safe_length_s = parse_num(key, line_no, value)?,
            KEY_TEST_NUMBER => settings.test_sequence_number = parse_num(key, line_no, value)?,
            _ => {
                warnings.push(ConfigWarning::UnknownKey {
                    line: line_no,
                    key: key.to_string(),
                });
                continue;
            }
        }
        variables += 1;
    }

    for w in &warnings {
        warn!(warning = %w, "settings");
    }

    Ok(ParsedSettings {
        settings,
        warnings,
        variables,
    })
}

/// Rewrite the last `*KEY:...;` line with `value`, keeping anything after
/// the `;`. The last line is the one `parse_settings` applies. Appends a new
/// line when the key is absent.
pub fn rewrite_key(text: &str, key: &str, value: &str) -> String {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let target = lines.iter().rposition(|line| {
        matches!(split_variable(line.trim_end()), Some((k, _)) if k == key)
    });

    let mut out = String::with_capacity(text.len() + 16);
    for (idx, line) in lines.iter().enumerate() {
        if Some(idx) == target
            && let Some(semi) = line.find(';')
        {
            out.push('*');
            out.push_str(key);
            out.push(':');
            out.push_str(value);
            out.push_str(&line[semi..]);
            continue;
        }
        out.push_str(line);
    }
    if target.is_none() {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&format!("*{key}:{value};\n"));
    }
    out
}

/// The settings file on the data card and its persisted mutations.
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
    text: String,
}

impl SettingsFile {
    pub fn load(path: impl Into<PathBuf>) -> eyre::Result<Self> {
        let path = path.into();
        let text = std::fs::read_to_string(&path)
            .map_err(|e| eyre::eyre!("read settings file {}: {e}", path.display()))?;
        Ok(Self { path, text })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parse(&self) -> eyre::Result<ParsedSettings> {
        parse_settings(&self.text)
    }

    /// The number the next run will take. Nothing is written.
    pub fn next_test_number(&self) -> eyre::Result<u32> {
        self.parse()?
            .settings
            .test_sequence_number
            .checked_add(1)
            .ok_or_else(|| eyre::eyre!("TN (test number) overflow"))
    }

    /// Increment the test number, persist it, and return the new number.
    /// This run's data file is named after the returned value.
    pub fn bump_test_number(&mut self) -> eyre::Result<u32> {
        let next = self.next_test_number()?;
        self.persist(rewrite_key(&self.text, KEY_TEST_NUMBER, &next.to_string()))?;
        info!(test_number = next, "test number advanced");
        Ok(next)
    }

    pub fn save_calibration_value(&mut self, value: f32) -> eyre::Result<()> {
        if !(value.is_finite() && value != 0.0) {
            eyre::bail!("refusing to save calibration value {value}");
        }
        self.persist(rewrite_key(&self.text, KEY_CALIBRATION, &value.to_string()))?;
        info!(calibration_value = value, "calibration value saved");
        Ok(())
    }

    fn persist(&mut self, text: String) -> eyre::Result<()> {
        write_atomic(&self.path, text.as_bytes())
            .map_err(|e| eyre::eyre!("write settings file {}: {e}", self.path.display()))?;
        self.text = text;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Test stand settings\n\
*CL:12;\n\
*LCV:421.5;\n\
*MLT:15.5;\n\
*DLF:5;\n\
*DLS:250;\n\
*BS:0;\n\
*DSL:3;\n\
*TN:41;\n";

    #[test]
    fn parses_every_known_key() {
        let p = parse_settings(SAMPLE).unwrap();
        let s = p.settings;
        assert_eq!(s.countdown_length_s, 12.0);
        assert_eq!(s.calibration_value, Some(421.5));
        assert_eq!(s.motor_load_threshold, 15.5);
        assert_eq!(s.data_log_interval_fast_ms, 5);
        assert_eq!(s.data_log_interval_slow_ms, 250);
        assert!(!s.buzzer_enabled);
        assert_eq!(s.data_safe_length_s, 3.0);
        assert_eq!(s.test_sequence_number, 41);
        assert_eq!(p.variables, 8);
        assert!(p.warnings.is_empty());
    }

    #[test]
    fn unknown_and_malformed_lines_are_warnings() {
        let p = parse_settings("*CL:5;\r\n*XYZ:1;\n*broken\nplain comment\n").unwrap();
        assert_eq!(p.settings.countdown_length_s, 5.0);
        assert_eq!(p.variables, 1);
        assert_eq!(
            p.warnings,
            vec![
                ConfigWarning::UnknownKey {
                    line: 2,
                    key: "XYZ".into()
                },
                ConfigWarning::Malformed {
                    line: 3,
                    text: "*broken".into()
                },
            ]
        );
    }

    #[test]
    fn bad_value_is_an_error() {
        let err = parse_settings("*DLF:fast;\n").unwrap_err();
        assert!(err.to_string().contains("DLF"), "{err}");
    }

    #[test]
    fn last_line_without_newline_is_read() {
        let p = parse_settings("*TN:3;").unwrap();
        assert_eq!(p.settings.test_sequence_number, 3);
    }

    #[test]
    fn rewrite_replaces_value_and_keeps_trailing_text() {
        let out = rewrite_key("# hdr\n*TN:9; last run\n*CL:1;\n", "TN", "10");
        assert_eq!(out, "# hdr\n*TN:10; last run\n*CL:1;\n");
    }

    #[test]
    fn rewrite_targets_the_line_that_parsing_applies() {
        let out = rewrite_key("*TN:3;\n*CL:1;\n*TN:7; dup\n", "TN", "8");
        assert_eq!(out, "*TN:3;\n*CL:1;\n*TN:8; dup\n");
        assert_eq!(parse_settings(&out).unwrap().settings.test_sequence_number, 8);
    }

    #[test]
    fn rewrite_appends_missing_key() {
        assert_eq!(rewrite_key("*CL:1;", "TN", "1"), "*CL:1;\n*TN:1;\n");
        assert_eq!(rewrite_key("", "LCV", "2.5"), "*LCV:2.5;\n");
    }

    #[test]
    fn defaults_validate() {
        Settings::default().validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_intervals() {
        let s = Settings {
            data_log_interval_fast_ms: 0,
            ..Settings::default()
        };
        assert!(s.validate().unwrap_err().to_string().contains("DLF"));
    }
}
