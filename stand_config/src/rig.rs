use std::path::PathBuf;

use serde::Deserialize;

/// BCM pin numbers for the stand wiring.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct Pins {
    pub hx711_dt: u8,
    pub hx711_sck: u8,
    pub igniter: u8,
    pub led_green: u8,
    pub led_red: u8,
    pub led_blue: u8,
    pub buzzer: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            hx711_dt: 9,
            hx711_sck: 10,
            igniter: 4,
            led_green: 3,
            led_red: 5,
            led_blue: 2,
            buzzer: 6,
        }
    }
}

impl Pins {
    fn all(&self) -> [(&'static str, u8); 7] {
        [
            ("hx711_dt", self.hx711_dt),
            ("hx711_sck", self.hx711_sck),
            ("igniter", self.igniter),
            ("led_green", self.led_green),
            ("led_red", self.led_red),
            ("led_blue", self.led_blue),
            ("buzzer", self.buzzer),
        ]
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct SamplingCfg {
    /// Minimum spacing between load-cell reads (ms).
    pub sample_period_ms: u64,
    /// Main loop tick (µs). The loop never sleeps longer than this.
    pub tick_us: u64,
    /// Settling time given to the amplifier before tare (ms).
    pub stabilize_ms: u64,
    /// Max time to wait for HX711 data-ready before failing (ms)
    pub read_timeout_ms: u64,
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self {
            sample_period_ms: 20,
            tick_us: 1000,
            stabilize_ms: 2000,
            read_timeout_ms: 150,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StorageCfg {
    pub data_dir: PathBuf,
    /// Relative paths resolve against `data_dir`.
    pub settings_file: PathBuf,
}

impl Default for StorageCfg {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            settings_file: PathBuf::from("config.txt"),
        }
    }
}

impl StorageCfg {
    pub fn settings_path(&self) -> PathBuf {
        if self.settings_file.is_absolute() {
            self.settings_file.clone()
        } else {
            self.data_dir.join(&self.settings_file)
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingCfg {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Rig description: wiring, timing, storage locations, logging.
/// Every section is optional; an empty file yields the stock rig.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RigConfig {
    pub pins: Pins,
    pub sampling: SamplingCfg,
    pub storage: StorageCfg,
    pub logging: LoggingCfg,
}

pub fn load_toml(s: &str) -> Result<RigConfig, toml::de::Error> {
    toml::from_str::<RigConfig>(s)
}

impl RigConfig {
    pub fn validate(&self) -> eyre::Result<()> {
        // Pins
        let pins = self.pins.all();
        for (i, (name_a, a)) in pins.iter().enumerate() {
            if *a > 27 {
                eyre::bail!("pins.{name_a} must be a BCM pin in 0..=27, got {a}");
            }
            if let Some((name_b, _)) = pins[i + 1..].iter().find(|(_, b)| b == a) {
                eyre::bail!("pins.{name_a} and pins.{name_b} share pin {a}");
            }
        }

        // Sampling
        if self.sampling.sample_period_ms == 0 {
            eyre::bail!("sampling.sample_period_ms must be >= 1");
        }
        if self.sampling.sample_period_ms > 10_000 {
            eyre::bail!("sampling.sample_period_ms is unreasonably large (>10s)");
        }
        if self.sampling.tick_us == 0 {
            eyre::bail!("sampling.tick_us must be >= 1");
        }
        if self.sampling.tick_us > 100_000 {
            eyre::bail!("sampling.tick_us is unreasonably large (>100ms)");
        }
        if self.sampling.stabilize_ms > 60_000 {
            eyre::bail!("sampling.stabilize_ms is unreasonably large (>60s)");
        }
        if self.sampling.read_timeout_ms == 0 {
            eyre::bail!("sampling.read_timeout_ms must be >= 1");
        }

        // Storage
        if self.storage.data_dir.as_os_str().is_empty() {
            eyre::bail!("storage.data_dir must not be empty");
        }
        if self.storage.settings_file.as_os_str().is_empty() {
            eyre::bail!("storage.settings_file must not be empty");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got '{r}'");
        }
        Ok(())
    }
}
