use std::time::{Duration, Instant};

use rppal::gpio::{Gpio, InputPin, OutputPin};
use stand_traits::{BoxError, Transducer};
use tracing::{debug, trace};

use crate::error::{HwError, Result};
use crate::util::{average_readings, wait_until_ready};

/// Samples averaged for tare and calibration.
const SETTLE_SAMPLES: usize = 16;

pub struct Hx711 {
    dt: InputPin,
    sck: OutputPin,
    gain_pulses: u8, // 25, 26, 27 based on gain/channel
}

impl Hx711 {
    pub fn new(dt_pin: u8, sck_pin: u8, gain_pulses: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let dt = gpio
            .get(dt_pin)
            .map_err(|e| HwError::Gpio(format!("open hx711 dt pin {dt_pin}: {e}")))?
            .into_input();
        let mut sck = gpio
            .get(sck_pin)
            .map_err(|e| HwError::Gpio(format!("open hx711 sck pin {sck_pin}: {e}")))?
            .into_output();
        sck.set_low(); // clock idle low
        Ok(Self {
            dt,
            sck,
            gain_pulses,
        })
    }

    /// DT low means a conversion is waiting.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.dt.is_low()
    }

    pub fn read_with_timeout(&mut self, timeout: Duration) -> Result<i32> {
        let deadline = Instant::now() + timeout;
        while !self.is_ready() {
            if Instant::now() >= deadline {
                return Err(HwError::Timeout);
            }
            std::thread::sleep(Duration::from_micros(200));
        }
        Ok(self.shift_in())
    }

    fn shift_in(&mut self) -> i32 {
        // Clock out 24 bits
        let mut value: i32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            spin_delay_100ns();
            value = (value << 1) | if self.dt.is_high() { 1 } else { 0 };
            self.sck.set_low();
            spin_delay_100ns();
        }

        // Pulse gain to set next measurement
        for _ in 0..self.gain_pulses.saturating_sub(24) {
            self.sck.set_high();
            spin_delay_100ns();
            self.sck.set_low();
            spin_delay_100ns();
        }

        // Sign extend 24-bit
        if (value & 0x800000) != 0 {
            value |= !0xFFFFFF;
        }
        trace!(raw = value, "hx711 raw read");
        value
    }
}

#[inline(always)]
fn spin_delay_100ns() {
    std::hint::spin_loop();
}

/// HX711-backed load cell: tare offset and scale factor applied here so the
/// control loop only sees grams-equivalent force.
pub struct Hx711Transducer {
    hx711: Hx711,
    read_timeout: Duration,
    tare_counts: f64,
    scale_factor: f32,
    initialized: bool,
}

impl Hx711Transducer {
    pub fn new(dt_pin: u8, sck_pin: u8, read_timeout: Duration) -> Result<Self> {
        Ok(Self {
            hx711: Hx711::new(dt_pin, sck_pin, 25)?,
            read_timeout,
            tare_counts: 0.0,
            scale_factor: 1.0,
            initialized: false,
        })
    }

    fn averaged_counts(&mut self) -> Result<f64> {
        let timeout = self.read_timeout * SETTLE_SAMPLES as u32;
        let hx = &mut self.hx711;
        average_readings(
            || {
                if hx.is_ready() {
                    Ok(Some(f64::from(hx.shift_in())))
                } else {
                    Ok(None)
                }
            },
            SETTLE_SAMPLES,
            timeout,
        )
    }
}

impl Transducer for Hx711Transducer {
    fn initialize(&mut self, stabilize: Duration) -> std::result::Result<(), BoxError> {
        let hx = &self.hx711;
        wait_until_ready(|| hx.is_ready(), self.read_timeout, Duration::from_micros(200))?;
        std::thread::sleep(stabilize);
        self.initialized = true;
        self.tare()?;
        debug!(tare_counts = self.tare_counts, "hx711 initialized");
        Ok(())
    }

    fn tare(&mut self) -> std::result::Result<(), BoxError> {
        if !self.initialized {
            return Err(Box::new(HwError::NotInitialized));
        }
        self.tare_counts = self.averaged_counts()?;
        Ok(())
    }

    fn calibrate(&mut self, known_mass_g: f32) -> std::result::Result<f32, BoxError> {
        if !(known_mass_g.is_finite() && known_mass_g > 0.0) {
            return Err(Box::new(HwError::Calibration(format!(
                "known mass must be > 0, got {known_mass_g}"
            ))));
        }
        let delta = self.averaged_counts()? - self.tare_counts;
        let factor = (delta / f64::from(known_mass_g)) as f32;
        if !(factor.is_finite() && factor.abs() > f32::EPSILON) {
            return Err(Box::new(HwError::Calibration(
                "no load change detected".into(),
            )));
        }
        self.scale_factor = factor;
        Ok(factor)
    }

    fn set_scale_factor(&mut self, factor: f32) {
        self.scale_factor = factor;
    }

    fn read_raw(&mut self) -> std::result::Result<Option<f32>, BoxError> {
        if !self.initialized {
            return Err(Box::new(HwError::NotInitialized));
        }
        if !self.hx711.is_ready() {
            return Ok(None);
        }
        let counts = f64::from(self.hx711.shift_in());
        Ok(Some(((counts - self.tare_counts) / f64::from(self.scale_factor)) as f32))
    }
}
