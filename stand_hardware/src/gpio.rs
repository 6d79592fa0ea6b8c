//! Igniter relay, status LEDs and buzzer on plain GPIO.

use rppal::gpio::{Gpio, OutputPin};
use stand_traits::{Annunciator, BoxError, Igniter, IndicatorFrame};

use crate::error::{HwError, Result};

fn output(gpio: &Gpio, pin: u8, what: &str) -> Result<OutputPin> {
    Ok(gpio
        .get(pin)
        .map_err(|e| HwError::Gpio(format!("open {what} pin {pin}: {e}")))?
        .into_output_low())
}

pub struct GpioIgniter {
    pin: OutputPin,
}

impl GpioIgniter {
    pub fn new(pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(Self {
            pin: output(&gpio, pin, "igniter")?,
        })
    }
}

impl Igniter for GpioIgniter {
    fn set_energized(&mut self, on: bool) -> std::result::Result<(), BoxError> {
        if on {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        Ok(())
    }
}

impl Drop for GpioIgniter {
    fn drop(&mut self) {
        self.pin.set_low();
    }
}

pub struct GpioAnnunciator {
    green: OutputPin,
    red: OutputPin,
    blue: OutputPin,
    buzzer: OutputPin,
    tone_hz: Option<u16>,
}

impl GpioAnnunciator {
    pub fn new(green: u8, red: u8, blue: u8, buzzer: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(Self {
            green: output(&gpio, green, "green led")?,
            red: output(&gpio, red, "red led")?,
            blue: output(&gpio, blue, "blue led")?,
            buzzer: output(&gpio, buzzer, "buzzer")?,
            tone_hz: None,
        })
    }
}

fn drive(pin: &mut OutputPin, on: bool) {
    if on {
        pin.set_high();
    } else {
        pin.set_low();
    }
}

impl Annunciator for GpioAnnunciator {
    fn show(&mut self, frame: IndicatorFrame) -> std::result::Result<(), BoxError> {
        drive(&mut self.green, frame.green);
        drive(&mut self.red, frame.red);
        drive(&mut self.blue, frame.blue);
        if frame.tone_hz != self.tone_hz {
            match frame.tone_hz {
                Some(hz) => self
                    .buzzer
                    .set_pwm_frequency(f64::from(hz), 0.5)
                    .map_err(|e| HwError::Gpio(e.to_string()))?,
                None => {
                    self.buzzer
                        .clear_pwm()
                        .map_err(|e| HwError::Gpio(e.to_string()))?;
                    self.buzzer.set_low();
                }
            }
            self.tone_hz = frame.tone_hz;
        }
        Ok(())
    }
}
