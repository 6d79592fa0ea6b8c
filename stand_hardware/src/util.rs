use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Poll `is_ready` until it returns true or `timeout` expires.
/// Sleeps `poll_interval` between polls to avoid CPU spinning.
pub fn wait_until_ready(
    mut is_ready: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !is_ready() {
        if Instant::now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Mean of `n` readings pulled through `read`, skipping not-ready polls.
/// Gives up with `Timeout` once `timeout` has passed without `n` readings.
pub fn average_readings(
    mut read: impl FnMut() -> Result<Option<f64>>,
    n: usize,
    timeout: Duration,
) -> Result<f64> {
    let n = n.max(1);
    let deadline = Instant::now() + timeout;
    let mut sum = 0.0f64;
    let mut got = 0usize;
    while got < n {
        match read()? {
            Some(v) => {
                sum += v;
                got += 1;
            }
            None => {
                if Instant::now() >= deadline {
                    return Err(HwError::Timeout);
                }
                std::thread::sleep(Duration::from_micros(500));
            }
        }
    }
    Ok(sum / n as f64)
}
