//! Maps `Box<dyn Error>` from trait boundaries to typed `StandError`.
//!
//! The traits in `stand_traits` use `Box<dyn Error + Send + Sync>`; this module
//! converts those to our typed error enum, with an optional feature-gated path
//! for `stand_hardware::HwError` downcasting.

use crate::error::StandError;

/// Map a trait-boundary error to a typed `StandError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> StandError {
    #[cfg(feature = "hardware-errors")]
    {
        use stand_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout | HwError::DataReadyTimeout => StandError::Timeout,
                HwError::StorageNotOpen | HwError::Csv(_) | HwError::Io(_) => {
                    StandError::StorageWrite(hw.to_string())
                }
                HwError::Calibration(msg) => StandError::Config(msg.clone()),
                other => StandError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        StandError::Timeout
    } else {
        StandError::Hardware(s)
    }
}

/// Startup variant: anything the transducer reports while powering up is a
/// hardware fault, timeouts included.
pub fn map_startup_error(e: &(dyn std::error::Error + 'static)) -> StandError {
    match map_hw_error(e) {
        StandError::Timeout => {
            StandError::HardwareFault(format!("load cell did not respond ({e})"))
        }
        StandError::Hardware(s) => StandError::HardwareFault(s),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_timeout_text_maps_to_timeout() {
        let e = std::io::Error::other("read timeout on channel A");
        assert_eq!(map_hw_error(&e), StandError::Timeout);
    }

    #[test]
    fn other_text_maps_to_hardware() {
        let e = std::io::Error::other("bus glitch");
        assert_eq!(map_hw_error(&e), StandError::Hardware("bus glitch".into()));
    }

    #[test]
    fn startup_timeout_is_a_fault() {
        let e = std::io::Error::other("timeout");
        assert!(matches!(
            map_startup_error(&e),
            StandError::HardwareFault(_)
        ));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn typed_hw_errors_downcast() {
        use stand_hardware::error::HwError;
        assert_eq!(map_hw_error(&HwError::DataReadyTimeout), StandError::Timeout);
        assert!(matches!(
            map_hw_error(&HwError::StorageNotOpen),
            StandError::StorageWrite(_)
        ));
        assert!(matches!(
            map_hw_error(&HwError::Gpio("pin 4 busy".into())),
            StandError::HardwareFault(_)
        ));
    }
}
