//! Common time helpers for stand_core.

use std::time::{Duration, Instant};

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;
/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Duration from fractional seconds; negative or non-finite input is zero.
#[inline]
pub fn secs_to_duration(s: f32) -> Duration {
    if s.is_finite() && s > 0.0 {
        Duration::from_secs_f64(f64::from(s))
    } else {
        Duration::ZERO
    }
}

/// Signed seconds from `reference` to `now` (negative before `reference`).
#[inline]
pub fn signed_secs(now: Instant, reference: Instant) -> f32 {
    if now >= reference {
        now.duration_since(reference).as_secs_f64() as f32
    } else {
        -(reference.duration_since(now).as_secs_f64() as f32)
    }
}

/// Record rate for a log interval in milliseconds.
/// - Clamps `interval_ms` to at least 1 to avoid division by zero.
#[inline]
pub fn rate_hz(interval_ms: u64) -> f32 {
    MILLIS_PER_SEC as f32 / interval_ms.max(1) as f32
}

/// Whole microseconds in `d`, saturating at `u64::MAX`.
#[inline]
pub fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}
