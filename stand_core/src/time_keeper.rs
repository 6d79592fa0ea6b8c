//! Elapsed-time bookkeeping: time since boot, test time relative to T-0, and
//! loop duration.

use std::time::{Duration, Instant};

use crate::util::{micros, signed_secs};

/// Gaps longer than this are pauses (card writes, debugger), not loop time.
pub const LOOP_TIME_GUARD: Duration = Duration::from_millis(60);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clocks {
    pub on_time_s: f64,
    /// Negative during countdown, zero at ignition.
    pub test_time_s: f32,
    pub loop_micros: u64,
}

#[derive(Debug, Clone)]
pub struct TimeKeeper {
    boot: Instant,
    countdown_length_s: f32,
    last_tick: Option<Instant>,
    loop_micros: u64,
}

impl TimeKeeper {
    pub fn new(boot: Instant, countdown_length_s: f32) -> Self {
        Self {
            boot,
            countdown_length_s,
            last_tick: None,
            loop_micros: 0,
        }
    }

    pub fn boot(&self) -> Instant {
        self.boot
    }

    /// `countdown_deadline` is T-0. Until it is known, test time reads
    /// exactly minus the countdown length.
    pub fn tick(&mut self, now: Instant, countdown_deadline: Option<Instant>) -> Clocks {
        if let Some(prev) = self.last_tick {
            let gap = now.saturating_duration_since(prev);
            if gap < LOOP_TIME_GUARD {
                self.loop_micros = micros(gap);
            }
        }
        self.last_tick = Some(now);

        let test_time_s = match countdown_deadline {
            Some(t0) => signed_secs(now, t0),
            None => -self.countdown_length_s,
        };
        Clocks {
            on_time_s: now.saturating_duration_since(self.boot).as_secs_f64(),
            test_time_s,
            loop_micros: self.loop_micros,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(30.0)]
    #[case(0.0)]
    #[case(12.5)]
    fn test_time_before_arming_is_minus_countdown(#[case] cl: f32) {
        let boot = Instant::now();
        let mut tk = TimeKeeper::new(boot, cl);
        for ms in [0u64, 5, 900, 45_000] {
            let c = tk.tick(boot + Duration::from_millis(ms), None);
            assert_eq!(c.test_time_s, -cl);
        }
    }

    #[test]
    fn test_time_is_zero_at_deadline_and_counts_both_ways() {
        let boot = Instant::now();
        let mut tk = TimeKeeper::new(boot, 10.0);
        let t0 = boot + Duration::from_secs(20);
        assert_eq!(tk.tick(t0, Some(t0)).test_time_s, 0.0);
        let before = tk.tick(t0 - Duration::from_millis(2500), Some(t0));
        assert_eq!(before.test_time_s, -2.5);
        let after = tk.tick(t0 + Duration::from_millis(750), Some(t0));
        assert_eq!(after.test_time_s, 0.75);
    }

    #[test]
    fn on_time_counts_from_boot() {
        let boot = Instant::now();
        let mut tk = TimeKeeper::new(boot, 30.0);
        let c = tk.tick(boot + Duration::from_millis(1250), None);
        assert_eq!(c.on_time_s, 1.25);
    }

    #[test]
    fn on_time_keeps_milliseconds_after_hours_powered() {
        let boot = Instant::now();
        let mut tk = TimeKeeper::new(boot, 30.0);
        let later = boot + Duration::from_secs(5 * 3600) + Duration::from_millis(1);
        let c = tk.tick(later, None);
        assert_eq!(format!("{:.3}", c.on_time_s), "18000.001");
    }

    #[test]
    fn loop_time_ignores_long_gaps() {
        let boot = Instant::now();
        let mut tk = TimeKeeper::new(boot, 30.0);
        assert_eq!(tk.tick(boot, None).loop_micros, 0);
        let t1 = boot + Duration::from_micros(1200);
        assert_eq!(tk.tick(t1, None).loop_micros, 1200);
        let t2 = t1 + Duration::from_millis(75);
        assert_eq!(tk.tick(t2, None).loop_micros, 1200);
        let t3 = t2 + Duration::from_micros(900);
        assert_eq!(tk.tick(t3, None).loop_micros, 900);
    }
}
