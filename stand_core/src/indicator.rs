//! Lamp and buzzer patterns.
//!
//! Patterns are pure functions of the state and the time spent in it, cut
//! into 100 ms slots. The loop pushes the result to an `Annunciator`.

use std::time::Duration;

use stand_traits::{Annunciator, Clock, IndicatorFrame};
use tracing::debug;

use crate::state::TestState;

pub const SLOT_MS: u64 = 100;

const STANDBY_TONE_HZ: u16 = 750;
const COUNTDOWN_TONE_HZ: u16 = 1250;
const IGNITION_TONE_HZ: u16 = 1500;
const ABORT_TONE_HZ: u16 = 2000;
const FATAL_TONE_HZ: u16 = 100;

/// Frame for `state` after `phase_ms` in it. `buzzer` gates every tone.
pub fn frame(state: TestState, phase_ms: u64, buzzer: bool) -> IndicatorFrame {
    let tone = |on: bool, hz: u16| (buzzer && on).then_some(hz);
    match state {
        TestState::Standby => {
            let slot = (phase_ms % 3000) / SLOT_MS;
            IndicatorFrame {
                green: matches!(slot, 0 | 10 | 20),
                tone_hz: tone(slot == 0, STANDBY_TONE_HZ),
                ..IndicatorFrame::DARK
            }
        }
        TestState::Countdown | TestState::BurnDataSafe => {
            let slot = (phase_ms % 1000) / SLOT_MS;
            IndicatorFrame {
                blue: matches!(slot, 0 | 3),
                tone_hz: tone(slot == 0, COUNTDOWN_TONE_HZ),
                ..IndicatorFrame::DARK
            }
        }
        TestState::Ignition => {
            let slot = (phase_ms % 1000) / SLOT_MS;
            IndicatorFrame {
                blue: true,
                tone_hz: tone(slot <= 1, IGNITION_TONE_HZ),
                ..IndicatorFrame::DARK
            }
        }
        TestState::Burn => {
            let slot = (phase_ms % 1000) / SLOT_MS;
            IndicatorFrame {
                red: matches!(slot, 0 | 3),
                tone_hz: tone(slot <= 1, COUNTDOWN_TONE_HZ),
                ..IndicatorFrame::DARK
            }
        }
        TestState::PostBurnStandby => {
            let slot = (phase_ms % 3000) / SLOT_MS;
            IndicatorFrame {
                green: slot == 0,
                tone_hz: tone(slot == 0, STANDBY_TONE_HZ),
                ..IndicatorFrame::DARK
            }
        }
        TestState::Abort => {
            let odd = (phase_ms / SLOT_MS) % 2 == 1;
            IndicatorFrame {
                red: !odd,
                green: odd,
                tone_hz: tone(true, ABORT_TONE_HZ),
                ..IndicatorFrame::DARK
            }
        }
    }
}

/// A frame held for a fixed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cue {
    pub frame: IndicatorFrame,
    pub hold: Duration,
}

const fn cue(frame: IndicatorFrame, hold_ms: u64) -> Cue {
    Cue {
        frame,
        hold: Duration::from_millis(hold_ms),
    }
}

const fn beep(hz: u16) -> IndicatorFrame {
    IndicatorFrame {
        tone_hz: Some(hz),
        ..IndicatorFrame::DARK
    }
}

/// Power-on: long low tone, three short beeps, then each lamp in turn.
pub fn startup_sequence(buzzer: bool) -> Vec<Cue> {
    let mut cues = Vec::with_capacity(11);
    if buzzer {
        cues.push(cue(beep(STANDBY_TONE_HZ), 500));
        for _ in 0..3 {
            cues.push(cue(beep(COUNTDOWN_TONE_HZ), 50));
            cues.push(cue(IndicatorFrame::DARK, 50));
        }
    }
    let lamp = IndicatorFrame::DARK;
    cues.push(cue(IndicatorFrame { green: true, ..lamp }, 200));
    cues.push(cue(IndicatorFrame { red: true, ..lamp }, 200));
    cues.push(cue(IndicatorFrame { blue: true, ..lamp }, 200));
    cues.push(cue(IndicatorFrame::DARK, 0));
    cues
}

/// Load cell came up.
pub fn ready_chime(buzzer: bool) -> Vec<Cue> {
    if buzzer {
        vec![cue(beep(IGNITION_TONE_HZ), 50), cue(IndicatorFrame::DARK, 0)]
    } else {
        Vec::new()
    }
}

/// Startup failure: red lamp stays lit after a short low tone.
pub fn fatal_alarm(buzzer: bool) -> Vec<Cue> {
    let red = IndicatorFrame {
        red: true,
        ..IndicatorFrame::DARK
    };
    let mut cues = Vec::with_capacity(2);
    if buzzer {
        cues.push(cue(
            IndicatorFrame {
                tone_hz: Some(FATAL_TONE_HZ),
                ..red
            },
            200,
        ));
    }
    cues.push(cue(red, 0));
    cues
}

/// Show each cue for its hold time. Indicator failures never stop the stand.
pub fn play<A, C>(annunciator: &mut A, clock: &C, cues: &[Cue])
where
    A: Annunciator + ?Sized,
    C: Clock + ?Sized,
{
    for c in cues {
        if let Err(e) = annunciator.show(c.frame) {
            debug!(error = %e, "indicator update failed");
        }
        clock.sleep(c.hold);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use stand_traits::ManualClock;

    #[rstest]
    #[case(0, true, Some(750))]
    #[case(99, true, Some(750))]
    #[case(100, false, None)]
    #[case(1000, true, None)]
    #[case(2050, true, None)]
    #[case(2500, false, None)]
    #[case(3000, true, Some(750))]
    fn standby_pattern(#[case] ms: u64, #[case] green: bool, #[case] tone: Option<u16>) {
        let f = frame(TestState::Standby, ms, true);
        assert_eq!(f.green, green);
        assert_eq!(f.tone_hz, tone);
        assert!(!f.red && !f.blue);
    }

    #[rstest]
    #[case(TestState::Countdown)]
    #[case(TestState::BurnDataSafe)]
    fn countdown_blinks_blue(#[case] state: TestState) {
        assert_eq!(frame(state, 0, true).tone_hz, Some(1250));
        assert!(frame(state, 0, true).blue);
        assert!(!frame(state, 150, true).blue);
        assert!(frame(state, 320, true).blue);
        assert_eq!(frame(state, 320, true).tone_hz, None);
        assert!(frame(state, 1000, true).blue);
    }

    #[test]
    fn ignition_holds_blue_with_double_slot_tone() {
        assert_eq!(frame(TestState::Ignition, 150, true).tone_hz, Some(1500));
        assert_eq!(frame(TestState::Ignition, 250, true).tone_hz, None);
        assert!(frame(TestState::Ignition, 650, true).blue);
    }

    #[test]
    fn burn_flashes_red() {
        let f = frame(TestState::Burn, 310, true);
        assert!(f.red);
        assert_eq!(f.tone_hz, None);
        assert_eq!(frame(TestState::Burn, 120, true).tone_hz, Some(1250));
    }

    #[test]
    fn abort_alternates_with_continuous_tone() {
        let a = frame(TestState::Abort, 0, true);
        let b = frame(TestState::Abort, 100, true);
        assert!(a.red && !a.green);
        assert!(b.green && !b.red);
        assert_eq!(a.tone_hz, Some(2000));
        assert_eq!(b.tone_hz, Some(2000));
    }

    #[test]
    fn buzzer_off_silences_everything() {
        for state in TestState::ALL {
            for ms in (0..3000).step_by(50) {
                assert_eq!(frame(state, ms, false).tone_hz, None);
            }
        }
    }

    #[test]
    fn startup_takes_expected_time() {
        let total = |cues: &[Cue]| cues.iter().map(|c| c.hold).sum::<Duration>();
        assert_eq!(total(&startup_sequence(true)), Duration::from_millis(1400));
        assert_eq!(total(&startup_sequence(false)), Duration::from_millis(600));
        assert!(startup_sequence(false).iter().all(|c| c.frame.tone_hz.is_none()));
    }

    #[test]
    fn fatal_alarm_leaves_red_on() {
        let cues = fatal_alarm(true);
        assert_eq!(cues[0].frame.tone_hz, Some(100));
        let last = cues.last().unwrap().frame;
        assert!(last.red);
        assert_eq!(last.tone_hz, None);
    }

    #[test]
    fn play_advances_clock() {
        struct Count(u32);
        impl Annunciator for Count {
            fn show(&mut self, _f: IndicatorFrame) -> Result<(), stand_traits::BoxError> {
                self.0 += 1;
                Ok(())
            }
        }
        let clock = ManualClock::new();
        let start = clock.now();
        let mut a = Count(0);
        play(&mut a, &clock, &ready_chime(true));
        assert_eq!(a.0, 2);
        assert_eq!(clock.now() - start, Duration::from_millis(50));
    }
}
