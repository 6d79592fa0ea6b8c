use std::sync::Arc;
use std::time::Duration;

use stand_config::Settings;
use stand_core::mocks::{MemoryStorage, RecordingIgniter, ScriptedTransducer};
use stand_core::{
    Calibration, Command, RunOptions, Signals, Stand, StandError, StandStatus, TestState,
    command_channel, run,
};
use stand_traits::{Clock, ManualClock};

fn settings(countdown_s: f32) -> Settings {
    Settings {
        countdown_length_s: countdown_s,
        motor_load_threshold: 10.0,
        data_log_interval_fast_ms: 10,
        data_log_interval_slow_ms: 100,
        buzzer_enabled: false,
        data_safe_length_s: 0.5,
        test_sequence_number: 1,
        calibration_value: None,
    }
}

struct Rig {
    stand: Stand,
    clock: ManualClock,
    cell: ScriptedTransducer,
    igniter: RecordingIgniter,
    storage: MemoryStorage,
}

fn rig(countdown_s: f32, force: f32) -> Rig {
    let clock = ManualClock::new();
    let cell = ScriptedTransducer::steady(force);
    let igniter = RecordingIgniter::new();
    let storage = MemoryStorage::new();
    let stand = Stand::builder()
        .with_transducer(cell.clone())
        .with_igniter(igniter.clone())
        .with_storage(storage.clone())
        .with_settings(settings(countdown_s))
        .with_clock(Arc::new(clock.clone()))
        .with_memory_probe(|| 4096)
        .build()
        .expect("build stand");
    Rig {
        stand,
        clock,
        cell,
        igniter,
        storage,
    }
}

/// Step once per millisecond for `ms` milliseconds.
fn run_for(r: &mut Rig, ms: u64, mut signals: Signals) -> StandStatus {
    let mut last = StandStatus::Running(r.stand.state());
    for _ in 0..ms {
        last = r.stand.step(signals).expect("step");
        signals = Signals::NONE;
        r.clock.advance(Duration::from_millis(1));
    }
    last
}

fn rows_in(storage: &MemoryStorage, label: &str) -> usize {
    storage.rows().iter().filter(|row| row[0] == label).count()
}

#[test]
fn standby_logs_at_slow_cadence_with_negative_test_time() {
    let mut r = rig(30.0, 0.0);
    run_for(&mut r, 1000, Signals::NONE);
    assert_eq!(rows_in(&r.storage, "STANDBY"), 10);
    for row in r.storage.rows() {
        assert_eq!(row[2], "-30.000");
        assert_eq!(row[5], "0");
        assert_eq!(row[9], "4096");
    }
}

#[test]
fn burn_logs_at_fast_cadence() {
    let mut r = rig(0.0, 50.0);
    // Arm; zero countdown reaches ignition next tick, thrust is already up.
    run_for(&mut r, 3, Signals::arm());
    assert_eq!(r.stand.state(), TestState::Burn);
    let before = rows_in(&r.storage, "BURN");
    run_for(&mut r, 1000, Signals::NONE);
    let burn_rows = rows_in(&r.storage, "BURN") - before;
    assert!((99..=101).contains(&burn_rows), "{burn_rows}");
}

#[test]
fn complete_sequence_reaches_post_burn_standby() {
    let mut r = rig(0.2, 0.0);
    run_for(&mut r, 10, Signals::arm());
    assert_eq!(r.stand.state(), TestState::Countdown);
    run_for(&mut r, 200, Signals::NONE);
    assert_eq!(r.stand.state(), TestState::Ignition);

    r.cell.set_level(400.0);
    run_for(&mut r, 100, Signals::NONE);
    assert_eq!(r.stand.state(), TestState::Burn);

    r.cell.set_level(0.0);
    // The moving average needs the whole window to fall below threshold.
    run_for(&mut r, 1000, Signals::NONE);
    assert_eq!(r.stand.state(), TestState::BurnDataSafe);
    let status = run_for(&mut r, 600, Signals::NONE);
    assert_eq!(status, StandStatus::Complete);
    assert!(r.storage.is_closed());
    assert_eq!(r.igniter.rising_edges(), 1);
    assert!(!r.igniter.is_energized());
}

#[test]
fn igniter_goes_high_for_exactly_one_tick() {
    let mut r = rig(0.05, 0.0);
    run_for(&mut r, 500, Signals::arm());
    let calls = r.igniter.calls();
    let highs: Vec<_> = calls.iter().enumerate().filter(|(_, on)| **on).collect();
    assert_eq!(highs.len(), 1);
    let fired_at = highs[0].0;
    assert!(calls[fired_at + 1..].iter().all(|on| !on));
    assert_eq!(r.stand.igniter_pulses(), 1);
}

#[test]
fn abort_closes_log_and_nothing_follows() {
    let mut r = rig(5.0, 0.0);
    run_for(&mut r, 50, Signals::arm());
    assert_eq!(r.stand.state(), TestState::Countdown);
    let status = run_for(&mut r, 1, Signals::abort());
    assert_eq!(status, StandStatus::Aborted);
    assert!(r.storage.is_closed());
    let rows = r.storage.rows().len();
    run_for(&mut r, 10_000, Signals::arm());
    assert_eq!(r.storage.rows().len(), rows);
    assert_eq!(r.stand.state(), TestState::Abort);
    assert_eq!(r.igniter.rising_edges(), 0);
}

#[test]
fn write_failures_are_counted_and_run_continues() {
    let mut r = rig(30.0, 0.0);
    r.storage.set_fail_appends(true);
    run_for(&mut r, 500, Signals::NONE);
    r.storage.set_fail_appends(false);
    run_for(&mut r, 500, Signals::NONE);
    assert_eq!(r.stand.logger().write_failures(), 5);
    assert_eq!(r.stand.logger().records(), 5);
    assert_eq!(r.stand.state(), TestState::Standby);
}

#[test]
fn runner_stops_on_operator_abort() {
    let mut r = rig(30.0, 0.0);
    let (tx, inbox) = command_channel();
    tx.send(Command::Arm);
    tx.send(Command::Abort);
    let summary = run(&mut r.stand, &inbox, RunOptions::default()).unwrap();
    assert_eq!(summary.final_state, TestState::Abort);
    assert!(!summary.completed());
    assert_eq!(summary.ticks, 1);
}

#[test]
fn runner_aborts_at_tick_limit() {
    let mut r = rig(30.0, 0.0);
    let start = r.clock.now();
    let (_tx, inbox) = command_channel();
    let opts = RunOptions {
        tick: Duration::from_millis(1),
        max_ticks: Some(250),
    };
    let summary = run(&mut r.stand, &inbox, opts).unwrap();
    assert_eq!(summary.final_state, TestState::Abort);
    assert_eq!(summary.ticks, 251);
    assert_eq!(summary.records_written, 3);
    assert!(r.storage.is_closed());
    // Virtual time moved with the loop: one tick of sleep per live step.
    assert_eq!(r.clock.now() - start, Duration::from_millis(250));
}

#[test]
fn igniter_failure_is_fatal_and_safes_the_stand() {
    let clock = ManualClock::new();
    let storage = MemoryStorage::new();
    let mut stand = Stand::builder()
        .with_transducer(ScriptedTransducer::steady(0.0))
        .with_igniter(RecordingIgniter::new().failing())
        .with_storage(storage.clone())
        .with_settings(settings(0.0))
        .with_clock(Arc::new(clock.clone()))
        .build()
        .unwrap();
    let (tx, inbox) = command_channel();
    tx.send(Command::Arm);
    let err = run(&mut stand, &inbox, RunOptions::default()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StandError>(),
        Some(StandError::HardwareFault(_))
    ));
    assert!(storage.is_closed());
}

#[test]
fn read_errors_do_not_stop_the_loop() {
    let clock = ManualClock::new();
    let mut stand = Stand::builder()
        .with_transducer(ScriptedTransducer::steady(0.0).failing_reads())
        .with_igniter(RecordingIgniter::new())
        .with_storage(MemoryStorage::new())
        .with_settings(settings(30.0))
        .with_clock(Arc::new(clock.clone()))
        .build()
        .unwrap();
    for _ in 0..100 {
        stand.step(Signals::NONE).unwrap();
        clock.advance(Duration::from_millis(1));
    }
    assert_eq!(stand.sampler().read_errors(), 5);
    assert!(stand.latest_reading().is_none());
    assert_eq!(stand.logger().records(), 1);
}

#[test]
fn config_calibration_is_logged() {
    let storage = MemoryStorage::new();
    let mut stand = Stand::builder()
        .with_transducer(ScriptedTransducer::steady(0.0))
        .with_igniter(RecordingIgniter::new())
        .with_storage(storage.clone())
        .with_calibration(Calibration::from_config(421.0).unwrap())
        .with_clock(Arc::new(ManualClock::new()))
        .build()
        .unwrap();
    stand.step(Signals::NONE).unwrap();
    assert_eq!(storage.rows()[0][5], "-1");
}
