use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use stand_hardware::error::HwError;
use stand_hardware::util::{average_readings, wait_until_ready};

#[test]
fn wait_until_ready_success_path() {
    let ready = Arc::new(AtomicBool::new(false));
    let ready_bg = ready.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(3));
        ready_bg.store(true, Ordering::Relaxed);
    });

    let res = wait_until_ready(
        || ready.load(Ordering::Relaxed),
        Duration::from_millis(200),
        Duration::from_micros(200),
    );
    assert!(res.is_ok(), "expected success, got {res:?}");
}

#[test]
fn wait_until_ready_timeout_path() {
    let err = wait_until_ready(
        || false,
        Duration::from_millis(5),
        Duration::from_micros(200),
    )
    .expect_err("expected timeout error");

    match err {
        HwError::DataReadyTimeout => {}
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn average_skips_not_ready_polls() {
    let mut seq = vec![None, Some(2.0), None, Some(4.0), Some(6.0)].into_iter();
    let avg = average_readings(
        || Ok(seq.next().flatten()),
        3,
        Duration::from_millis(100),
    )
    .expect("average");
    assert!((avg - 4.0).abs() < 1e-9);
}

#[test]
fn average_times_out_when_never_ready() {
    let err = average_readings(|| Ok(None), 4, Duration::from_millis(5))
        .expect_err("expected timeout");
    assert!(matches!(err, HwError::Timeout));
}
