use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use stand_core::{FILTER_WINDOW, MovingAverage, Sequencer, SequencerSettings, SensorReading};
use std::time::{Duration, Instant};

fn bench_moving_average(c: &mut Criterion) {
    let mut group = c.benchmark_group("moving_average");
    for window in [10usize, FILTER_WINDOW, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(window), &window, |b, &w| {
            let mut ma = MovingAverage::new(w);
            let mut x = 0.0f32;
            b.iter(|| {
                x += 0.37;
                if x > 5000.0 {
                    x = 0.0;
                }
                black_box(ma.push(black_box(x)))
            });
        });
    }
    group.finish();
}

fn bench_sequencer_burn(c: &mut Criterion) {
    c.bench_function("sequencer_advance_burn", |b| {
        let t0 = Instant::now();
        let mut seq = Sequencer::new(
            SequencerSettings {
                countdown_length: Duration::ZERO,
                motor_load_threshold: 10.0,
                data_safe_length: Duration::from_secs(5),
            },
            t0,
        );
        seq.advance(None, t0, true, false);
        let mut now = t0;
        let mut f = 50.0f32;
        b.iter(|| {
            now += Duration::from_micros(1000);
            // Oscillate around the threshold to exercise burn/data-safe edges.
            f = if f > 10.0 { 9.0 } else { 11.0 };
            let r = SensorReading {
                raw: f,
                filtered: f,
                timestamp: now,
            };
            black_box(seq.advance(Some(&r), now, false, false))
        });
    });
}

criterion_group!(benches, bench_moving_average, bench_sequencer_burn);
criterion_main!(benches);
