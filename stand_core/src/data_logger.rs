//! Time-gated telemetry records.
//!
//! One record per cadence interval: fast during ignition and burn, slow in
//! every other live state. Entering a terminal state closes the sink and
//! nothing is written after that.

use std::time::{Duration, Instant};

use stand_traits::Storage;
use tracing::{debug, info, warn};

use crate::calibration::CalibrationSource;
use crate::error::{Result, StandError};
use crate::hw_error::map_hw_error;
use crate::sampler::SensorReading;
use crate::state::TestState;
use crate::time_keeper::Clocks;
use crate::util::rate_hz;

pub const LOG_HEADER: [&str; 10] = [
    "State",
    "OnTime_s",
    "TestTime_s",
    "RawForce_g",
    "FilteredForce_g",
    "CalibState",
    "LogIntervalMs",
    "LogRateHz",
    "LoopMicros",
    "FreeMemBytes",
];

/// Records between explicit flushes of the sink.
const FLUSH_EVERY: u64 = 100;

/// Data file for run `test_number`.
pub fn data_file_name(test_number: u32) -> String {
    format!("Data_Test{test_number}.csv")
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub state: TestState,
    pub on_time_s: f64,
    pub test_time_s: f32,
    pub raw_force: f32,
    pub filtered_force: f32,
    pub calibration_state: i8,
    pub log_interval_ms: u64,
    pub log_rate_hz: f32,
    pub loop_micros: u64,
    pub free_memory_bytes: u64,
}

impl LogRecord {
    /// Row fields in `LOG_HEADER` order.
    pub fn fields(&self) -> Vec<String> {
        vec![
            self.state.label().to_string(),
            format!("{:.3}", self.on_time_s),
            format!("{:.3}", self.test_time_s),
            format!("{:.2}", self.raw_force),
            format!("{:.2}", self.filtered_force),
            self.calibration_state.to_string(),
            self.log_interval_ms.to_string(),
            format!("{:.2}", self.log_rate_hz),
            self.loop_micros.to_string(),
            self.free_memory_bytes.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadenceCfg {
    pub fast: Duration,
    pub slow: Duration,
}

impl CadenceCfg {
    pub fn from_millis(fast_ms: u64, slow_ms: u64) -> Self {
        Self {
            fast: Duration::from_millis(fast_ms),
            slow: Duration::from_millis(slow_ms),
        }
    }

    pub fn interval_for(&self, state: TestState) -> Duration {
        if state.is_fast_logging() {
            self.fast
        } else {
            self.slow
        }
    }
}

pub struct DataLogger<S: Storage> {
    storage: S,
    cadence: CadenceCfg,
    calibration: CalibrationSource,
    memory_probe: Box<dyn Fn() -> u64>,
    last_emit: Option<Instant>,
    enabled: bool,
    records: u64,
    write_failures: u64,
}

impl<S: Storage> core::fmt::Debug for DataLogger<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DataLogger")
            .field("cadence", &self.cadence)
            .field("enabled", &self.enabled)
            .field("records", &self.records)
            .field("write_failures", &self.write_failures)
            .finish()
    }
}

impl<S: Storage> DataLogger<S> {
    /// Open the sink and write the header. Failure is a `StorageFault`.
    pub fn open(
        mut storage: S,
        cadence: CadenceCfg,
        calibration: CalibrationSource,
        memory_probe: Box<dyn Fn() -> u64>,
    ) -> Result<Self> {
        storage.open(&LOG_HEADER).map_err(|e| {
            eyre::Report::new(StandError::StorageFault(format!(
                "cannot open data file: {e}"
            )))
        })?;
        info!(
            fast_ms = cadence.fast.as_millis() as u64,
            slow_ms = cadence.slow.as_millis() as u64,
            "data log open"
        );
        Ok(Self {
            storage,
            cadence,
            calibration,
            memory_probe,
            last_emit: None,
            enabled: true,
            records: 0,
            write_failures: 0,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures
    }

    pub fn cadence(&self) -> CadenceCfg {
        self.cadence
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Emit at most one record for this tick.
    ///
    /// A terminal `state` closes the sink first. A failed write is counted
    /// and reported but still consumes the interval.
    pub fn maybe_emit(
        &mut self,
        state: TestState,
        reading: Option<&SensorReading>,
        clocks: &Clocks,
        now: Instant,
    ) -> Option<LogRecord> {
        if state.is_terminal() {
            self.close();
            return None;
        }
        if !self.enabled {
            return None;
        }
        let interval = self.cadence.interval_for(state);
        if let Some(prev) = self.last_emit
            && now.saturating_duration_since(prev) < interval
        {
            return None;
        }
        self.last_emit = Some(now);

        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        let record = LogRecord {
            state,
            on_time_s: clocks.on_time_s,
            test_time_s: clocks.test_time_s,
            raw_force: reading.map_or(0.0, |r| r.raw),
            filtered_force: reading.map_or(0.0, |r| r.filtered),
            calibration_state: self.calibration.code(),
            log_interval_ms: interval_ms,
            log_rate_hz: rate_hz(interval_ms),
            loop_micros: clocks.loop_micros,
            free_memory_bytes: (self.memory_probe)(),
        };

        match self.storage.append(&record.fields()) {
            Ok(()) => {
                self.records += 1;
                if self.records % FLUSH_EVERY == 0
                    && let Err(e) = self.storage.flush()
                {
                    warn!(error = %map_hw_error(e.as_ref()), "data log flush failed");
                }
                Some(record)
            }
            Err(e) => {
                self.write_failures += 1;
                let err = StandError::StorageWrite(map_hw_error(e.as_ref()).to_string());
                warn!(error = %err, failures = self.write_failures, "record dropped");
                None
            }
        }
    }

    /// Flush and close. Logging stays disabled afterwards.
    pub fn close(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        if let Err(e) = self.storage.flush() {
            warn!(error = %map_hw_error(e.as_ref()), "data log flush failed");
        }
        if let Err(e) = self.storage.close() {
            warn!(error = %map_hw_error(e.as_ref()), "data log close failed");
        }
        info!(
            records = self.records,
            write_failures = self.write_failures,
            "data log closed"
        );
        debug!("logging disabled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MemoryStorage;

    fn clocks() -> Clocks {
        Clocks {
            on_time_s: 1.0,
            test_time_s: -30.0,
            loop_micros: 800,
        }
    }

    fn logger(storage: MemoryStorage) -> DataLogger<MemoryStorage> {
        DataLogger::open(
            storage,
            CadenceCfg::from_millis(10, 100),
            CalibrationSource::Interactive,
            Box::new(|| 2048),
        )
        .unwrap()
    }

    #[test]
    fn header_written_on_open() {
        let mem = MemoryStorage::new();
        let _log = logger(mem.clone());
        assert_eq!(mem.header(), LOG_HEADER.to_vec());
    }

    #[test]
    fn open_failure_is_storage_fault() {
        let err = DataLogger::open(
            MemoryStorage::unavailable(),
            CadenceCfg::from_millis(10, 100),
            CalibrationSource::Uncalibrated,
            Box::new(|| 0),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StandError>(),
            Some(StandError::StorageFault(_))
        ));
    }

    #[test]
    fn record_fields_follow_header() {
        let mem = MemoryStorage::new();
        let mut log = logger(mem.clone());
        let now = Instant::now();
        let r = SensorReading {
            raw: 12.345,
            filtered: 11.5,
            timestamp: now,
        };
        let rec = log
            .maybe_emit(TestState::Burn, Some(&r), &clocks(), now)
            .unwrap();
        assert_eq!(rec.log_interval_ms, 10);
        assert_eq!(rec.log_rate_hz, 100.0);
        assert_eq!(
            mem.rows()[0],
            vec![
                "BURN", "1.000", "-30.000", "12.35", "11.50", "4", "10", "100.00", "800", "2048"
            ]
        );
    }

    #[test]
    fn cadence_switch_keeps_last_emission_time() {
        let mem = MemoryStorage::new();
        let mut log = logger(mem.clone());
        let t0 = Instant::now();
        assert!(
            log.maybe_emit(TestState::Standby, None, &clocks(), t0)
                .is_some()
        );
        // Ignition is fast: 10 ms after the standby record is already due.
        let t1 = t0 + Duration::from_millis(10);
        assert!(
            log.maybe_emit(TestState::Ignition, None, &clocks(), t1)
                .is_some()
        );
        // Back to a slow state: needs the full 100 ms since t1.
        let t2 = t1 + Duration::from_millis(99);
        assert!(
            log.maybe_emit(TestState::BurnDataSafe, None, &clocks(), t2)
                .is_none()
        );
        let t3 = t1 + Duration::from_millis(100);
        assert!(
            log.maybe_emit(TestState::BurnDataSafe, None, &clocks(), t3)
                .is_some()
        );
    }

    #[test]
    fn failed_write_consumes_interval() {
        let mem = MemoryStorage::new();
        let mut log = logger(mem.clone());
        let t0 = Instant::now();
        mem.set_fail_appends(true);
        assert!(log.maybe_emit(TestState::Burn, None, &clocks(), t0).is_none());
        assert_eq!(log.write_failures(), 1);
        mem.set_fail_appends(false);
        let t1 = t0 + Duration::from_millis(5);
        assert!(log.maybe_emit(TestState::Burn, None, &clocks(), t1).is_none());
        assert_eq!(log.write_failures(), 1);
        let t2 = t0 + Duration::from_millis(10);
        assert!(log.maybe_emit(TestState::Burn, None, &clocks(), t2).is_some());
        assert_eq!(log.records(), 1);
    }

    #[test]
    fn terminal_state_closes_for_good() {
        let mem = MemoryStorage::new();
        let mut log = logger(mem.clone());
        let t0 = Instant::now();
        assert!(log.maybe_emit(TestState::Abort, None, &clocks(), t0).is_none());
        assert!(!log.is_enabled());
        assert!(mem.is_closed());
        for ms in (0..2000).step_by(5) {
            let t = t0 + Duration::from_millis(ms);
            assert!(log.maybe_emit(TestState::Burn, None, &clocks(), t).is_none());
        }
        assert!(mem.rows().is_empty());
    }

    #[test]
    fn file_name_carries_test_number() {
        assert_eq!(data_file_name(7), "Data_Test7.csv");
    }
}
