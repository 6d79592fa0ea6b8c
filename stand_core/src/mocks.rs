//! Test and helper doubles for stand_core.
//!
//! Clones share state, so a test can keep a handle after moving the double
//! into a `StandCore`.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use stand_traits::{Annunciator, BoxError, IndicatorFrame, Igniter, Storage, Transducer};

/// Annunciator that drops every frame. Default when none is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAnnunciator;

impl Annunciator for NullAnnunciator {
    fn show(&mut self, _frame: IndicatorFrame) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Transducer fed from a script, or from a settable level once the script
/// runs out.
#[derive(Debug, Clone)]
pub struct ScriptedTransducer {
    script: Rc<RefCell<VecDeque<Option<f32>>>>,
    level: Rc<Cell<Option<f32>>>,
    fail_reads: bool,
    fail_init: bool,
    scale_factor: f32,
}

impl ScriptedTransducer {
    /// Always ready with `v`.
    pub fn steady(v: f32) -> Self {
        Self {
            script: Rc::default(),
            level: Rc::new(Cell::new(Some(v))),
            fail_reads: false,
            fail_init: false,
            scale_factor: 1.0,
        }
    }

    /// Play `script` in order, then report not-ready.
    pub fn from_script(script: impl IntoIterator<Item = Option<f32>>) -> Self {
        Self {
            script: Rc::new(RefCell::new(script.into_iter().collect())),
            level: Rc::new(Cell::new(None)),
            fail_reads: false,
            fail_init: false,
            scale_factor: 1.0,
        }
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Change what the cell reports after the script.
    pub fn set_level(&self, v: f32) {
        self.level.set(Some(v));
    }

    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }
}

impl Transducer for ScriptedTransducer {
    fn initialize(&mut self, _stabilize: Duration) -> Result<(), BoxError> {
        if self.fail_init {
            return Err(Box::new(std::io::Error::other("data-ready timeout")));
        }
        Ok(())
    }

    fn tare(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn calibrate(&mut self, known_mass_g: f32) -> Result<f32, BoxError> {
        if !(known_mass_g.is_finite() && known_mass_g > 0.0) {
            return Err(Box::new(std::io::Error::other("known mass must be > 0")));
        }
        self.scale_factor = 420.0;
        Ok(self.scale_factor)
    }

    fn set_scale_factor(&mut self, factor: f32) {
        self.scale_factor = factor;
    }

    fn read_raw(&mut self) -> Result<Option<f32>, BoxError> {
        if self.fail_reads {
            return Err(Box::new(std::io::Error::other("bus glitch")));
        }
        if let Some(v) = self.script.borrow_mut().pop_front() {
            return Ok(v);
        }
        Ok(self.level.get())
    }
}

/// Igniter that records every command it receives.
#[derive(Debug, Default, Clone)]
pub struct RecordingIgniter {
    calls: Rc<RefCell<Vec<bool>>>,
    fail: bool,
}

impl RecordingIgniter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> Vec<bool> {
        self.calls.borrow().clone()
    }

    /// Off→on transitions, counting from an initial off.
    pub fn rising_edges(&self) -> usize {
        let calls = self.calls.borrow();
        let mut prev = false;
        let mut n = 0;
        for &on in calls.iter() {
            if on && !prev {
                n += 1;
            }
            prev = on;
        }
        n
    }

    pub fn is_energized(&self) -> bool {
        self.calls.borrow().last().copied().unwrap_or(false)
    }
}

impl Igniter for RecordingIgniter {
    fn set_energized(&mut self, on: bool) -> Result<(), BoxError> {
        if self.fail && on {
            return Err(Box::new(std::io::Error::other("igniter channel open")));
        }
        self.calls.borrow_mut().push(on);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    open: bool,
    closed: bool,
    flushes: u32,
    fail_open: bool,
    fail_appends: bool,
}

/// In-memory sink.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    inner: Rc<RefCell<MemoryState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `open` fails, like a missing card.
    pub fn unavailable() -> Self {
        let s = Self::default();
        s.inner.borrow_mut().fail_open = true;
        s
    }

    /// Toggle append failures mid-run.
    pub fn set_fail_appends(&self, fail: bool) {
        self.inner.borrow_mut().fail_appends = fail;
    }

    pub fn header(&self) -> Vec<String> {
        self.inner.borrow().header.clone()
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.inner.borrow().rows.clone()
    }

    pub fn is_open(&self) -> bool {
        self.inner.borrow().open
    }

    pub fn is_closed(&self) -> bool {
        self.inner.borrow().closed
    }

    pub fn flushes(&self) -> u32 {
        self.inner.borrow().flushes
    }
}

impl Storage for MemoryStorage {
    fn open(&mut self, header: &[&str]) -> Result<(), BoxError> {
        let mut s = self.inner.borrow_mut();
        if s.fail_open {
            return Err(Box::new(std::io::Error::other("no card detected")));
        }
        s.header = header.iter().map(ToString::to_string).collect();
        s.open = true;
        Ok(())
    }

    fn append(&mut self, fields: &[String]) -> Result<(), BoxError> {
        let mut s = self.inner.borrow_mut();
        if !s.open || s.fail_appends {
            return Err(Box::new(std::io::Error::other("card write failed")));
        }
        s.rows.push(fields.to_vec());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BoxError> {
        self.inner.borrow_mut().flushes += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), BoxError> {
        let mut s = self.inner.borrow_mut();
        s.open = false;
        s.closed = true;
        Ok(())
    }
}
