//! Hardware assembly: the simulated rig by default, real pins behind the
//! `hardware` feature.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use eyre::Result;
use stand_config::RigConfig;
use stand_traits::{
    Annunciator, BoxError, Clock, Igniter, IndicatorFrame, ManualClock, MonotonicClock, Transducer,
};

/// Places (`Some(g)`) or removes (`None`) the calibration mass.
pub type BenchLoad = Box<dyn FnMut(Option<f32>) -> Result<()>>;

pub struct Rig {
    pub transducer: Box<dyn Transducer>,
    pub igniter: Box<dyn Igniter>,
    pub annunciator: Box<dyn Annunciator>,
    pub clock: Arc<dyn Clock + Send + Sync>,
    pub bench: BenchLoad,
}

/// Lamps and buzzer handed to the stand while the startup path keeps a
/// handle, so a failed build can still sound the alarm.
#[derive(Clone)]
pub struct SharedAnnunciator(Rc<RefCell<Box<dyn Annunciator>>>);

impl SharedAnnunciator {
    pub fn new(inner: Box<dyn Annunciator>) -> Self {
        Self(Rc::new(RefCell::new(inner)))
    }
}

impl Annunciator for SharedAnnunciator {
    fn show(&mut self, frame: IndicatorFrame) -> Result<(), BoxError> {
        self.0.borrow_mut().show(frame)
    }
}

pub fn select_clock(virtual_time: bool) -> Arc<dyn Clock + Send + Sync> {
    if virtual_time {
        tracing::info!("virtual time: the loop advances a manual clock");
        Arc::new(ManualClock::new())
    } else {
        Arc::new(MonotonicClock::new())
    }
}

#[cfg(not(feature = "hardware"))]
pub fn build_rig(_cfg: &RigConfig, virtual_time: bool) -> Result<Rig> {
    use stand_hardware::{LogAnnunciator, ThrustProfile, simulated_rig};

    let clock = select_clock(virtual_time);
    let (mut transducer, igniter, handles) = simulated_rig(clock.clone(), ThrustProfile::default());
    if std::env::var_os(crate::cli::SIM_FAULT_ENV).is_some() {
        tracing::warn!("simulated load cell will not respond");
        transducer = transducer.unresponsive();
    }
    let load = handles.bench_load_g.clone();
    let bench: BenchLoad = Box::new(move |mass| {
        load.set(mass.unwrap_or(0.0));
        Ok(())
    });
    tracing::info!("using simulated rig");
    Ok(Rig {
        transducer: Box::new(transducer),
        igniter: Box::new(igniter),
        annunciator: Box::new(LogAnnunciator::new()),
        clock,
        bench,
    })
}

#[cfg(feature = "hardware")]
pub fn build_rig(cfg: &RigConfig, virtual_time: bool) -> Result<Rig> {
    use stand_core::error::StandError;
    use stand_hardware::{GpioAnnunciator, GpioIgniter, Hx711Transducer};
    use std::time::Duration;

    if virtual_time {
        tracing::warn!("--virtual-time is ignored on real hardware");
    }
    let fault = |e: stand_hardware::error::HwError| eyre::Report::new(StandError::HardwareFault(e.to_string()));
    let pins = cfg.pins;
    let transducer = Hx711Transducer::new(
        pins.hx711_dt,
        pins.hx711_sck,
        Duration::from_millis(cfg.sampling.read_timeout_ms),
    )
    .map_err(fault)?;
    let igniter = GpioIgniter::new(pins.igniter).map_err(fault)?;
    let annunciator =
        GpioAnnunciator::new(pins.led_green, pins.led_red, pins.led_blue, pins.buzzer)
            .map_err(fault)?;
    tracing::info!(dt = pins.hx711_dt, sck = pins.hx711_sck, igniter = pins.igniter, "using GPIO rig");
    Ok(Rig {
        transducer: Box::new(transducer),
        igniter: Box::new(igniter),
        annunciator: Box::new(annunciator),
        clock: select_clock(false),
        bench: Box::new(prompt_operator),
    })
}

/// Ask the operator to load or unload the cell and wait for Enter.
#[cfg(feature = "hardware")]
fn prompt_operator(mass: Option<f32>) -> Result<()> {
    use std::io::BufRead;

    match mass {
        Some(g) => eprintln!("Place {g} g on the load cell, then press Enter."),
        None => eprintln!("Remove the calibration mass, then press Enter."),
    }
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(())
}

/// Free RAM in bytes for the data log; 0 where the OS gives no answer.
#[cfg(target_os = "linux")]
pub fn free_memory_bytes() -> u64 {
    let mut info = std::mem::MaybeUninit::<libc::sysinfo>::uninit();
    // SAFETY: sysinfo fills the struct on success and we only read it then.
    let rc = unsafe { libc::sysinfo(info.as_mut_ptr()) };
    if rc != 0 {
        return 0;
    }
    let info = unsafe { info.assume_init() };
    (info.freeram as u64).saturating_mul(u64::from(info.mem_unit))
}

#[cfg(not(target_os = "linux"))]
pub fn free_memory_bytes() -> u64 {
    0
}
