//! The fire monitor process: watches every level's temperature stream,
//! detects fires with the rise and spike algorithms, and on alarm forces
//! every gate open while flashing EVACUATE on the entrance signs.

mod detect;
mod evac;
mod gates;

pub use detect::{Detector, Trigger, RAW_WINDOW, SMOOTHED_WINDOW};

use crate::config::Config;
use crate::error::Result;
use crate::park::{Counts, SharedRegion};
use crate::tasks::{self, EndFlag};
use log::info;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The process-local alarm latch the detector threads raise and the gate
/// and sign workers wait on. Sticky for the rest of the run.
#[derive(Default)]
pub struct AlarmSignal {
    active: AtomicBool,
    gate: Mutex<()>,
    changed: Condvar,
}

impl AlarmSignal {
    pub fn new() -> Self {
        <_>::default()
    }

    pub fn raise(&self) {
        self.active.store(true, Ordering::SeqCst);
        drop(self.gate.lock());
        self.changed.notify_all();
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Blocks until the alarm is active or the simulation ends; returns
    /// whether the alarm is active.
    pub fn wait_active(&self, end: &EndFlag) -> bool {
        let mut guard = self.gate.lock();
        while !self.is_active() && !end.is_raised() {
            self.changed.wait(&mut guard);
        }
        self.is_active()
    }

    pub fn notify_waiters(&self) {
        drop(self.gate.lock());
        self.changed.notify_all();
    }
}

/// Everything the fire monitor's workers share.
pub(crate) struct SafetyCtx {
    pub(crate) region: SharedRegion,
    pub(crate) end: EndFlag,
    pub(crate) alarm: AlarmSignal,
}

pub fn run(config: Config) -> Result<()> {
    let counts = Counts::from_config(&config);
    let region = SharedRegion::open(&config.shm_name, counts)?;
    let ctx = Arc::new(SafetyCtx {
        region,
        end: EndFlag::new(),
        alarm: AlarmSignal::new(),
    });

    for i in 0..counts.levels {
        let ctx = Arc::clone(&ctx);
        tasks::spawn(&format!("fdet{}", i), move || detect::run(&ctx, i));
    }
    {
        let ctx = Arc::clone(&ctx);
        tasks::spawn("fgate", move || gates::run(&ctx));
    }
    {
        let ctx = Arc::clone(&ctx);
        tasks::spawn("fevac", move || evac::run(&ctx));
    }

    crate::wait_for_shutdown(config.duration);
    info!("simulation over, stopping workers");

    ctx.end.raise();
    ctx.alarm.notify_waiters();
    ctx.region.broadcast_all();
    tasks::join_workers();
    info!("fire monitor stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn alarm_signal_is_sticky() {
        let alarm = AlarmSignal::new();
        assert!(!alarm.is_active());
        alarm.raise();
        assert!(alarm.is_active());
        alarm.raise();
        assert!(alarm.is_active());
    }

    #[test]
    fn wait_active_wakes_on_raise() {
        let alarm = Arc::new(AlarmSignal::new());
        let end = EndFlag::new();
        let waiter = {
            let alarm = Arc::clone(&alarm);
            let end = end.clone();
            std::thread::spawn(move || alarm.wait_active(&end))
        };
        std::thread::sleep(Duration::from_millis(20));
        alarm.raise();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn wait_active_wakes_on_shutdown() {
        let alarm = Arc::new(AlarmSignal::new());
        let end = EndFlag::new();
        let waiter = {
            let alarm = Arc::clone(&alarm);
            let end = end.clone();
            std::thread::spawn(move || alarm.wait_active(&end))
        };
        std::thread::sleep(Duration::from_millis(20));
        end.raise();
        alarm.notify_waiters();
        assert!(!waiter.join().unwrap());
    }
}
