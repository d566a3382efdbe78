use log::{debug, warn};
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

static WAIT_HANDLES: Lazy<Mutex<Option<Vec<thread::JoinHandle<()>>>>> = Lazy::new(<_>::default);

static SLOW_MOTION: OnceCell<u32> = OnceCell::new();

pub const SLEEP_STEP: Duration = Duration::from_millis(50);

/// Step used by interruptible sleeps to notice the end of the simulation.
const CANCEL_STEP: Duration = Duration::from_millis(20);

pub(crate) fn init() {
    WAIT_HANDLES.lock().replace(<_>::default());
}

/// Sets the slow-motion multiplier for all scaled sleeps of this process.
/// May be called once; later calls are ignored.
pub fn set_slow_motion(factor: u32) {
    let _ = SLOW_MOTION.set(factor.max(1));
}

#[inline]
fn slow_motion() -> u32 {
    SLOW_MOTION.get().copied().unwrap_or(1)
}

/// Milliseconds scaled by the slow-motion multiplier.
#[inline]
pub fn scaled_millis(ms: u64) -> Duration {
    Duration::from_millis(ms * u64::from(slow_motion()))
}

#[inline]
pub fn sleep(duration: Duration) {
    thread::sleep(duration);
}

/// Sleeps for `ms` milliseconds of simulated time (scaled by slow motion).
#[inline]
pub fn sleep_millis(ms: u64) {
    thread::sleep(scaled_millis(ms));
}

/// Sleeps for `ms` wall-clock milliseconds, ignoring the slow-motion
/// multiplier. Used for the status display sampling windows, which must
/// stay consistent regardless of how much the simulation is slowed down.
#[inline]
pub fn sleep_millis_raw(ms: u64) {
    thread::sleep(Duration::from_millis(ms));
}

pub fn thread_name() -> String {
    let th = thread::current();
    if let Some(name) = th.name() {
        name.to_owned()
    } else {
        format!("{:?}", th.id())
    }
}

/// Spawns a named worker thread and registers it for the shutdown join.
///
/// # Panics
///
/// The function will panic if
///
/// - the thread name is more than 14 characters
///
/// - the OS is unable to spawn the thread
pub fn spawn<F>(name: &str, f: F)
where
    F: FnOnce() + Send + 'static,
{
    if let Some(wait_handles) = WAIT_HANDLES.lock().as_mut() {
        assert!(
            name.len() < 15,
            "task name MUST be LESS than 15 characters ({})",
            name
        );
        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                debug!("worker {} running", thread_name());
                f();
                debug!("worker {} finished", thread_name());
            })
            .unwrap();
        wait_handles.push(handle);
    } else {
        warn!("can not spawn {}, tasks are not initialized", name);
    }
}

/// Joins every worker registered with [`spawn`]. Called once during
/// shutdown, after the end flag has been raised and every condition
/// variable has been woken.
pub fn join_workers() {
    if let Some(wait_handles) = WAIT_HANDLES.lock().take() {
        for handle in wait_handles {
            let _ = handle.join();
        }
    } else {
        warn!("no wait handles, is shutdown called twice?");
    }
}

/// End-of-simulation flag, shared by every worker of a process. Once
/// raised it never goes back down.
#[derive(Clone, Default)]
pub struct EndFlag(Arc<AtomicBool>);

impl EndFlag {
    pub fn new() -> Self {
        <_>::default()
    }
    #[inline]
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    #[inline]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
    /// Sleeps for the given duration unless the flag is raised first.
    /// Returns false if the sleep was cut short.
    pub fn sleep_unless_raised(&self, duration: Duration) -> bool {
        let deadline = std::time::Instant::now() + duration;
        loop {
            if self.is_raised() {
                return false;
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(CANCEL_STEP));
        }
    }
}

/// Counts detached per-car tasks so shutdown can wait for them to drain.
#[derive(Default)]
pub struct TaskTracker {
    active: Mutex<u32>,
    drained: Condvar,
}

impl TaskTracker {
    pub fn new() -> Self {
        <_>::default()
    }
    pub fn checkout(&self) {
        *self.active.lock() += 1;
    }
    pub fn checkin(&self) {
        let mut active = self.active.lock();
        *active = active.saturating_sub(1);
        if *active == 0 {
            self.drained.notify_all();
        }
    }
    pub fn active(&self) -> u32 {
        *self.active.lock()
    }
    /// Waits until every tracked task has checked in. Returns false on
    /// timeout with tasks still outstanding.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let mut active = self.active.lock();
        while *active > 0 {
            if self.drained.wait_for(&mut active, timeout).timed_out() {
                return *active == 0;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_flag_starts_lowered() {
        let end = EndFlag::new();
        assert!(!end.is_raised());
        end.raise();
        assert!(end.is_raised());
    }

    #[test]
    fn end_flag_cuts_sleep_short() {
        let end = EndFlag::new();
        end.raise();
        let t = std::time::Instant::now();
        assert!(!end.sleep_unless_raised(Duration::from_secs(5)));
        assert!(t.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn tracker_drains() {
        let tracker = TaskTracker::new();
        tracker.checkout();
        tracker.checkout();
        tracker.checkin();
        assert_eq!(tracker.active(), 1);
        tracker.checkin();
        assert!(tracker.wait_drained(Duration::from_millis(10)));
    }
}
