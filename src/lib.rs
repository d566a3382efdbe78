use log::debug;
use once_cell::sync::{Lazy, OnceCell};
use std::env;
use std::panic;
use std::sync::atomic;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub mod config;
pub mod error;
pub mod interval;
pub mod manager;
pub mod park;
pub mod plates;
pub mod safety;
pub mod sim;
pub mod tasks;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use log::{debug, error, info, trace, warn};
}

pub static NAME: OnceCell<String> = OnceCell::new();
pub static VERSION: OnceCell<String> = OnceCell::new();

static HOSTNAME: OnceCell<String> = OnceCell::new();
static STARTUP_TIME: OnceCell<Instant> = OnceCell::new();

static TERM_FLAG: Lazy<Arc<atomic::AtomicBool>> =
    Lazy::new(|| Arc::new(atomic::AtomicBool::new(false)));

pub fn sigterm_received() -> bool {
    TERM_FLAG.load(atomic::Ordering::SeqCst)
}

/// # Panics
///
/// Will panic if the process is not initialized
#[inline]
pub fn hostname() -> &'static str {
    HOSTNAME.get().unwrap()
}

/// # Panics
///
/// Will panic if the process is not initialized
#[inline]
pub fn uptime() -> Duration {
    STARTUP_TIME.get().unwrap().elapsed()
}

/// Initializes logging, the panic hook and signal handlers for one of the
/// three car park processes. Must be called once, before any worker spawns.
///
/// # Panics
///
/// Will panic if syslog is selected but can not be connected
pub fn init(name: &str) {
    panic::set_hook(Box::new(|s| {
        eprintln!("PANIC: {}", s);
        std::process::exit(1);
    }));
    HOSTNAME
        .set(hostname::get().unwrap().to_string_lossy().to_string())
        .unwrap();
    STARTUP_TIME.set(Instant::now()).unwrap();
    NAME.set(name.to_owned()).unwrap();
    VERSION.set(env!("CARGO_PKG_VERSION").to_owned()).unwrap();
    let verbose: bool = env::var("VERBOSE").ok().map_or(false, |v| v == "1");
    let syslog: bool = env::var("SYSLOG").ok().map_or(false, |v| v == "1");
    if syslog {
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_USER,
            hostname: None,
            process: name.to_owned(),
            pid: std::process::id(),
        };
        log::set_boxed_logger(Box::new(syslog::BasicLogger::new(
            syslog::unix(formatter).unwrap(),
        )))
        .unwrap();
        log::set_max_level(if verbose {
            log::LevelFilter::Trace
        } else {
            log::LevelFilter::Info
        });
    } else {
        // stdout belongs to the manager's status display
        env_logger::Builder::new()
            .target(env_logger::Target::Stderr)
            .filter_level(if verbose {
                log::LevelFilter::Trace
            } else {
                log::LevelFilter::Info
            })
            .init();
    }
    debug!("log initialization completed");
    log::info!(
        "{} {} on {}",
        name,
        VERSION.get().unwrap(),
        HOSTNAME.get().unwrap()
    );
    register_signals();
    tasks::init();
}

/// # Panics
///
/// Will panic if unable to register SIGTERM/SIGINT handler
fn register_signals() {
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&TERM_FLAG)).unwrap();
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&TERM_FLAG)).unwrap();
}

/// Blocks the main thread until the simulation duration elapses or a
/// termination signal arrives, whichever comes first.
pub fn wait_for_shutdown(duration: Duration) {
    let deadline = Instant::now() + duration;
    while !sigterm_received() {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        tasks::sleep((deadline - now).min(tasks::SLEEP_STEP));
    }
}
