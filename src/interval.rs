use crate::tasks;
use log::debug;
use std::cmp::Ordering;
use std::time::{Duration, Instant};

/// Fixed-interval loop timer. `tick` sleeps until the next scheduled
/// iteration; overruns reschedule from the current instant instead of
/// trying to catch up on missed iterations.
pub struct Loop {
    next_iter: Instant,
    interval: Duration,
}

#[negative_impl::negative_impl]
impl !Send for Loop {}

impl Loop {
    pub fn prepare(interval: Duration) -> Self {
        Loop {
            next_iter: Instant::now() + interval,
            interval,
        }
    }

    pub fn tick(&mut self) -> bool {
        let t = Instant::now();
        let result = match t.cmp(&self.next_iter) {
            Ordering::Greater => false,
            Ordering::Equal => true,
            Ordering::Less => {
                tasks::sleep(self.next_iter - t);
                true
            }
        };
        if result {
            self.next_iter += self.interval;
        } else {
            self.next_iter = Instant::now() + self.interval;
            debug!(
                "{} loop timeout ({:?} + {:?})",
                tasks::thread_name(),
                self.interval,
                self.next_iter.elapsed()
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_keeps_cadence() {
        let mut int = Loop::prepare(Duration::from_millis(5));
        let t = Instant::now();
        assert!(int.tick());
        assert!(t.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn overrun_reports_false() {
        let mut int = Loop::prepare(Duration::from_millis(1));
        tasks::sleep(Duration::from_millis(10));
        assert!(!int.tick());
        // rescheduled from now, the next tick is on time again
        assert!(int.tick());
    }
}
