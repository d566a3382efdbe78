use crate::plates::Plate;
use crate::tasks::EndFlag;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// A car waiting at an LPR, or driving around inside the park once a
/// level has been assigned. Ownership moves through the queues: whoever
/// pops the descriptor owns the car.
#[derive(Debug, Copy, Clone)]
pub struct Car {
    pub plate: Plate,
    pub level: usize,
}

/// One FIFO per entrance (or per exit). The whole array shares a single
/// mutex and condition variable; pushers broadcast so that every lane
/// worker re-checks its own queue.
pub struct CarQueues {
    lanes: Mutex<Vec<VecDeque<Car>>>,
    arrived: Condvar,
}

impl CarQueues {
    pub fn new(lanes: usize) -> Self {
        Self {
            lanes: Mutex::new(vec![VecDeque::new(); lanes]),
            arrived: Condvar::new(),
        }
    }

    pub fn push(&self, lane: usize, car: Car) {
        self.lanes.lock()[lane].push_back(car);
        self.arrived.notify_all();
    }

    /// Blocks until a car is waiting in `lane` or the simulation ends.
    /// Returns None on a shutdown wakeup with nothing queued.
    pub fn wait_pop(&self, lane: usize, end: &EndFlag) -> Option<Car> {
        let mut lanes = self.lanes.lock();
        while lanes[lane].is_empty() && !end.is_raised() {
            self.arrived.wait(&mut lanes);
        }
        lanes[lane].pop_front()
    }

    /// Shutdown: throw away everything still queued and wake every lane
    /// worker so it can observe the end flag.
    pub fn drain(&self) {
        let mut lanes = self.lanes.lock();
        for lane in lanes.iter_mut() {
            lane.clear();
        }
        drop(lanes);
        self.arrived.notify_all();
    }

    pub fn queued(&self, lane: usize) -> usize {
        self.lanes.lock()[lane].len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn car(plate: &str) -> Car {
        Car {
            plate: Plate::parse(plate).unwrap(),
            level: 0,
        }
    }

    #[test]
    fn fifo_order_per_lane() {
        let queues = CarQueues::new(2);
        let end = EndFlag::new();
        queues.push(0, car("111AAA"));
        queues.push(0, car("222BBB"));
        queues.push(1, car("333CCC"));
        assert_eq!(
            queues.wait_pop(0, &end).unwrap().plate.as_str(),
            "111AAA"
        );
        assert_eq!(
            queues.wait_pop(0, &end).unwrap().plate.as_str(),
            "222BBB"
        );
        assert_eq!(queues.wait_pop(1, &end).unwrap().plate.as_str(), "333CCC");
    }

    #[test]
    fn shutdown_drain_unblocks_waiter() {
        let queues = Arc::new(CarQueues::new(1));
        let end = EndFlag::new();
        let waiter = {
            let queues = Arc::clone(&queues);
            let end = end.clone();
            std::thread::spawn(move || queues.wait_pop(0, &end))
        };
        std::thread::sleep(Duration::from_millis(20));
        end.raise();
        queues.drain();
        assert!(waiter.join().unwrap().is_none());
    }

    #[test]
    fn push_wakes_waiter() {
        let queues = Arc::new(CarQueues::new(1));
        let end = EndFlag::new();
        let waiter = {
            let queues = Arc::clone(&queues);
            let end = end.clone();
            std::thread::spawn(move || queues.wait_pop(0, &end))
        };
        std::thread::sleep(Duration::from_millis(20));
        queues.push(0, car("123XYZ"));
        assert_eq!(waiter.join().unwrap().unwrap().plate.as_str(), "123XYZ");
    }
}
