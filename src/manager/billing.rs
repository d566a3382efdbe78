use crate::error::{Error, Result};
use crate::plates::Plate;
use log::warn;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

/// Billing rate: five cents per millisecond parked.
const CENTS_PER_MILLI: u64 = 5;

/// One car currently inside the park.
#[derive(Debug, Copy, Clone)]
pub struct Ticket {
    pub level: usize,
    pub entered: Instant,
}

/// Per-level occupancy counts under a single mutex with a companion
/// condition variable. The sum of all entries always equals the number of
/// live tickets.
pub struct Occupancy {
    counts: Mutex<Vec<u32>>,
    changed: Condvar,
}

/// Outcome of trying to place an arriving car on a level.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Placement {
    Full,
    Level(usize),
}

impl Occupancy {
    pub fn new(levels: usize) -> Self {
        Self {
            counts: Mutex::new(vec![0; levels]),
            changed: Condvar::new(),
        }
    }

    /// Picks the first level with spare capacity, rotating from the
    /// entrance's own index so arrivals spread across levels, and
    /// reserves the spot. `Full` when the park is at total capacity.
    pub fn place(&self, start: usize, capacity: u32, total_capacity: u32) -> Placement {
        let mut counts = self.counts.lock();
        let total: u32 = counts.iter().sum();
        if total >= total_capacity {
            return Placement::Full;
        }
        let levels = counts.len();
        for k in 0..levels {
            let i = (start + k) % levels;
            if counts[i] < capacity {
                counts[i] += 1;
                drop(counts);
                self.changed.notify_all();
                return Placement::Level(i);
            }
        }
        // per-level counts disagree with the total: clamp to FULL
        warn!("no level with spare capacity although {} < {}", total, total_capacity);
        Placement::Full
    }

    /// Frees a spot on `level`, flooring at zero.
    pub fn release(&self, level: usize) {
        let mut counts = self.counts.lock();
        match counts.get_mut(level) {
            Some(count) if *count > 0 => *count -= 1,
            Some(_) => warn!("occupancy on level {} already zero", level),
            None => warn!("level index {} out of range", level),
        }
        drop(counts);
        self.changed.notify_all();
    }

    pub fn snapshot(&self) -> Vec<u32> {
        self.counts.lock().clone()
    }

    pub fn total(&self) -> u32 {
        self.counts.lock().iter().sum()
    }

    pub fn notify_waiters(&self) {
        self.changed.notify_all();
    }
}

/// The manager's billing desk: the map of cars currently in the park, the
/// append-only ledger file, the revenue accumulator and the car counter.
pub struct BillingDesk {
    cars: Mutex<HashMap<Plate, Ticket>>,
    changed: Condvar,
    ledger: Mutex<File>,
    revenue_cents: AtomicU64,
    total_entered: AtomicU32,
}

impl BillingDesk {
    /// Opens (or creates) the ledger for appending. The ledger is never
    /// read back.
    pub fn open(path: &Path) -> Result<Self> {
        let ledger = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| Error::file(path, e))?;
        Ok(Self {
            cars: Mutex::new(HashMap::new()),
            changed: Condvar::new(),
            ledger: Mutex::new(ledger),
            revenue_cents: AtomicU64::new(0),
            total_entered: AtomicU32::new(0),
        })
    }

    pub(crate) fn cars(&self) -> MutexGuard<'_, HashMap<Plate, Ticket>> {
        self.cars.lock()
    }

    /// Inserts a ticket for an authorised car. The caller holds the map
    /// guard so the duplicate check and the insert stay atomic.
    pub(crate) fn check_in(
        &self,
        cars: &mut HashMap<Plate, Ticket>,
        plate: Plate,
        level: usize,
    ) {
        cars.insert(
            plate,
            Ticket {
                level,
                entered: Instant::now(),
            },
        );
        self.total_entered.fetch_add(1, Ordering::Relaxed);
        self.changed.notify_all();
    }

    /// Removes the ticket and frees its level spot. Both locks are taken
    /// in the canonical billing-then-occupancy order and dropped before
    /// the ledger write.
    pub fn check_out(&self, plate: &Plate, occupancy: &Occupancy) -> Option<Ticket> {
        let ticket = {
            let mut cars = self.cars.lock();
            let ticket = cars.remove(plate)?;
            occupancy.release(ticket.level);
            ticket
        };
        self.changed.notify_all();
        Some(ticket)
    }

    /// Bills a departing car: elapsed milliseconds on the monotonic clock
    /// times five cents, appended to the ledger and added to revenue.
    pub fn settle(&self, plate: &Plate, ticket: &Ticket) -> Result<u64> {
        let elapsed_ms = ticket.entered.elapsed().as_millis() as u64;
        let cents = elapsed_ms * CENTS_PER_MILLI;
        let line = bill_line(plate, cents);
        {
            let mut ledger = self.ledger.lock();
            ledger.write_all(line.as_bytes())?;
            ledger.flush()?;
        }
        self.revenue_cents.fetch_add(cents, Ordering::Relaxed);
        Ok(cents)
    }

    pub fn in_park(&self, plate: &Plate) -> bool {
        self.cars.lock().contains_key(plate)
    }

    pub fn parked(&self) -> usize {
        self.cars.lock().len()
    }

    pub fn revenue_cents(&self) -> u64 {
        self.revenue_cents.load(Ordering::Relaxed)
    }

    pub fn total_entered(&self) -> u32 {
        self.total_entered.load(Ordering::Relaxed)
    }

    pub fn notify_waiters(&self) {
        self.changed.notify_all();
    }
}

/// `PLATE $D.CC` formatting of one ledger line.
pub fn bill_line(plate: &Plate, cents: u64) -> String {
    format!("{} ${}.{:02}\n", plate, cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn plate(s: &str) -> Plate {
        Plate::parse(s).unwrap()
    }

    fn desk() -> BillingDesk {
        let path = std::env::temp_dir().join(format!(
            "carpark-billing-{}-{:p}.txt",
            std::process::id(),
            &CENTS_PER_MILLI
        ));
        BillingDesk::open(&path).unwrap()
    }

    #[test]
    fn bill_line_formats_dollars_and_cents() {
        assert_eq!(bill_line(&plate("206WHS"), 305), "206WHS $3.05\n");
        assert_eq!(bill_line(&plate("206WHS"), 5), "206WHS $0.05\n");
        assert_eq!(bill_line(&plate("206WHS"), 100), "206WHS $1.00\n");
        assert_eq!(bill_line(&plate("206WHS"), 0), "206WHS $0.00\n");
    }

    #[test]
    fn settle_charges_five_cents_per_milli() {
        let desk = desk();
        let ticket = Ticket {
            level: 0,
            entered: Instant::now() - Duration::from_millis(100),
        };
        let cents = desk.settle(&plate("111AAA"), &ticket).unwrap();
        assert!(cents >= 500);
        assert_eq!(desk.revenue_cents(), cents);
    }

    #[test]
    fn place_rotates_from_the_entrance_index() {
        let occupancy = Occupancy::new(3);
        assert_eq!(occupancy.place(1, 1, 3), Placement::Level(1));
        assert_eq!(occupancy.place(1, 1, 3), Placement::Level(2));
        assert_eq!(occupancy.place(1, 1, 3), Placement::Level(0));
        assert_eq!(occupancy.place(1, 1, 3), Placement::Full);
        assert_eq!(occupancy.snapshot(), vec![1, 1, 1]);
    }

    #[test]
    fn place_respects_total_capacity() {
        let occupancy = Occupancy::new(2);
        assert_eq!(occupancy.place(0, 5, 1), Placement::Level(0));
        assert_eq!(occupancy.place(0, 5, 1), Placement::Full);
    }

    #[test]
    fn release_floors_at_zero() {
        let occupancy = Occupancy::new(2);
        assert_eq!(occupancy.place(0, 1, 2), Placement::Level(0));
        occupancy.release(0);
        occupancy.release(0);
        occupancy.release(7);
        assert_eq!(occupancy.total(), 0);
    }

    #[test]
    fn check_out_frees_the_spot() {
        let desk = desk();
        let occupancy = Occupancy::new(2);
        assert_eq!(occupancy.place(0, 1, 2), Placement::Level(0));
        desk.check_in(&mut desk.cars(), plate("222BBB"), 0);
        assert!(desk.in_park(&plate("222BBB")));
        assert_eq!(desk.total_entered(), 1);

        let ticket = desk.check_out(&plate("222BBB"), &occupancy).unwrap();
        assert_eq!(ticket.level, 0);
        assert!(!desk.in_park(&plate("222BBB")));
        assert_eq!(occupancy.total(), 0);
        assert!(desk.check_out(&plate("222BBB"), &occupancy).is_none());
    }
}
