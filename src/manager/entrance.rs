use super::billing::{BillingDesk, Occupancy, Placement};
use super::ManagerCtx;
use crate::park::{GateStatus, SignDisplay};
use crate::plates::{Plate, Whitelist};
use crate::tasks;
use log::debug;
use std::sync::Arc;

/// Verdict for a car standing at an entrance LPR.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(super) enum Decision {
    Refused,
    Full,
    Admitted(usize),
}

/// Applies the decision table: whitelist membership, in-park duplicate,
/// then level placement. On admission the occupancy spot and the billing
/// ticket are created together, under the billing map guard, so the two
/// structures never disagree.
pub(super) fn authorise(
    whitelist: &Whitelist,
    billing: &BillingDesk,
    occupancy: &Occupancy,
    plate: Plate,
    entrance_id: usize,
    capacity: u32,
    total_capacity: u32,
) -> Decision {
    if !whitelist.contains(&plate) {
        return Decision::Refused;
    }
    let mut cars = billing.cars();
    if cars.contains_key(&plate) {
        // still inside the park
        return Decision::Refused;
    }
    match occupancy.place(entrance_id, capacity, total_capacity) {
        Placement::Full => Decision::Full,
        Placement::Level(level) => {
            billing.check_in(&mut cars, plate, level);
            Decision::Admitted(level)
        }
    }
}

/// Entrance manager worker, one per entrance: waits for plates, decides,
/// answers on the sign and starts raising the gate for admitted cars.
pub(super) fn run(ctx: &Arc<ManagerCtx>, id: usize) {
    let en = ctx.region.entrance(id);

    while !ctx.end.is_raised() {
        let mut lpr = en.lpr.lock();
        while lpr.plate().is_none() && !ctx.end.is_raised() {
            lpr.wait();
        }
        if ctx.end.is_raised() {
            break;
        }
        let Some(plate) = lpr.plate() else {
            continue;
        };

        // during an evacuation the fire monitor owns the sign; cars are
        // neither authorised nor billed
        if ctx.region.alarm_active() {
            lpr.clear();
            drop(lpr);
            en.lpr.notify();
            continue;
        }

        let decision = authorise(
            &ctx.whitelist,
            &ctx.billing,
            &ctx.occupancy,
            plate,
            id,
            ctx.config.capacity,
            ctx.config.total_capacity(),
        );
        debug!("entrance {}: {} -> {:?}", id, plate, decision);

        {
            let mut sign = en.sign.lock();
            match decision {
                Decision::Refused => sign.set(SignDisplay::Refused),
                Decision::Full => sign.set(SignDisplay::Full),
                Decision::Admitted(level) => {
                    sign.set(SignDisplay::Level(level as u8));
                    {
                        let mut gate = en.gate.lock();
                        if gate.status() == GateStatus::Closed {
                            gate.set(GateStatus::Raising);
                        }
                    }
                    en.gate.notify();
                }
            }
        }
        en.sign.notify();

        // unscaled window so the status display can sample the plate
        tasks::sleep_millis_raw(8);
        lpr.clear();
        drop(lpr);
        en.lpr.notify();
        ctx.billing.notify_waiters();
        ctx.occupancy.notify_waiters();

        // the fire may have started while the sign was being served; the
        // car was waved away by the EVACUATE letters, hand its spot back
        if let Decision::Admitted(_) = decision {
            if ctx.region.alarm_active() {
                ctx.billing.check_out(&plate, &ctx.occupancy);
                debug!("entrance {}: {} rolled back, alarm active", id, plate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn plate(s: &str) -> Plate {
        Plate::parse(s).unwrap()
    }

    fn desk() -> BillingDesk {
        let path = PathBuf::from(std::env::temp_dir()).join(format!(
            "carpark-entrance-test-{}.txt",
            std::process::id()
        ));
        BillingDesk::open(&path).unwrap()
    }

    #[test]
    fn unknown_plate_is_refused() {
        let whitelist = Whitelist::from_plates([plate("206WHS")]);
        let billing = desk();
        let occupancy = Occupancy::new(1);
        assert_eq!(
            authorise(&whitelist, &billing, &occupancy, plate("123ABC"), 0, 5, 5),
            Decision::Refused
        );
        assert_eq!(occupancy.total(), 0);
        assert_eq!(billing.parked(), 0);
    }

    #[test]
    fn authorised_plate_gets_a_level_and_a_ticket() {
        let whitelist = Whitelist::from_plates([plate("206WHS")]);
        let billing = desk();
        let occupancy = Occupancy::new(1);
        assert_eq!(
            authorise(&whitelist, &billing, &occupancy, plate("206WHS"), 0, 5, 5),
            Decision::Admitted(0)
        );
        assert!(billing.in_park(&plate("206WHS")));
        assert_eq!(occupancy.total(), 1);
        assert_eq!(billing.total_entered(), 1);
    }

    #[test]
    fn duplicate_in_park_is_refused() {
        let whitelist = Whitelist::from_plates([plate("206WHS")]);
        let billing = desk();
        let occupancy = Occupancy::new(1);
        assert_eq!(
            authorise(&whitelist, &billing, &occupancy, plate("206WHS"), 0, 5, 5),
            Decision::Admitted(0)
        );
        assert_eq!(
            authorise(&whitelist, &billing, &occupancy, plate("206WHS"), 0, 5, 5),
            Decision::Refused
        );
        // once the first car departs the plate may return
        billing.check_out(&plate("206WHS"), &occupancy);
        assert_eq!(
            authorise(&whitelist, &billing, &occupancy, plate("206WHS"), 0, 5, 5),
            Decision::Admitted(0)
        );
    }

    #[test]
    fn full_park_shows_f() {
        let plates = [
            plate("111AAA"),
            plate("222BBB"),
            plate("333CCC"),
        ];
        let whitelist = Whitelist::from_plates(plates);
        let billing = desk();
        let occupancy = Occupancy::new(2);
        assert_eq!(
            authorise(&whitelist, &billing, &occupancy, plates[0], 0, 1, 2),
            Decision::Admitted(0)
        );
        assert_eq!(
            authorise(&whitelist, &billing, &occupancy, plates[1], 0, 1, 2),
            Decision::Admitted(1)
        );
        assert_eq!(
            authorise(&whitelist, &billing, &occupancy, plates[2], 0, 1, 2),
            Decision::Full
        );
        assert_eq!(billing.parked(), 2);
    }

    #[test]
    fn placement_starts_at_the_entrance_index() {
        let whitelist = Whitelist::from_plates([plate("111AAA")]);
        let billing = desk();
        let occupancy = Occupancy::new(3);
        assert_eq!(
            authorise(&whitelist, &billing, &occupancy, plate("111AAA"), 2, 1, 3),
            Decision::Admitted(2)
        );
    }
}
