use super::ManagerCtx;
use crate::park::GateStatus;
use log::{debug, warn};
use std::sync::Arc;

/// Exit manager worker, one per exit: bills departing cars and raises the
/// gate. Exits do no whitelist check; a plate without a ticket still gets
/// the gate raised so the lane cannot jam.
pub(super) fn run(ctx: &Arc<ManagerCtx>, id: usize) {
    let ex = ctx.region.exit(id);

    while !ctx.end.is_raised() {
        let mut lpr = ex.lpr.lock();
        while lpr.plate().is_none() && !ctx.end.is_raised() {
            lpr.wait();
        }
        if ctx.end.is_raised() {
            break;
        }
        let Some(plate) = lpr.plate() else {
            continue;
        };

        if let Some(ticket) = ctx.billing.check_out(&plate, &ctx.occupancy) {
            match ctx.billing.settle(&plate, &ticket) {
                Ok(cents) => debug!(
                    "exit {}: {} billed {} cents for level {}",
                    id,
                    plate,
                    cents,
                    ticket.level + 1
                ),
                Err(e) => warn!("exit {}: billing ledger append failed: {}", id, e),
            }
            ctx.occupancy.notify_waiters();
            ctx.billing.notify_waiters();
        } else {
            debug!("exit {}: {} has no ticket, letting it out", id, plate);
        }

        {
            let mut gate = ex.gate.lock();
            if gate.status() == GateStatus::Closed {
                gate.set(GateStatus::Raising);
            }
        }
        ex.gate.notify();

        lpr.clear();
        drop(lpr);
        ex.lpr.notify();
    }
}
