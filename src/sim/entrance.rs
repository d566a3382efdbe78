use super::{car, SimCtx};
use crate::park::{GateStatus, SignDisplay};
use crate::tasks;
use log::debug;
use std::sync::Arc;

/// Entrance hardware worker, one per entrance. Pulls cars from its queue,
/// triggers the LPR, waits for the manager's verdict on the sign and
/// finishes the boom gate motions the manager initiates.
pub(super) fn run(ctx: &Arc<SimCtx>, id: usize) {
    let en = ctx.region.entrance(id);

    while !ctx.end.is_raised() {
        let Some(mut next) = ctx.entrance_queues.wait_pop(id, &ctx.end) else {
            continue;
        };

        // Finish any pending gate motion before serving the car: the
        // manager left the gate lowering after the previous car, or the
        // fire monitor raised it. The 10 ms of gate travel elapse while
        // the gate mutex is held, so no observer can see O before R or C
        // before L.
        {
            let mut gate = en.gate.lock();
            if gate.status() == GateStatus::Lowering {
                tasks::sleep_millis(10);
                gate.set(GateStatus::Closed);
            }
            if gate.status() == GateStatus::Raising {
                tasks::sleep_millis(10);
                gate.set(GateStatus::Open);
            }
        }
        en.gate.notify();

        if ctx.end.is_raised() {
            break;
        }

        // 2 ms of driving up to the sensor, then the plate is read in.
        tasks::sleep_millis(2);
        {
            let mut lpr = en.lpr.lock();
            lpr.set_plate(next.plate);
        }
        // unscaled window so the status display can sample the plate
        tasks::sleep_millis_raw(8);
        en.lpr.notify();

        // wait for the manager to validate the plate and update the sign
        let mut sign = en.sign.lock();
        while sign.display() == SignDisplay::Blank && !ctx.end.is_raised() {
            sign.wait();
        }

        match sign.display() {
            SignDisplay::Level(level) if !ctx.end.is_raised() => {
                next.level = level as usize;
                {
                    let mut gate = en.gate.lock();
                    while gate.status() == GateStatus::Closed && !ctx.end.is_raised() {
                        gate.wait();
                    }
                    if gate.status() == GateStatus::Raising {
                        tasks::sleep_millis(10);
                        gate.set(GateStatus::Open);
                    }
                }
                en.gate.notify();
                car::dispatch(ctx, next);
            }
            // refused, full, evacuating or shutting down: the car leaves
            other => debug!("entrance {}: {} turned away ({:?})", id, next.plate, other),
        }

        sign.clear();
    }
}
