use super::SimCtx;
use crate::park::GateStatus;
use crate::tasks;
use std::sync::Arc;

/// Exit hardware worker, one per exit. Symmetric to the entrance worker
/// but simpler: exits have no sign, the gate raise is the whole verdict.
pub(super) fn run(ctx: &Arc<SimCtx>, id: usize) {
    let ex = ctx.region.exit(id);

    while !ctx.end.is_raised() {
        let Some(leaving) = ctx.exit_queues.wait_pop(id, &ctx.end) else {
            continue;
        };

        {
            let mut gate = ex.gate.lock();
            if gate.status() == GateStatus::Lowering {
                tasks::sleep_millis(10);
                gate.set(GateStatus::Closed);
            }
        }
        ex.gate.notify();

        if ctx.end.is_raised() {
            break;
        }

        // the car is already at the sensor, trigger the LPR immediately
        {
            let mut lpr = ex.lpr.lock();
            lpr.set_plate(leaving.plate);
        }
        ex.lpr.notify();

        // wait for the manager to bill the car and start raising the gate
        {
            let mut gate = ex.gate.lock();
            while gate.status() == GateStatus::Closed && !ctx.end.is_raised() {
                gate.wait();
            }
            if gate.status() == GateStatus::Raising {
                tasks::sleep_millis(10);
                gate.set(GateStatus::Open);
            }
        }
        ex.gate.notify();
        // the car has left the simulation
    }
}
