use super::SafetyCtx;
use crate::park::{Gate, GateStatus};
use std::sync::Arc;
use std::time::Duration;

/// Pause between sweeps; an open gate only needs to be re-raised if some
/// worker closed it again by mistake.
const RECHECK_PAUSE: Duration = Duration::from_secs(5);

/// Evacuation gate worker: on alarm, starts raising every closed gate in
/// the car park, entrances and exits alike, and re-checks periodically.
pub(super) fn run(ctx: &Arc<SafetyCtx>) {
    while !ctx.end.is_raised() {
        if ctx.alarm.wait_active(&ctx.end) {
            let counts = ctx.region.counts();
            for i in 0..counts.entrances {
                raise(&ctx.region.entrance(i).gate);
            }
            for i in 0..counts.exits {
                raise(&ctx.region.exit(i).gate);
            }
        }
        ctx.end.sleep_unless_raised(RECHECK_PAUSE);
    }
}

fn raise(gate: &Gate) {
    {
        let mut g = gate.lock();
        if g.status() == GateStatus::Closed {
            g.set(GateStatus::Raising);
        }
    }
    gate.notify();
}
