use super::ManagerCtx;
use crate::park::{Gate, GateStatus};
use crate::tasks;
use std::sync::Arc;
use std::time::Duration;

/// How long a boom gate stays open before the manager starts lowering it.
const OPEN_HOLD_MILLIS: u64 = 20;

/// Pause between alarm re-checks while gates are pinned open.
const ALARM_NAP: Duration = Duration::from_millis(100);

#[derive(Debug, Copy, Clone)]
pub(super) enum GateId {
    Entrance(usize),
    Exit(usize),
}

/// Gate closer worker, one per boom gate. Waits for the gate to finish
/// opening, holds it open for 20 ms, then starts lowering it. During an
/// evacuation the worker stands down and leaves every gate open.
pub(super) fn run(ctx: &Arc<ManagerCtx>, id: GateId) {
    let gate: &Gate = match id {
        GateId::Entrance(i) => &ctx.region.entrance(i).gate,
        GateId::Exit(i) => &ctx.region.exit(i).gate,
    };

    while !ctx.end.is_raised() {
        {
            let mut g = gate.lock();
            while g.status() != GateStatus::Open && !ctx.end.is_raised() {
                g.wait();
            }
        }
        if ctx.end.is_raised() {
            break;
        }
        if ctx.region.alarm_active() {
            ctx.end.sleep_unless_raised(ALARM_NAP);
            continue;
        }

        tasks::sleep_millis(OPEN_HOLD_MILLIS);

        let mut g = gate.lock();
        if g.status() == GateStatus::Open && !ctx.region.alarm_active() {
            g.set(GateStatus::Lowering);
        }
        drop(g);
        gate.notify();
    }
}
