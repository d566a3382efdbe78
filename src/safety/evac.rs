use super::SafetyCtx;
use crate::park::{SignDisplay, EVACUATE};
use crate::tasks;
use std::sync::Arc;

/// Milliseconds between letters on the evacuation signs.
const LETTER_MILLIS: u64 = 20;

/// Evacuation sign worker: once the alarm fires, walks the letters of
/// EVACUATE across every entrance sign until shutdown. The alarm is
/// sticky, so the letters only stop when the simulation ends.
pub(super) fn run(ctx: &Arc<SafetyCtx>) {
    while !ctx.end.is_raised() {
        if !ctx.alarm.wait_active(&ctx.end) {
            continue;
        }
        for &letter in EVACUATE {
            if ctx.end.is_raised() || !ctx.alarm.is_active() {
                break;
            }
            for i in 0..ctx.region.counts().entrances {
                let en = ctx.region.entrance(i);
                {
                    let mut sign = en.sign.lock();
                    sign.set(SignDisplay::Evac(letter));
                }
                en.sign.notify();
            }
            tasks::sleep_millis(LETTER_MILLIS);
        }
    }
}
