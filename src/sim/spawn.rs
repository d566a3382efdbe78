use super::{Car, SimCtx};
use crate::tasks;
use rand::Rng;

/// Arrival generator: every 1..=100 ms a new car pulls up to a uniformly
/// chosen entrance queue. With probability `chance` its plate comes from
/// the whitelist pool, otherwise it is random.
pub(super) fn generate_arrivals(ctx: &SimCtx) {
    let mut rng = rand::rng();
    while !ctx.end.is_raised() {
        let pause: u64 = rng.random_range(1..=100);
        let lane = rng.random_range(0..ctx.config.entrances);
        if !ctx.end.sleep_unless_raised(tasks::scaled_millis(pause)) {
            break;
        }
        let plate = ctx.pool.pick(&mut rng, ctx.config.chance);
        ctx.entrance_queues.push(lane, Car { plate, level: 0 });
    }
}
