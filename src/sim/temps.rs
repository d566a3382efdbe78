use super::SimCtx;
use crate::config::TempMode;
use crate::tasks;
use rand::Rng;
use std::sync::Arc;

/// Temperature sensor worker, one per level. Every 1..=5 ms a fresh
/// reading lands in the level's atomic field; no lock is involved.
pub(super) fn run(ctx: &Arc<SimCtx>, id: usize) {
    let level = ctx.region.level(id);
    let mut rng = rand::rng();
    let (min, max) = (ctx.config.min_temp, ctx.config.max_temp);

    let mut current: i16 = rng.random_range(min..=max);
    level.set_temperature(current);

    while !ctx.end.is_raised() {
        let pause: u64 = rng.random_range(1..=5);
        if !ctx.end.sleep_unless_raised(tasks::scaled_millis(pause)) {
            break;
        }
        current = match ctx.config.temp_mode {
            // bounded random walk keeps readings plausible between samples
            TempMode::Walk => current
                .saturating_add(rng.random_range(-1i16..=1))
                .clamp(min, max),
            TempMode::Uniform => rng.random_range(min..=max),
        };
        level.set_temperature(current);
    }
}
