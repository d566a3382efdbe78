use super::{Car, SimCtx};
use crate::tasks;
use log::{debug, warn};
use rand::Rng;
use std::sync::Arc;
use std::thread;

/// Sends an authorised car off on its own detached task. Cars move
/// independently once inside the park; the tracker lets shutdown wait for
/// the outstanding set to drain.
pub(super) fn dispatch(ctx: &Arc<SimCtx>, car: Car) {
    ctx.cars.checkout();
    let task_ctx = Arc::clone(ctx);
    let spawned = thread::Builder::new()
        .name(format!("car-{}", car.plate))
        .spawn(move || {
            lifecycle(&task_ctx, car);
            task_ctx.cars.checkin();
        });
    if let Err(e) = spawned {
        ctx.cars.checkin();
        warn!("unable to spawn car task for {}: {}", car.plate, e);
    }
}

/// Drive to the spot, park for 100..=10000 ms, drive to a random exit.
/// The level LPR is triggered on the way in and on the way out.
fn lifecycle(ctx: &SimCtx, car: Car) {
    let mut rng = rand::rng();
    let stay: u64 = rng.random_range(100..=10_000);
    let exit = rng.random_range(0..ctx.config.exits);
    debug!("{} parking on level {} for {}ms", car.plate, car.level + 1, stay);

    let level = ctx.region.level(car.level);
    tasks::sleep_millis(10);
    {
        let mut lpr = level.lpr.lock();
        lpr.set_plate(car.plate);
    }
    if !ctx.end.sleep_unless_raised(tasks::scaled_millis(stay)) {
        return;
    }
    {
        let mut lpr = level.lpr.lock();
        lpr.set_plate(car.plate);
    }
    tasks::sleep_millis(10);
    if ctx.end.is_raised() {
        return;
    }
    ctx.exit_queues.push(exit, car);
}
