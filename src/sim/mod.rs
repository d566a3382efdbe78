//! The simulator process: owns the shared region, generates car arrivals,
//! drives the entrance and exit hardware, animates boom gates, runs one
//! detached task per authorised car and feeds the level temperature
//! sensors.

mod car;
mod entrance;
mod exits;
mod queues;
mod spawn;
mod temps;

pub use queues::{Car, CarQueues};

use crate::config::Config;
use crate::error::Result;
use crate::park::{Counts, SharedRegion};
use crate::plates::PlatePool;
use crate::tasks::{self, EndFlag, TaskTracker};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// How long shutdown waits for detached car tasks before giving up on
/// them. Cars notice the end flag within one cancellation step, so this
/// only guards against a wedged task.
const CAR_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything the simulator's workers share. Owned here rather than in
/// globals so isolated instances can be spun up side by side.
pub(crate) struct SimCtx {
    pub(crate) config: Config,
    pub(crate) region: SharedRegion,
    pub(crate) pool: PlatePool,
    pub(crate) entrance_queues: CarQueues,
    pub(crate) exit_queues: CarQueues,
    pub(crate) end: EndFlag,
    pub(crate) cars: TaskTracker,
}

pub fn run(config: Config) -> Result<()> {
    let counts = Counts::from_config(&config);
    let region = SharedRegion::create(&config.shm_name, counts)?;
    let pool = PlatePool::load(&config.plates_file)?;
    let ctx = Arc::new(SimCtx {
        entrance_queues: CarQueues::new(config.entrances),
        exit_queues: CarQueues::new(config.exits),
        end: EndFlag::new(),
        cars: TaskTracker::new(),
        region,
        pool,
        config,
    });

    {
        let ctx = Arc::clone(&ctx);
        tasks::spawn("spawn", move || spawn::generate_arrivals(&ctx));
    }
    for i in 0..counts.entrances {
        let ctx = Arc::clone(&ctx);
        tasks::spawn(&format!("ent{}", i), move || entrance::run(&ctx, i));
    }
    for i in 0..counts.exits {
        let ctx = Arc::clone(&ctx);
        tasks::spawn(&format!("exit{}", i), move || exits::run(&ctx, i));
    }
    for i in 0..counts.levels {
        let ctx = Arc::clone(&ctx);
        tasks::spawn(&format!("temp{}", i), move || temps::run(&ctx, i));
    }

    crate::wait_for_shutdown(ctx.config.duration);
    info!("simulation over, stopping workers");

    ctx.end.raise();
    ctx.entrance_queues.drain();
    ctx.exit_queues.drain();
    ctx.region.broadcast_all();
    tasks::join_workers();
    if !ctx.cars.wait_drained(CAR_DRAIN_TIMEOUT) {
        warn!("{} car tasks still outstanding", ctx.cars.active());
    }
    info!("simulator stopped");
    // the region unmaps and unlinks when the last Arc drops
    Ok(())
}
