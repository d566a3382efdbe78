//! The manager process: authorises arriving cars, assigns levels, keeps
//! the occupancy and billing books, closes boom gates after their open
//! hold and renders the status display.

mod billing;
mod entrance;
mod exits;
mod gates;
mod status;

pub use billing::{bill_line, BillingDesk, Occupancy, Placement, Ticket};

use crate::config::Config;
use crate::error::Result;
use crate::park::{Counts, SharedRegion};
use crate::plates::Whitelist;
use crate::tasks::{self, EndFlag};
use gates::GateId;
use log::info;
use std::sync::Arc;

/// Everything the manager's workers share.
pub(crate) struct ManagerCtx {
    pub(crate) config: Config,
    pub(crate) region: SharedRegion,
    pub(crate) whitelist: Whitelist,
    pub(crate) billing: BillingDesk,
    pub(crate) occupancy: Occupancy,
    pub(crate) end: EndFlag,
}

pub fn run(config: Config) -> Result<()> {
    let counts = Counts::from_config(&config);
    let region = SharedRegion::open(&config.shm_name, counts)?;
    let whitelist = Whitelist::load(&config.plates_file)?;
    let billing = BillingDesk::open(&config.billing_file)?;
    let occupancy = Occupancy::new(config.levels);
    let ctx = Arc::new(ManagerCtx {
        end: EndFlag::new(),
        region,
        whitelist,
        billing,
        occupancy,
        config,
    });

    for i in 0..counts.entrances {
        let ctx = Arc::clone(&ctx);
        tasks::spawn(&format!("ment{}", i), move || entrance::run(&ctx, i));
    }
    for i in 0..counts.exits {
        let ctx = Arc::clone(&ctx);
        tasks::spawn(&format!("mext{}", i), move || exits::run(&ctx, i));
    }
    for i in 0..counts.entrances {
        let ctx = Arc::clone(&ctx);
        tasks::spawn(&format!("gent{}", i), move || {
            gates::run(&ctx, GateId::Entrance(i));
        });
    }
    for i in 0..counts.exits {
        let ctx = Arc::clone(&ctx);
        tasks::spawn(&format!("gext{}", i), move || {
            gates::run(&ctx, GateId::Exit(i));
        });
    }
    {
        let ctx = Arc::clone(&ctx);
        tasks::spawn("status", move || status::run(&ctx));
    }

    crate::wait_for_shutdown(ctx.config.duration);
    info!("simulation over, stopping workers");

    ctx.end.raise();
    ctx.region.broadcast_all();
    ctx.billing.notify_waiters();
    ctx.occupancy.notify_waiters();
    tasks::join_workers();

    let revenue = ctx.billing.revenue_cents();
    info!(
        "manager stopped: {} cars entered, ${}.{:02} revenue",
        ctx.billing.total_entered(),
        revenue / 100,
        revenue % 100
    );
    Ok(())
}
