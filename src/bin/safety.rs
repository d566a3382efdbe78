use carpark::config::{Args, Config};
use carpark::prelude::*;
use clap::Parser;

fn main() {
    let args = Args::parse();
    carpark::init("carpark-safety");
    let config = match Config::from_cli(args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    carpark::tasks::set_slow_motion(config.slow_motion);
    if let Err(e) = carpark::safety::run(config) {
        error!("{}", e);
        std::process::exit(1);
    }
}
