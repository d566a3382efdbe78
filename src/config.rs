use crate::error::{Error, Result};
use log::warn;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Hard cap on entrances, exits and levels imposed by the sign alphabet
/// (one ASCII digit per level) and the fixed region layout.
pub const MAX_LANES: usize = 5;

pub const DEFAULT_LANES: usize = 5;
pub const DEFAULT_CAPACITY: u32 = 20;
pub const DEFAULT_DURATION_SECS: u64 = 60;
pub const DEFAULT_CHANCE: f64 = 0.5;
pub const DEFAULT_MIN_TEMP: i16 = 26;
pub const DEFAULT_MAX_TEMP: i16 = 33;

/// Command line of all three car park binaries. Flags override values
/// from the optional YAML configuration file.
#[derive(clap::Parser, Debug, Default)]
pub struct Args {
    #[clap(long = "config", help = "YAML configuration file")]
    config: Option<PathBuf>,
    #[clap(long, help = "number of entrances (1..=5)")]
    entrances: Option<usize>,
    #[clap(long, help = "number of exits (1..=5)")]
    exits: Option<usize>,
    #[clap(long, help = "number of levels (1..=5)")]
    levels: Option<usize>,
    #[clap(long, help = "cars per level")]
    capacity: Option<u32>,
    #[clap(long, help = "simulation duration, seconds")]
    duration: Option<u64>,
    #[clap(long, help = "probability an arrival carries a whitelisted plate")]
    chance: Option<f64>,
    #[clap(long, help = "lower temperature bound, degrees")]
    min_temp: Option<i16>,
    #[clap(long, help = "upper temperature bound, degrees")]
    max_temp: Option<i16>,
    #[clap(long, help = "slow every simulated delay down N times")]
    slow_motion: Option<u32>,
    #[clap(long, help = "authorised plates file")]
    plates_file: Option<PathBuf>,
    #[clap(long, help = "billing ledger file")]
    billing_file: Option<PathBuf>,
    #[clap(long, help = "shared memory object name")]
    shm_name: Option<String>,
    #[clap(long, value_enum, help = "temperature generation mode")]
    temp_mode: Option<TempMode>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    entrances: Option<usize>,
    exits: Option<usize>,
    levels: Option<usize>,
    capacity: Option<u32>,
    duration: Option<u64>,
    chance: Option<f64>,
    min_temp: Option<i16>,
    max_temp: Option<i16>,
    slow_motion: Option<u32>,
    plates_file: Option<PathBuf>,
    billing_file: Option<PathBuf>,
    shm_name: Option<String>,
    temp_mode: Option<TempMode>,
}

#[derive(clap::ValueEnum, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TempMode {
    /// Random walk with a step of at most one degree per sample.
    Walk,
    /// Pure uniform draw from the configured window. Test mode: makes the
    /// spike trigger reachable within a short run.
    Uniform,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub entrances: usize,
    pub exits: usize,
    pub levels: usize,
    pub capacity: u32,
    pub duration: Duration,
    pub chance: f64,
    pub min_temp: i16,
    pub max_temp: i16,
    pub slow_motion: u32,
    pub plates_file: PathBuf,
    pub billing_file: PathBuf,
    pub shm_name: String,
    pub temp_mode: TempMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            entrances: DEFAULT_LANES,
            exits: DEFAULT_LANES,
            levels: DEFAULT_LANES,
            capacity: DEFAULT_CAPACITY,
            duration: Duration::from_secs(DEFAULT_DURATION_SECS),
            chance: DEFAULT_CHANCE,
            min_temp: DEFAULT_MIN_TEMP,
            max_temp: DEFAULT_MAX_TEMP,
            slow_motion: 1,
            plates_file: PathBuf::from("plates.txt"),
            billing_file: PathBuf::from("billing.txt"),
            shm_name: crate::park::DEFAULT_SHM_NAME.to_owned(),
            temp_mode: TempMode::Walk,
        }
    }
}

impl Config {
    /// Builds the effective configuration from parsed command-line
    /// arguments, merging the optional YAML file underneath the flags and
    /// clamping anything out of bounds back to the documented defaults.
    pub fn from_cli(args: Args) -> Result<Self> {
        let file = if let Some(ref path) = args.config {
            let raw = fs::read_to_string(path).map_err(|e| Error::file(path, e))?;
            serde_yaml::from_str::<FileConfig>(&raw)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
        } else {
            FileConfig::default()
        };
        let defaults = Config::default();
        let mut config = Config {
            entrances: args.entrances.or(file.entrances).unwrap_or(defaults.entrances),
            exits: args.exits.or(file.exits).unwrap_or(defaults.exits),
            levels: args.levels.or(file.levels).unwrap_or(defaults.levels),
            capacity: args.capacity.or(file.capacity).unwrap_or(defaults.capacity),
            duration: Duration::from_secs(
                args.duration.or(file.duration).unwrap_or(DEFAULT_DURATION_SECS),
            ),
            chance: args.chance.or(file.chance).unwrap_or(defaults.chance),
            min_temp: args.min_temp.or(file.min_temp).unwrap_or(defaults.min_temp),
            max_temp: args.max_temp.or(file.max_temp).unwrap_or(defaults.max_temp),
            slow_motion: args.slow_motion.or(file.slow_motion).unwrap_or(1),
            plates_file: args.plates_file.or(file.plates_file).unwrap_or(defaults.plates_file),
            billing_file: args
                .billing_file
                .or(file.billing_file)
                .unwrap_or(defaults.billing_file),
            shm_name: args.shm_name.or(file.shm_name).unwrap_or(defaults.shm_name),
            temp_mode: args.temp_mode.or(file.temp_mode).unwrap_or(defaults.temp_mode),
        };
        config.clamp();
        Ok(config)
    }

    /// Bounds check for human-edited values. Out-of-bounds entries are
    /// warned about and replaced with the documented defaults; inverted
    /// temperature bounds are swapped.
    fn clamp(&mut self) {
        if self.entrances < 1 || self.entrances > MAX_LANES {
            warn!("entrances {} out of bounds, using {}", self.entrances, DEFAULT_LANES);
            self.entrances = DEFAULT_LANES;
        }
        if self.exits < 1 || self.exits > MAX_LANES {
            warn!("exits {} out of bounds, using {}", self.exits, DEFAULT_LANES);
            self.exits = DEFAULT_LANES;
        }
        if self.levels < 1 || self.levels > MAX_LANES {
            warn!("levels {} out of bounds, using {}", self.levels, DEFAULT_LANES);
            self.levels = DEFAULT_LANES;
        }
        if self.capacity < 1 {
            warn!("capacity {} out of bounds, using {}", self.capacity, DEFAULT_CAPACITY);
            self.capacity = DEFAULT_CAPACITY;
        }
        if self.duration < Duration::from_secs(1) {
            warn!("duration below 1s, using {}s", DEFAULT_DURATION_SECS);
            self.duration = Duration::from_secs(DEFAULT_DURATION_SECS);
        }
        if !(0.0..=1.0).contains(&self.chance) {
            warn!("chance {} out of bounds, using {}", self.chance, DEFAULT_CHANCE);
            self.chance = DEFAULT_CHANCE;
        }
        if self.min_temp > self.max_temp {
            warn!(
                "temperature bounds inverted ({}..{}), swapping",
                self.min_temp, self.max_temp
            );
            std::mem::swap(&mut self.min_temp, &mut self.max_temp);
        }
        if self.slow_motion < 1 {
            warn!("slow motion multiplier must be at least 1, using 1");
            self.slow_motion = 1;
        }
    }

    #[inline]
    pub fn total_capacity(&self) -> u32 {
        self.capacity * self.levels as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(mutate: impl FnOnce(&mut Config)) -> Config {
        let mut config = Config::default();
        mutate(&mut config);
        config.clamp();
        config
    }

    #[test]
    fn defaults_pass_untouched() {
        let config = build(|_| {});
        assert_eq!(config.entrances, 5);
        assert_eq!(config.capacity, 20);
        assert_eq!(config.duration, Duration::from_secs(60));
        assert!((config.chance - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn lane_counts_fall_back() {
        let config = build(|c| {
            c.entrances = 0;
            c.exits = 9;
            c.levels = 6;
        });
        assert_eq!(config.entrances, 5);
        assert_eq!(config.exits, 5);
        assert_eq!(config.levels, 5);
    }

    #[test]
    fn inverted_temps_swap() {
        let config = build(|c| {
            c.min_temp = 40;
            c.max_temp = 20;
        });
        assert_eq!(config.min_temp, 20);
        assert_eq!(config.max_temp, 40);
    }

    #[test]
    fn chance_out_of_bounds_resets() {
        let config = build(|c| c.chance = 1.5);
        assert!((config.chance - DEFAULT_CHANCE).abs() < f64::EPSILON);
    }

    #[test]
    fn total_capacity_multiplies_levels() {
        let config = build(|c| {
            c.capacity = 3;
            c.levels = 2;
        });
        assert_eq!(config.total_capacity(), 6);
    }

    #[test]
    fn yaml_file_merges_under_flags() {
        let raw = "entrances: 2\ncapacity: 7\ntemp_mode: uniform\n";
        let file: FileConfig = serde_yaml::from_str(raw).unwrap();
        assert_eq!(file.entrances, Some(2));
        assert_eq!(file.capacity, Some(7));
        assert_eq!(file.temp_mode, Some(TempMode::Uniform));
    }
}
