//! CLI command definitions using clap

use clap::Parser;
use std::path::PathBuf;

use pocketpet_core::Config;
use pocketpet_core::runtime::{MAX_TIME_SCALE, MIN_TIME_SCALE};

#[derive(Parser, Debug)]
#[command(name = "pocketpet", version)]
#[command(about = "Run the PocketPet virtual device in a terminal")]
pub struct Cli {
    /// Config file (default: config.toml in the platform config directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Save file to load and autosave to
    #[arg(long, value_name = "PATH")]
    pub save: Option<PathBuf>,

    /// Seconds between autosaves
    #[arg(long, value_name = "SECS")]
    pub save_interval: Option<u64>,

    /// Display multiplier
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..=16))]
    pub scale: Option<u32>,

    /// Frames per second (0 runs unpaced)
    #[arg(long, value_name = "N")]
    pub fps: Option<u32>,

    /// Simulated seconds per real second (1 to 3600)
    #[arg(long, value_name = "X", value_parser = parse_time_scale)]
    pub time_scale: Option<f32>,

    /// Log file (default: pocketpet.log in the platform data directory)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Write a default config file and exit
    #[arg(long)]
    pub write_default_config: bool,
}

impl Cli {
    /// Override config values with the flags that were given.
    pub fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.save {
            config.save.path = Some(path.clone());
        }
        if let Some(secs) = self.save_interval {
            config.save.interval_secs = secs;
        }
        if let Some(scale) = self.scale {
            config.display.scale = scale;
        }
        if let Some(fps) = self.fps {
            config.display.target_fps = fps;
        }
        if let Some(time_scale) = self.time_scale {
            config.sim.time_scale = time_scale;
        }
    }
}

fn parse_time_scale(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|e| format!("{e}"))?;
    if !(MIN_TIME_SCALE..=MAX_TIME_SCALE).contains(&value) {
        return Err(format!(
            "time scale must be between {MIN_TIME_SCALE} and {MAX_TIME_SCALE}, got {s}"
        ));
    }
    Ok(value)
}
