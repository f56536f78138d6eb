//! PocketPet terminal front end
//!
//! Runs the reference pet engine in the terminal: keys become button
//! presses, frames are drawn with half-block characters, and the pet is
//! autosaved to the data directory.

mod cli;
mod demo;
mod display;
mod logging;
mod terminal_input;

use anyhow::Result;
use clap::Parser;

use pocketpet_core::app::config;
use pocketpet_core::{Config, ConfigError, HostError, HostLoop, SystemTimeSource};

use cli::Cli;
use demo::DemoEngine;
use display::TerminalDisplay;
use terminal_input::{KeyBindings, TerminalInput};

fn main() {
    if let Err(err) = run() {
        eprintln!("pocketpet: {:#}", err);
        std::process::exit(exit_code(&err));
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(host) = err.downcast_ref::<HostError>() {
        host.exit_code()
    } else if err.downcast_ref::<ConfigError>().is_some() {
        2
    } else {
        1
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.write_default_config {
        let config = Config::default();
        let path = match &cli.config {
            Some(path) => {
                config::save_to(&config, path)?;
                path.clone()
            }
            None => config::save(&config)?,
        };
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    // Before the config, so a fallback to defaults is logged.
    let log_path = logging::log_path(cli.log_file.as_deref(), config::data_dir());
    logging::init(&log_path)?;
    tracing::info!("PocketPet {} starting", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => config::load_from(path)?,
        None => config::load(),
    };
    cli.apply(&mut config);

    for warning in config::validate_keybindings(&config) {
        tracing::warn!("Key binding: {}", warning);
    }
    let bindings = KeyBindings::from_config(&config.keys)?;
    let runtime = config.runtime_config();
    tracing::info!("Save file: {}", runtime.persistence.save_path.display());

    let display = TerminalDisplay::new(runtime.display_scale)?;
    let mut host: HostLoop<DemoEngine, _, _> =
        HostLoop::new(runtime, SystemTimeSource::new(), display);
    let mut input = TerminalInput::new(bindings)?;

    host.run(&mut input)?;
    tracing::info!("PocketPet exited after {} frames", host.frames());
    Ok(())
}
