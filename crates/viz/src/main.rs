//! Campus Simulation Viewer
//!
//! Run with: cargo run -p viz
//!
//! Examples:
//!   cargo run -p viz -- --base-url http://localhost:5000/api
//!   cargo run -p viz -- --config viewer.toml --paused

use bevy::prelude::*;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use view_sync::ViewSyncConfig;
use viz::{CampusVizPlugin, SyncBridge, ViewerSettings};

/// Campus Simulation Viewer
#[derive(Parser, Debug)]
#[command(name = "viz")]
#[command(about = "Live viewer for the campus agent simulation")]
struct Args {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of the simulation API (overrides the config file)
    #[arg(long)]
    base_url: Option<String>,

    /// Milliseconds between automatic ticks (overrides the config file)
    #[arg(long)]
    tick_interval_ms: Option<u64>,

    /// Start paused instead of ticking automatically
    #[arg(long)]
    paused: bool,

    /// Output directory for exported statistics
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
}

impl Args {
    fn into_settings(self) -> Result<ViewerSettings, view_sync::ConfigError> {
        let mut config = match &self.config {
            Some(path) => ViewSyncConfig::from_file(path)?,
            None => ViewSyncConfig::default(),
        };

        if let Some(base_url) = self.base_url {
            config.sync.base_url = base_url;
        }
        if let Some(interval) = self.tick_interval_ms {
            config.sync.tick_interval_ms = interval;
        }
        if self.paused {
            config.sync.start_running = false;
        }
        config.validate()?;

        Ok(ViewerSettings {
            config,
            output_dir: self.output_dir,
        })
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Bevy's LogPlugin installs the subscriber later, so startup failures
    // go straight to stderr.
    let settings = match args.into_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let bridge = match SyncBridge::connect(&settings.config) {
        Ok(bridge) => bridge,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let exit = App::new()
        .insert_resource(settings)
        .insert_resource(bridge)
        .add_plugins(CampusVizPlugin)
        .run();

    match exit {
        AppExit::Success => ExitCode::SUCCESS,
        AppExit::Error(_) => ExitCode::FAILURE,
    }
}
