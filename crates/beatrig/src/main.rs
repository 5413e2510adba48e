//! Beatrig - beat-synchronised DMX lighting
//!
//! Polls the music player, fires beat events on time, lets the handlers move
//! the lights, and streams the resulting universes out over Art-Net or sACN.

mod config;
mod logging_setup;
mod rig;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

use beatrig_control::{BeatScheduler, SpotifyClient, UdpDmxTransport};
use beatrig_core::{EffectRegistry, MusicEmitter};

use crate::config::AppConfig;
use crate::rig::Rig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Beat-synchronised DMX lighting engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the rig until interrupted.
    Run {
        /// Path to the TOML configuration.
        #[arg(short, long, default_value = "beatrig.toml")]
        config: PathBuf,
    },
    /// Validate the configuration and print a summary.
    Check {
        /// Path to the TOML configuration.
        #[arg(short, long, default_value = "beatrig.toml")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run(&config),
        Commands::Check { config } => check(&config),
    }
}

fn check(path: &Path) -> Result<()> {
    let config = AppConfig::load(path)?;
    let registry = EffectRegistry::with_defaults();
    let rig = Rig::build(&config, &registry)?;

    println!("Configuration OK: {:?}", path);
    println!("  tick interval: {} ms", config.tick_interval_ms);
    println!("  endpoints:     {}", config.endpoints.len());
    println!("  controllers:   {}", config.controllers.len());
    println!("  groups:        {}", rig.group_count);
    println!(
        "  playback:      {}",
        if config.playback.enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

fn run(path: &Path) -> Result<()> {
    let config = AppConfig::load(path)?;
    let _log_guard = logging_setup::init(&config.logging)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(serve(config))
}

async fn serve(config: AppConfig) -> Result<()> {
    let registry = EffectRegistry::with_defaults();
    let rig = Rig::build(&config, &registry)?;
    tracing::info!(
        "Rig loaded: {} controllers, {} groups",
        config.controllers.len(),
        rig.group_count
    );

    let handlers = Arc::new(Mutex::new(rig.handlers));
    let emitter = Arc::new(MusicEmitter::new());
    rig::connect(&emitter, &handlers);

    let transport = UdpDmxTransport::from_config(&config.endpoints)
        .context("Failed to open DMX endpoints")?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let compositor = tokio::spawn(rig.compositor.run(
        Arc::clone(&handlers),
        Box::new(transport),
        config.tick_interval(),
        shutdown_rx.clone(),
    ));

    let scheduler = if config.playback.enabled {
        let client = SpotifyClient::new(config.playback.spotify())
            .context("Failed to create playback client")?;
        let scheduler = Arc::new(BeatScheduler::new(client, config.playback.scheduler()));
        scheduler.init(Arc::clone(&emitter))?;
        Some(tokio::spawn(scheduler.run(shutdown_rx)))
    } else {
        tracing::info!("Playback disabled, no beat events will be produced");
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down");
    // Receivers may already be gone if a task ended early
    let _ = shutdown_tx.send(true);

    if let Some(scheduler) = scheduler {
        if let Err(e) = scheduler.await {
            tracing::warn!("Beat scheduler task failed: {}", e);
        }
    }
    if let Err(e) = compositor.await {
        tracing::warn!("Frame compositor task failed: {}", e);
    }
    Ok(())
}
