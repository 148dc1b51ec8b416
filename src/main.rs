// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::runtime::Handle;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use csv_playback::config::{load_config_with_env, LoggingConfig, PlayerOverrides};
use csv_playback::producer::ProducerExit;
use csv_playback::{PlaybackSession, SinkFactory};

/// CSV Playback - Replay a recorded CSV file as a live feed
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.yaml")]
    config: PathBuf,

    /// Asset name (overrides config file)
    #[arg(short, long)]
    asset_name: Option<String>,

    /// Recording to replay (overrides config file)
    #[arg(long)]
    csv: Option<String>,

    /// Loop the recording until interrupted
    #[arg(long)]
    repeat: bool,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.to_lowercase()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))
}

// Dispatch tasks share this single thread with the supervisor below
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration from file
    let mut config = load_config_with_env(&args.config)?;

    // Apply CLI overrides
    PlayerOverrides {
        asset_name: args.asset_name,
        csv_filename: args.csv,
        repeat_loop: args.repeat,
    }
    .apply(&mut config)?;

    init_tracing(&config.logging)?;

    info!("Starting CSV playback");
    info!("Loaded configuration from: {:?}", args.config);
    info!("Asset: {}", config.player.asset_name);
    info!("Recording: {}", config.player.csv_path().display());
    info!("Storage backend: {}", config.storage.backend);

    // Create and initialize the ingestion sink
    let sink = SinkFactory::create(&config.storage)?;
    sink.initialize()
        .await
        .with_context(|| format!("Failed to initialize {} sink", sink.sink_type()))?;
    info!("Ingestion sink initialized: {}", sink.sink_type());

    let mut session = PlaybackSession::start(&config.player, sink, Handle::current())
        .context("Failed to start playback")?;

    if let Some(mut failures) = session.take_failures() {
        tokio::spawn(async move {
            while let Some(failure) = failures.recv().await {
                error!(asset = %failure.asset, key = %failure.key, "Ingestion failure: {}", failure);
            }
        });
    }

    tokio::select! {
        _ = session.finished() => {
            info!("Playback finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    // Cleanup
    session.shutdown();
    if let Some(ProducerExit::Failed(e)) = session.producer_exit() {
        error!("Playback stopped early: {}", e);
    }
    let stats = session.stats();
    info!(
        units = stats.units_emitted,
        records = stats.records_emitted,
        skipped = stats.ticks_skipped,
        passes = stats.passes,
        dispatched = stats.dispatched,
        delivered = stats.delivered,
        rejected = stats.rejected,
        failed = stats.failed,
        "CSV playback shut down successfully"
    );

    Ok(())
}
