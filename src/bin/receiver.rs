//! PCM Receiver Application
//!
//! Receives sequenced float32 PCM over UDP and plays it on an output device.
//!
//! Usage: `receiver [config.toml]`. Without an argument the platform config
//! file is used if present, otherwise defaults. `device = "null"` in the
//! `[audio]` section plays into a paced null sink.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use udp_pcm_receiver::{
    audio::{CpalSinkFactory, NullSinkFactory, SinkFactory},
    config::AppConfig,
    Session,
};

const STATS_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting UDP PCM receiver");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    let sinks: Arc<dyn SinkFactory> = match config.audio.device.as_deref() {
        Some("null") => Arc::new(NullSinkFactory),
        device => Arc::new(CpalSinkFactory::new(device.map(str::to_string))),
    };

    let session = Session::start(config, sinks).context("Failed to start session")?;
    tracing::info!("Receiving on {} - press Ctrl+C to stop", session.local_addr());

    let mut stats_timer = tokio::time::interval(STATS_INTERVAL);
    stats_timer.tick().await;
    let mut reported_playback_loss = false;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("Failed to listen for Ctrl+C")?;
                tracing::info!("Shutdown requested");
                break;
            }
            _ = stats_timer.tick() => {
                let stats = session.stats();
                tracing::info!(
                    "Receiver: {} datagrams, {} frames, {} malformed, {} oversized, {} read errors",
                    stats.receiver.datagrams,
                    stats.receiver.frames,
                    stats.receiver.malformed,
                    stats.receiver.oversized,
                    stats.receiver.read_errors
                );
                tracing::info!(
                    "Jitter buffer: level {}/{}, {} played, {} silence ({:.1}% underrun), {} late, {} duplicate, {} evicted, {} resyncs",
                    stats.jitter.level,
                    stats.jitter.max_span,
                    stats.jitter.played,
                    stats.jitter.silence,
                    stats.jitter.underrun_rate() * 100.0,
                    stats.jitter.late,
                    stats.jitter.duplicate,
                    stats.jitter.evicted,
                    stats.jitter.resyncs
                );
                tracing::debug!("Stats: {}", serde_json::to_string(&stats)?);

                if !session.is_playing() && !reported_playback_loss {
                    reported_playback_loss = true;
                    tracing::error!("Playback has stopped; still draining the network");
                }
                if !session.is_receiving() {
                    tracing::error!("Receiver has stopped, shutting down");
                    break;
                }
            }
        }
    }

    let final_stats = session.stats();
    println!("{}", serde_json::to_string_pretty(&final_stats)?);
    session.stop().context("Session ended with an error")?;

    Ok(())
}
