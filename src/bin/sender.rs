//! Test Tone Sender
//!
//! Streams a 440 Hz sine as sequenced PCM frames, one chunk per chunk
//! duration, to a receiver.
//!
//! Usage: `sender [target_addr] [config.toml]`. The audio section of the
//! config (sample rate, channels, chunk size) must match the receiver's.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use udp_pcm_receiver::{
    audio::{AudioFrame, SineTone},
    codec::FrameCodec,
    config::AppConfig,
    constants::{DEFAULT_BIND_ADDRESS, DEFAULT_UDP_PORT},
};

const TONE_HZ: f32 = 440.0;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let target_addr: SocketAddr = args
        .next()
        .unwrap_or_else(|| format!("{}:{}", DEFAULT_BIND_ADDRESS, DEFAULT_UDP_PORT))
        .parse()
        .context("Invalid target address")?;
    let config_path = args.next().map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;
    let audio = config.audio;

    let codec = FrameCodec::new(audio.channels);
    let datagram_len = FrameCodec::encoded_len(audio.chunk_samples());
    if datagram_len > config.network.max_frame_bytes {
        tracing::warn!(
            "Frames are {} bytes, above the receiver's max_frame_bytes of {}",
            datagram_len,
            config.network.max_frame_bytes
        );
    }

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(target_addr).await?;

    tracing::info!(
        "Sending {} Hz tone to {}: {} Hz, {} ch, {} frames ({} bytes) every {:?}",
        TONE_HZ,
        target_addr,
        audio.sample_rate,
        audio.channels,
        audio.chunk_size,
        datagram_len,
        audio.chunk_duration()
    );

    let mut tone = SineTone::new(TONE_HZ, audio.sample_rate, audio.channels);
    let mut ticker = tokio::time::interval(audio.chunk_duration());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    let mut sequence: u64 = 0;
    let mut last_report = Instant::now();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                break;
            }
            _ = ticker.tick() => {
                let frame = AudioFrame::new(sequence, tone.next_chunk(audio.chunk_size), audio.channels);
                if let Err(e) = socket.send(&codec.encode(&frame)).await {
                    tracing::warn!("Failed to send frame {}: {}", sequence, e);
                }
                sequence += 1;

                if last_report.elapsed().as_secs() >= 5 {
                    last_report = Instant::now();
                    tracing::info!("Sent {} frames", sequence);
                }
            }
        }
    }

    tracing::info!("Stopped after {} frames", sequence);
    Ok(())
}
