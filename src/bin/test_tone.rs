//! Plays a two second 440 Hz tone to check an output device.
//!
//! Usage: `test-tone [device] [sample_rate] [channels]`

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use udp_pcm_receiver::{
    audio::{CpalSinkFactory, SineTone, SinkFactory, SinkGuard},
    constants::{DEFAULT_CHANNELS, DEFAULT_CHUNK_SIZE, DEFAULT_SAMPLE_RATE},
};

const TONE_HZ: f32 = 440.0;
const TONE_SECONDS: u32 = 2;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let device = args.next();
    let sample_rate: u32 = match args.next() {
        Some(rate) => rate.parse().context("Invalid sample rate")?,
        None => DEFAULT_SAMPLE_RATE,
    };
    let channels: u16 = match args.next() {
        Some(ch) => ch.parse().context("Invalid channel count")?,
        None => DEFAULT_CHANNELS,
    };

    let factory = CpalSinkFactory::new(device);
    tracing::info!("Playing a test tone on {}", factory.describe());

    let mut sink = SinkGuard::open(&factory, sample_rate, channels, DEFAULT_CHUNK_SIZE)?;
    let mut tone = SineTone::new(TONE_HZ, sample_rate, channels);

    let total_frames = (sample_rate * TONE_SECONDS) as usize;
    let mut written = 0;
    while written < total_frames {
        let frames = DEFAULT_CHUNK_SIZE.min(total_frames - written);
        sink.write(&tone.next_chunk(frames))?;
        written += frames;
    }

    // Let the queued chunks drain before the stream is closed
    std::thread::sleep(std::time::Duration::from_millis(200));
    sink.close();

    Ok(())
}
