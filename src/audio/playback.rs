//! Playback thread
//!
//! Pops one chunk per iteration from the jitter buffer and writes it to the
//! sink. The loop has no timer of its own: the blocking sink write is what
//! paces it to the device clock.

use crossbeam_channel::bounded;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::audio::buffer::{Playout, SharedJitterBuffer};
use crate::audio::sink::{SinkFactory, SinkGuard};
use crate::config::AudioConfig;
use crate::error::AudioError;

/// Counters updated by the playback thread
#[derive(Debug, Default)]
pub struct PlaybackStats {
    chunks_written: AtomicU64,
    frames_played: AtomicU64,
    silence_chunks: AtomicU64,
    write_failures: AtomicU64,
    sink_reopens: AtomicU64,
    alive: AtomicBool,
}

impl PlaybackStats {
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            chunks_written: self.chunks_written.load(Ordering::Relaxed),
            frames_played: self.frames_played.load(Ordering::Relaxed),
            silence_chunks: self.silence_chunks.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            sink_reopens: self.sink_reopens.load(Ordering::Relaxed),
            alive: self.is_alive(),
        }
    }
}

/// Point-in-time copy of [`PlaybackStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlaybackSnapshot {
    pub chunks_written: u64,
    pub frames_played: u64,
    pub silence_chunks: u64,
    pub write_failures: u64,
    pub sink_reopens: u64,
    pub alive: bool,
}

/// Jitter buffer -> sink pump
pub struct PlaybackLoop {
    buffer: SharedJitterBuffer,
    sinks: Arc<dyn SinkFactory>,
    sample_rate: u32,
    channels: u16,
    chunk_size: usize,
    running: Arc<AtomicBool>,
    stats: Arc<PlaybackStats>,
}

impl PlaybackLoop {
    pub fn new(
        buffer: SharedJitterBuffer,
        sinks: Arc<dyn SinkFactory>,
        audio: &AudioConfig,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            buffer,
            sinks,
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            chunk_size: audio.chunk_size,
            running,
            stats: Arc::new(PlaybackStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<PlaybackStats> {
        self.stats.clone()
    }

    /// Start the playback thread.
    ///
    /// The sink is opened on the new thread; this call waits for the result
    /// so an open failure is reported to the caller.
    pub fn spawn(self) -> Result<JoinHandle<Result<(), AudioError>>, AudioError> {
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let handle = thread::Builder::new()
            .name("pcm-playback".to_string())
            .spawn(move || {
                let sink = match self.open_sink() {
                    Ok(sink) => {
                        self.stats.alive.store(true, Ordering::Relaxed);
                        let _ = ready_tx.send(Ok(()));
                        sink
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.clone()));
                        return Err(e);
                    }
                };
                self.run(sink)
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AudioError::SinkOpenFailed(
                    "playback thread exited during startup".to_string(),
                ))
            }
        }
    }

    fn open_sink(&self) -> Result<SinkGuard, AudioError> {
        SinkGuard::open(
            self.sinks.as_ref(),
            self.sample_rate,
            self.channels,
            self.chunk_size,
        )
    }

    /// Pump until the running flag clears or the sink fails for good.
    ///
    /// A failed write gets one reopen and one retry of the same chunk.
    pub fn run(&self, mut sink: SinkGuard) -> Result<(), AudioError> {
        self.stats.alive.store(true, Ordering::Relaxed);
        tracing::info!("Playback started on {}", self.sinks.describe());

        let chunk_samples = self.chunk_size * self.channels as usize;
        let mut silence = vec![0.0f32; chunk_samples];
        let mut warned_mismatch = false;

        let result = loop {
            if !self.running.load(Ordering::Relaxed) {
                break Ok(());
            }

            let playout = self.buffer.pop_for_playback();
            let samples: &[f32] = match &playout {
                Playout::Frame(frame) => {
                    if frame.samples.len() != chunk_samples && !warned_mismatch {
                        warned_mismatch = true;
                        tracing::warn!(
                            "Frame {} carries {} samples, expected {} per chunk",
                            frame.sequence,
                            frame.samples.len(),
                            chunk_samples
                        );
                    }
                    &frame.samples
                }
                Playout::Silence { samples } => {
                    if silence.len() != *samples {
                        silence.resize(*samples, 0.0);
                    }
                    &silence
                }
            };

            if let Err(e) = sink.write(samples) {
                self.stats.write_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Sink write failed: {}, reopening", e);

                sink.close();
                match self.open_sink() {
                    Ok(reopened) => {
                        sink = reopened;
                        self.stats.sink_reopens.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => break Err(e),
                }

                if let Err(e) = sink.write(samples) {
                    break Err(e);
                }
            }

            self.stats.chunks_written.fetch_add(1, Ordering::Relaxed);
            if playout.is_silence() {
                self.stats.silence_chunks.fetch_add(1, Ordering::Relaxed);
            } else {
                self.stats.frames_played.fetch_add(1, Ordering::Relaxed);
            }
        };

        self.stats.alive.store(false, Ordering::Relaxed);
        match &result {
            Ok(()) => tracing::info!("Playback stopped"),
            Err(e) => tracing::error!(
                "Playback failed: {}. Receiver keeps running; incoming frames will be evicted",
                e
            ),
        }

        result
    }
}
