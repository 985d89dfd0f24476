//! Receive/playback session
//!
//! Owns the socket, the jitter buffer and both threads for one stream. No
//! global state: everything lives here from [`Session::start`] until
//! [`Session::stop`] or drop.

use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crate::audio::buffer::{JitterBuffer, JitterBufferStats, SharedJitterBuffer};
use crate::audio::playback::{PlaybackLoop, PlaybackSnapshot, PlaybackStats};
use crate::audio::sink::SinkFactory;
use crate::codec::FrameCodec;
use crate::config::AppConfig;
use crate::error::{AudioError, Error, NetworkError, Result};
use crate::network::receiver::{ReceiverLoop, ReceiverSnapshot, ReceiverStats};
use crate::network::socket::bind_socket;

/// Combined statistics for a running session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub uptime_secs: f64,
    pub local_addr: SocketAddr,
    pub receiver: ReceiverSnapshot,
    pub jitter: JitterBufferStats,
    pub playback: PlaybackSnapshot,
}

/// A running receiver and player
pub struct Session {
    config: AppConfig,
    local_addr: SocketAddr,
    buffer: SharedJitterBuffer,
    running: Arc<AtomicBool>,
    receiver: Option<JoinHandle<std::result::Result<(), NetworkError>>>,
    playback: Option<JoinHandle<std::result::Result<(), AudioError>>>,
    receiver_stats: Arc<ReceiverStats>,
    playback_stats: Arc<PlaybackStats>,
    started_at: Instant,
}

impl Session {
    /// Bind the socket, open the sink and start both threads.
    ///
    /// Fails if the configuration is invalid, the socket cannot be bound or
    /// the sink cannot be opened. Nothing is left running on failure.
    pub fn start(config: AppConfig, sinks: Arc<dyn SinkFactory>) -> Result<Self> {
        config.validate()?;

        let socket = bind_socket(&config.network)?;
        let local_addr = socket.local_addr()?;

        let buffer = SharedJitterBuffer::new(JitterBuffer::from_config(
            &config.jitter,
            config.audio.chunk_samples(),
        ));
        let running = Arc::new(AtomicBool::new(true));

        let playback = PlaybackLoop::new(buffer.clone(), sinks, &config.audio, running.clone());
        let playback_stats = playback.stats();
        let playback_handle = playback.spawn()?;

        let codec = FrameCodec::new(config.audio.channels)
            .with_max_frame_bytes(config.network.max_frame_bytes);
        let receiver = ReceiverLoop::new(socket, codec, buffer.clone(), running.clone());
        let receiver_stats = receiver.stats();
        let receiver_handle = match receiver.spawn() {
            Ok(handle) => handle,
            Err(e) => {
                running.store(false, Ordering::SeqCst);
                let _ = playback_handle.join();
                return Err(e.into());
            }
        };

        tracing::info!(
            "Session started on {}: {} Hz, {} ch, {} frames/chunk, jitter span {} (prefill {})",
            local_addr,
            config.audio.sample_rate,
            config.audio.channels,
            config.audio.chunk_size,
            config.jitter.max_span,
            config.jitter.prefill
        );

        Ok(Self {
            config,
            local_addr,
            buffer,
            running,
            receiver: Some(receiver_handle),
            playback: Some(playback_handle),
            receiver_stats,
            playback_stats,
            started_at: Instant::now(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Address the socket is actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_receiving(&self) -> bool {
        self.receiver_stats.is_alive()
    }

    pub fn is_playing(&self) -> bool {
        self.playback_stats.is_alive()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
            local_addr: self.local_addr,
            receiver: self.receiver_stats.snapshot(),
            jitter: self.buffer.stats(),
            playback: self.playback_stats.snapshot(),
        }
    }

    /// Stop both threads and release the socket and sink.
    ///
    /// Returns the first fatal error either thread ended with.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        let mut first_error: Option<Error> = None;

        if let Some(handle) = self.playback.take() {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first_error.get_or_insert(e.into());
                }
                Err(_) => tracing::error!("Playback thread panicked"),
            }
        }

        if let Some(handle) = self.receiver.take() {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first_error.get_or_insert(e.into());
                }
                Err(_) => tracing::error!("Receiver thread panicked"),
            }
        }

        tracing::info!("Session on {} stopped", self.local_addr);
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.playback.is_some() || self.receiver.is_some() {
            if let Err(e) = self.shutdown() {
                tracing::warn!("Session ended with error: {}", e);
            }
        }
    }
}
