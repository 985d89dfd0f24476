//! Receiver thread
//!
//! Owns the UDP socket. Each datagram is decoded and pushed into the jitter
//! buffer; a bad datagram is counted and skipped, never fatal.

use parking_lot::Mutex;
use serde::Serialize;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::audio::buffer::{PushOutcome, SharedJitterBuffer};
use crate::codec::FrameCodec;
use crate::constants::MAX_DATAGRAM_SIZE;
use crate::error::{CodecError, NetworkError};

/// Consecutive read errors after which the socket is considered dead
pub const MAX_CONSECUTIVE_READ_ERRORS: u32 = 16;

/// Counters updated by the receiver thread
#[derive(Debug, Default)]
pub struct ReceiverStats {
    datagrams: AtomicU64,
    bytes: AtomicU64,
    frames: AtomicU64,
    malformed: AtomicU64,
    oversized: AtomicU64,
    read_errors: AtomicU64,
    last_peer: Mutex<Option<SocketAddr>>,
    alive: AtomicBool,
}

impl ReceiverStats {
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ReceiverSnapshot {
        ReceiverSnapshot {
            datagrams: self.datagrams.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            oversized: self.oversized.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            last_peer: *self.last_peer.lock(),
            alive: self.is_alive(),
        }
    }
}

/// Point-in-time copy of [`ReceiverStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReceiverSnapshot {
    pub datagrams: u64,
    pub bytes: u64,
    /// Datagrams that decoded into frames
    pub frames: u64,
    pub malformed: u64,
    pub oversized: u64,
    pub read_errors: u64,
    pub last_peer: Option<SocketAddr>,
    pub alive: bool,
}

/// How the loop reacts to a failed read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadFailure {
    /// Timeout or signal; just check the running flag again
    Idle,
    /// Log, count, keep reading
    Transient,
    /// The socket cannot be used any more
    Fatal,
}

fn classify(err: &io::Error) -> ReadFailure {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted => {
            ReadFailure::Idle
        }
        io::ErrorKind::NotConnected
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::InvalidInput
        | io::ErrorKind::Unsupported => ReadFailure::Fatal,
        _ => ReadFailure::Transient,
    }
}

/// Counts back-to-back transient read errors
#[derive(Debug, Default)]
struct ErrorStreak {
    consecutive: u32,
}

impl ErrorStreak {
    fn reset(&mut self) {
        self.consecutive = 0;
    }

    /// Record one failure; true once the socket should be given up on
    fn record(&mut self) -> bool {
        self.consecutive += 1;
        self.consecutive >= MAX_CONSECUTIVE_READ_ERRORS
    }
}

/// Socket -> codec -> jitter buffer pump
pub struct ReceiverLoop {
    socket: UdpSocket,
    codec: FrameCodec,
    buffer: SharedJitterBuffer,
    running: Arc<AtomicBool>,
    stats: Arc<ReceiverStats>,
}

impl ReceiverLoop {
    pub fn new(
        socket: UdpSocket,
        codec: FrameCodec,
        buffer: SharedJitterBuffer,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            socket,
            codec,
            buffer,
            running,
            stats: Arc::new(ReceiverStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<ReceiverStats> {
        self.stats.clone()
    }

    /// Start the receiver thread
    pub fn spawn(self) -> io::Result<JoinHandle<Result<(), NetworkError>>> {
        self.stats.alive.store(true, Ordering::Relaxed);
        let stats = self.stats.clone();

        thread::Builder::new()
            .name("pcm-receiver".to_string())
            .spawn(move || self.run())
            .inspect_err(|_| stats.alive.store(false, Ordering::Relaxed))
    }

    /// Receive until the running flag clears or the socket becomes unusable
    pub fn run(&self) -> Result<(), NetworkError> {
        self.stats.alive.store(true, Ordering::Relaxed);
        if let Ok(addr) = self.socket.local_addr() {
            tracing::info!("Listening for PCM frames on {}", addr);
        }

        let result = self.receive_loop();

        self.stats.alive.store(false, Ordering::Relaxed);
        match &result {
            Ok(()) => tracing::info!("Receiver stopped"),
            Err(e) => tracing::error!("Receiver failed: {}", e),
        }
        result
    }

    fn receive_loop(&self) -> Result<(), NetworkError> {
        let mut recv_buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut errors = ErrorStreak::default();

        while self.running.load(Ordering::Relaxed) {
            match self.socket.recv_from(&mut recv_buf) {
                Ok((len, peer)) => {
                    errors.reset();
                    self.handle_datagram(&recv_buf[..len], peer);
                }
                Err(e) => match classify(&e) {
                    ReadFailure::Idle => continue,
                    ReadFailure::Fatal => {
                        return Err(NetworkError::SocketUnusable(e.to_string()));
                    }
                    ReadFailure::Transient => {
                        self.stats.read_errors.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!("Receive failed: {}", e);

                        if errors.record() {
                            return Err(NetworkError::SocketUnusable(format!(
                                "{} consecutive read errors, last: {}",
                                errors.consecutive, e
                            )));
                        }
                    }
                },
            }
        }

        Ok(())
    }

    fn handle_datagram(&self, data: &[u8], peer: SocketAddr) {
        self.stats.datagrams.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes.fetch_add(data.len() as u64, Ordering::Relaxed);
        self.note_peer(peer);

        let frame = match self.codec.decode(data) {
            Ok(frame) => frame,
            Err(e @ CodecError::FrameTooLarge { .. }) => {
                self.stats.oversized.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Rejected datagram from {}: {}", peer, e);
                return;
            }
            Err(e @ CodecError::MalformedFrame { .. }) => {
                self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Dropped datagram from {}: {}", peer, e);
                return;
            }
        };

        self.stats.frames.fetch_add(1, Ordering::Relaxed);
        if let PushOutcome::Inserted { evicted } = self.buffer.push(frame) {
            if evicted > 0 {
                tracing::debug!("Jitter buffer full, {} unplayed frames evicted", evicted);
            }
        }
    }

    fn note_peer(&self, peer: SocketAddr) {
        let mut last = self.stats.last_peer.lock();
        match *last {
            Some(previous) if previous == peer => {}
            Some(previous) => {
                tracing::warn!(
                    "Sender changed from {} to {}; multiple senders are not supported",
                    previous,
                    peer
                );
                *last = Some(peer);
            }
            None => {
                tracing::info!("Receiving audio from {}", peer);
                *last = Some(peer);
            }
        }
    }
}
