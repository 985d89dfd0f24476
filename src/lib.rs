//! # UDP PCM Receiver
//!
//! Jitter-buffered playback of raw float32 PCM received over UDP.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                               SESSION                                 │
//! │                                                                       │
//! │   UDP datagrams                                                       │
//! │   [Seq u64 BE | f32 LE samples...]                                    │
//! │          │                                                            │
//! │          ▼                                                            │
//! │  ┌──────────────────────┐                                             │
//! │  │ Receiver thread      │  network::receiver                          │
//! │  │  recv -> FrameCodec  │  (owns the socket)                          │
//! │  └──────────┬───────────┘                                             │
//! │             │ push(frame)                                             │
//! │             ▼                                                         │
//! │  ┌──────────────────────────────────────────────┐                     │
//! │  │ SharedJitterBuffer   audio::buffer           │                     │
//! │  │   seq -> frame, bounded by max_span          │                     │
//! │  │   late / duplicate dropped, oldest evicted   │                     │
//! │  └──────────┬───────────────────────────────────┘                     │
//! │             │ pop_for_playback() -> Frame | Silence                   │
//! │             ▼                                                         │
//! │  ┌──────────────────────┐      ┌──────────────────────┐               │
//! │  │ Playback thread      │ ───▶ │ Sink (cpal / null)   │               │
//! │  │  paced by sink write │      │  audio::sink         │               │
//! │  └──────────────────────┘      └──────────────────────┘               │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod network;
pub mod session;

pub use error::{Error, Result};
pub use session::{Session, SessionStats};

/// Application-wide constants
pub mod constants {
    /// Default sample rate for audio processing
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Default channel count (mono)
    pub const DEFAULT_CHANNELS: u16 = 1;

    /// Default frames per playback tick
    pub const DEFAULT_CHUNK_SIZE: usize = 256;

    /// Default bind address
    pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

    /// Default UDP port for audio streaming
    pub const DEFAULT_UDP_PORT: u16 = 8888;

    /// Default socket read timeout in milliseconds
    pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;

    /// Default jitter buffer span in frames
    pub const DEFAULT_JITTER_MAX_SPAN: u64 = 8;

    /// Default playout delay behind the first frame, in frames
    pub const DEFAULT_JITTER_PREFILL: u64 = 3;

    /// Default run of late frames that forces a resync
    pub const DEFAULT_RESYNC_AFTER: u32 = 50;

    /// Maximum packet size for UDP
    pub const MAX_PACKET_SIZE: usize = 1472; // MTU - IP/UDP headers

    /// Receive buffer size; anything above max_frame_bytes is rejected anyway
    pub const MAX_DATAGRAM_SIZE: usize = 65536;
}
