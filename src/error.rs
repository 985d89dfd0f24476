//! Error types for the PCM receiver

use std::net::SocketAddr;

use thiserror::Error;

/// Main error type for the receiver
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio output errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open sink: {0}")]
    SinkOpenFailed(String),

    #[error("Sink write failed: {0}")]
    SinkWriteFailed(String),

    #[error("Sink is closed")]
    SinkClosed,

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Stream error: {0}")]
    StreamError(String),
}

/// Frame codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed frame ({len} bytes): {reason}")]
    MalformedFrame { len: usize, reason: &'static str },

    #[error("Frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Socket bind to {addr} failed: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),

    #[error("Socket no longer usable: {0}")]
    SocketUnusable(String),
}

/// Result type alias for the receiver
pub type Result<T> = std::result::Result<T, Error>;
