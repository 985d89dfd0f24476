//! Receiver configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file
//! at all) yields a working loopback receiver.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codec::SEQUENCE_HEADER_BYTES;
use crate::constants::*;
use crate::error::{Error, NetworkError, Result};

/// File name looked up in the platform config directory
pub const CONFIG_FILE_NAME: &str = "receiver.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub audio: AudioConfig,
    pub jitter: JitterConfig,
}

/// Socket settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind_address: String,
    pub bind_port: u16,
    /// Datagrams larger than this are rejected
    pub max_frame_bytes: usize,
    /// Upper bound on how long shutdown waits for a blocked read
    pub read_timeout_ms: u64,
    /// SO_RCVBUF override; OS default when unset
    pub recv_buffer_size: Option<usize>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            bind_port: DEFAULT_UDP_PORT,
            max_frame_bytes: MAX_PACKET_SIZE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            recv_buffer_size: None,
        }
    }
}

impl NetworkConfig {
    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, NetworkError> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|_| NetworkError::InvalidAddress(self.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.bind_port))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Output format, fixed for the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames (samples per channel) per playback tick
    pub chunk_size: usize,
    /// Opaque output device id, see [`crate::audio::device::get_output_device`]
    pub device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            device: None,
        }
    }
}

impl AudioConfig {
    /// Interleaved samples in one playback chunk
    pub fn chunk_samples(&self) -> usize {
        self.chunk_size * self.channels as usize
    }

    /// Wall-clock duration of one playback chunk
    pub fn chunk_duration(&self) -> Duration {
        Duration::from_nanos(self.chunk_size as u64 * 1_000_000_000 / self.sample_rate as u64)
    }
}

/// Jitter buffer tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterConfig {
    /// Maximum distance, in frames, between the cursor and the newest frame
    pub max_span: u64,
    /// Ticks of delay between the first frame and its playout
    pub prefill: u64,
    /// Consecutive late frames that trigger a re-anchor; 0 disables
    pub resync_after: u32,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            max_span: DEFAULT_JITTER_MAX_SPAN,
            prefill: DEFAULT_JITTER_PREFILL,
            resync_after: DEFAULT_RESYNC_AFTER,
        }
    }
}

impl AppConfig {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Load `path` if given, else the platform config file if it exists,
    /// else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            tracing::info!("Loading config from {}", path.display());
            return Self::from_file(path);
        }

        if let Some(default_path) = default_config_path() {
            if default_path.is_file() {
                tracing::info!("Loading config from {}", default_path.display());
                return Self::from_file(&default_path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let audio = &self.audio;
        if audio.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be non-zero".into()));
        }
        if audio.channels == 0 {
            return Err(Error::Config("channels must be non-zero".into()));
        }
        if audio.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be non-zero".into()));
        }

        let jitter = &self.jitter;
        if jitter.max_span == 0 {
            return Err(Error::Config("jitter.max_span must be at least 1".into()));
        }
        if jitter.prefill >= jitter.max_span {
            return Err(Error::Config(format!(
                "jitter.prefill ({}) must be smaller than jitter.max_span ({})",
                jitter.prefill, jitter.max_span
            )));
        }

        let min_frame = SEQUENCE_HEADER_BYTES + 4 * audio.channels as usize;
        if self.network.max_frame_bytes < min_frame {
            return Err(Error::Config(format!(
                "max_frame_bytes ({}) is below the smallest valid frame ({} bytes)",
                self.network.max_frame_bytes, min_frame
            )));
        }

        self.network.socket_addr()?;
        Ok(())
    }
}

/// `<config dir>/receiver.toml` for this application, if the platform has one
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "udp-pcm-receiver")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}
