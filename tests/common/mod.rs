#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use udp_pcm_receiver::audio::{Sink, SinkFactory};
use udp_pcm_receiver::config::AppConfig;
use udp_pcm_receiver::error::AudioError;

/// Shared record of everything written to sinks opened by [`RecordingFactory`]
#[derive(Default)]
pub struct Recording {
    pub chunks: Mutex<Vec<Vec<f32>>>,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub fail_writes: AtomicBool,
    pub fail_opens: AtomicBool,
}

impl Recording {
    /// First sample of every non-silent chunk, in write order
    pub fn played_markers(&self) -> Vec<f32> {
        self.chunks
            .lock()
            .iter()
            .filter(|c| c.iter().any(|&s| s != 0.0))
            .map(|c| c[0])
            .collect()
    }
}

pub struct RecordingSink {
    recording: Arc<Recording>,
    tick: Duration,
    closed: bool,
}

impl Sink for RecordingSink {
    fn write(&mut self, samples: &[f32]) -> Result<(), AudioError> {
        if self.closed {
            return Err(AudioError::SinkClosed);
        }
        if self.recording.fail_writes.load(Ordering::SeqCst) {
            return Err(AudioError::SinkWriteFailed("device unplugged".into()));
        }
        thread::sleep(self.tick);
        self.recording.chunks.lock().push(samples.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.recording.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Opens recording sinks that take `tick` per write, standing in for a device clock
pub struct RecordingFactory {
    pub recording: Arc<Recording>,
    pub tick: Duration,
}

impl RecordingFactory {
    pub fn new(tick: Duration) -> (Arc<Self>, Arc<Recording>) {
        let recording = Arc::new(Recording::default());
        let factory = Arc::new(Self {
            recording: recording.clone(),
            tick,
        });
        (factory, recording)
    }
}

impl SinkFactory for RecordingFactory {
    fn open(&self, _: u32, _: u16, _: usize) -> Result<Box<dyn Sink>, AudioError> {
        self.recording.opens.fetch_add(1, Ordering::SeqCst);
        if self.recording.fail_opens.load(Ordering::SeqCst) {
            return Err(AudioError::SinkOpenFailed("no device".into()));
        }
        Ok(Box::new(RecordingSink {
            recording: self.recording.clone(),
            tick: self.tick,
            closed: false,
        }))
    }

    fn describe(&self) -> String {
        "recording sink".into()
    }
}

/// Loopback config on an ephemeral port with short timeouts
pub fn loopback_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.network.bind_address = "127.0.0.1".into();
    config.network.bind_port = 0;
    config.network.read_timeout_ms = 20;
    config.audio.channels = 1;
    config.audio.chunk_size = 32;
    config.jitter.max_span = 64;
    config.jitter.prefill = 32;
    config
}

pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
