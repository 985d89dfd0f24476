//! Audio output abstraction
//!
//! A [`SinkFactory`] opens [`Sink`]s; the playback thread owns the sink
//! through a [`SinkGuard`], which closes it on every exit path.

use std::thread;
use std::time::Duration;

use crate::error::AudioError;

/// An open audio output
///
/// Not required to be `Send`: platform streams usually have to stay on the
/// thread that opened them.
pub trait Sink {
    /// Queue interleaved samples, blocking until the device accepts them
    fn write(&mut self, samples: &[f32]) -> Result<(), AudioError>;

    /// Release the device. Safe to call more than once.
    fn close(&mut self);
}

/// Opens sinks; shared with the playback thread
pub trait SinkFactory: Send + Sync {
    fn open(
        &self,
        sample_rate: u32,
        channels: u16,
        chunk_size: usize,
    ) -> Result<Box<dyn Sink>, AudioError>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Owns an open sink and closes it when dropped
pub struct SinkGuard {
    sink: Box<dyn Sink>,
}

impl SinkGuard {
    pub fn new(sink: Box<dyn Sink>) -> Self {
        Self { sink }
    }

    pub fn open(
        factory: &dyn SinkFactory,
        sample_rate: u32,
        channels: u16,
        chunk_size: usize,
    ) -> Result<Self, AudioError> {
        factory
            .open(sample_rate, channels, chunk_size)
            .map(Self::new)
    }

    pub fn write(&mut self, samples: &[f32]) -> Result<(), AudioError> {
        self.sink.write(samples)
    }

    pub fn close(&mut self) {
        self.sink.close();
    }
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        self.sink.close();
    }
}

/// Discards audio in real time, for hosts without an output device
pub struct NullSink {
    sample_rate: u32,
    channels: u16,
    closed: bool,
}

impl Sink for NullSink {
    fn write(&mut self, samples: &[f32]) -> Result<(), AudioError> {
        if self.closed {
            return Err(AudioError::SinkClosed);
        }

        let frames = samples.len() as u64 / self.channels as u64;
        thread::sleep(Duration::from_nanos(
            frames * 1_000_000_000 / self.sample_rate as u64,
        ));
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Opens [`NullSink`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSinkFactory;

impl SinkFactory for NullSinkFactory {
    fn open(
        &self,
        sample_rate: u32,
        channels: u16,
        _chunk_size: usize,
    ) -> Result<Box<dyn Sink>, AudioError> {
        if sample_rate == 0 || channels == 0 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{} Hz, {} channels",
                sample_rate, channels
            )));
        }

        Ok(Box::new(NullSink {
            sample_rate,
            channels,
            closed: false,
        }))
    }

    fn describe(&self) -> String {
        "null sink".to_string()
    }
}
