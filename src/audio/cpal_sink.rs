//! cpal output device sink
//!
//! cpal drives playback with a pull callback; the sink turns that into a
//! blocking push interface. Samples go into a preallocated lock-free ring
//! that the device callback drains. A full ring blocks the writer until the
//! callback has consumed some of it and woken the writer.
//!
//! The callback never allocates: it copies out of the ring, zero-fills any
//! shortfall and signals through a preallocated channel slot.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::audio::device::get_output_device;
use crate::audio::sink::{Sink, SinkFactory};
use crate::error::AudioError;

/// Chunks buffered between the writer and the device callback
const QUEUE_CHUNKS: usize = 2;

/// A write blocked longer than this means the device has stalled
const DEVICE_STALL_TIMEOUT: Duration = Duration::from_secs(1);

/// Opens [`CpalSink`]s on a configured output device
#[derive(Debug, Clone, Default)]
pub struct CpalSinkFactory {
    device_id: Option<String>,
}

impl CpalSinkFactory {
    pub fn new(device_id: Option<String>) -> Self {
        Self { device_id }
    }
}

impl SinkFactory for CpalSinkFactory {
    fn open(
        &self,
        sample_rate: u32,
        channels: u16,
        chunk_size: usize,
    ) -> Result<Box<dyn Sink>, AudioError> {
        let sink = CpalSink::open(self.device_id.as_deref(), sample_rate, channels, chunk_size)?;
        Ok(Box::new(sink))
    }

    fn describe(&self) -> String {
        match &self.device_id {
            Some(id) => format!("output device {}", id),
            None => "default output device".to_string(),
        }
    }
}

/// Copy as much of `ring` as fits into `out`, then zero the rest.
/// Returns the number of samples taken from the ring.
fn drain_into(ring: &mut rtrb::Consumer<f32>, out: &mut [f32]) -> usize {
    let filled = match ring.read_chunk(ring.slots().min(out.len())) {
        Ok(chunk) => {
            let (first, second) = chunk.as_slices();
            let n = first.len() + second.len();
            out[..first.len()].copy_from_slice(first);
            out[first.len()..n].copy_from_slice(second);
            chunk.commit_all();
            n
        }
        Err(_) => 0,
    };
    out[filled..].fill(0.0);
    filled
}

/// Blocking writer in front of a cpal output stream
pub struct CpalSink {
    stream: Option<cpal::Stream>,
    ring: Option<rtrb::Producer<f32>>,
    /// Signalled by the callback after it consumes samples
    wake_rx: Receiver<()>,
    error_rx: Receiver<AudioError>,
    device_name: String,
}

impl CpalSink {
    pub fn open(
        device_id: Option<&str>,
        sample_rate: u32,
        channels: u16,
        chunk_size: usize,
    ) -> Result<Self, AudioError> {
        let device = get_output_device(device_id)
            .map_err(|e| AudioError::SinkOpenFailed(e.to_string()))?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let capacity = (chunk_size * channels as usize * QUEUE_CHUNKS).max(1);
        let (ring_tx, mut ring_rx) = rtrb::RingBuffer::<f32>::new(capacity);
        let (wake_tx, wake_rx) = bounded::<()>(1);
        let (error_tx, error_rx) = bounded::<AudioError>(16);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if drain_into(&mut ring_rx, data) > 0 {
                        let _ = wake_tx.try_send(());
                    }
                },
                move |err| {
                    let _ = error_tx.try_send(AudioError::StreamError(err.to_string()));
                },
                None,
            )
            .map_err(|e| {
                AudioError::SinkOpenFailed(format!(
                    "{} ({} Hz, {} ch): {}",
                    device_name, sample_rate, channels, e
                ))
            })?;

        stream
            .play()
            .map_err(|e| AudioError::SinkOpenFailed(e.to_string()))?;

        tracing::info!(
            "Opened output {}: {} Hz, {} channels, {} frames/chunk",
            device_name,
            sample_rate,
            channels,
            chunk_size
        );

        Ok(Self {
            stream: Some(stream),
            ring: Some(ring_tx),
            wake_rx,
            error_rx,
            device_name,
        })
    }
}

impl Sink for CpalSink {
    fn write(&mut self, samples: &[f32]) -> Result<(), AudioError> {
        if let Ok(err) = self.error_rx.try_recv() {
            return Err(AudioError::SinkWriteFailed(err.to_string()));
        }

        let ring = self.ring.as_mut().ok_or(AudioError::SinkClosed)?;
        let deadline = Instant::now() + DEVICE_STALL_TIMEOUT;
        let mut remaining = samples;

        while !remaining.is_empty() {
            let n = ring.slots().min(remaining.len());
            if n > 0 {
                let chunk = ring
                    .write_chunk_uninit(n)
                    .map_err(|e| AudioError::SinkWriteFailed(e.to_string()))?;
                let written = chunk.fill_from_iter(remaining[..n].iter().copied());
                remaining = &remaining[written..];
                continue;
            }

            match self.wake_rx.recv_deadline(deadline) {
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout) => {
                    return Err(AudioError::SinkWriteFailed(format!(
                        "{} did not accept audio within {:?}",
                        self.device_name, DEVICE_STALL_TIMEOUT
                    )));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(AudioError::SinkWriteFailed(format!(
                        "{} output stream has stopped",
                        self.device_name
                    )));
                }
            }
        }

        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
            tracing::debug!("Closed output {}", self.device_name);
        }
        self.ring = None;
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.close();
    }
}
