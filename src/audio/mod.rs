//! Audio subsystem module

pub mod buffer;
pub mod cpal_sink;
pub mod device;
pub mod playback;
pub mod sink;
pub mod tone;

pub use buffer::{AudioFrame, JitterBuffer, Playout, PushOutcome, SharedJitterBuffer};
pub use cpal_sink::{CpalSink, CpalSinkFactory};
pub use device::{get_output_device, list_devices, AudioDeviceInfo};
pub use playback::{PlaybackLoop, PlaybackSnapshot, PlaybackStats};
pub use sink::{NullSinkFactory, Sink, SinkFactory, SinkGuard};
pub use tone::SineTone;
