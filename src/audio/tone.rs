//! Sine tone generator for the test producer and the device check

use std::f32::consts::TAU;

/// Continuous-phase sine generator writing interleaved samples
#[derive(Debug, Clone)]
pub struct SineTone {
    frequency: f32,
    sample_rate: u32,
    channels: u16,
    amplitude: f32,
    phase: f32,
}

impl SineTone {
    pub fn new(frequency: f32, sample_rate: u32, channels: u16) -> Self {
        Self {
            frequency,
            sample_rate,
            channels,
            amplitude: 0.5,
            phase: 0.0,
        }
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Fill `out` with whole sample frames; the same value goes to every channel
    pub fn fill(&mut self, out: &mut [f32]) {
        let step = TAU * self.frequency / self.sample_rate as f32;

        for frame in out.chunks_mut(self.channels as usize) {
            let value = self.phase.sin() * self.amplitude;
            frame.fill(value);

            self.phase += step;
            if self.phase >= TAU {
                self.phase -= TAU;
            }
        }
    }

    /// Next `frames` sample frames as a new interleaved buffer
    pub fn next_chunk(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * self.channels as usize];
        self.fill(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_carry_same_value() {
        let mut tone = SineTone::new(440.0, 48000, 2);
        let chunk = tone.next_chunk(64);

        assert_eq!(chunk.len(), 128);
        for frame in chunk.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn test_phase_continues_across_chunks() {
        let mut split = SineTone::new(1000.0, 48000, 1);
        let mut whole = SineTone::new(1000.0, 48000, 1);

        let mut joined = split.next_chunk(100);
        joined.extend(split.next_chunk(100));
        let reference = whole.next_chunk(200);

        for (a, b) in joined.iter().zip(&reference) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_amplitude_bound() {
        let mut tone = SineTone::new(440.0, 44100, 1).with_amplitude(0.25);
        assert!(tone.next_chunk(44100).iter().all(|s| s.abs() <= 0.25));
    }
}
