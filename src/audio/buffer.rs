//! Sequence-aware jitter buffer
//!
//! Sits between the receiver thread (bursty, reordered, lossy arrivals) and
//! the playback thread (one pop per device tick). Frames are keyed by their
//! sender-assigned sequence number; the playback cursor advances by exactly
//! one on every pop, whether a frame or silence comes out.
//!
//! Latency is bounded: the newest frame may never be more than `max_span`
//! frames ahead of the cursor. When a push would exceed that, the cursor is
//! forced forward and whatever it skips over is evicted.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::JitterConfig;

/// Audio frame containing interleaved samples
#[derive(Clone, Debug, PartialEq)]
pub struct AudioFrame {
    /// Sender-assigned sequence number
    pub sequence: u64,
    /// Interleaved audio samples (f32, not clamped)
    pub samples: Vec<f32>,
    /// Number of channels
    pub channels: u16,
}

impl AudioFrame {
    pub fn new(sequence: u64, samples: Vec<f32>, channels: u16) -> Self {
        Self {
            sequence,
            samples,
            channels,
        }
    }

    /// Get number of samples per channel
    pub fn samples_per_channel(&self) -> usize {
        self.samples.len() / self.channels as usize
    }
}

/// What the playback thread gets for one tick
#[derive(Clone, Debug, PartialEq)]
pub enum Playout {
    /// The frame at the cursor
    Frame(AudioFrame),
    /// Nothing at the cursor; `samples` interleaved zeros stand in for it
    Silence { samples: usize },
}

impl Playout {
    pub fn is_silence(&self) -> bool {
        matches!(self, Playout::Silence { .. })
    }
}

/// Result of [`JitterBuffer::push`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Stored; `evicted` unplayed frames were dropped to keep the span bounded
    Inserted { evicted: u64 },
    /// Behind the cursor, dropped
    Late,
    /// Slot already taken, dropped (first arrival wins)
    Duplicate,
    /// Too many consecutive late frames: buffer cleared and re-anchored on
    /// this frame, which was stored
    Resynced,
}

/// Jitter buffer for frame reordering
pub struct JitterBuffer {
    /// Pending frames, all at or ahead of the cursor
    frames: BTreeMap<u64, AudioFrame>,
    /// Maximum `newest - cursor + 1`
    max_span: u64,
    /// Ticks between the first frame and its playout
    prefill: u64,
    /// Consecutive late frames that trigger a resync (0 = never)
    resync_after: u32,
    /// Interleaved sample count of a silence chunk
    silence_samples: usize,
    /// Playback cursor; `None` until the first frame anchors it
    next_sequence: Option<u64>,
    consecutive_late: u32,
    stats: JitterBufferStats,
}

impl JitterBuffer {
    /// Create a new jitter buffer
    ///
    /// `silence_samples` is the interleaved length of one playback chunk.
    pub fn new(max_span: u64, silence_samples: usize) -> Self {
        assert!(max_span > 0, "max_span must be at least 1");

        Self {
            frames: BTreeMap::new(),
            max_span,
            prefill: 0,
            resync_after: 0,
            silence_samples,
            next_sequence: None,
            consecutive_late: 0,
            stats: JitterBufferStats {
                max_span,
                ..Default::default()
            },
        }
    }

    pub fn from_config(config: &JitterConfig, silence_samples: usize) -> Self {
        Self::new(config.max_span, silence_samples)
            .with_prefill(config.prefill)
            .with_resync_after(config.resync_after)
    }

    /// Start playback `prefill` ticks behind the first frame
    pub fn with_prefill(mut self, prefill: u64) -> Self {
        assert!(prefill < self.max_span, "prefill must be below max_span");
        self.prefill = prefill;
        self
    }

    pub fn with_resync_after(mut self, resync_after: u32) -> Self {
        self.resync_after = resync_after;
        self
    }

    /// Anchor the cursor explicitly instead of on the first frame
    pub fn starting_at(mut self, sequence: u64) -> Self {
        self.next_sequence = Some(sequence);
        self
    }

    /// Insert a frame under its sequence number
    pub fn push(&mut self, frame: AudioFrame) -> PushOutcome {
        self.stats.pushed += 1;
        let seq = frame.sequence;

        let cursor = match self.next_sequence {
            Some(cursor) => cursor,
            None => self.anchor(seq),
        };

        if seq < cursor {
            self.consecutive_late += 1;

            if self.resync_after > 0 && self.consecutive_late >= self.resync_after {
                tracing::warn!(
                    "{} consecutive late frames (seq {} behind cursor {}), resyncing",
                    self.consecutive_late,
                    seq,
                    cursor
                );
                self.reset();
                self.stats.resyncs += 1;
                self.anchor(seq);
                self.frames.insert(seq, frame);
                self.stats.inserted += 1;
                return PushOutcome::Resynced;
            }

            self.stats.late += 1;
            tracing::debug!("Discarding late frame: seq={} (cursor={})", seq, cursor);
            return PushOutcome::Late;
        }
        self.consecutive_late = 0;

        if self.frames.contains_key(&seq) {
            self.stats.duplicate += 1;
            tracing::trace!("Discarding duplicate frame: seq={}", seq);
            return PushOutcome::Duplicate;
        }

        let evicted = self.make_room_for(seq, cursor);
        self.frames.insert(seq, frame);
        self.stats.inserted += 1;

        PushOutcome::Inserted { evicted }
    }

    /// Take the frame for the next tick, or silence if it never arrived.
    ///
    /// Never blocks and never fails. Until the first frame anchors the
    /// cursor this returns silence without advancing anything. Playing the
    /// last representable sequence number un-anchors the cursor, so the
    /// next frame starts a new stream.
    pub fn pop_for_playback(&mut self) -> Playout {
        let Some(cursor) = self.next_sequence else {
            self.stats.idle += 1;
            return self.silence();
        };

        self.next_sequence = cursor.checked_add(1);
        if self.next_sequence.is_none() {
            tracing::warn!("Sequence space exhausted at {}, waiting for a new stream", cursor);
        }

        match self.frames.remove(&cursor) {
            Some(frame) => {
                self.stats.played += 1;
                Playout::Frame(frame)
            }
            None => {
                self.stats.silence += 1;
                tracing::trace!("Underrun at seq {}", cursor);
                self.silence()
            }
        }
    }

    fn silence(&self) -> Playout {
        Playout::Silence {
            samples: self.silence_samples,
        }
    }

    fn anchor(&mut self, first_seq: u64) -> u64 {
        let cursor = first_seq.saturating_sub(self.prefill);
        tracing::debug!(
            "Jitter buffer anchored: first seq {}, playback starts at {}",
            first_seq,
            cursor
        );
        self.next_sequence = Some(cursor);
        cursor
    }

    /// Force the cursor forward so that `seq` fits within `max_span`.
    /// Returns the number of buffered frames dropped.
    fn make_room_for(&mut self, seq: u64, cursor: u64) -> u64 {
        if seq - cursor < self.max_span {
            return 0;
        }

        let new_cursor = seq - (self.max_span - 1);
        let kept = self.frames.split_off(&new_cursor);
        let evicted = self.frames.len() as u64;
        self.frames = kept;
        self.next_sequence = Some(new_cursor);

        self.stats.evicted += evicted;
        self.stats.skipped += (new_cursor - cursor) - evicted;

        tracing::debug!(
            "Span exceeded by seq {}: cursor {} -> {}, {} frames evicted",
            seq,
            cursor,
            new_cursor,
            evicted
        );

        evicted
    }

    /// Drop everything and wait for the next frame to anchor the cursor
    pub fn reset(&mut self) {
        self.frames.clear();
        self.next_sequence = None;
        self.consecutive_late = 0;
    }

    /// Set the next expected sequence (for sync)
    pub fn set_next_sequence(&mut self, seq: u64) {
        self.reset();
        self.next_sequence = Some(seq);
    }

    /// Current playback cursor
    pub fn cursor(&self) -> Option<u64> {
        self.next_sequence
    }

    /// Oldest buffered sequence number
    pub fn lowest_sequence(&self) -> Option<u64> {
        self.frames.keys().next().copied()
    }

    /// Newest buffered sequence number
    pub fn highest_sequence(&self) -> Option<u64> {
        self.frames.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn max_span(&self) -> u64 {
        self.max_span
    }

    /// Get statistics
    pub fn stats(&self) -> JitterBufferStats {
        JitterBufferStats {
            level: self.frames.len(),
            next_sequence: self.next_sequence,
            ..self.stats.clone()
        }
    }
}

/// Jitter buffer statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JitterBufferStats {
    pub level: usize,
    pub max_span: u64,
    pub next_sequence: Option<u64>,
    /// Frames offered to `push`
    pub pushed: u64,
    pub inserted: u64,
    pub late: u64,
    pub duplicate: u64,
    /// Unplayed frames dropped by a forced cursor advance
    pub evicted: u64,
    /// Empty slots jumped over by a forced cursor advance
    pub skipped: u64,
    pub played: u64,
    /// Underruns after anchoring
    pub silence: u64,
    /// Pops before the first frame arrived
    pub idle: u64,
    pub resyncs: u64,
}

impl JitterBufferStats {
    /// Fraction of anchored ticks that had to play silence
    pub fn underrun_rate(&self) -> f32 {
        let ticks = self.played + self.silence;
        if ticks == 0 {
            0.0
        } else {
            self.silence as f32 / ticks as f32
        }
    }
}

/// Thread-safe handle shared by the receiver and playback threads.
///
/// The lock is held only for the map mutation, never across I/O.
#[derive(Clone)]
pub struct SharedJitterBuffer {
    inner: Arc<Mutex<JitterBuffer>>,
}

impl SharedJitterBuffer {
    pub fn new(buffer: JitterBuffer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(buffer)),
        }
    }

    pub fn push(&self, frame: AudioFrame) -> PushOutcome {
        self.inner.lock().push(frame)
    }

    pub fn pop_for_playback(&self) -> Playout {
        self.inner.lock().pop_for_playback()
    }

    pub fn stats(&self) -> JitterBufferStats {
        self.inner.lock().stats()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHUNK: usize = 4;

    fn frame(seq: u64) -> AudioFrame {
        AudioFrame::new(seq, vec![seq as f32; CHUNK], 1)
    }

    fn played_seq(playout: Playout) -> Option<u64> {
        match playout {
            Playout::Frame(f) => Some(f.sequence),
            Playout::Silence { samples } => {
                assert_eq!(samples, CHUNK);
                None
            }
        }
    }

    #[test]
    fn test_reorders() {
        let mut jitter = JitterBuffer::new(8, CHUNK).starting_at(3);

        for seq in [5, 3, 4] {
            assert_eq!(jitter.push(frame(seq)), PushOutcome::Inserted { evicted: 0 });
        }

        assert_eq!(played_seq(jitter.pop_for_playback()), Some(3));
        assert_eq!(played_seq(jitter.pop_for_playback()), Some(4));
        assert_eq!(played_seq(jitter.pop_for_playback()), Some(5));
        assert!(jitter.is_empty());
    }

    #[test]
    fn test_gap_plays_silence() {
        let mut jitter = JitterBuffer::new(8, CHUNK).starting_at(3);
        jitter.push(frame(3));
        jitter.push(frame(5));

        assert_eq!(played_seq(jitter.pop_for_playback()), Some(3));
        assert_eq!(played_seq(jitter.pop_for_playback()), None);
        assert_eq!(played_seq(jitter.pop_for_playback()), Some(5));

        let stats = jitter.stats();
        assert_eq!(stats.played, 2);
        assert_eq!(stats.silence, 1);
        assert_eq!(stats.next_sequence, Some(6));
    }

    #[test]
    fn test_duplicate_first_wins() {
        let mut jitter = JitterBuffer::new(8, CHUNK).starting_at(7);
        let first = AudioFrame::new(7, vec![1.0; CHUNK], 1);
        let second = AudioFrame::new(7, vec![2.0; CHUNK], 1);

        assert!(matches!(jitter.push(first.clone()), PushOutcome::Inserted { .. }));
        assert_eq!(jitter.push(second), PushOutcome::Duplicate);
        assert_eq!(jitter.len(), 1);

        assert_eq!(jitter.pop_for_playback(), Playout::Frame(first));
        assert!(jitter.pop_for_playback().is_silence());
        assert_eq!(jitter.stats().duplicate, 1);
    }

    #[test]
    fn test_late_frame_dropped() {
        let mut jitter = JitterBuffer::new(8, CHUNK).starting_at(10);
        jitter.pop_for_playback();
        jitter.pop_for_playback();

        assert_eq!(jitter.push(frame(11)), PushOutcome::Late);
        assert_eq!(jitter.push(frame(3)), PushOutcome::Late);
        assert!(jitter.is_empty());
        assert_eq!(jitter.stats().late, 2);
    }

    #[test]
    fn test_span_bounded_without_consumer() {
        let span = 5;
        let mut jitter = JitterBuffer::new(span, CHUNK).starting_at(0);
        let mut lowest = 0;

        for seq in 0..2 * span {
            jitter.push(frame(seq));
            assert!(jitter.len() as u64 <= span);

            let now_lowest = jitter.lowest_sequence().unwrap();
            assert!(now_lowest >= lowest);
            lowest = now_lowest;
        }

        assert_eq!(jitter.lowest_sequence(), Some(span));
        assert_eq!(jitter.cursor(), Some(span));
        assert_eq!(jitter.stats().evicted, span);
    }

    #[test]
    fn test_far_jump_evicts_and_skips() {
        let mut jitter = JitterBuffer::new(4, CHUNK).starting_at(0);
        jitter.push(frame(0));
        jitter.push(frame(1));

        assert_eq!(jitter.push(frame(100)), PushOutcome::Inserted { evicted: 2 });
        assert_eq!(jitter.cursor(), Some(97));
        assert_eq!(jitter.len(), 1);

        let stats = jitter.stats();
        assert_eq!(stats.evicted, 2);
        assert_eq!(stats.skipped, 95);
    }

    #[test]
    fn test_anchor_with_prefill() {
        let mut jitter = JitterBuffer::new(8, CHUNK).with_prefill(2);
        assert!(jitter.pop_for_playback().is_silence());
        assert_eq!(jitter.cursor(), None);

        jitter.push(frame(100));
        assert_eq!(jitter.cursor(), Some(98));

        // A frame just before the first one still makes it
        assert!(matches!(jitter.push(frame(99)), PushOutcome::Inserted { .. }));

        assert_eq!(played_seq(jitter.pop_for_playback()), None);
        assert_eq!(played_seq(jitter.pop_for_playback()), Some(99));
        assert_eq!(played_seq(jitter.pop_for_playback()), Some(100));

        let stats = jitter.stats();
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.silence, 1);
    }

    #[test]
    fn test_prefill_saturates_at_zero() {
        let mut jitter = JitterBuffer::new(8, CHUNK).with_prefill(3);
        jitter.push(frame(1));
        assert_eq!(jitter.cursor(), Some(0));
    }

    #[test]
    fn test_resync_after_sender_restart() {
        let mut jitter = JitterBuffer::new(8, CHUNK).with_resync_after(3);
        jitter.push(frame(1000));
        jitter.pop_for_playback();

        assert_eq!(jitter.push(frame(0)), PushOutcome::Late);
        assert_eq!(jitter.push(frame(1)), PushOutcome::Late);
        assert_eq!(jitter.push(frame(2)), PushOutcome::Resynced);

        assert_eq!(jitter.cursor(), Some(2));
        assert_eq!(played_seq(jitter.pop_for_playback()), Some(2));

        let stats = jitter.stats();
        assert_eq!(stats.resyncs, 1);
        assert_eq!(stats.late, 2);
    }

    #[test]
    fn test_late_run_interrupted() {
        let mut jitter = JitterBuffer::new(8, CHUNK).with_resync_after(2).starting_at(10);

        assert_eq!(jitter.push(frame(1)), PushOutcome::Late);
        assert!(matches!(jitter.push(frame(11)), PushOutcome::Inserted { .. }));
        assert_eq!(jitter.push(frame(2)), PushOutcome::Late);
        assert_eq!(jitter.stats().resyncs, 0);
    }

    #[test]
    fn test_set_next_sequence() {
        let mut jitter = JitterBuffer::new(8, CHUNK).starting_at(0);
        jitter.push(frame(1));
        jitter.set_next_sequence(50);

        assert!(jitter.is_empty());
        assert_eq!(jitter.cursor(), Some(50));
    }

    #[test]
    fn test_cursor_at_end_of_sequence_space() {
        let mut jitter = JitterBuffer::new(8, CHUNK).with_prefill(3);
        jitter.push(frame(u64::MAX));
        assert_eq!(jitter.cursor(), Some(u64::MAX - 3));

        for _ in 0..3 {
            assert_eq!(played_seq(jitter.pop_for_playback()), None);
        }
        assert_eq!(played_seq(jitter.pop_for_playback()), Some(u64::MAX));
        assert_eq!(jitter.cursor(), None);

        // Popping past the end plays idle silence instead of wrapping
        assert!(jitter.pop_for_playback().is_silence());
        assert!(jitter.pop_for_playback().is_silence());
        assert_eq!(jitter.stats().idle, 2);

        // The next frame anchors a fresh stream
        jitter.push(frame(0));
        assert_eq!(jitter.cursor(), Some(0));
        assert_eq!(played_seq(jitter.pop_for_playback()), Some(0));
    }

    #[test]
    fn test_far_jump_to_end_of_sequence_space() {
        let mut jitter = JitterBuffer::new(4, CHUNK).starting_at(0);
        jitter.push(frame(0));

        assert_eq!(
            jitter.push(frame(u64::MAX)),
            PushOutcome::Inserted { evicted: 1 }
        );
        assert_eq!(jitter.cursor(), Some(u64::MAX - 3));

        let played: Vec<_> = (0..6).map(|_| played_seq(jitter.pop_for_playback())).collect();
        assert_eq!(played, vec![None, None, None, Some(u64::MAX), None, None]);
    }

    #[test]
    fn test_underrun_rate() {
        let stats = JitterBufferStats {
            played: 3,
            silence: 1,
            ..Default::default()
        };
        assert_eq!(stats.underrun_rate(), 0.25);
        assert_eq!(JitterBufferStats::default().underrun_rate(), 0.0);
    }
}
