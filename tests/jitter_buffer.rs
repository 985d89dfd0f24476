use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use udp_pcm_receiver::audio::{AudioFrame, JitterBuffer, Playout, PushOutcome, SharedJitterBuffer};

const CHUNK: usize = 16;

fn frame(seq: u64) -> AudioFrame {
    AudioFrame::new(seq, vec![seq as f32; CHUNK], 1)
}

/// Small deterministic PRNG so stress runs are reproducible
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }
}

#[test]
fn ordering_scenario() {
    let mut jitter = JitterBuffer::new(10, CHUNK).starting_at(3);
    for seq in [5, 3, 4] {
        jitter.push(frame(seq));
    }

    let order: Vec<_> = (0..3)
        .map(|_| match jitter.pop_for_playback() {
            Playout::Frame(f) => f.sequence,
            Playout::Silence { .. } => panic!("unexpected silence"),
        })
        .collect();
    assert_eq!(order, vec![3, 4, 5]);
}

#[test]
fn loss_scenario() {
    let mut jitter = JitterBuffer::new(10, CHUNK).starting_at(3);
    jitter.push(frame(3));
    jitter.push(frame(5));

    assert_eq!(jitter.pop_for_playback(), Playout::Frame(frame(3)));
    assert_eq!(jitter.pop_for_playback(), Playout::Silence { samples: CHUNK });
    assert_eq!(jitter.pop_for_playback(), Playout::Frame(frame(5)));
}

proptest! {
    #[test]
    fn span_never_exceeded(span in 1u64..16, pushes in prop::collection::vec(0u64..64, 1..128)) {
        let mut jitter = JitterBuffer::new(span, CHUNK).starting_at(0);
        let mut last_cursor = 0;

        for seq in pushes {
            jitter.push(frame(seq));

            prop_assert!(jitter.len() as u64 <= span);
            let cursor = jitter.cursor().unwrap();
            prop_assert!(cursor >= last_cursor);
            last_cursor = cursor;

            if let (Some(lo), Some(hi)) = (jitter.lowest_sequence(), jitter.highest_sequence()) {
                prop_assert!(lo >= cursor);
                prop_assert!(hi - cursor < span);
            }
        }
    }

    #[test]
    fn backlog_of_twice_the_span(span in 1u64..32) {
        let mut jitter = JitterBuffer::new(span, CHUNK).starting_at(0);
        let mut lowest = 0;

        for seq in 0..2 * span {
            jitter.push(frame(seq));
            prop_assert!(jitter.len() as u64 <= span);

            let now = jitter.lowest_sequence().unwrap();
            prop_assert!(now >= lowest);
            lowest = now;
        }
        prop_assert_eq!(lowest, span);
    }

    #[test]
    fn duplicates_never_replayed(seqs in prop::collection::vec(0u64..8, 1..32)) {
        let mut jitter = JitterBuffer::new(8, CHUNK).starting_at(0);
        for seq in &seqs {
            jitter.push(frame(*seq));
        }

        let mut played = Vec::new();
        for _ in 0..8 {
            if let Playout::Frame(f) = jitter.pop_for_playback() {
                played.push(f.sequence);
            }
        }

        let mut expected: Vec<u64> = seqs.clone();
        expected.sort_unstable();
        expected.dedup();
        prop_assert_eq!(played, expected);
    }
}

#[test]
fn concurrent_push_and_pop_stay_consistent() {
    const FRAMES: u64 = 20_000;

    let buffer = SharedJitterBuffer::new(JitterBuffer::new(8, CHUNK).starting_at(0));
    let producer_done = AtomicBool::new(false);

    let (inserted_seqs, outcomes, (played, emitted_sum)) = thread::scope(|scope| {
        let producer = scope.spawn(|| {
            let mut rng = XorShift(0x9E37_79B9_7F4A_7C15);
            let mut outcomes = [0u64; 3];
            let mut inserted_seqs = BTreeSet::new();

            // Emit in windows of four, shuffled, with occasional duplicates
            for base in (0..FRAMES).step_by(4) {
                let mut window: Vec<u64> = (base..(base + 4).min(FRAMES)).collect();
                for i in (1..window.len()).rev() {
                    window.swap(i, (rng.next() % (i as u64 + 1)) as usize);
                }
                if rng.next() % 5 == 0 {
                    window.push(window[0]);
                }

                for seq in window {
                    let slot = match buffer.push(frame(seq)) {
                        PushOutcome::Inserted { .. } => {
                            assert!(inserted_seqs.insert(seq), "seq {} stored twice", seq);
                            0
                        }
                        PushOutcome::Late => 1,
                        PushOutcome::Duplicate => 2,
                        PushOutcome::Resynced => panic!("resync is disabled"),
                    };
                    outcomes[slot] += 1;
                }

                if rng.next() % 3 == 0 {
                    thread::yield_now();
                }
            }

            producer_done.store(true, Ordering::SeqCst);
            (inserted_seqs, outcomes)
        });

        let consumer = scope.spawn(|| {
            let mut rng = XorShift(0xD1B5_4A32_D192_ED03);
            let mut played = Vec::new();
            let mut emitted_sum = 0f64;

            loop {
                let done = producer_done.load(Ordering::SeqCst);
                match buffer.pop_for_playback() {
                    Playout::Frame(f) => {
                        assert_eq!(f.samples.len(), CHUNK);
                        emitted_sum += f.samples.iter().map(|&s| s as f64).sum::<f64>();
                        played.push(f.sequence);
                    }
                    Playout::Silence { samples } => assert_eq!(samples, CHUNK),
                }

                if done && buffer.is_empty() {
                    break;
                }
                if rng.next() % 2 == 0 {
                    thread::yield_now();
                }
            }
            (played, emitted_sum)
        });

        let (inserted_seqs, outcomes) = producer.join().unwrap();
        (inserted_seqs, outcomes, consumer.join().unwrap())
    });

    // Playback order is strictly increasing: no duplicates, no reordering
    assert!(played.windows(2).all(|w| w[0] < w[1]));

    let stats = buffer.stats();
    let [inserted, late, duplicate] = outcomes;
    assert_eq!(stats.inserted, inserted);
    assert_eq!(stats.late, late);
    assert_eq!(stats.duplicate, duplicate);
    assert_eq!(stats.pushed, inserted + late + duplicate);
    assert_eq!(stats.played, played.len() as u64);
    assert_eq!(stats.level, 0);

    // Every inserted sequence was either played or evicted, never both
    let played_set: BTreeSet<u64> = played.iter().copied().collect();
    assert!(played_set.is_subset(&inserted_seqs));
    assert_eq!(inserted_seqs.len() as u64, stats.inserted);
    assert_eq!(
        (inserted_seqs.len() - played_set.len()) as u64,
        stats.evicted
    );

    // Checksum: each played frame carries CHUNK copies of its sequence, so
    // the emitted samples must sum to exactly that and nothing else
    let expected_sum: f64 = played.iter().map(|&seq| (seq * CHUNK as u64) as f64).sum();
    assert_eq!(emitted_sum, expected_sum);
    assert!(played.iter().all(|&seq| seq < FRAMES));
}
