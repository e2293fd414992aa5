//! Property-based tests for queue, controls and crossfade
//!
//! Uses proptest to check invariants across random operation sequences.

use mood_playback::{
    clamp_rate, clamp_volume, CrossfadeController, EndOfTrack, FadeStep, QueueManager, RepeatMode,
    SyncedLyrics, Track,
};
use proptest::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

// ===== Helpers =====

fn track(id: u8) -> Track {
    Track::new(
        format!("t{id}"),
        format!("Song {id}"),
        "Artist",
        format!("https://cdn.test/{id}.mp3"),
    )
}

fn counts(tracks: &[Track]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for t in tracks {
        *counts.entry(t.id.clone()).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone)]
enum Op {
    Enqueue(u8),
    Dequeue,
    Remove(u8),
    Reorder(usize, usize),
    PushFront(u8),
    Shuffle(bool),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..12).prop_map(Op::Enqueue),
        Just(Op::Dequeue),
        (0u8..12).prop_map(Op::Remove),
        (0usize..16, 0usize..16).prop_map(|(a, b)| Op::Reorder(a, b)),
        (0u8..12).prop_map(Op::PushFront),
        any::<bool>().prop_map(Op::Shuffle),
    ]
}

// ===== Property Tests =====

proptest! {
    /// Property: the queue behaves like a multiset under every operation
    #[test]
    fn queue_matches_model(ops in prop::collection::vec(op(), 0..80), seed in any::<u64>()) {
        let mut queue = QueueManager::with_seed(seed);
        let mut model: Vec<Track> = Vec::new();

        for op in ops {
            match op {
                Op::Enqueue(id) => {
                    queue.enqueue(track(id));
                    model.push(track(id));
                }
                Op::PushFront(id) => {
                    queue.push_front(track(id));
                    model.insert(0, track(id));
                }
                Op::Dequeue => {
                    let taken = queue.dequeue_next();
                    prop_assert_eq!(taken.is_some(), !model.is_empty());
                    if let Some(taken) = taken {
                        let at = model.iter().position(|t| t.id == taken.id);
                        prop_assert!(at.is_some(), "dequeued a track that was never queued");
                        model.remove(at.unwrap());
                    }
                }
                Op::Remove(id) => {
                    let id = format!("t{id}");
                    let before = model.len();
                    model.retain(|t| t.id != id);
                    prop_assert_eq!(queue.remove_by_id(&id), before - model.len());
                }
                Op::Reorder(from, to) => {
                    let ok = queue.reorder(from, to).is_ok();
                    prop_assert_eq!(ok, from < model.len() && to < model.len());
                    if ok {
                        let moved = model.remove(from);
                        model.insert(to, moved);
                    }
                }
                Op::Shuffle(on) => queue.set_shuffle(on),
            }

            prop_assert_eq!(queue.len(), model.len());
            prop_assert_eq!(counts(&queue.tracks()), counts(&model));
        }
    }

    /// Property: without shuffle, dequeue order is insertion order
    #[test]
    fn fifo_without_shuffle(ids in prop::collection::vec(0u8..255, 0..40)) {
        let mut queue = QueueManager::with_seed(1);
        queue.enqueue_all(ids.iter().map(|&id| track(id)));

        let mut out = Vec::new();
        while let Some(t) = queue.dequeue_next() {
            out.push(t.id);
        }
        let expected: Vec<String> = ids.iter().map(|id| format!("t{id}")).collect();
        prop_assert_eq!(out, expected);
    }

    /// Property: repeat-all plays every enqueued track once per cycle
    #[test]
    fn repeat_all_cycles_everything(
        n in 1u8..20,
        shuffle in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let mut queue = QueueManager::with_seed(seed);
        queue.set_shuffle(shuffle);
        queue.set_repeat(RepeatMode::All);
        let tracks: Vec<Track> = (0..n).map(track).collect();
        queue.set_queue(tracks.clone());

        for _ in 0..2 {
            let mut played = Vec::new();
            let mut current = queue.dequeue_next();
            for _ in 0..n {
                let t = current.take().unwrap();
                played.push(t.clone());
                match queue.on_track_end(Some(&t)) {
                    EndOfTrack::Advance(next) => current = Some(next),
                    other => prop_assert!(false, "unexpected {:?}", other),
                }
            }
            prop_assert_eq!(counts(&played), counts(&tracks));
            // The last Advance already started the next cycle
            queue.push_front(current.take().unwrap());
        }
    }

    /// Property: history is last-in first-out
    #[test]
    fn history_is_lifo(ids in prop::collection::vec(0u8..50, 1..30)) {
        let mut queue = QueueManager::with_seed(3);
        for &id in &ids {
            queue.record_played(track(id), None);
        }
        for &id in ids.iter().rev() {
            let popped = queue.previous().unwrap();
            prop_assert_eq!(popped.id, format!("t{id}"));
        }
        prop_assert!(queue.previous().is_none());
    }

    /// Property: volume and speed clamping always lands in range
    #[test]
    fn clamps_stay_in_range(volume in any::<f32>(), rate in any::<f32>()) {
        match clamp_volume(volume) {
            Some(v) => prop_assert!((0.0..=1.0).contains(&v)),
            None => prop_assert!(!volume.is_finite()),
        }
        match clamp_rate(rate) {
            Some(r) => prop_assert!((0.5..=2.0).contains(&r)),
            None => prop_assert!(!rate.is_finite()),
        }
    }

    /// Property: a crossfade ramp is monotonic and ends exactly once
    #[test]
    fn crossfade_ramp_is_monotonic(secs in 1u32..=12, volume in 0.05f32..=1.0) {
        let mut fade = CrossfadeController::new(secs, Duration::from_millis(100));
        let duration = 100.0;
        prop_assert!(fade.observe(duration - f64::from(secs), duration, volume, true));
        prop_assert!(!fade.observe(duration - f64::from(secs), duration, volume, true));

        let mut last = volume;
        let mut completed = 0;
        for _ in 0..(secs * 10 + 5) {
            match fade.step() {
                FadeStep::Gain(gain) => {
                    prop_assert!(gain < last && gain > 0.0);
                    last = gain;
                }
                FadeStep::Complete(restore) => {
                    prop_assert_eq!(restore, volume);
                    completed += 1;
                }
                FadeStep::Idle => {}
            }
        }
        prop_assert_eq!(completed, 1);
    }

    /// Property: the active lyric line never starts after the position
    #[test]
    fn active_lyric_line_is_not_ahead(
        stamps in prop::collection::vec(0u32..600, 1..20),
        position in 0.0f64..700.0,
    ) {
        let lrc: String = stamps
            .iter()
            .map(|s| format!("[{:02}:{:02}.00] line {s}\n", s / 60, s % 60))
            .collect();
        let lyrics = SyncedLyrics::parse(&lrc);
        prop_assert_eq!(lyrics.lines().len(), stamps.len());

        if let Some(i) = lyrics.active_line(position) {
            prop_assert!(lyrics.lines()[i].time_secs <= position);
            if let Some(next) = lyrics.lines().get(i + 1) {
                prop_assert!(next.time_secs > position);
            }
        } else {
            prop_assert!(lyrics.lines()[0].time_secs > position);
        }
    }
}
