//! Upcoming tracks, history and the end-of-track policy
//!
//! Shuffle never reorders storage: it only changes which element leaves
//! the queue on `dequeue_next`. The queue the UI shows is always the order
//! tracks were added (or dragged into).

use crate::error::{PlaybackError, Result};
use crate::history::History;
use crate::shuffle::{pick_index, shuffle_in_place};
use crate::types::{RepeatMode, Track};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;

/// What to do when the current track ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndOfTrack {
    /// Repeat-one: play the same track again from 0
    Replay,
    /// Load and play this track
    Advance(Track),
    /// Nothing left; stop and keep the last track visible
    Finish,
}

/// Queue and history for one session
#[derive(Debug)]
pub struct QueueManager {
    queue: VecDeque<Track>,
    history: History,
    /// Every track enqueued since the last `set_queue`/`clear`, for repeat-all
    cycle: Vec<Track>,
    shuffle: bool,
    repeat: RepeatMode,
    rng: StdRng,
}

impl QueueManager {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic shuffle, for tests and reproducible sessions
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            queue: VecDeque::new(),
            history: History::new(),
            cycle: Vec::new(),
            shuffle: false,
            repeat: RepeatMode::Off,
            rng,
        }
    }

    // ===== Queue Management =====

    /// Append to the tail; never starts playback
    pub fn enqueue(&mut self, track: Track) {
        self.cycle.push(track.clone());
        self.queue.push_back(track);
    }

    pub fn enqueue_all(&mut self, tracks: impl IntoIterator<Item = Track>) {
        for track in tracks {
            self.enqueue(track);
        }
    }

    /// Replace the queue and the repeat-all snapshot
    pub fn set_queue(&mut self, tracks: Vec<Track>) {
        self.cycle.clone_from(&tracks);
        self.queue = tracks.into();
    }

    /// Put a track back at the head without touching the repeat-all snapshot
    pub fn push_front(&mut self, track: Track) {
        self.queue.push_front(track);
    }

    /// Remove the next track to play: a random one when shuffling, else the head
    pub fn dequeue_next(&mut self) -> Option<Track> {
        if self.shuffle {
            let index = pick_index(self.queue.len(), &mut self.rng)?;
            self.queue.remove(index)
        } else {
            self.queue.pop_front()
        }
    }

    /// Remove every entry with this id; returns how many went
    pub fn remove_by_id(&mut self, id: &str) -> usize {
        let before = self.queue.len();
        self.queue.retain(|t| t.id != id);
        self.cycle.retain(|t| t.id != id);
        before - self.queue.len()
    }

    /// Move one entry, keeping everything else in relative order
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        if from >= self.queue.len() {
            return Err(PlaybackError::IndexOutOfBounds(from));
        }
        if to >= self.queue.len() {
            return Err(PlaybackError::IndexOutOfBounds(to));
        }
        if from == to {
            return Ok(());
        }

        if let Some(track) = self.queue.remove(from) {
            self.queue.insert(to, track);
        }
        Ok(())
    }

    /// Empty the queue and forget the repeat-all snapshot
    pub fn clear(&mut self) {
        self.queue.clear();
        self.cycle.clear();
    }

    /// Next track in storage order (not necessarily the one shuffle will pick)
    pub fn peek_next(&self) -> Option<&Track> {
        self.queue.front()
    }

    /// Copy of the queue for rendering
    pub fn tracks(&self) -> Vec<Track> {
        self.queue.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    // ===== History =====

    /// Record a finished or superseded track, unless it is the one coming next
    pub fn record_played(&mut self, played: Track, next: Option<&Track>) {
        if next.is_some_and(|next| next.same_as(&played)) {
            return;
        }
        self.history.push(played);
    }

    /// Pop the most recent history entry
    ///
    /// The caller pushes the current track back onto the queue head so
    /// forward navigation is not lost.
    pub fn previous(&mut self) -> Option<Track> {
        self.history.pop()
    }

    pub fn history(&self) -> Vec<Track> {
        self.history.tracks().to_vec()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    // ===== Modes =====

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.shuffle = shuffle;
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        self.repeat = repeat;
    }

    // ===== Transitions =====

    /// Refill an empty queue from the repeat-all snapshot
    ///
    /// Shuffled when shuffle is on. Returns false if there was nothing to refill.
    pub fn refill_from_cycle(&mut self) -> bool {
        if self.cycle.is_empty() {
            return false;
        }
        let mut tracks = self.cycle.clone();
        if self.shuffle {
            shuffle_in_place(&mut tracks, &mut self.rng);
        }
        self.queue = tracks.into();
        true
    }

    /// Next track for a manual skip: the queue, then the repeat-all snapshot
    ///
    /// Repeat-one does not apply to a manual skip.
    pub fn next_for_skip(&mut self) -> Option<Track> {
        if let Some(track) = self.dequeue_next() {
            return Some(track);
        }
        if self.repeat == RepeatMode::All && self.refill_from_cycle() {
            return self.take_head();
        }
        None
    }

    /// Decide what follows `current` when it plays to the end
    pub fn on_track_end(&mut self, current: Option<&Track>) -> EndOfTrack {
        if self.repeat == RepeatMode::One && current.is_some() {
            return EndOfTrack::Replay;
        }
        if let Some(next) = self.dequeue_next() {
            return EndOfTrack::Advance(next);
        }
        if self.repeat == RepeatMode::All && self.refill_from_cycle() {
            if let Some(head) = self.take_head() {
                return EndOfTrack::Advance(head);
            }
        }
        EndOfTrack::Finish
    }

    fn take_head(&mut self) -> Option<Track> {
        self.queue.pop_front()
    }
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new()
    }
}
