//! Playback history tracking
//!
//! Every track that finished or was skipped past, for "previous" navigation.
//! Lives as long as the session; there is no size cap.

use crate::types::Track;

/// Played tracks, most recent last
#[derive(Debug, Clone, Default)]
pub struct History {
    tracks: Vec<Track>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// Most recent track, without removing it
    pub fn peek(&self) -> Option<&Track> {
        self.tracks.last()
    }

    /// Remove and return the most recent track
    pub fn pop(&mut self) -> Option<Track> {
        self.tracks.pop()
    }

    /// All tracks, oldest first
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> Track {
        Track::new(id, id, "Artist", format!("https://cdn/{id}.mp3"))
    }

    #[test]
    fn test_pop_is_lifo() {
        let mut history = History::new();
        history.push(track("a"));
        history.push(track("b"));

        assert_eq!(history.peek().unwrap().id, "b");
        assert_eq!(history.pop().unwrap().id, "b");
        assert_eq!(history.pop().unwrap().id, "a");
        assert!(history.pop().is_none());
    }

    #[test]
    fn test_unbounded() {
        let mut history = History::new();
        for i in 0..500 {
            history.push(track(&i.to_string()));
        }
        assert_eq!(history.len(), 500);
        assert_eq!(history.tracks()[0].id, "0");
    }
}
