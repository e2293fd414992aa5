//! Time-synced lyrics
//!
//! Parses LRC text (`[mm:ss.xx] line`) and answers which line is active at
//! a playback position. A line may carry several timestamps; metadata tags
//! such as `[ar:...]` and lines without a timestamp are skipped.

use serde::{Deserialize, Serialize};

/// How long the last line counts as "in progress"
const LAST_LINE_SECS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    pub time_secs: f64,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncedLyrics {
    lines: Vec<LyricLine>,
}

impl SyncedLyrics {
    /// Parse LRC text; lines come out sorted by time
    pub fn parse(lrc: &str) -> Self {
        let mut lines = Vec::new();

        for raw in lrc.lines() {
            let mut rest = raw.trim();
            let mut stamps = Vec::new();
            while let Some(after) = rest.strip_prefix('[') {
                let Some(end) = after.find(']') else { break };
                match parse_timestamp(&after[..end]) {
                    Some(secs) => stamps.push(secs),
                    None => break,
                }
                rest = after[end + 1..].trim_start();
            }

            let text = rest.trim();
            for time_secs in stamps {
                lines.push(LyricLine {
                    time_secs,
                    text: text.to_string(),
                });
            }
        }

        lines.sort_by(|a, b| a.time_secs.total_cmp(&b.time_secs));
        Self { lines }
    }

    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Index of the line being sung at `position_secs`
    pub fn active_line(&self, position_secs: f64) -> Option<usize> {
        let after = self.lines.partition_point(|line| line.time_secs <= position_secs);
        after.checked_sub(1)
    }

    /// How far through the active line we are, in [0, 1]
    pub fn line_progress(&self, position_secs: f64) -> f32 {
        let Some(index) = self.active_line(position_secs) else {
            return 0.0;
        };
        let start = self.lines[index].time_secs;
        let end = self
            .lines
            .get(index + 1)
            .map_or(start + LAST_LINE_SECS, |next| next.time_secs);
        if end <= start {
            return 1.0;
        }
        ((position_secs - start) / (end - start)).clamp(0.0, 1.0) as f32
    }
}

/// `mm:ss`, `mm:ss.xx` or `mm:ss:xx`
fn parse_timestamp(tag: &str) -> Option<f64> {
    let (minutes, rest) = tag.split_once(':')?;
    let minutes: u32 = minutes.trim().parse().ok()?;
    let seconds: f64 = rest.trim().replacen(':', ".", 1).parse().ok()?;
    if !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some(f64::from(minutes) * 60.0 + seconds)
}
