//! Crossfade Controller
//!
//! Fades the outgoing track to silence over the last `duration_secs` of
//! playback, stepping once per engine tick. The controller only ever
//! touches the live graph's gain; the session volume is left alone, so
//! the next track starts at the pre-fade level.

use crate::config::MAX_CROSSFADE_SECS;
use std::time::Duration;

/// Result of advancing the ramp by one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FadeStep {
    /// No ramp running
    Idle,
    /// Set the live gain to this value
    Gain(f32),
    /// Ramp finished; hold the outgoing track silent.
    /// Carries the pre-fade volume for the next track.
    Complete(f32),
}

#[derive(Debug, Clone, Copy)]
struct Ramp {
    start_volume: f32,
    current: f32,
    step: f32,
}

/// Per-track fade-out state
#[derive(Debug, Clone)]
pub struct CrossfadeController {
    duration_secs: u32,
    tick: Duration,
    ramp: Option<Ramp>,
    /// False once a ramp has started (or been cancelled) for the current track
    armed: bool,
}

impl CrossfadeController {
    pub fn new(duration_secs: u32, tick: Duration) -> Self {
        Self {
            duration_secs: duration_secs.min(MAX_CROSSFADE_SECS),
            tick: tick.max(Duration::from_millis(1)),
            ramp: None,
            armed: true,
        }
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    /// Set the window in seconds, clamped to [0, 12]; 0 disables
    pub fn set_duration(&mut self, secs: u32) {
        self.duration_secs = secs.min(MAX_CROSSFADE_SECS);
    }

    pub fn is_enabled(&self) -> bool {
        self.duration_secs > 0
    }

    pub fn is_fading(&self) -> bool {
        self.ramp.is_some()
    }

    /// Look at a position update; returns true if a ramp just started
    ///
    /// Starts at most once per track, and only when `0 < remaining <= window`
    /// and another track is waiting.
    pub fn observe(&mut self, position_secs: f64, duration_secs: f64, volume: f32, has_next: bool) -> bool {
        if !self.is_enabled() || !self.armed || !has_next || duration_secs <= 0.0 {
            return false;
        }

        let remaining = duration_secs - position_secs;
        if remaining <= 0.0 || remaining > f64::from(self.duration_secs) {
            return false;
        }

        let steps = f64::from(self.duration_secs) / self.tick.as_secs_f64();
        self.ramp = Some(Ramp {
            start_volume: volume,
            current: volume,
            step: (f64::from(volume) / steps) as f32,
        });
        self.armed = false;
        true
    }

    /// Advance the ramp by one tick
    pub fn step(&mut self) -> FadeStep {
        let Some(ramp) = self.ramp.as_mut() else {
            return FadeStep::Idle;
        };

        if ramp.current > ramp.step {
            ramp.current -= ramp.step;
            FadeStep::Gain(ramp.current)
        } else {
            let volume = ramp.start_volume;
            self.ramp = None;
            FadeStep::Complete(volume)
        }
    }

    /// Abandon any ramp for the current track without re-arming
    ///
    /// Returns the pre-fade volume if a ramp was running.
    pub fn cancel(&mut self) -> Option<f32> {
        self.armed = false;
        self.ramp.take().map(|ramp| ramp.start_volume)
    }

    /// New track (or a seek): drop any ramp and allow one to start again
    pub fn reset(&mut self) {
        self.ramp = None;
        self.armed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(100);

    #[test]
    fn test_disabled_never_starts() {
        let mut fade = CrossfadeController::new(0, TICK);
        assert!(!fade.observe(178.0, 180.0, 0.8, true));
        assert_eq!(fade.step(), FadeStep::Idle);
    }

    #[test]
    fn test_needs_next_track() {
        let mut fade = CrossfadeController::new(5, TICK);
        assert!(!fade.observe(176.0, 180.0, 0.8, false));
        assert!(fade.observe(176.0, 180.0, 0.8, true));
    }

    #[test]
    fn test_outside_window() {
        let mut fade = CrossfadeController::new(5, TICK);
        assert!(!fade.observe(100.0, 180.0, 0.8, true));
        assert!(!fade.observe(180.0, 180.0, 0.8, true));
    }

    #[test]
    fn test_starts_once_per_track() {
        let mut fade = CrossfadeController::new(5, TICK);
        assert!(fade.observe(175.0, 180.0, 0.8, true));
        assert!(!fade.observe(175.1, 180.0, 0.8, true));

        fade.reset();
        assert!(fade.observe(175.0, 180.0, 0.8, true));
    }

    #[test]
    fn test_ramp_reaches_zero_over_window() {
        let mut fade = CrossfadeController::new(5, TICK);
        assert!(fade.observe(175.0, 180.0, 0.8, true));

        let mut ticks = 0;
        let mut last_gain = 0.8;
        loop {
            ticks += 1;
            match fade.step() {
                FadeStep::Gain(gain) => {
                    assert!(gain < last_gain);
                    last_gain = gain;
                }
                FadeStep::Complete(volume) => {
                    assert_eq!(volume, 0.8);
                    break;
                }
                FadeStep::Idle => panic!("ramp stopped early"),
            }
        }

        // 5 seconds at 100ms per tick
        assert!((49..=51).contains(&ticks), "took {ticks} ticks");
        assert!(last_gain < 0.05);
        assert!(!fade.is_fading());
    }

    #[test]
    fn test_cancel_returns_volume_and_disarms() {
        let mut fade = CrossfadeController::new(3, TICK);
        assert!(fade.observe(178.0, 180.0, 0.5, true));
        fade.step();
        assert_eq!(fade.cancel(), Some(0.5));
        assert!(!fade.observe(178.5, 180.0, 0.5, true));
    }

    #[test]
    fn test_duration_clamped() {
        let mut fade = CrossfadeController::new(40, TICK);
        assert_eq!(fade.duration_secs(), 12);
        fade.set_duration(3);
        assert_eq!(fade.duration_secs(), 3);
    }
}
