//! Playback Engine
//!
//! Owns the session, the single live output and everything that reacts to
//! it (queue, crossfade, equalizer, visualizer, sleep timer).
//!
//! # Concurrency
//!
//! All state sits behind one mutex that is never held across an `.await`.
//! Loads run as spawned tasks; every load captures the engine's generation
//! counter when it starts and its completion is discarded if the counter
//! has moved on (a newer `play`, a `stop`, or a timeout). Only the newest
//! request can ever touch the session.
//!
//! # Same-track policy
//!
//! `play(track)` with the id of the current track toggles: playing pauses,
//! paused resumes, loading is left alone. An ended, failed or stopped track
//! is loaded again from the start.

use crate::backend::{AudioBackend, OutputHandle};
use crate::config::{clamp_rate, clamp_volume, PlaybackConfig};
use crate::control::{PlayerCommand, UNMUTE_VOLUME, VOLUME_STEP};
use crate::crossfade::{CrossfadeController, FadeStep};
use crate::equalizer::EqualizerController;
use crate::error::{PlaybackError, Result};
use crate::events::{PlaybackEvent, PlayerSnapshot, SleepTimerStatus};
use crate::lyrics::SyncedLyrics;
use crate::queue::{EndOfTrack, QueueManager};
use crate::sleep::SleepTimer;
use crate::types::{PlaybackSession, PlaybackState, RepeatMode, Track};
use crate::visualizer::FrequencyAnalyzer;
use mood_audio::{AudioGraph, AudioSource, EqPreset, EqualizerState, GraphBuilder, SharedGraph};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Events kept for `drain_events` before the oldest are dropped
const MAX_PENDING_EVENTS: usize = 1024;

const SLEEP_TICK: Duration = Duration::from_secs(1);

/// How a play request ended
#[derive(Debug)]
pub enum LoadOutcome {
    /// Audio is playing
    Started,
    /// The track was already current; play/pause toggled
    Toggled,
    /// The track is already loading; nothing changed
    AlreadyLoading,
    /// The current track went back to 0 (previous with empty history)
    Restarted,
    /// A newer request took over first; this one changed nothing
    Superseded,
    /// Load or start failed; the engine is idle
    Failed(PlaybackError),
}

impl LoadOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started)
    }

    pub fn error(&self) -> Option<&PlaybackError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Returned by `play`, `next` and `previous`
///
/// Dropping it is fine: the load carries on and its result shows up in the
/// snapshot and events. Awaiting [`outcome`](PlayRequest::outcome) gives the
/// caller the result directly.
#[derive(Debug)]
pub struct PlayRequest {
    inner: RequestInner,
}

#[derive(Debug)]
enum RequestInner {
    Ready(LoadOutcome),
    Pending(JoinHandle<LoadOutcome>),
}

impl PlayRequest {
    fn ready(outcome: LoadOutcome) -> Self {
        Self {
            inner: RequestInner::Ready(outcome),
        }
    }

    fn pending(handle: JoinHandle<LoadOutcome>) -> Self {
        Self {
            inner: RequestInner::Pending(handle),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.inner, RequestInner::Pending(_))
    }

    pub async fn outcome(self) -> LoadOutcome {
        match self.inner {
            RequestInner::Ready(outcome) => outcome,
            RequestInner::Pending(handle) => handle.await.unwrap_or(LoadOutcome::Superseded),
        }
    }
}

/// The playing graph and the output it is attached to
struct LiveOutput {
    graph: SharedGraph,
    output: Box<dyn OutputHandle>,
}

struct EngineState {
    session: PlaybackSession,
    generation: u64,
    live: Option<LiveOutput>,
    queue: QueueManager,
    crossfade: CrossfadeController,
    equalizer: EqualizerController,
    analyzer: FrequencyAnalyzer,
    sleep_timer: Option<SleepTimer>,
    muted_volume: Option<f32>,
    /// Pause requested while loading; the load lands in Paused
    start_paused: bool,
    events: VecDeque<PlaybackEvent>,
}

#[derive(Default)]
struct EngineTasks {
    clock: Option<JoinHandle<()>>,
    sleep: Option<JoinHandle<()>>,
    visualizer: Option<JoinHandle<()>>,
}

impl EngineTasks {
    fn replace(slot: &mut Option<JoinHandle<()>>, handle: JoinHandle<()>) {
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    fn abort_all(&mut self) {
        for handle in [self.clock.take(), self.sleep.take(), self.visualizer.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }
}

struct Shared {
    backend: Arc<dyn AudioBackend>,
    config: PlaybackConfig,
    state: Mutex<EngineState>,
    snapshot_tx: watch::Sender<PlayerSnapshot>,
    tasks: Mutex<EngineTasks>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.tasks
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .abort_all();
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .detach_live();
    }
}

/// Playback engine handle
///
/// Cheap to clone; all clones drive the same engine. Methods that start
/// loads or timers must be called from inside a Tokio runtime.
#[derive(Clone)]
pub struct PlaybackEngine {
    shared: Arc<Shared>,
}

impl PlaybackEngine {
    pub fn new(backend: Arc<dyn AudioBackend>, config: PlaybackConfig) -> Self {
        Self::with_queue(backend, config, QueueManager::new())
    }

    /// Use a prepared queue manager (e.g. one with a fixed shuffle seed)
    pub fn with_queue(backend: Arc<dyn AudioBackend>, config: PlaybackConfig, mut queue: QueueManager) -> Self {
        let config = config.normalized();
        queue.set_shuffle(config.shuffle);
        queue.set_repeat(config.repeat);

        let state = EngineState {
            session: PlaybackSession::new(config.volume, config.playback_rate),
            generation: 0,
            live: None,
            queue,
            crossfade: CrossfadeController::new(config.crossfade_secs, config.tick_interval()),
            equalizer: EqualizerController::new(),
            analyzer: FrequencyAnalyzer::new(config.visualizer_bars),
            sleep_timer: None,
            muted_volume: None,
            start_paused: false,
            events: VecDeque::new(),
        };
        let (snapshot_tx, _) = watch::channel(state.snapshot());

        tracing::debug!(?config, "Playback engine created");

        Self {
            shared: Arc::new(Shared {
                backend,
                config,
                state: Mutex::new(state),
                snapshot_tx,
                tasks: Mutex::new(EngineTasks::default()),
            }),
        }
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.shared.config
    }

    // ===== Playback Control =====

    /// Load and play `track`, superseding whatever is loaded
    pub fn play(&self, track: Track) -> PlayRequest {
        let mut state = self.lock_state();

        if let Some(outcome) = Self::toggle_current(&mut state, &track) {
            self.publish(&state);
            return PlayRequest::ready(outcome);
        }

        if let Some(current) = state.started_track() {
            state.queue.record_played(current, Some(&track));
        }
        let handle = self.begin_load(&mut state, track);
        self.publish(&state);
        PlayRequest::pending(handle)
    }

    /// Suspend output, keeping the position; idempotent
    ///
    /// During a load the track is opened paused instead.
    pub fn pause(&self) {
        let mut state = self.lock_state();
        state.pause_output();
        self.publish(&state);
    }

    /// Continue from the current position
    ///
    /// An ended track starts over. Errors if nothing is loaded or the output
    /// refuses to restart.
    pub fn resume(&self) -> Result<()> {
        let mut state = self.lock_state();
        let result = state.resume_output();
        self.publish(&state);
        result
    }

    pub fn toggle_play_pause(&self) -> Result<()> {
        let mut state = self.lock_state();
        let result = match state.session.state {
            PlaybackState::Playing => {
                state.pause_output();
                Ok(())
            }
            PlaybackState::Loading if !state.start_paused => {
                state.pause_output();
                Ok(())
            }
            _ => state.resume_output(),
        };
        self.publish(&state);
        result
    }

    /// Silence output, reset position and forget the current track
    ///
    /// Any in-flight load is disregarded.
    pub fn stop(&self) {
        let mut state = self.lock_state();
        state.generation += 1;
        state.start_paused = false;
        state.detach_live();
        state.set_state(PlaybackState::Idle);
        let (volume, rate) = (state.session.volume, state.session.playback_rate);
        state.session = PlaybackSession::new(volume, rate);
        tracing::info!("Playback stopped");
        self.publish(&state);
    }

    /// Jump to `target_secs`, clamped to [0, duration]
    pub fn seek(&self, target_secs: f64) -> Result<()> {
        let mut state = self.lock_state();
        if state.session.current_track.is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }

        let duration = state.session.duration_secs;
        let target = if target_secs.is_finite() {
            target_secs.clamp(0.0, duration)
        } else {
            0.0
        };
        state.session.position_secs = target;

        let volume = state.session.volume;
        let seeked = state.with_graph(|graph| {
            let result = graph.seek(Duration::from_secs_f64(target));
            graph.set_gain(volume);
            result
        });
        state.crossfade.reset();
        if state.session.state == PlaybackState::Ended {
            state.set_state(PlaybackState::Paused);
        }
        state.emit_position();
        self.publish(&state);

        if let Some(result) = seeked {
            result?;
        }
        Ok(())
    }

    /// Seek to a percentage (0..=100) of the duration
    pub fn seek_percent(&self, percent: f64) -> Result<()> {
        let duration = self.lock_state().session.duration_secs;
        self.seek(duration * percent.clamp(0.0, 100.0) / 100.0)
    }

    /// Set volume, clamped to [0, 1]; returns the volume in effect
    ///
    /// Applies to the live output now and to every later track.
    pub fn set_volume(&self, volume: f32) -> f32 {
        let mut state = self.lock_state();
        let applied = state.apply_volume(volume);
        self.publish(&state);
        applied
    }

    /// Set speed, clamped to [0.5, 2.0]; returns the speed in effect
    pub fn set_playback_rate(&self, rate: f32) -> f32 {
        let mut state = self.lock_state();
        let Some(rate) = clamp_rate(rate) else {
            return state.session.playback_rate;
        };
        state.session.playback_rate = rate;
        state.with_graph(|graph| graph.set_speed(rate));
        state.emit(PlaybackEvent::PlaybackRateChanged { rate });
        self.publish(&state);
        rate
    }

    /// Play the next queued track (repeat-all refills an empty queue)
    pub fn next(&self) -> PlayRequest {
        let mut state = self.lock_state();
        let Some(next) = state.queue.next_for_skip() else {
            return PlayRequest::ready(LoadOutcome::Failed(PlaybackError::QueueEmpty));
        };

        if let Some(current) = state.started_track() {
            state.queue.record_played(current, Some(&next));
        }
        let handle = self.begin_load(&mut state, next);
        state.emit_queue_changed();
        self.publish(&state);
        PlayRequest::pending(handle)
    }

    /// Go back in history; the current track returns to the queue head
    ///
    /// With empty history the current track restarts from 0.
    pub fn previous(&self) -> PlayRequest {
        let mut state = self.lock_state();

        if let Some(previous) = state.queue.previous() {
            if let Some(current) = state.session.current_track.clone() {
                state.queue.push_front(current);
            }
            let handle = self.begin_load(&mut state, previous);
            state.emit_queue_changed();
            self.publish(&state);
            return PlayRequest::pending(handle);
        }

        if state.live.is_none() {
            return PlayRequest::ready(LoadOutcome::Failed(PlaybackError::NoTrackLoaded));
        }
        let volume = state.session.volume;
        state.with_graph(|graph| {
            if let Err(e) = graph.seek(Duration::ZERO) {
                tracing::warn!("Restart seek failed: {}", e);
            }
            graph.set_gain(volume);
        });
        state.session.position_secs = 0.0;
        state.crossfade.reset();
        if state.session.state == PlaybackState::Ended {
            state.set_state(PlaybackState::Paused);
        }
        state.emit_position();
        self.publish(&state);
        PlayRequest::ready(LoadOutcome::Restarted)
    }

    fn toggle_current(state: &mut EngineState, track: &Track) -> Option<LoadOutcome> {
        let current = state.session.current_track.as_ref()?;
        if !current.same_as(track) {
            return None;
        }

        match state.session.state {
            PlaybackState::Playing => {
                state.pause_output();
                Some(LoadOutcome::Toggled)
            }
            PlaybackState::Paused => Some(match state.resume_output() {
                Ok(()) => LoadOutcome::Toggled,
                Err(err) => LoadOutcome::Failed(err),
            }),
            PlaybackState::Loading => Some(LoadOutcome::AlreadyLoading),
            PlaybackState::Idle | PlaybackState::Ended => None,
        }
    }

    // ===== Loading =====

    /// Tear down the live output, enter Loading and spawn the load
    fn begin_load(&self, state: &mut EngineState, track: Track) -> JoinHandle<LoadOutcome> {
        state.generation += 1;
        let generation = state.generation;
        state.start_paused = false;
        state.detach_live();

        let previous_track_id = state.session.current_track.as_ref().map(|t| t.id.clone());
        let (volume, rate) = (state.session.volume, state.session.playback_rate);
        state.set_state(PlaybackState::Loading);
        state.session = PlaybackSession {
            current_track: Some(track.clone()),
            state: PlaybackState::Loading,
            ..PlaybackSession::new(volume, rate)
        };
        state.emit(PlaybackEvent::TrackChanged {
            track_id: track.id.clone(),
            previous_track_id,
        });

        tracing::debug!(track_id = %track.id, generation, "Loading track");

        let engine = self.clone();
        tokio::spawn(async move { engine.run_load(generation, track).await })
    }

    async fn run_load(self, generation: u64, track: Track) -> LoadOutcome {
        let backend = Arc::clone(&self.shared.backend);
        let url = track.source_url.clone();
        // Separate task: a timeout stops waiting but the fetch runs on
        let fetch = tokio::spawn(async move { backend.load(&url).await });

        let timeout = self.shared.config.load_timeout();
        let loaded = match tokio::time::timeout(timeout, fetch).await {
            Ok(Ok(Ok(source))) => Ok(source),
            Ok(Ok(Err(e))) => Err(PlaybackError::LoadFailed {
                track_id: track.id.clone(),
                reason: e.to_string(),
            }),
            Ok(Err(join_error)) => Err(PlaybackError::LoadFailed {
                track_id: track.id.clone(),
                reason: join_error.to_string(),
            }),
            Err(_) => Err(PlaybackError::LoadTimedOut {
                track_id: track.id.clone(),
                timeout,
            }),
        };

        self.complete_load(generation, &track, loaded)
    }

    fn complete_load(
        &self,
        generation: u64,
        track: &Track,
        loaded: Result<Box<dyn AudioSource>>,
    ) -> LoadOutcome {
        let mut state = self.lock_state();
        if state.generation != generation {
            tracing::debug!(
                track_id = %track.id,
                generation,
                current = state.generation,
                "Discarding stale load completion"
            );
            return LoadOutcome::Superseded;
        }

        let source = match loaded {
            Ok(source) => source,
            Err(err) => {
                state.fail_load(track, &err);
                self.publish(&state);
                return LoadOutcome::Failed(err);
            }
        };

        let graph = GraphBuilder::new(self.shared.backend.sample_rate())
            .equalizer(state.equalizer.state())
            .with_analyser(true)
            .gain(state.session.volume)
            .speed(state.session.playback_rate)
            .build_shared(source);

        // EQ and analyser are wired before the first sample is audible
        state.equalizer.attach(&graph);
        if let Err(e) = state.analyzer.attach(&graph) {
            state.emit(PlaybackEvent::VisualizerFallback {
                reason: e.to_string(),
            });
        }

        let mut output = match self.shared.backend.open_output(Arc::clone(&graph)) {
            Ok(output) => output,
            Err(e) => {
                state.equalizer.detach();
                state.analyzer.detach();
                let err = PlaybackError::PlaybackRejected {
                    track_id: track.id.clone(),
                    reason: e.to_string(),
                };
                state.fail_load(track, &err);
                self.publish(&state);
                return LoadOutcome::Failed(err);
            }
        };

        let start_paused = std::mem::take(&mut state.start_paused);
        if start_paused {
            output.pause();
        }

        let duration = lock_graph(&graph).duration().as_secs_f64();
        state.live = Some(LiveOutput { graph, output });
        state.session.duration_secs = duration;
        state.session.position_secs = 0.0;
        state.crossfade.reset();

        if start_paused {
            state.set_state(PlaybackState::Paused);
            tracing::info!(track_id = %track.id, "Track loaded paused");
        } else {
            state.set_state(PlaybackState::Playing);
            tracing::info!(
                track_id = %track.id,
                title = %track.title,
                duration_secs = duration,
                "Playback started"
            );
        }
        self.publish(&state);
        LoadOutcome::Started
    }

    // ===== Clock =====

    /// One position update: sync position, drive crossfade, handle track end
    ///
    /// Called by the clock task every `tick_interval`; hosts without a
    /// clock (and tests) can call it directly.
    pub fn tick(&self) {
        let mut state = self.lock_state();
        if state.session.state != PlaybackState::Playing {
            return;
        }
        let Some((position, duration, finished)) = state.with_graph(|graph| {
            (
                graph.position().as_secs_f64(),
                graph.duration().as_secs_f64(),
                graph.is_finished(),
            )
        }) else {
            return;
        };

        state.session.duration_secs = duration;
        state.session.position_secs = position.min(duration);
        state.emit_position();

        let volume = state.session.volume;
        let has_next = !state.queue.is_empty();
        if state.crossfade.observe(position, duration, volume, has_next) {
            let track_id = state.current_id().unwrap_or_default();
            let duration_secs = state.crossfade.duration_secs();
            tracing::debug!(%track_id, duration_secs, "Crossfade started");
            state.emit(PlaybackEvent::CrossfadeStarted {
                track_id,
                duration_secs,
            });
        }
        match state.crossfade.step() {
            FadeStep::Idle => {}
            FadeStep::Gain(gain) => {
                state.with_graph(|graph| graph.set_gain(gain));
            }
            FadeStep::Complete(_) => {
                // Outgoing track stays silent; the next graph is built at the session volume
                state.with_graph(|graph| graph.set_gain(0.0));
                state.emit(PlaybackEvent::CrossfadeCompleted);
            }
        }

        if finished {
            self.handle_track_end(&mut state);
        }
        self.publish(&state);
    }

    fn handle_track_end(&self, state: &mut EngineState) {
        let finished = state.session.current_track.clone();
        if let Some(track) = &finished {
            state.emit(PlaybackEvent::TrackFinished {
                track_id: track.id.clone(),
            });
        }

        match state.queue.on_track_end(finished.as_ref()) {
            EndOfTrack::Replay => {
                let volume = state.session.volume;
                state.with_graph(|graph| {
                    if let Err(e) = graph.seek(Duration::ZERO) {
                        tracing::warn!("Repeat seek failed: {}", e);
                    }
                    graph.set_gain(volume);
                });
                state.session.position_secs = 0.0;
                state.crossfade.reset();
                tracing::debug!("Repeating track");
            }
            EndOfTrack::Advance(next) => {
                if let Some(done) = finished {
                    state.queue.record_played(done, Some(&next));
                }
                // Fire and forget; the outcome lands in the snapshot
                drop(self.begin_load(state, next));
                state.emit_queue_changed();
            }
            EndOfTrack::Finish => {
                if let Some(live) = state.live.as_mut() {
                    live.output.pause();
                }
                state.session.position_secs = state.session.duration_secs;
                state.set_state(PlaybackState::Ended);
                tracing::info!("Queue finished");
            }
        }
    }

    /// Run `tick` on the configured interval until shutdown
    pub fn start_clock(&self) {
        let weak = Arc::downgrade(&self.shared);
        let period = self.shared.config.tick_interval();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(engine) = Self::upgrade(&weak) else {
                    break;
                };
                engine.tick();
            }
        });
        EngineTasks::replace(&mut self.lock_tasks().clock, handle);
    }

    /// Stop every timer task and playback
    pub fn shutdown(&self) {
        self.lock_tasks().abort_all();
        {
            let mut state = self.lock_state();
            state.sleep_timer = None;
        }
        self.stop();
        tracing::debug!("Playback engine shut down");
    }

    // ===== Queue =====

    pub fn enqueue(&self, track: Track) {
        self.with_queue_change(|queue| queue.enqueue(track));
    }

    pub fn enqueue_all(&self, tracks: Vec<Track>) {
        self.with_queue_change(|queue| queue.enqueue_all(tracks));
    }

    /// Replace the queue (and the repeat-all snapshot)
    pub fn set_queue(&self, tracks: Vec<Track>) {
        self.with_queue_change(|queue| queue.set_queue(tracks));
    }

    /// Remove every queued entry with this id
    pub fn remove_from_queue(&self, id: &str) -> usize {
        self.with_queue_change(|queue| queue.remove_by_id(id))
    }

    pub fn reorder_queue(&self, from: usize, to: usize) -> Result<()> {
        self.with_queue_change(|queue| queue.reorder(from, to))
    }

    pub fn clear_queue(&self) {
        self.with_queue_change(QueueManager::clear);
    }

    pub fn queue(&self) -> Vec<Track> {
        self.lock_state().queue.tracks()
    }

    pub fn history(&self) -> Vec<Track> {
        self.lock_state().queue.history()
    }

    pub fn set_shuffle(&self, shuffle: bool) {
        self.with_queue_change(|queue| queue.set_shuffle(shuffle));
    }

    pub fn set_repeat(&self, repeat: RepeatMode) {
        self.with_queue_change(|queue| queue.set_repeat(repeat));
    }

    fn with_queue_change<R>(&self, f: impl FnOnce(&mut QueueManager) -> R) -> R {
        let mut state = self.lock_state();
        let result = f(&mut state.queue);
        state.emit_queue_changed();
        self.publish(&state);
        result
    }

    // ===== Crossfade =====

    /// Crossfade window in seconds, clamped to [0, 12]; 0 disables
    pub fn set_crossfade(&self, secs: u32) {
        let mut state = self.lock_state();
        state.crossfade.set_duration(secs);
        if secs == 0 && state.crossfade.cancel().is_some() {
            let volume = state.session.volume;
            state.with_graph(|graph| graph.set_gain(volume));
        }
        self.publish(&state);
    }

    // ===== Equalizer =====

    /// Set one band's gain (clamped to +/-12 dB); returns the stored gain
    pub fn set_eq_band(&self, index: usize, gain_db: f32) -> Result<f32> {
        let mut state = self.lock_state();
        let gain = state.equalizer.set_band_gain(index, gain_db)?;
        let gains = state.equalizer.gains();
        state.emit(PlaybackEvent::EqualizerChanged { gains });
        self.publish(&state);
        Ok(gain)
    }

    /// Apply a named preset; unknown names change nothing
    pub fn apply_eq_preset(&self, name: &str) -> Result<EqPreset> {
        let mut state = self.lock_state();
        let preset = state.equalizer.apply_preset_name(name)?;
        let gains = state.equalizer.gains();
        state.emit(PlaybackEvent::EqualizerChanged { gains });
        self.publish(&state);
        Ok(preset)
    }

    pub fn equalizer(&self) -> EqualizerState {
        self.lock_state().equalizer.state().clone()
    }

    // ===== Visualizer =====

    /// One frame of visualizer bars on a 0..100 scale
    pub fn visualizer_frame(&self) -> Vec<f32> {
        let mut state = self.lock_state();
        let playing = state.session.is_playing();
        state.analyzer.frame(playing)
    }

    pub fn set_visualizer_bars(&self, bars: usize) {
        self.lock_state().analyzer.set_bar_count(bars);
    }

    /// Publish visualizer frames at the configured rate
    pub fn start_visualizer_feed(&self) -> watch::Receiver<Vec<f32>> {
        let (tx, rx) = watch::channel(self.visualizer_frame());
        let weak = Arc::downgrade(&self.shared);
        let period = self.shared.config.visualizer_interval();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(engine) = Self::upgrade(&weak) else {
                    break;
                };
                if tx.send(engine.visualizer_frame()).is_err() {
                    break;
                }
            }
        });
        EngineTasks::replace(&mut self.lock_tasks().visualizer, handle);
        rx
    }

    // ===== Sleep Timer =====

    /// Pause playback after `minutes`; replaces any running timer, 0 cancels
    pub fn start_sleep_timer(&self, minutes: u32) {
        if minutes == 0 {
            self.cancel_sleep_timer();
            return;
        }

        {
            let mut state = self.lock_state();
            state.sleep_timer = Some(SleepTimer::from_minutes(minutes));
            state.emit(PlaybackEvent::SleepTimerChanged {
                minutes: Some(minutes),
            });
            self.publish(&state);
        }
        tracing::info!(minutes, "Sleep timer set");

        let weak = Arc::downgrade(&self.shared);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + SLEEP_TICK, SLEEP_TICK);
            loop {
                ticker.tick().await;
                let Some(engine) = Self::upgrade(&weak) else {
                    break;
                };
                if engine.sleep_tick() {
                    break;
                }
            }
        });
        EngineTasks::replace(&mut self.lock_tasks().sleep, handle);
    }

    pub fn cancel_sleep_timer(&self) {
        if let Some(handle) = self.lock_tasks().sleep.take() {
            handle.abort();
        }
        let mut state = self.lock_state();
        if state.sleep_timer.take().is_some() {
            state.emit(PlaybackEvent::SleepTimerChanged { minutes: None });
            tracing::info!("Sleep timer cancelled");
        }
        self.publish(&state);
    }

    pub fn sleep_timer(&self) -> Option<SleepTimerStatus> {
        self.lock_state().sleep_timer.as_ref().map(SleepTimer::status)
    }

    /// One second of sleep timer; true once the timer is gone
    fn sleep_tick(&self) -> bool {
        let mut state = self.lock_state();
        let Some(timer) = state.sleep_timer.as_mut() else {
            return true;
        };

        let fired = timer.tick();
        if fired {
            state.sleep_timer = None;
            state.pause_output();
            state.emit(PlaybackEvent::SleepTimerFired);
            tracing::info!("Sleep timer ended, playback paused");
        }
        self.publish(&state);
        fired
    }

    // ===== Commands =====

    /// Run a user command; skip commands start loads in the background
    pub fn execute(&self, command: PlayerCommand) -> Result<()> {
        match command {
            PlayerCommand::TogglePlayPause => {
                if self.lock_state().session.current_track.is_some() {
                    self.toggle_play_pause()?;
                }
            }
            PlayerCommand::Next => {
                if let Some(err) = self.next().into_ready_error() {
                    return Err(err);
                }
            }
            PlayerCommand::Previous => {
                if let Some(err) = self.previous().into_ready_error() {
                    return Err(err);
                }
            }
            PlayerCommand::VolumeUp => {
                let volume = self.volume();
                self.set_volume(volume + VOLUME_STEP);
            }
            PlayerCommand::VolumeDown => {
                let volume = self.volume();
                self.set_volume(volume - VOLUME_STEP);
            }
            PlayerCommand::ToggleMute => self.toggle_mute(),
            PlayerCommand::SetVolume(volume) => {
                self.set_volume(volume);
            }
            PlayerCommand::Seek(secs) => self.seek(secs)?,
            PlayerCommand::SeekPercent(percent) => self.seek_percent(percent)?,
            PlayerCommand::SetSpeed(rate) => {
                self.set_playback_rate(rate);
            }
            PlayerCommand::Stop => self.stop(),
            PlayerCommand::SetShuffle(shuffle) => self.set_shuffle(shuffle),
            PlayerCommand::SetRepeat(repeat) => self.set_repeat(repeat),
            PlayerCommand::SetCrossfade(secs) => self.set_crossfade(secs),
            PlayerCommand::SleepTimer(Some(minutes)) => self.start_sleep_timer(minutes),
            PlayerCommand::SleepTimer(None) => self.cancel_sleep_timer(),
            PlayerCommand::EqPreset(name) => {
                self.apply_eq_preset(&name)?;
            }
            PlayerCommand::EqBand { index, gain_db } => {
                self.set_eq_band(index, gain_db)?;
            }
        }
        Ok(())
    }

    /// Mute, or restore the volume from before muting
    pub fn toggle_mute(&self) {
        let mut state = self.lock_state();
        if state.session.volume <= 0.0 {
            let restore = state.muted_volume.take().unwrap_or(UNMUTE_VOLUME);
            state.apply_volume(restore);
        } else {
            state.muted_volume = Some(state.session.volume);
            state.apply_volume(0.0);
        }
        self.publish(&state);
    }

    // ===== Observation =====

    pub fn session(&self) -> PlaybackSession {
        self.lock_state().session.clone()
    }

    pub fn volume(&self) -> f32 {
        self.lock_state().session.volume
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.lock_state().snapshot()
    }

    /// Latest snapshot after every change
    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    /// Take all events queued since the last drain
    pub fn drain_events(&self) -> Vec<PlaybackEvent> {
        self.lock_state().events.drain(..).collect()
    }

    /// Lyrics of the current track, if it has any timed lines
    pub fn current_lyrics(&self) -> Option<SyncedLyrics> {
        let state = self.lock_state();
        let lyrics = SyncedLyrics::parse(state.session.current_track.as_ref()?.lyrics.as_deref()?);
        (!lyrics.is_empty()).then_some(lyrics)
    }

    // ===== Internals =====

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tasks(&self) -> MutexGuard<'_, EngineTasks> {
        self.shared
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &EngineState) {
        self.shared.snapshot_tx.send_replace(state.snapshot());
    }

    fn upgrade(weak: &Weak<Shared>) -> Option<Self> {
        weak.upgrade().map(|shared| Self { shared })
    }
}

impl fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("PlaybackEngine")
            .field("state", &state.session.state)
            .field("generation", &state.generation)
            .field("queue_len", &state.queue.len())
            .finish_non_exhaustive()
    }
}

impl PlayRequest {
    /// The error of an already-finished request; pending requests yield `None`
    fn into_ready_error(self) -> Option<PlaybackError> {
        match self.inner {
            RequestInner::Ready(LoadOutcome::Failed(err)) => Some(err),
            _ => None,
        }
    }
}

fn lock_graph(graph: &SharedGraph) -> MutexGuard<'_, AudioGraph> {
    graph.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EngineState {
    fn emit(&mut self, event: PlaybackEvent) {
        if self.events.len() >= MAX_PENDING_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    fn set_state(&mut self, new_state: PlaybackState) {
        if self.session.state != new_state {
            self.session.state = new_state;
            self.emit(PlaybackEvent::StateChanged { state: new_state });
        }
    }

    fn emit_position(&mut self) {
        let position_ms = (self.session.position_secs * 1000.0) as u64;
        let duration_ms = (self.session.duration_secs * 1000.0) as u64;
        self.emit(PlaybackEvent::PositionUpdate {
            position_ms,
            duration_ms,
        });
    }

    fn emit_queue_changed(&mut self) {
        let length = self.queue.len();
        self.emit(PlaybackEvent::QueueChanged { length });
    }

    /// The current track, if it ever reached the output
    fn started_track(&self) -> Option<Track> {
        match self.session.state {
            PlaybackState::Playing | PlaybackState::Paused | PlaybackState::Ended => {
                self.session.current_track.clone()
            }
            PlaybackState::Idle | PlaybackState::Loading => None,
        }
    }

    fn current_id(&self) -> Option<String> {
        self.session.current_track.as_ref().map(|t| t.id.clone())
    }

    fn with_graph<R>(&self, f: impl FnOnce(&mut AudioGraph) -> R) -> Option<R> {
        let live = self.live.as_ref()?;
        let mut graph = lock_graph(&live.graph);
        Some(f(&mut graph))
    }

    /// Pause and release the live output; nothing is audible afterwards
    fn detach_live(&mut self) {
        self.analyzer.detach();
        self.equalizer.detach();
        self.crossfade.reset();
        if let Some(mut live) = self.live.take() {
            live.output.pause();
            live.output.detach();
        }
    }

    fn pause_output(&mut self) {
        if self.session.state == PlaybackState::Loading {
            self.start_paused = true;
            return;
        }
        if self.session.state != PlaybackState::Playing {
            return;
        }
        if let Some(live) = self.live.as_mut() {
            live.output.pause();
        }
        if let Some(position) = self.with_graph(|graph| graph.position().as_secs_f64()) {
            self.session.position_secs = position.min(self.session.duration_secs);
        }
        self.set_state(PlaybackState::Paused);
    }

    fn resume_output(&mut self) -> Result<()> {
        match self.session.state {
            PlaybackState::Playing => Ok(()),
            PlaybackState::Loading => {
                self.start_paused = false;
                Ok(())
            }
            PlaybackState::Idle => Err(PlaybackError::NoTrackLoaded),
            PlaybackState::Paused | PlaybackState::Ended => {
                if self.session.state == PlaybackState::Ended {
                    let volume = self.session.volume;
                    self.with_graph(|graph| {
                        if let Err(e) = graph.seek(Duration::ZERO) {
                            tracing::warn!("Restart seek failed: {}", e);
                        }
                        graph.set_gain(volume);
                    });
                    self.session.position_secs = 0.0;
                    self.crossfade.reset();
                }

                let track_id = self.current_id().unwrap_or_default();
                let live = self.live.as_mut().ok_or(PlaybackError::NoTrackLoaded)?;
                match live.output.resume() {
                    Ok(()) => {
                        self.set_state(PlaybackState::Playing);
                        Ok(())
                    }
                    Err(e) => {
                        let err = PlaybackError::PlaybackRejected {
                            track_id: track_id.clone(),
                            reason: e.to_string(),
                        };
                        tracing::warn!(%track_id, "Resume rejected: {}", e);
                        self.session.last_error = Some(err.to_string());
                        self.emit(PlaybackEvent::PlaybackRejected {
                            track_id,
                            message: e.to_string(),
                        });
                        Err(err)
                    }
                }
            }
        }
    }

    /// Volume change shared by `set_volume` and mute
    fn apply_volume(&mut self, volume: f32) -> f32 {
        let Some(volume) = clamp_volume(volume) else {
            return self.session.volume;
        };
        self.session.volume = volume;
        if self.crossfade.is_fading() {
            self.crossfade.cancel();
        }
        self.with_graph(|graph| graph.set_gain(volume));
        self.emit(PlaybackEvent::VolumeChanged { volume });
        volume
    }

    /// Back to a clean idle session, remembering why
    fn fail_load(&mut self, track: &Track, err: &PlaybackError) {
        if matches!(err, PlaybackError::LoadTimedOut { .. }) {
            // The fetch may still land; make sure it is ignored
            self.generation += 1;
        }
        self.start_paused = false;
        self.detach_live();
        self.set_state(PlaybackState::Idle);
        let (volume, rate) = (self.session.volume, self.session.playback_rate);
        self.session = PlaybackSession {
            last_error: Some(err.to_string()),
            ..PlaybackSession::new(volume, rate)
        };

        match err {
            PlaybackError::PlaybackRejected { reason, .. } => {
                tracing::warn!(track_id = %track.id, "Playback rejected: {}", reason);
                self.emit(PlaybackEvent::PlaybackRejected {
                    track_id: track.id.clone(),
                    message: reason.clone(),
                });
            }
            other => {
                tracing::warn!(track_id = %track.id, "Track load failed: {}", other);
                self.emit(PlaybackEvent::LoadFailed {
                    track_id: track.id.clone(),
                    message: other.to_string(),
                    timed_out: matches!(other, PlaybackError::LoadTimedOut { .. }),
                });
            }
        }
    }

    fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            session: self.session.clone(),
            queue: self.queue.tracks(),
            history: self.queue.history(),
            shuffle: self.queue.shuffle(),
            repeat: self.queue.repeat(),
            crossfade_secs: self.crossfade.duration_secs(),
            crossfade_active: self.crossfade.is_fading(),
            sleep_timer: self.sleep_timer.as_ref().map(SleepTimer::status),
            equalizer: self.equalizer.state().clone(),
        }
    }
}
