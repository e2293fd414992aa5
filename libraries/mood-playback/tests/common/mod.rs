//! Shared test utilities: a scripted backend with observable outputs

#![allow(dead_code)]

use async_trait::async_trait;
use mood_audio::{AudioError, AudioSource, MemorySource, Result as AudioResult, SharedGraph};
use mood_playback::{AudioBackend, OutputHandle, PlaybackEngine, PlaybackState, PlayerSnapshot, Track};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Rate every mock graph runs at; low to keep buffers small
pub const TEST_RATE: u32 = 8_000;

/// How a URL behaves when loaded
#[derive(Debug, Clone)]
pub enum Script {
    /// Silent audio of `secs`, after `delay`
    Ok { secs: u32, delay: Duration },
    /// Fails with this reason
    Fail(String),
    /// Never completes
    Hang,
}

/// An output the engine opened, as seen from the test
pub struct OutputProbe {
    pub url: String,
    pub graph: SharedGraph,
    pub paused: AtomicBool,
    pub detached: AtomicBool,
    pub resumes: AtomicUsize,
    reject_resume: Arc<AtomicBool>,
}

impl OutputProbe {
    pub fn is_audible(&self) -> bool {
        !self.paused.load(Ordering::SeqCst) && !self.detached.load(Ordering::SeqCst)
    }

    pub fn gain(&self) -> f32 {
        self.graph.lock().unwrap().gain()
    }

    /// Pull `secs` of audio through the graph, as a device would
    pub fn render_secs(&self, secs: f64) {
        let samples = (secs * f64::from(TEST_RATE)) as usize * 2;
        let mut buffer = vec![0.0f32; samples.max(2)];
        self.graph.lock().unwrap().render(&mut buffer);
    }
}

struct ProbeHandle(Arc<OutputProbe>);

impl OutputHandle for ProbeHandle {
    fn pause(&mut self) {
        self.0.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&mut self) -> AudioResult<()> {
        if self.0.reject_resume.load(Ordering::SeqCst) {
            return Err(AudioError::OutputRejected("resume refused".into()));
        }
        self.0.paused.store(false, Ordering::SeqCst);
        self.0.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn detach(&mut self) {
        self.0.paused.store(true, Ordering::SeqCst);
        self.0.detached.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MockBackend {
    scripts: Mutex<HashMap<String, Script>>,
    outputs: Mutex<Vec<Arc<OutputProbe>>>,
    loads: AtomicUsize,
    pub reject_output: AtomicBool,
    pub reject_resume: Arc<AtomicBool>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, track: &Track, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(track.source_url.clone(), script);
    }

    /// Register a track that loads instantly
    pub fn ready(&self, track: &Track, secs: u32) {
        self.script(
            track,
            Script::Ok {
                secs,
                delay: Duration::ZERO,
            },
        );
    }

    pub fn outputs(&self) -> Vec<Arc<OutputProbe>> {
        self.outputs.lock().unwrap().clone()
    }

    pub fn last_output(&self) -> Arc<OutputProbe> {
        self.outputs().last().cloned().expect("no output opened")
    }

    /// Outputs that are currently producing sound
    pub fn audible_count(&self) -> usize {
        self.outputs().iter().filter(|o| o.is_audible()).count()
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioBackend for MockBackend {
    async fn load(&self, url: &str) -> AudioResult<Box<dyn AudioSource>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().get(url).cloned();

        match script {
            Some(Script::Ok { secs, delay }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(Box::new(MemorySource::silent(
                    Duration::from_secs(u64::from(secs)),
                    TEST_RATE,
                )))
            }
            Some(Script::Fail(reason)) => Err(AudioError::Fetch {
                url: url.to_string(),
                reason,
            }),
            Some(Script::Hang) => std::future::pending().await,
            None => Err(AudioError::FileNotFound(url.to_string())),
        }
    }

    fn open_output(&self, graph: SharedGraph) -> AudioResult<Box<dyn OutputHandle>> {
        if self.reject_output.load(Ordering::SeqCst) {
            return Err(AudioError::OutputRejected("autoplay blocked".into()));
        }

        let url = format!("output-{}", self.outputs.lock().unwrap().len());
        let probe = Arc::new(OutputProbe {
            url,
            graph,
            paused: AtomicBool::new(false),
            detached: AtomicBool::new(false),
            resumes: AtomicUsize::new(0),
            reject_resume: Arc::clone(&self.reject_resume),
        });
        self.outputs.lock().unwrap().push(Arc::clone(&probe));
        Ok(Box::new(ProbeHandle(probe)))
    }

    fn sample_rate(&self) -> u32 {
        TEST_RATE
    }
}

pub fn track(id: &str) -> Track {
    Track::new(
        id,
        format!("Song {id}"),
        "Test Artist",
        format!("https://cdn.test/{id}.mp3"),
    )
}

/// Wait until a snapshot satisfies `done`, failing after five seconds
pub async fn wait_for(engine: &PlaybackEngine, done: impl Fn(&PlayerSnapshot) -> bool) -> PlayerSnapshot {
    let mut rx = engine.subscribe();
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if done(&snapshot) {
                    return snapshot.clone();
                }
            }
            if rx.changed().await.is_err() {
                panic!("engine dropped while waiting");
            }
        }
    })
    .await;
    waited.expect("condition not reached in time")
}

/// Wait until `id` is the current track and playing
pub async fn wait_playing(engine: &PlaybackEngine, id: &str) -> PlayerSnapshot {
    wait_for(engine, |s| {
        s.session.state == PlaybackState::Playing
            && s.session.current_track.as_ref().is_some_and(|t| t.id == id)
    })
    .await
}
