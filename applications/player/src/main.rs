//! Mood Player - terminal host for the playback engine

mod settings;

use anyhow::Context;
use clap::Parser;
use mood_playback::{
    DesktopBackend, PlaybackEngine, PlaybackEvent, PlayerCommand, PlayerSnapshot, RepeatMode,
    Track,
};
use settings::PlayerSettings;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often queued engine events are flushed to the terminal
const EVENT_POLL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "mood-player")]
#[command(about = "Play mood playlists from files or URLs", long_about = None)]
struct Cli {
    /// Tracks to queue: local paths, file:// or http(s) URLs
    #[arg(required_unless_present = "print_config")]
    sources: Vec<String>,

    /// Configuration file path
    #[arg(short, long, env = "MOOD_CONFIG")]
    config: Option<PathBuf>,

    /// Initial volume (0.0 - 1.0)
    #[arg(long)]
    volume: Option<f32>,

    /// Shuffle the queue
    #[arg(long)]
    shuffle: bool,

    /// Repeat mode: off, all, one
    #[arg(long)]
    repeat: Option<RepeatMode>,

    /// Crossfade window in seconds (0 disables, max 12)
    #[arg(long)]
    crossfade: Option<u32>,

    /// Equalizer preset
    #[arg(long)]
    preset: Option<String>,

    /// Mood tag attached to every queued track
    #[arg(long)]
    mood: Option<String>,

    /// Pause after this many minutes
    #[arg(long)]
    sleep: Option<u32>,

    /// Print engine events as JSON lines
    #[arg(long)]
    json_events: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mood_player=info,mood_playback=info,mood_audio=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = apply_cli(
        PlayerSettings::load(cli.config.as_deref()).context("Failed to load configuration")?,
        &cli,
    );

    if cli.print_config {
        print!("{}", settings.to_toml()?);
        return Ok(());
    }

    let backend = DesktopBackend::new().context("Failed to open audio output")?;
    let engine = PlaybackEngine::new(Arc::new(backend), settings.playback.clone());

    if let Some(preset) = settings.equalizer.preset.as_deref() {
        if let Err(e) = engine.apply_eq_preset(preset) {
            tracing::warn!("Ignoring equalizer preset: {}", e);
        }
    }

    let tracks = cli
        .sources
        .iter()
        .enumerate()
        .map(|(index, source)| track_from_source(index, source, cli.mood.as_deref()))
        .collect::<Vec<_>>();
    tracing::info!(count = tracks.len(), "Queued tracks");
    engine.set_queue(tracks);

    engine.start_clock();
    if let Some(minutes) = cli.sleep {
        engine.start_sleep_timer(minutes);
    }

    let first = engine.next().outcome().await;
    if let Some(err) = first.error() {
        tracing::error!("First track did not start: {}", err);
    }

    print_help();
    run(&engine, settings.output.json_events).await?;

    engine.shutdown();
    Ok(())
}

/// Command-line flags override file and environment settings
fn apply_cli(mut settings: PlayerSettings, cli: &Cli) -> PlayerSettings {
    if let Some(volume) = cli.volume {
        settings.playback.volume = volume;
    }
    if cli.shuffle {
        settings.playback.shuffle = true;
    }
    if let Some(repeat) = cli.repeat {
        settings.playback.repeat = repeat;
    }
    if let Some(crossfade) = cli.crossfade {
        settings.playback.crossfade_secs = crossfade;
    }
    if let Some(preset) = &cli.preset {
        settings.equalizer.preset = Some(preset.clone());
    }
    if cli.json_events {
        settings.output.json_events = true;
    }
    settings.normalized()
}

/// Read commands from stdin until `quit`, EOF or Ctrl-C
async fn run(engine: &PlaybackEngine, json_events: bool) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut events = tokio::time::interval(EVENT_POLL);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                match line {
                    "" => {}
                    "quit" | "q" | "exit" => break,
                    "status" | "s" => print_status(&engine.snapshot()),
                    "queue" => print_queue(&engine.snapshot()),
                    "bars" => println!("{}", render_bars(&engine.visualizer_frame())),
                    "lyrics" => print_lyrics(engine),
                    "help" | "?" => print_help(),
                    command => match command.parse::<PlayerCommand>() {
                        Ok(command) => {
                            if let Err(e) = engine.execute(command) {
                                println!("! {e}");
                            }
                        }
                        Err(e) => println!("! {e}"),
                    },
                }
            }
            _ = events.tick() => {
                for event in engine.drain_events() {
                    report_event(&event, json_events)?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }
    Ok(())
}

fn track_from_source(index: usize, source: &str, mood: Option<&str>) -> Track {
    let name = source
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(source);
    let title = Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(name);

    let track = Track::new(format!("track-{}", index + 1), title, "Unknown Artist", source);
    match mood {
        Some(mood) => track.with_mood(mood),
        None => track,
    }
}

fn report_event(event: &PlaybackEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    match event {
        PlaybackEvent::TrackChanged { track_id, .. } => println!("> loading {track_id}"),
        PlaybackEvent::StateChanged { state } => println!("> {state:?}"),
        PlaybackEvent::LoadFailed { track_id, message, .. } => println!("! {track_id}: {message}"),
        PlaybackEvent::PlaybackRejected { track_id, message } => {
            println!("! {track_id} rejected: {message}");
        }
        PlaybackEvent::CrossfadeStarted { duration_secs, .. } => {
            println!("> crossfading over {duration_secs}s");
        }
        PlaybackEvent::SleepTimerFired => println!("> sleep timer ended"),
        PlaybackEvent::VisualizerFallback { reason } => println!("> visualizer simulated: {reason}"),
        // Position and the rest are visible through `status`
        _ => {}
    }
    Ok(())
}

fn print_status(snapshot: &PlayerSnapshot) {
    let session = &snapshot.session;
    let title = session
        .current_track
        .as_ref()
        .map_or_else(|| "-".to_string(), |t| format!("{} - {}", t.artist, t.title));

    println!(
        "{:?} | {} | {} / {} | vol {:.0}% | {:.2}x",
        session.state,
        title,
        format_time(session.position_secs),
        format_time(session.duration_secs),
        session.volume * 100.0,
        session.playback_rate,
    );
    println!(
        "shuffle {} | repeat {} | crossfade {}s | eq {} | queue {}",
        if snapshot.shuffle { "on" } else { "off" },
        snapshot.repeat,
        snapshot.crossfade_secs,
        snapshot.equalizer.preset(),
        snapshot.queue.len(),
    );
    if let Some(timer) = snapshot.sleep_timer {
        println!(
            "sleep in {}",
            format_time(f64::from(timer.remaining_secs))
        );
    }
    if let Some(error) = &session.last_error {
        println!("last error: {error}");
    }
}

fn print_queue(snapshot: &PlayerSnapshot) {
    if snapshot.queue.is_empty() {
        println!("(queue empty)");
    }
    for (index, track) in snapshot.queue.iter().enumerate() {
        println!("{:>3}. {} ({})", index + 1, track.title, track.id);
    }
}

fn print_lyrics(engine: &PlaybackEngine) {
    let Some(lyrics) = engine.current_lyrics() else {
        println!("(no lyrics)");
        return;
    };
    let position = engine.session().position_secs;
    match lyrics.active_line(position) {
        Some(index) => println!("♪ {}", lyrics.lines()[index].text),
        None => println!("♪ ..."),
    }
}

fn print_help() {
    println!(
        "commands: space | next | prev | vol <0-1> | up | down | mute | seek <secs|pct%> | \
         speed <x> | shuffle on|off | repeat off|all|one | crossfade <secs> | \
         sleep <min>|off | eq <preset> | eq <band> <db> | status | queue | bars | lyrics | quit"
    );
}

/// `m:ss`
fn format_time(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// One text row per bar height band
fn render_bars(bars: &[f32]) -> String {
    const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    bars.iter()
        .map(|&height| {
            let index = ((height.clamp(0.0, 100.0) / 100.0) * (LEVELS.len() - 1) as f32).round();
            LEVELS[index as usize]
        })
        .collect()
}
