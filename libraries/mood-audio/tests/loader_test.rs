//! Loading real files through fetch, decode and resample

use mood_audio::{decode_bytes, AudioError, AudioSource, GraphBuilder, SymphoniaLoader};
use std::path::Path;
use std::time::Duration;

fn write_wav(path: &Path, sample_rate: u32, channels: u16, seconds: f32) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let frames = (sample_rate as f32 * seconds) as usize;
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let sample = ((2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5 * i16::MAX as f32) as i16;
        for _ in 0..channels {
            writer.write_sample(sample).unwrap();
        }
    }
    writer.finalize().unwrap();
}

#[test]
fn test_decode_stereo_wav() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_wav(&path, 44_100, 2, 0.5);

    let decoded = decode_bytes(std::fs::read(&path).unwrap(), Some("wav")).unwrap();
    assert_eq!(decoded.sample_rate, 44_100);
    assert_eq!(decoded.frames(), 22_050);
    assert!(decoded.samples.iter().any(|&s| s.abs() > 0.4));
}

#[test]
fn test_decode_mono_wav_without_hint() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mono");
    write_wav(&path, 22_050, 1, 0.25);

    let decoded = decode_bytes(std::fs::read(&path).unwrap(), None).unwrap();
    assert_eq!(decoded.frames(), 5_512);
    // Duplicated into both channels
    for frame in decoded.samples.chunks_exact(2) {
        assert_eq!(frame[0], frame[1]);
    }
}

#[tokio::test]
async fn test_loader_resamples_to_graph_rate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("low.wav");
    write_wav(&path, 22_050, 2, 1.0);

    let loader = SymphoniaLoader::new(44_100);
    let source = loader.load(path.to_str().unwrap()).await.unwrap();

    let duration = source.duration().as_secs_f64();
    assert!((duration - 1.0).abs() < 0.01, "duration was {duration}");
    assert_eq!(source.source_rate(), 44_100);
}

#[tokio::test]
async fn test_loader_reports_missing_file() {
    let loader = SymphoniaLoader::new(44_100);
    let result = loader.load("/no/such/track.mp3").await;
    assert!(matches!(result, Err(AudioError::FileNotFound(_))));
}

#[tokio::test]
async fn test_loader_rejects_non_audio() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "definitely not audio ".repeat(64)).unwrap();

    let loader = SymphoniaLoader::new(44_100);
    assert!(loader.load(path.to_str().unwrap()).await.is_err());
}

#[tokio::test]
async fn test_loaded_track_plays_through_graph() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_wav(&path, 44_100, 2, 0.2);

    let source = SymphoniaLoader::new(44_100)
        .load(path.to_str().unwrap())
        .await
        .unwrap();
    let mut graph = GraphBuilder::new(44_100).gain(0.5).build(Box::new(source));

    let mut block = vec![0.0; 4096];
    while graph.render(&mut block) > 0 {}
    assert!(graph.is_finished());
    assert!((graph.position().as_secs_f64() - 0.2).abs() < 0.001);

    graph.seek(Duration::from_millis(100)).unwrap();
    assert!(!graph.is_finished());
}
