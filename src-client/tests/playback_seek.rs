//! Playback engine against a scripted sink and loader

use aiwisper_audio::{AnalysisGraph, DecodedAudio, MeterLevels, PlaybackError, PlaybackSink};
use aiwisper_client::playback::{
    AssetLoader, AudioAsset, PlayOutcome, PlaybackEngine, SeekOutcome,
};
use aiwisper_types::{Chunk, Session};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

const RATE: u32 = 100;

#[derive(Default)]
struct SinkState {
    duration: Option<f64>,
    position: f64,
    playing: bool,
    reject_play: bool,
    log: Vec<String>,
}

#[derive(Default)]
struct ScriptedSink {
    state: Mutex<SinkState>,
    graph: Arc<AnalysisGraph>,
}

impl ScriptedSink {
    fn log(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }
}

impl PlaybackSink for ScriptedSink {
    fn load(&self, audio: DecodedAudio) -> Result<(), PlaybackError> {
        let mut state = self.state.lock();
        state.duration = Some(audio.duration());
        state.position = 0.0;
        state.playing = false;
        state.log.push(format!("load {}", audio.duration()));
        Ok(())
    }

    fn play(&self) -> Result<(), PlaybackError> {
        let mut state = self.state.lock();
        if state.reject_play {
            return Err(PlaybackError::Rejected("autoplay blocked".into()));
        }
        state.playing = true;
        state.log.push("play".into());
        Ok(())
    }

    fn pause(&self) {
        self.state.lock().playing = false;
    }

    fn seek(&self, seconds: f64) -> Result<(), PlaybackError> {
        let mut state = self.state.lock();
        let duration = state.duration.ok_or(PlaybackError::NoAsset)?;
        if !(0.0..=duration).contains(&seconds) {
            return Err(PlaybackError::SeekOutOfRange {
                target: seconds,
                duration,
            });
        }
        state.position = seconds;
        state.log.push(format!("seek {}", seconds));
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.state.lock().position
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().duration
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn analysis_graph(&self) -> Arc<AnalysisGraph> {
        self.graph.clone()
    }
}

/// Chunk clips are 10 s, speaker samples 3 s, the full session 120 s
struct SilentLoader {
    requests: Mutex<Vec<AudioAsset>>,
}

#[async_trait]
impl AssetLoader for SilentLoader {
    async fn load(&self, asset: &AudioAsset) -> anyhow::Result<DecodedAudio> {
        self.requests.lock().push(asset.clone());
        let seconds = match asset {
            AudioAsset::Full { .. } => 120,
            AudioAsset::Chunk { .. } => 10,
            AudioAsset::SpeakerSample { .. } => 3,
        };
        Ok(DecodedAudio {
            channels: vec![vec![0.0; (seconds * RATE) as usize]; 2],
            sample_rate: RATE,
        })
    }
}

fn engine() -> (PlaybackEngine, Arc<ScriptedSink>, Arc<SilentLoader>) {
    let sink = Arc::new(ScriptedSink::default());
    let loader = Arc::new(SilentLoader {
        requests: Mutex::new(Vec::new()),
    });
    let engine = PlaybackEngine::new(sink.clone(), loader.clone(), Duration::from_millis(5));
    (engine, sink, loader)
}

fn chunk(index: u32, start_ms: Option<i64>, seconds: i64) -> Chunk {
    Chunk {
        id: format!("c{}", index),
        session_id: "s1".into(),
        index,
        start_ms,
        duration_ns: seconds * 1_000_000_000,
        ..Default::default()
    }
}

fn session(chunks: Vec<Chunk>) -> Session {
    Session {
        id: "s1".into(),
        chunks,
        ..Default::default()
    }
}

fn position_of(log: &[String], entry: &str) -> usize {
    log.iter()
        .position(|l| l == entry)
        .unwrap_or_else(|| panic!("{:?} not in {:?}", entry, log))
}

#[tokio::test]
async fn test_seek_outside_clip_switches_to_full_before_seeking() {
    let (engine, sink, loader) = engine();
    let session = session(vec![chunk(0, Some(0), 50), chunk(1, Some(50_000), 10)]);

    assert_eq!(
        engine.play_chunk(&session, 1).await.unwrap(),
        PlayOutcome::Started
    );
    let cursor = engine.cursor().await.unwrap();
    assert_eq!(cursor.offset, 50.0);
    assert_eq!(cursor.duration, 10.0);

    assert_eq!(engine.seek(200.0).await.unwrap(), SeekOutcome::SwitchedToFull);

    let cursor = engine.cursor().await.unwrap();
    assert_eq!(
        cursor.asset,
        AudioAsset::Full {
            session_id: "s1".into()
        }
    );
    assert_eq!(cursor.offset, 0.0);
    assert_eq!(cursor.duration, 120.0);

    // the full asset is loaded before any seek reaches the sink
    let log = sink.log();
    assert!(position_of(&log, "load 120") < position_of(&log, "seek 120"));
    assert_eq!(loader.requests.lock().len(), 2);
    assert!(engine.is_playing());
    assert_eq!(engine.position().await, Some(120.0));
}

#[tokio::test]
async fn test_seek_inside_clip_stays_in_place() {
    let (engine, sink, loader) = engine();
    let session = session(vec![chunk(0, Some(0), 50), chunk(1, Some(50_000), 10)]);

    engine.play_chunk(&session, 1).await.unwrap();
    assert_eq!(engine.seek(55.0).await.unwrap(), SeekOutcome::InPlace);

    assert!(sink.log().contains(&"seek 5".to_string()));
    assert_eq!(engine.position().await, Some(55.0));
    assert_eq!(loader.requests.lock().len(), 1);
}

#[tokio::test]
async fn test_seek_before_clip_switches_to_full() {
    let (engine, _sink, _loader) = engine();
    let session = session(vec![chunk(0, Some(0), 50), chunk(1, Some(50_000), 10)]);

    engine.play_chunk(&session, 1).await.unwrap();
    assert_eq!(engine.seek(20.0).await.unwrap(), SeekOutcome::SwitchedToFull);
    assert_eq!(engine.position().await, Some(20.0));
}

#[tokio::test]
async fn test_play_same_asset_toggles_to_stop() {
    let (engine, sink, loader) = engine();
    let session = session(vec![chunk(0, Some(0), 10)]);

    engine.play_chunk(&session, 0).await.unwrap();
    engine.seek(4.0).await.unwrap();

    assert_eq!(
        engine.play_chunk(&session, 0).await.unwrap(),
        PlayOutcome::Stopped
    );
    assert!(!sink.is_playing());
    assert_eq!(sink.current_time(), 0.0);
    assert_eq!(engine.meter_levels(), MeterLevels::default());

    // a stopped asset starts again without reloading
    assert_eq!(
        engine.play_chunk(&session, 0).await.unwrap(),
        PlayOutcome::Started
    );
    assert_eq!(loader.requests.lock().len(), 1);
}

#[tokio::test]
async fn test_switching_assets_resets_local_time_and_offset() {
    let (engine, _sink, _loader) = engine();
    let session = session(vec![chunk(0, Some(0), 50), chunk(1, Some(50_000), 10)]);

    engine.play_chunk(&session, 1).await.unwrap();
    engine.seek(58.0).await.unwrap();

    engine.play_speaker_sample("s1", 2, 75.0).await.unwrap();
    let cursor = engine.cursor().await.unwrap();
    assert_eq!(cursor.offset, 75.0);
    assert_eq!(cursor.local_time, 0.0);
    assert_eq!(cursor.duration, 3.0);

    engine.play_full("s1").await.unwrap();
    let cursor = engine.cursor().await.unwrap();
    assert_eq!(cursor.offset, 0.0);
    assert_eq!(cursor.local_time, 0.0);
}

#[tokio::test]
async fn test_offset_from_prior_durations_without_start_ms() {
    let (engine, _sink, _loader) = engine();
    // legacy chunks: startMs missing or zero past the first chunk
    let session = session(vec![
        chunk(0, None, 30),
        chunk(1, Some(0), 30),
        chunk(2, None, 10),
    ]);

    engine.play_chunk(&session, 2).await.unwrap();
    assert_eq!(engine.cursor().await.unwrap().offset, 60.0);
}

#[tokio::test]
async fn test_rejected_play_resets_meter() {
    let (engine, sink, _loader) = engine();
    sink.state.lock().reject_play = true;

    let err = engine.play_full("s1").await.unwrap_err();
    assert!(matches!(err, PlaybackError::Rejected(_)));
    assert!(!engine.is_playing());
    assert_eq!(engine.meter_levels(), MeterLevels::default());
}

#[tokio::test]
async fn test_seek_without_asset() {
    let (engine, _sink, _loader) = engine();
    assert!(matches!(
        engine.seek(3.0).await,
        Err(PlaybackError::NoAsset)
    ));
}
