//! Playback engine
//!
//! One sink plays one asset at a time: a chunk clip, a speaker sample or the
//! whole session. The engine keeps the asset's offset into the session so the
//! UI can work in absolute session time, and routes seeks that leave the
//! loaded sub-range to the full-session asset.

mod meter_loop;

pub use meter_loop::MeterLoop;

use aiwisper_audio::{
    decode_bytes, CpalSink, DecodedAudio, MeterLevels, PlaybackError, PlaybackSink,
};
use aiwisper_types::Session;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

use crate::config::ClientConfig;
use crate::media::MediaSource;
use crate::state::dialogue::chunk_start_seconds;

// ============================================================================
// Assets
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioAsset {
    Full { session_id: String },
    Chunk { session_id: String, index: u32 },
    SpeakerSample { session_id: String, local_id: i32 },
}

impl AudioAsset {
    pub fn session_id(&self) -> &str {
        match self {
            AudioAsset::Full { session_id }
            | AudioAsset::Chunk { session_id, .. }
            | AudioAsset::SpeakerSample { session_id, .. } => session_id,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, AudioAsset::Full { .. })
    }
}

/// Fetches and decodes an asset
#[async_trait]
pub trait AssetLoader: Send + Sync {
    async fn load(&self, asset: &AudioAsset) -> Result<DecodedAudio>;
}

/// Loads assets from the backend's HTTP media routes
pub struct HttpAssetLoader {
    media: Arc<dyn MediaSource>,
}

impl HttpAssetLoader {
    pub fn new(media: Arc<dyn MediaSource>) -> Self {
        Self { media }
    }
}

#[async_trait]
impl AssetLoader for HttpAssetLoader {
    async fn load(&self, asset: &AudioAsset) -> Result<DecodedAudio> {
        let endpoints = self.media.endpoints();
        let url = match asset {
            AudioAsset::Full { session_id } => endpoints.full_audio(session_id),
            AudioAsset::Chunk { session_id, index } => endpoints.chunk_audio(session_id, *index),
            AudioAsset::SpeakerSample {
                session_id,
                local_id,
            } => endpoints.speaker_sample(session_id, *local_id),
        };

        let bytes = self.media.fetch(&url).await?;
        let audio =
            tokio::task::spawn_blocking(move || decode_bytes(bytes, Some("mp3"))).await??;
        tracing::debug!(
            "Loaded {} ({:.2}s, {} ch)",
            url,
            audio.duration(),
            audio.channel_count()
        );
        Ok(audio)
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Where playback stands, in both timelines
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackCursor {
    pub asset: AudioAsset,
    /// Absolute session time at which the asset starts, seconds
    pub offset: f64,
    /// Position within the asset, seconds
    pub local_time: f64,
    pub duration: f64,
}

impl PlaybackCursor {
    pub fn absolute_time(&self) -> f64 {
        self.offset + self.local_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Started,
    /// The asset was already playing and is now stopped at 0
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOutcome {
    InPlace,
    SwitchedToFull,
}

struct Loaded {
    asset: AudioAsset,
    offset: f64,
    duration: f64,
}

pub struct PlaybackEngine {
    sink: Arc<dyn PlaybackSink>,
    loader: Arc<dyn AssetLoader>,
    loaded: Mutex<Option<Loaded>>,
    meter: MeterLoop,
}

impl PlaybackEngine {
    pub fn new(
        sink: Arc<dyn PlaybackSink>,
        loader: Arc<dyn AssetLoader>,
        meter_frame: Duration,
    ) -> Self {
        Self {
            sink,
            loader,
            loaded: Mutex::new(None),
            meter: MeterLoop::new(meter_frame),
        }
    }

    /// Engine on the default output device, loading assets over HTTP
    ///
    /// Fails when the machine has no usable output device.
    pub fn open(config: &ClientConfig, media: Arc<dyn MediaSource>) -> Result<Self, PlaybackError> {
        let sink = CpalSink::new()?;
        Ok(Self::new(
            Arc::new(sink),
            Arc::new(HttpAssetLoader::new(media)),
            config.meter_frame(),
        ))
    }

    pub fn is_playing(&self) -> bool {
        self.sink.is_playing()
    }

    pub fn meter_levels(&self) -> MeterLevels {
        self.meter.levels()
    }

    pub fn subscribe_levels(&self) -> watch::Receiver<MeterLevels> {
        self.meter.subscribe()
    }

    pub async fn cursor(&self) -> Option<PlaybackCursor> {
        let loaded = self.loaded.lock().await;
        loaded.as_ref().map(|l| PlaybackCursor {
            asset: l.asset.clone(),
            offset: l.offset,
            local_time: self.sink.current_time(),
            duration: l.duration,
        })
    }

    /// Absolute session time of the playhead
    pub async fn position(&self) -> Option<f64> {
        self.cursor().await.map(|c| c.absolute_time())
    }

    /// Play one chunk's clip, offset by the chunk's absolute start
    pub async fn play_chunk(
        &self,
        session: &Session,
        index: u32,
    ) -> Result<PlayOutcome, PlaybackError> {
        let offset = chunk_start_seconds(session, index).unwrap_or(0.0);
        let asset = AudioAsset::Chunk {
            session_id: session.id.clone(),
            index,
        };
        self.play_asset(asset, offset).await
    }

    pub async fn play_speaker_sample(
        &self,
        session_id: &str,
        local_id: i32,
        offset: f64,
    ) -> Result<PlayOutcome, PlaybackError> {
        let asset = AudioAsset::SpeakerSample {
            session_id: session_id.to_string(),
            local_id,
        };
        self.play_asset(asset, offset).await
    }

    pub async fn play_full(&self, session_id: &str) -> Result<PlayOutcome, PlaybackError> {
        let asset = AudioAsset::Full {
            session_id: session_id.to_string(),
        };
        self.play_asset(asset, 0.0).await
    }

    /// Play an asset, or stop it when it is the one already playing
    pub async fn play_asset(
        &self,
        asset: AudioAsset,
        offset: f64,
    ) -> Result<PlayOutcome, PlaybackError> {
        let mut loaded = self.loaded.lock().await;

        if let Some(current) = loaded.as_ref().filter(|l| l.asset == asset) {
            if self.sink.is_playing() {
                tracing::debug!("Stopping {:?}", current.asset);
                self.rewind();
                return Ok(PlayOutcome::Stopped);
            }
            self.start()?;
            return Ok(PlayOutcome::Started);
        }

        *loaded = Some(self.load(asset, offset).await?);
        self.start()?;
        Ok(PlayOutcome::Started)
    }

    /// Seek to an absolute session time
    ///
    /// Targets outside the loaded sub-range switch to the full-session asset
    /// first.
    pub async fn seek(&self, absolute: f64) -> Result<SeekOutcome, PlaybackError> {
        let mut loaded = self.loaded.lock().await;
        let current = loaded.as_ref().ok_or(PlaybackError::NoAsset)?;

        let duration = self.sink.duration().unwrap_or(current.duration);
        let relative = absolute - current.offset;
        if (0.0..=duration).contains(&relative) {
            self.sink.seek(relative)?;
            return Ok(SeekOutcome::InPlace);
        }

        if current.asset.is_full() {
            self.sink.seek(relative.clamp(0.0, duration))?;
            return Ok(SeekOutcome::InPlace);
        }

        let was_playing = self.sink.is_playing();
        let full = AudioAsset::Full {
            session_id: current.asset.session_id().to_string(),
        };
        tracing::debug!(
            "Seek to {:.2}s is outside {:?}, switching to full audio",
            absolute,
            current.asset
        );

        self.meter.stop();
        let next = self.load(full, 0.0).await?;
        let target = absolute.clamp(0.0, next.duration);
        *loaded = Some(next);
        self.sink.seek(target)?;

        if was_playing {
            self.start()?;
        }
        Ok(SeekOutcome::SwitchedToFull)
    }

    pub async fn pause(&self) {
        let _loaded = self.loaded.lock().await;
        self.sink.pause();
        self.meter.stop();
    }

    /// Stop and rewind the loaded asset
    pub async fn stop(&self) {
        let _loaded = self.loaded.lock().await;
        self.rewind();
    }

    async fn load(&self, asset: AudioAsset, offset: f64) -> Result<Loaded, PlaybackError> {
        self.sink.pause();
        self.meter.stop();

        let audio = self.loader.load(&asset).await.map_err(|e| {
            tracing::warn!("Failed to load {:?}: {:#}", asset, e);
            PlaybackError::Load(e.to_string())
        })?;
        let decoded_duration = audio.duration();
        self.sink.load(audio)?;

        let duration = self.sink.duration().unwrap_or(decoded_duration);
        tracing::info!(
            "Loaded {:?} at offset {:.2}s ({:.2}s)",
            asset,
            offset,
            duration
        );
        Ok(Loaded {
            asset,
            offset,
            duration,
        })
    }

    fn start(&self) -> Result<(), PlaybackError> {
        if let Err(e) = self.sink.play() {
            tracing::warn!("Playback rejected: {}", e);
            self.meter.stop();
            return Err(e);
        }
        self.meter
            .start(self.sink.analysis_graph(), self.sink.clone());
        Ok(())
    }

    fn rewind(&self) {
        self.sink.pause();
        if let Err(e) = self.sink.seek(0.0) {
            tracing::debug!("Rewind failed: {}", e);
        }
        self.meter.stop();
    }
}
