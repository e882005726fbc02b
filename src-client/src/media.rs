//! HTTP media endpoints
//!
//! Session audio, per-chunk audio, speaker samples and the waveform cache
//! are served by the backend's HTTP listener.

use aiwisper_types::WaveformData;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;

/// URL builder for the backend's media routes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEndpoints {
    base: String,
}

impl MediaEndpoints {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn full_audio(&self, session_id: &str) -> String {
        format!("{}/api/sessions/{}/full.mp3", self.base, session_id)
    }

    pub fn chunk_audio(&self, session_id: &str, index: u32) -> String {
        format!("{}/api/sessions/{}/chunk/{}.mp3", self.base, session_id, index)
    }

    pub fn speaker_sample(&self, session_id: &str, local_id: i32) -> String {
        format!("{}/api/speaker-sample/{}/{}", self.base, session_id, local_id)
    }

    pub fn waveform(&self, session_id: &str) -> String {
        format!("{}/api/waveform/{}", self.base, session_id)
    }
}

/// Source of encoded session audio
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;

    fn endpoints(&self) -> &MediaEndpoints;
}

/// Persisted waveform analysis, keyed by session id
#[async_trait]
pub trait WaveformCache: Send + Sync {
    /// `None` when nothing is stored yet
    async fn get(&self, session_id: &str) -> Result<Option<WaveformData>>;

    async fn put(&self, session_id: &str, waveform: &WaveformData) -> Result<()>;
}

/// reqwest-backed client for media and waveform cache
#[derive(Clone)]
pub struct HttpMediaClient {
    client: reqwest::Client,
    endpoints: MediaEndpoints,
}

impl HttpMediaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints: MediaEndpoints::new(base_url),
        }
    }
}

#[async_trait]
impl MediaSource for HttpMediaClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!("Fetching {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to request {}", url))?
            .error_for_status()
            .with_context(|| format!("Bad response from {}", url))?;

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read body from {}", url))?;
        Ok(bytes.to_vec())
    }

    fn endpoints(&self) -> &MediaEndpoints {
        &self.endpoints
    }
}

#[async_trait]
impl WaveformCache for HttpMediaClient {
    async fn get(&self, session_id: &str) -> Result<Option<WaveformData>> {
        let url = self.endpoints.waveform(session_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to request {}", url))?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let waveform = response
                    .json::<WaveformData>()
                    .await
                    .context("Failed to parse cached waveform")?;
                Ok(Some(waveform))
            }
            status => anyhow::bail!("Waveform cache returned {}", status),
        }
    }

    async fn put(&self, session_id: &str, waveform: &WaveformData) -> Result<()> {
        let url = self.endpoints.waveform(session_id);
        self.client
            .post(&url)
            .json(waveform)
            .send()
            .await
            .with_context(|| format!("Failed to post {}", url))?
            .error_for_status()
            .context("Waveform cache rejected the upload")?;
        tracing::debug!("Cached waveform for session {}", session_id);
        Ok(())
    }
}
