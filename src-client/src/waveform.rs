//! Waveform service
//!
//! Owns waveform results per session: answers from memory when a session was
//! already analyzed, then from the external cache, and only then downloads
//! and decodes the full recording. A result that arrives after the user
//! moved on to another session, or after a recording started, is discarded.

use aiwisper_audio::WaveformAnalyzer;
use aiwisper_types::WaveformData;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::media::{MediaSource, WaveformCache};
use crate::state::{ClientState, SessionChange, StateChange};

#[derive(Debug, Clone, PartialEq)]
pub enum WaveformState {
    Loading,
    Ready(Arc<WaveformData>),
    Failed(String),
}

pub struct WaveformService {
    analyzer: WaveformAnalyzer,
    media: Arc<dyn MediaSource>,
    cache: Arc<dyn WaveformCache>,
    /// Session the latest request was made for
    current: RwLock<Option<String>>,
    states: RwLock<HashMap<String, WaveformState>>,
}

impl WaveformService {
    pub fn new(
        analyzer: WaveformAnalyzer,
        media: Arc<dyn MediaSource>,
        cache: Arc<dyn WaveformCache>,
    ) -> Self {
        Self {
            analyzer,
            media,
            cache,
            current: RwLock::new(None),
            states: RwLock::new(HashMap::new()),
        }
    }

    pub fn state(&self, session_id: &str) -> Option<WaveformState> {
        self.states.read().get(session_id).cloned()
    }

    pub fn current_session(&self) -> Option<String> {
        self.current.read().clone()
    }

    /// Forget the current request so in-flight results are dropped
    pub fn cancel(&self) {
        *self.current.write() = None;
    }

    /// Whether opening `session_id` should start a request
    ///
    /// A session that is loading or ready for the current selection is left
    /// alone; a failed one is retried.
    pub fn needs_request(&self, session_id: &str) -> bool {
        if !self.is_current(session_id) {
            return true;
        }
        !matches!(
            self.state(session_id),
            Some(WaveformState::Loading) | Some(WaveformState::Ready(_))
        )
    }

    fn is_current(&self, session_id: &str) -> bool {
        self.current.read().as_deref() == Some(session_id)
    }

    /// Waveform for a session
    ///
    /// Returns `None` when the result went stale before it arrived.
    pub async fn request(&self, session_id: &str) -> Option<WaveformState> {
        *self.current.write() = Some(session_id.to_string());

        if let Some(WaveformState::Ready(waveform)) = self.state(session_id) {
            tracing::debug!("Waveform for {} already analyzed", session_id);
            return Some(WaveformState::Ready(waveform));
        }

        self.states
            .write()
            .insert(session_id.to_string(), WaveformState::Loading);

        match self.cache.get(session_id).await {
            Ok(Some(waveform)) => {
                tracing::debug!("Loaded waveform for {} from cache", session_id);
                return self.settle(session_id, WaveformState::Ready(Arc::new(waveform)));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Waveform cache lookup failed for {}: {:#}", session_id, e),
        }

        if !self.is_current(session_id) {
            return self.settle(session_id, WaveformState::Loading);
        }

        let url = self.media.endpoints().full_audio(session_id);
        let bytes = match self.media.fetch(&url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to fetch audio for {}: {:#}", session_id, e);
                return self.settle(session_id, WaveformState::Failed(e.to_string()));
            }
        };

        let analyzer = self.analyzer;
        let analyzed = tokio::task::spawn_blocking(move || analyzer.analyze(bytes)).await;

        let state = match analyzed {
            Ok(Ok(waveform)) => {
                tracing::info!(
                    "Computed waveform for {}: {} slices, {:.1}s",
                    session_id,
                    waveform.sample_count,
                    waveform.duration
                );
                WaveformState::Ready(Arc::new(waveform))
            }
            Ok(Err(e)) => {
                tracing::warn!("Failed to decode audio for {}: {:#}", session_id, e);
                WaveformState::Failed(e.to_string())
            }
            Err(e) => WaveformState::Failed(e.to_string()),
        };

        let fresh = matches!(state, WaveformState::Ready(_)) && self.is_current(session_id);
        let settled = self.settle(session_id, state);

        if fresh {
            if let Some(WaveformState::Ready(waveform)) = &settled {
                if let Err(e) = self.cache.put(session_id, waveform).await {
                    tracing::warn!("Failed to cache waveform for {}: {:#}", session_id, e);
                }
            }
        }
        settled
    }

    /// Store the result unless the request went stale
    ///
    /// A failure releases the current selection so the next open retries.
    fn settle(&self, session_id: &str, state: WaveformState) -> Option<WaveformState> {
        let mut states = self.states.write();
        if !self.is_current(session_id) {
            tracing::debug!("Discarding stale waveform for {}", session_id);
            states.remove(session_id);
            return None;
        }
        if matches!(state, WaveformState::Failed(_)) {
            *self.current.write() = None;
        }
        states.insert(session_id.to_string(), state.clone());
        Some(state)
    }
}

// ============================================================================
// Selection follower
// ============================================================================

/// Analyze the waveform of whichever session the user opens
///
/// A recording start drops any in-flight analysis. Subscribes before
/// returning, so no change applied afterwards is missed.
pub fn follow_selection(state: ClientState, waveforms: Arc<WaveformService>) -> JoinHandle<()> {
    let mut changes = state.subscribe();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(StateChange::Session(SessionChange::Inspected)) => {
                    let Some(session_id) = state.selected_session_id() else {
                        waveforms.cancel();
                        continue;
                    };
                    if !waveforms.needs_request(&session_id) {
                        continue;
                    }
                    let waveforms = waveforms.clone();
                    tokio::spawn(async move {
                        waveforms.request(&session_id).await;
                    });
                }
                Ok(StateChange::Session(SessionChange::RecordingStarted { session_id, .. })) => {
                    tracing::debug!("Recording {} started, dropping waveform work", session_id);
                    waveforms.cancel();
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => {
                    tracing::debug!("Waveform follower lagged by {} changes", n);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
