//! Client state
//!
//! Holds the reconciled session view plus the ancillary cells fed by push
//! events (devices, models, diarization, summaries, retranscription progress,
//! LLM post-processing, streaming text, audio levels). Every change is announced on a broadcast channel as a
//! [`StateChange`]; readers take snapshots, nothing hands out references into
//! the locks.

pub mod dialogue;
pub mod reconciler;
pub mod recording;
pub mod speakers;

use aiwisper_audio::MeterLevels;
use aiwisper_types::{
    AudioDevice, DialogueSegment, ModelState, ServerEvent, Session, SessionInfo, SessionSpeaker,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub use dialogue::{assemble_dialogue, chunk_start_seconds};
pub use reconciler::{SessionChange, SessionReconciler};
pub use recording::RecordingClock;
pub use speakers::SpeakerRoster;

/// Broadcast notification of a state change
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    Session(SessionChange),
    RecordingTick { elapsed: Duration },
    Devices,
    Models,
    Diarization,
    Speakers { session_id: String },
    Summary { session_id: String },
    Retranscription { session_id: String },
    LlmTask { session_id: String, task: LlmTask },
    Streaming,
    AudioLevels(MeterLevels),
    BackendError(String),
}

/// Summary generation state for one session
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SummaryState {
    #[default]
    Idle,
    Generating,
    Ready(String),
    Failed(String),
}

/// Full retranscription state for one session
#[derive(Debug, Clone, PartialEq)]
pub enum RetranscriptionState {
    Running { progress: f64, message: String },
    Completed,
    Failed(String),
    Cancelled,
}

/// LLM post-processing jobs the backend runs over a finished session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmTask {
    Improve,
    Diarize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LlmTaskState {
    Running,
    Completed,
    Failed(String),
}

/// Text from the streaming recognizer during a recording
///
/// Confirmed updates are appended to `confirmed`; volatile ones replace
/// `volatile` until the recognizer confirms them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamingText {
    pub confirmed: String,
    pub volatile: String,
    pub confidence: f64,
    /// Unix milliseconds of the last update
    pub timestamp_ms: i64,
}

impl StreamingText {
    fn push(&mut self, text: &str, is_confirmed: bool, confidence: f64, timestamp_ms: i64) {
        if is_confirmed {
            let text = text.trim();
            if !text.is_empty() {
                if !self.confirmed.is_empty() {
                    self.confirmed.push(' ');
                }
                self.confirmed.push_str(text);
            }
            self.volatile.clear();
        } else {
            self.volatile = text.to_string();
        }
        self.confidence = confidence;
        self.timestamp_ms = timestamp_ms;
    }

    /// Confirmed text followed by the volatile tail
    pub fn display(&self) -> String {
        match (self.confirmed.is_empty(), self.volatile.trim().is_empty()) {
            (_, true) => self.confirmed.clone(),
            (true, false) => self.volatile.trim().to_string(),
            (false, false) => format!("{} {}", self.confirmed, self.volatile.trim()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiarizationStatus {
    pub enabled: bool,
    pub provider: String,
    pub backend: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelCatalog {
    pub models: Vec<ModelState>,
    pub active_model_id: Option<String>,
}

/// Main client state
#[derive(Clone)]
pub struct ClientState {
    inner: Arc<ClientStateInner>,
}

struct ClientStateInner {
    sessions: RwLock<SessionReconciler>,
    recording: RecordingClock,
    devices: RwLock<Vec<AudioDevice>>,
    screen_capture_kit_available: RwLock<bool>,
    models: RwLock<ModelCatalog>,
    diarization: RwLock<DiarizationStatus>,
    speakers: RwLock<HashMap<String, SpeakerRoster>>,
    summaries: RwLock<HashMap<String, SummaryState>>,
    retranscriptions: RwLock<HashMap<String, RetranscriptionState>>,
    chunk_errors: RwLock<HashMap<String, String>>,
    llm_tasks: RwLock<HashMap<(String, LlmTask), LlmTaskState>>,
    streaming: RwLock<StreamingText>,
    pushed_levels: RwLock<MeterLevels>,
    last_error: RwLock<Option<String>>,
    changes_tx: broadcast::Sender<StateChange>,
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientState {
    pub fn new() -> Self {
        let (changes_tx, _) = broadcast::channel(256);

        Self {
            inner: Arc::new(ClientStateInner {
                sessions: RwLock::new(SessionReconciler::new()),
                recording: RecordingClock::new(),
                devices: RwLock::new(Vec::new()),
                screen_capture_kit_available: RwLock::new(false),
                models: RwLock::new(ModelCatalog::default()),
                diarization: RwLock::new(DiarizationStatus::default()),
                speakers: RwLock::new(HashMap::new()),
                summaries: RwLock::new(HashMap::new()),
                retranscriptions: RwLock::new(HashMap::new()),
                chunk_errors: RwLock::new(HashMap::new()),
                llm_tasks: RwLock::new(HashMap::new()),
                streaming: RwLock::new(StreamingText::default()),
                pushed_levels: RwLock::new(MeterLevels::default()),
                last_error: RwLock::new(None),
                changes_tx,
            }),
        }
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.inner.changes_tx.subscribe()
    }

    fn publish(&self, change: StateChange) {
        // No receivers is fine
        let _ = self.inner.changes_tx.send(change);
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    pub fn live_session(&self) -> Option<Session> {
        self.inner.sessions.read().live().cloned()
    }

    pub fn inspected_session(&self) -> Option<Session> {
        self.inner.sessions.read().inspected().cloned()
    }

    pub fn selected_session_id(&self) -> Option<String> {
        self.inner.sessions.read().selected_id().map(str::to_string)
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.inner.sessions.read().sessions().to_vec()
    }

    /// Merged dialogue of the inspected session
    pub fn inspected_dialogue(&self) -> Vec<DialogueSegment> {
        self.inner
            .sessions
            .read()
            .inspected()
            .map(assemble_dialogue)
            .unwrap_or_default()
    }

    pub fn devices(&self) -> Vec<AudioDevice> {
        self.inner.devices.read().clone()
    }

    pub fn screen_capture_kit_available(&self) -> bool {
        *self.inner.screen_capture_kit_available.read()
    }

    pub fn models(&self) -> ModelCatalog {
        self.inner.models.read().clone()
    }

    pub fn diarization(&self) -> DiarizationStatus {
        self.inner.diarization.read().clone()
    }

    pub fn speakers(&self, session_id: &str) -> Vec<SessionSpeaker> {
        self.inner
            .speakers
            .read()
            .get(session_id)
            .map(|r| r.speakers().to_vec())
            .unwrap_or_default()
    }

    pub fn summary(&self, session_id: &str) -> SummaryState {
        self.inner
            .summaries
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn retranscription(&self, session_id: &str) -> Option<RetranscriptionState> {
        self.inner.retranscriptions.read().get(session_id).cloned()
    }

    pub fn chunk_error(&self, session_id: &str) -> Option<String> {
        self.inner.chunk_errors.read().get(session_id).cloned()
    }

    pub fn llm_task(&self, session_id: &str, task: LlmTask) -> Option<LlmTaskState> {
        self.inner
            .llm_tasks
            .read()
            .get(&(session_id.to_string(), task))
            .cloned()
    }

    pub fn streaming_text(&self) -> StreamingText {
        self.inner.streaming.read().clone()
    }

    /// Levels pushed by the backend during recording
    pub fn pushed_levels(&self) -> MeterLevels {
        *self.inner.pushed_levels.read()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.read().clone()
    }

    pub fn recording_elapsed(&self) -> Duration {
        self.inner.recording.elapsed()
    }

    pub fn is_recording(&self) -> bool {
        self.inner.sessions.read().live().is_some()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Record the session the user opened
    pub fn select_session(&self, session_id: &str) {
        let changes = self.inner.sessions.write().select(session_id);
        for change in changes {
            self.publish(StateChange::Session(change));
        }
    }

    pub fn clear_selection(&self) {
        let changes = self.inner.sessions.write().clear_selection();
        for change in changes {
            self.publish(StateChange::Session(change));
        }
    }

    /// Mark summary generation as requested before the backend confirms
    pub fn mark_summary_requested(&self, session_id: &str) {
        self.inner
            .summaries
            .write()
            .insert(session_id.to_string(), SummaryState::Generating);
        self.publish(StateChange::Summary {
            session_id: session_id.to_string(),
        });
    }

    /// Mark an LLM job as requested before the backend confirms
    pub fn mark_llm_task_requested(&self, session_id: &str, task: LlmTask) {
        self.set_llm_task(session_id, task, LlmTaskState::Running);
    }

    /// Apply a decoded push event
    pub fn apply(&self, event: &ServerEvent) {
        let session_changes = self.inner.sessions.write().apply(event);
        for change in session_changes {
            self.on_session_change(&change);
            self.publish(StateChange::Session(change));
        }

        match event {
            ServerEvent::Devices {
                devices,
                screen_capture_kit_available,
            } => {
                *self.inner.devices.write() = devices.clone();
                *self.inner.screen_capture_kit_available.write() = *screen_capture_kit_available;
                self.publish(StateChange::Devices);
            }

            ServerEvent::ModelsList { models } => {
                self.inner.models.write().models = models.clone();
                self.publish(StateChange::Models);
            }

            ServerEvent::ModelProgress {
                model_id,
                progress,
                data,
                error,
            } => {
                {
                    let mut catalog = self.inner.models.write();
                    if let Some(model) = catalog.models.iter_mut().find(|m| &m.id == model_id) {
                        model.progress = *progress;
                        if !data.is_empty() {
                            model.status = data.clone();
                        }
                        model.error = error.clone();
                    }
                }
                self.publish(StateChange::Models);
            }

            ServerEvent::ActiveModelChanged { model_id } => {
                self.inner.models.write().active_model_id = Some(model_id.clone());
                self.publish(StateChange::Models);
            }

            ServerEvent::AudioLevel {
                mic_level,
                system_level,
            } => {
                let levels = MeterLevels::from_pushed(*mic_level, *system_level);
                *self.inner.pushed_levels.write() = levels;
                self.publish(StateChange::AudioLevels(levels));
            }

            ServerEvent::SessionSpeakers {
                session_id,
                speakers,
            } => {
                self.inner.speakers.write().insert(
                    session_id.clone(),
                    SpeakerRoster::from_speakers(speakers.clone()),
                );
                self.publish(StateChange::Speakers {
                    session_id: session_id.clone(),
                });
            }

            ServerEvent::SpeakerRenamed {
                session_id,
                local_speaker_id,
                speaker_name,
                voiceprint_id,
            } => {
                let changed = self
                    .inner
                    .speakers
                    .write()
                    .entry(session_id.clone())
                    .or_default()
                    .rename(*local_speaker_id, speaker_name, voiceprint_id.as_deref());
                if changed {
                    self.publish(StateChange::Speakers {
                        session_id: session_id.clone(),
                    });
                }
            }

            ServerEvent::SummaryStarted { session_id } => {
                self.set_summary(session_id, SummaryState::Generating);
            }
            ServerEvent::SummaryCompleted {
                session_id,
                summary,
            } => {
                self.set_summary(session_id, SummaryState::Ready(summary.clone()));
                let changes = self
                    .inner
                    .sessions
                    .write()
                    .set_summary(session_id, summary);
                for change in changes {
                    self.publish(StateChange::Session(change));
                }
            }
            ServerEvent::SummaryError { session_id, error } => {
                self.set_summary(session_id, SummaryState::Failed(error.clone()));
            }

            ServerEvent::FullTranscriptionStarted { session_id } => {
                self.set_retranscription(
                    session_id,
                    RetranscriptionState::Running {
                        progress: 0.0,
                        message: String::new(),
                    },
                );
            }
            ServerEvent::FullTranscriptionProgress {
                session_id,
                progress,
                data,
            } => {
                self.set_retranscription(
                    session_id,
                    RetranscriptionState::Running {
                        progress: progress.clamp(0.0, 1.0),
                        message: data.clone(),
                    },
                );
            }
            ServerEvent::FullTranscriptionCompleted { session_id, .. } => {
                self.set_retranscription(session_id, RetranscriptionState::Completed);
            }
            ServerEvent::FullTranscriptionError { session_id, error } => {
                self.set_retranscription(session_id, RetranscriptionState::Failed(error.clone()));
            }
            ServerEvent::FullTranscriptionCancelled { session_id, .. } => {
                self.set_retranscription(session_id, RetranscriptionState::Cancelled);
            }

            ServerEvent::ImproveStarted { session_id } => {
                self.set_llm_task(session_id, LlmTask::Improve, LlmTaskState::Running);
            }
            ServerEvent::ImproveCompleted { session_id, .. } => {
                self.set_llm_task(session_id, LlmTask::Improve, LlmTaskState::Completed);
            }
            ServerEvent::ImproveError { session_id, error } => {
                tracing::warn!("Improve failed for {}: {}", session_id, error);
                self.set_llm_task(session_id, LlmTask::Improve, LlmTaskState::Failed(error.clone()));
            }
            ServerEvent::DiarizeStarted { session_id } => {
                self.set_llm_task(session_id, LlmTask::Diarize, LlmTaskState::Running);
            }
            ServerEvent::DiarizeCompleted { session_id, .. } => {
                self.set_llm_task(session_id, LlmTask::Diarize, LlmTaskState::Completed);
            }
            ServerEvent::DiarizeError { session_id, error } => {
                tracing::warn!("LLM diarization failed for {}: {}", session_id, error);
                self.set_llm_task(session_id, LlmTask::Diarize, LlmTaskState::Failed(error.clone()));
            }

            ServerEvent::StreamingUpdate {
                streaming_text,
                streaming_is_confirmed,
                streaming_confidence,
                streaming_timestamp,
            } => {
                self.inner.streaming.write().push(
                    streaming_text,
                    *streaming_is_confirmed,
                    *streaming_confidence,
                    *streaming_timestamp,
                );
                self.publish(StateChange::Streaming);
            }

            ServerEvent::SessionDeleted { session_id } => {
                self.forget_session(session_id);
            }

            ServerEvent::DiarizationEnabled {
                diarization_provider,
                diarization_backend,
            } => {
                *self.inner.diarization.write() = DiarizationStatus {
                    enabled: true,
                    provider: diarization_provider.clone(),
                    backend: diarization_backend.clone(),
                    error: None,
                };
                self.publish(StateChange::Diarization);
            }
            ServerEvent::DiarizationDisabled => {
                {
                    let mut status = self.inner.diarization.write();
                    status.enabled = false;
                    status.error = None;
                }
                self.publish(StateChange::Diarization);
            }
            ServerEvent::DiarizationStatus {
                diarization_enabled,
                diarization_provider,
            } => {
                {
                    let mut status = self.inner.diarization.write();
                    status.enabled = *diarization_enabled;
                    status.provider = diarization_provider.clone();
                }
                self.publish(StateChange::Diarization);
            }
            ServerEvent::DiarizationError { error } => {
                self.inner.diarization.write().error = Some(error.clone());
                self.publish(StateChange::Diarization);
            }

            ServerEvent::Error { data } => {
                tracing::warn!("Backend error: {}", data);
                *self.inner.last_error.write() = Some(data.clone());
                self.publish(StateChange::BackendError(data.clone()));
            }

            _ => {}
        }
    }

    fn on_session_change(&self, change: &SessionChange) {
        match change {
            SessionChange::RecordingStarted {
                session_id,
                start_time,
            } => {
                tracing::info!("Recording started: {}", session_id);
                self.inner.recording.start(
                    recording::parse_start_time(start_time),
                    self.inner.changes_tx.clone(),
                );
                *self.inner.pushed_levels.write() = MeterLevels::default();
                *self.inner.streaming.write() = StreamingText::default();
            }
            SessionChange::RecordingStopped { session_id } => {
                tracing::info!("Recording stopped: {:?}", session_id);
                self.inner.recording.stop();
                *self.inner.pushed_levels.write() = MeterLevels::default();
                *self.inner.streaming.write() = StreamingText::default();
            }
            SessionChange::ChunkError { session_id, error } => {
                tracing::warn!("Chunk error in session {}: {}", session_id, error);
                self.inner
                    .chunk_errors
                    .write()
                    .insert(session_id.clone(), error.clone());
            }
            _ => {}
        }
    }

    fn set_summary(&self, session_id: &str, state: SummaryState) {
        self.inner
            .summaries
            .write()
            .insert(session_id.to_string(), state);
        self.publish(StateChange::Summary {
            session_id: session_id.to_string(),
        });
    }

    /// Drop every per-session cell of a deleted session
    fn forget_session(&self, session_id: &str) {
        self.inner.speakers.write().remove(session_id);
        self.inner.summaries.write().remove(session_id);
        self.inner.retranscriptions.write().remove(session_id);
        self.inner.chunk_errors.write().remove(session_id);
        self.inner
            .llm_tasks
            .write()
            .retain(|(id, _), _| id != session_id);
        tracing::debug!("Forgot cached state of deleted session {}", session_id);
    }

    fn set_llm_task(&self, session_id: &str, task: LlmTask, state: LlmTaskState) {
        self.inner
            .llm_tasks
            .write()
            .insert((session_id.to_string(), task), state);
        self.publish(StateChange::LlmTask {
            session_id: session_id.to_string(),
            task,
        });
    }

    fn set_retranscription(&self, session_id: &str, state: RetranscriptionState) {
        self.inner
            .retranscriptions
            .write()
            .insert(session_id.to_string(), state);
        self.publish(StateChange::Retranscription {
            session_id: session_id.to_string(),
        });
    }
}
