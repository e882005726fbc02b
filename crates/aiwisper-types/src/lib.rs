//! Shared types for the AIWisper client
//!
//! This crate contains the wire protocol spoken with the AIWisper backend:
//! the session data model, the `type`-tagged server events and client
//! commands, and duration normalization.

pub mod duration;

use serde::{Deserialize, Deserializer, Serialize};

pub use duration::{millis_to_seconds, to_seconds, DurationValue};

/// The backend serializes empty Go slices as `null`
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Session Types
// ============================================================================

/// Session status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    #[serde(alias = "active")]
    Recording,
    Completed,
    Failed,
}

/// Session information (lightweight, for lists)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub start_time: String,
    #[serde(default)]
    pub status: SessionStatus,
    /// Milliseconds in list payloads
    #[serde(default)]
    pub total_duration: DurationValue,
    #[serde(default)]
    pub chunks_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl SessionInfo {
    /// Total duration in seconds; list entries report milliseconds
    pub fn duration_seconds(&self) -> f64 {
        millis_to_seconds(&self.total_duration)
    }

    /// Build a list entry from a full session
    pub fn from_session(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            start_time: session.start_time.clone(),
            status: session.status,
            total_duration: DurationValue::Number(session.duration_seconds() * 1e3),
            chunks_count: session.chunks.len(),
            title: session.title.clone(),
        }
    }
}

/// Full session data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub language: String,
    #[serde(default, alias = "modelId")]
    pub model: String,
    /// Nanoseconds in detail payloads, normalized through [`DurationValue::seconds`]
    #[serde(default)]
    pub total_duration: DurationValue,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chunks: Vec<Chunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Session {
    /// Total duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.total_duration.seconds()
    }

    pub fn chunk_by_index(&self, index: u32) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.index == index)
    }
}

/// Chunk status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    #[default]
    Pending,
    Transcribing,
    Completed,
    #[serde(alias = "error")]
    Failed,
}

/// Audio chunk with transcription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: String,
    #[serde(default)]
    pub session_id: String,
    pub index: u32,
    #[serde(default)]
    pub status: ChunkStatus,
    /// Start within the session timeline, milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_ms: Option<i64>,
    /// Go time.Duration, nanoseconds
    #[serde(default, rename = "duration")]
    pub duration_ns: i64,
    #[serde(default)]
    pub is_stereo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mic_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sys_text: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dialogue: Vec<DialogueSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Chunk {
    /// Chunk length in seconds
    ///
    /// Prefers the nanosecond duration, falls back to the millisecond span.
    pub fn duration_seconds(&self) -> f64 {
        if self.duration_ns > 0 {
            return self.duration_ns as f64 / 1e9;
        }
        match (self.start_ms, self.end_ms) {
            (Some(start), Some(end)) if end > start => (end - start) as f64 / 1000.0,
            _ => 0.0,
        }
    }

    /// Start offset when the backend actually reported one
    ///
    /// Legacy chunks carry `startMs = 0` everywhere, so zero only counts for the first chunk.
    pub fn explicit_start_ms(&self) -> Option<i64> {
        match self.start_ms {
            Some(0) if self.index > 0 => None,
            Some(ms) if ms >= 0 => Some(ms),
            _ => None,
        }
    }
}

/// Dialogue entry with speaker information
///
/// `start`/`end` are milliseconds on the session timeline: the backend adds
/// the chunk's `startMs` before emitting them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DialogueSegment {
    pub start: i64,
    pub end: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub speaker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<TranscriptWord>>,
}

/// A single word with timing information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptWord {
    /// Start time in milliseconds
    pub start: i64,
    /// End time in milliseconds
    pub end: i64,
    /// The word text
    pub text: String,
    /// Confidence score (0.0 - 1.0)
    #[serde(default, rename = "p")]
    pub confidence: f32,
}

// ============================================================================
// Speaker Types
// ============================================================================

/// Session speaker info
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionSpeaker {
    /// ID within the session (0, 1, 2...)
    pub local_id: i32,
    /// Voiceprint UUID when recognized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_id: Option<String>,
    pub display_name: String,
    #[serde(default)]
    pub is_recognized: bool,
    #[serde(default)]
    pub is_mic: bool,
    #[serde(default)]
    pub segment_count: u32,
    /// Seconds of speech
    #[serde(default)]
    pub total_duration: f32,
    #[serde(default)]
    pub has_sample: bool,
}

// ============================================================================
// Audio Types
// ============================================================================

/// Audio device as reported by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AudioDevice {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_input: bool,
    #[serde(default)]
    pub is_output: bool,
}

/// Waveform data for visualization and seek mapping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WaveformData {
    /// Peaks normalized to the loudest slice
    pub peaks: Vec<Vec<f32>>,
    /// RMS normalized to the loudest slice
    pub rms: Vec<Vec<f32>>,
    /// Raw RMS, used for loudness meters
    pub rms_absolute: Vec<Vec<f32>>,
    /// Seconds per slice
    pub sample_duration: f64,
    /// Seconds
    pub duration: f64,
    pub sample_count: u64,
    pub channel_count: u32,
}

// ============================================================================
// Model Types
// ============================================================================

/// Model with its on-device state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModelState {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub model_type: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub status: String,
    /// Download progress (0-100)
    #[serde(default)]
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

// ============================================================================
// Server Events
// ============================================================================

/// Events pushed by the backend
///
/// Envelope is `{"type": "<name>", ...fields}`. Fields the backend leaves
/// at their zero value are omitted on the wire, hence the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    Devices {
        #[serde(default, deserialize_with = "null_as_default")]
        devices: Vec<AudioDevice>,
        #[serde(default)]
        screen_capture_kit_available: bool,
    },
    SessionsList {
        #[serde(default, deserialize_with = "null_as_default")]
        sessions: Vec<SessionInfo>,
    },
    SessionStarted {
        session: Session,
    },
    SessionStopped {
        #[serde(default)]
        session: Option<Session>,
    },
    SessionDeleted {
        session_id: String,
    },
    SessionRenamed {
        session_id: String,
        #[serde(default)]
        data: String,
    },
    ChunkCreated {
        #[serde(default)]
        session_id: String,
        chunk: Chunk,
    },
    ChunkTranscribed {
        #[serde(default)]
        session_id: String,
        #[serde(default)]
        chunk: Option<Chunk>,
        #[serde(default)]
        error: Option<String>,
    },
    SessionDetails {
        session: Session,
    },
    AudioLevel {
        #[serde(default)]
        mic_level: f64,
        #[serde(default, alias = "sysLevel")]
        system_level: f64,
    },
    ModelsList {
        #[serde(default, deserialize_with = "null_as_default")]
        models: Vec<ModelState>,
    },
    ModelProgress {
        model_id: String,
        #[serde(default)]
        progress: f64,
        /// Model status string
        #[serde(default)]
        data: String,
        #[serde(default)]
        error: Option<String>,
    },
    ActiveModelChanged {
        model_id: String,
    },
    SummaryStarted {
        session_id: String,
    },
    SummaryCompleted {
        session_id: String,
        #[serde(default)]
        summary: String,
    },
    SummaryError {
        session_id: String,
        #[serde(default)]
        error: String,
    },
    FullTranscriptionStarted {
        session_id: String,
    },
    FullTranscriptionProgress {
        session_id: String,
        /// 0.0 - 1.0
        #[serde(default)]
        progress: f64,
        #[serde(default)]
        data: String,
    },
    FullTranscriptionCompleted {
        session_id: String,
        #[serde(default)]
        session: Option<Session>,
    },
    FullTranscriptionError {
        session_id: String,
        #[serde(default)]
        error: String,
    },
    FullTranscriptionCancelled {
        session_id: String,
        #[serde(default)]
        data: String,
    },
    ImproveStarted {
        session_id: String,
    },
    ImproveCompleted {
        session_id: String,
        #[serde(default)]
        session: Option<Session>,
    },
    ImproveError {
        session_id: String,
        #[serde(default)]
        error: String,
    },
    DiarizeStarted {
        session_id: String,
    },
    DiarizeCompleted {
        session_id: String,
        #[serde(default)]
        session: Option<Session>,
    },
    DiarizeError {
        session_id: String,
        #[serde(default)]
        error: String,
    },
    /// Live text from the streaming recognizer
    StreamingUpdate {
        #[serde(default)]
        streaming_text: String,
        /// `false` while the text may still change
        #[serde(default)]
        streaming_is_confirmed: bool,
        #[serde(default)]
        streaming_confidence: f64,
        /// Unix milliseconds
        #[serde(default)]
        streaming_timestamp: i64,
    },
    DiarizationEnabled {
        #[serde(default)]
        diarization_provider: String,
        #[serde(default)]
        diarization_backend: String,
    },
    DiarizationDisabled,
    DiarizationStatus {
        #[serde(default)]
        diarization_enabled: bool,
        #[serde(default)]
        diarization_provider: String,
    },
    DiarizationError {
        #[serde(default)]
        error: String,
    },
    SessionSpeakers {
        session_id: String,
        #[serde(default, deserialize_with = "null_as_default")]
        speakers: Vec<SessionSpeaker>,
    },
    SpeakerRenamed {
        session_id: String,
        #[serde(default)]
        local_speaker_id: i32,
        speaker_name: String,
        #[serde(default)]
        voiceprint_id: Option<String>,
    },
    Error {
        #[serde(default)]
        data: String,
    },
}

impl ServerEvent {
    /// Decode a parsed envelope; unknown `type` values are an error
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// The `type` discriminator of this event
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Devices { .. } => "devices",
            ServerEvent::SessionsList { .. } => "sessions_list",
            ServerEvent::SessionStarted { .. } => "session_started",
            ServerEvent::SessionStopped { .. } => "session_stopped",
            ServerEvent::SessionDeleted { .. } => "session_deleted",
            ServerEvent::SessionRenamed { .. } => "session_renamed",
            ServerEvent::ChunkCreated { .. } => "chunk_created",
            ServerEvent::ChunkTranscribed { .. } => "chunk_transcribed",
            ServerEvent::SessionDetails { .. } => "session_details",
            ServerEvent::AudioLevel { .. } => "audio_level",
            ServerEvent::ModelsList { .. } => "models_list",
            ServerEvent::ModelProgress { .. } => "model_progress",
            ServerEvent::ActiveModelChanged { .. } => "active_model_changed",
            ServerEvent::SummaryStarted { .. } => "summary_started",
            ServerEvent::SummaryCompleted { .. } => "summary_completed",
            ServerEvent::SummaryError { .. } => "summary_error",
            ServerEvent::FullTranscriptionStarted { .. } => "full_transcription_started",
            ServerEvent::FullTranscriptionProgress { .. } => "full_transcription_progress",
            ServerEvent::FullTranscriptionCompleted { .. } => "full_transcription_completed",
            ServerEvent::FullTranscriptionError { .. } => "full_transcription_error",
            ServerEvent::FullTranscriptionCancelled { .. } => "full_transcription_cancelled",
            ServerEvent::ImproveStarted { .. } => "improve_started",
            ServerEvent::ImproveCompleted { .. } => "improve_completed",
            ServerEvent::ImproveError { .. } => "improve_error",
            ServerEvent::DiarizeStarted { .. } => "diarize_started",
            ServerEvent::DiarizeCompleted { .. } => "diarize_completed",
            ServerEvent::DiarizeError { .. } => "diarize_error",
            ServerEvent::StreamingUpdate { .. } => "streaming_update",
            ServerEvent::DiarizationEnabled { .. } => "diarization_enabled",
            ServerEvent::DiarizationDisabled => "diarization_disabled",
            ServerEvent::DiarizationStatus { .. } => "diarization_status",
            ServerEvent::DiarizationError { .. } => "diarization_error",
            ServerEvent::SessionSpeakers { .. } => "session_speakers",
            ServerEvent::SpeakerRenamed { .. } => "speaker_renamed",
            ServerEvent::Error { .. } => "error",
        }
    }
}

/// Every `type` a [`ServerEvent`] can decode from
pub const SERVER_EVENT_TYPES: &[&str] = &[
    "devices",
    "sessions_list",
    "session_started",
    "session_stopped",
    "session_deleted",
    "session_renamed",
    "chunk_created",
    "chunk_transcribed",
    "session_details",
    "audio_level",
    "models_list",
    "model_progress",
    "active_model_changed",
    "summary_started",
    "summary_completed",
    "summary_error",
    "full_transcription_started",
    "full_transcription_progress",
    "full_transcription_completed",
    "full_transcription_error",
    "full_transcription_cancelled",
    "improve_started",
    "improve_completed",
    "improve_error",
    "diarize_started",
    "diarize_completed",
    "diarize_error",
    "streaming_update",
    "diarization_enabled",
    "diarization_disabled",
    "diarization_status",
    "diarization_error",
    "session_speakers",
    "speaker_renamed",
    "error",
];

// ============================================================================
// Client Commands
// ============================================================================

/// Arguments for `start_session`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionArgs {
    pub language: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mic_device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_device: Option<String>,
    pub capture_system: bool,
    /// auto, compression, per-region, off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vad_mode: Option<String>,
    /// energy, silero, auto
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vad_method: Option<String>,
    #[serde(default)]
    pub use_voice_isolation: bool,
    #[serde(default)]
    pub echo_cancel: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_threshold: Option<f64>,
}

impl Default for StartSessionArgs {
    fn default() -> Self {
        Self {
            language: "auto".to_string(),
            model: "ggml-large-v3-turbo".to_string(),
            mic_device: None,
            system_device: None,
            capture_system: true,
            vad_mode: None,
            vad_method: None,
            use_voice_isolation: false,
            echo_cancel: 0.0,
            pause_threshold: None,
        }
    }
}

/// Commands sent to the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    GetDevices,
    GetSessions,
    GetModels,
    GetDiarizationStatus,
    StartSession(StartSessionArgs),
    StopSession,
    GetSession {
        session_id: String,
    },
    DeleteSession {
        session_id: String,
    },
    RetranscribeChunk {
        session_id: String,
        /// The backend reads the chunk id from `data`
        #[serde(rename = "data")]
        chunk_id: String,
        model: String,
        language: String,
    },
    RetranscribeFull {
        session_id: String,
        model: String,
        language: String,
        #[serde(default)]
        diarization_enabled: bool,
    },
    CancelFullTranscription {
        session_id: String,
    },
    RenameSessionSpeaker {
        session_id: String,
        local_speaker_id: i32,
        speaker_name: String,
        #[serde(default)]
        save_as_voiceprint: bool,
    },
    GetSessionSpeakers {
        session_id: String,
    },
    RenameSession {
        session_id: String,
        /// The backend reads the new title from `data`
        #[serde(rename = "data")]
        title: String,
    },
    GenerateSummary {
        session_id: String,
        ollama_model: String,
        ollama_url: String,
    },
    /// LLM cleanup of the session's dialogue
    ImproveTranscription {
        session_id: String,
        ollama_model: String,
        ollama_url: String,
    },
    /// LLM speaker split of the session's dialogue
    DiarizeWithLlm {
        session_id: String,
        ollama_model: String,
        ollama_url: String,
    },
    EnableDiarization {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        segmentation_model_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        embedding_model_path: Option<String>,
        diarization_provider: String,
        diarization_backend: String,
    },
    DisableDiarization,
    SetActiveModel {
        model_id: String,
    },
}

impl ClientCommand {
    /// Serialize into a wire frame
    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Commands re-issued on every (re)connect; the backend keeps no per-client state
pub const BOOTSTRAP_COMMANDS: [ClientCommand; 4] = [
    ClientCommand::GetDevices,
    ClientCommand::GetSessions,
    ClientCommand::GetModels,
    ClientCommand::GetDiarizationStatus,
];
