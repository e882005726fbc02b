//! Session reconciler
//!
//! Folds push events into two independent cells: `live` (the recording in
//! progress) and `inspected` (the session open for viewing). Events whose
//! session id matches neither cell are dropped, never queued.

use aiwisper_types::{Chunk, ServerEvent, Session, SessionInfo, SessionStatus};

/// What a single event changed
#[derive(Debug, Clone, PartialEq)]
pub enum SessionChange {
    SessionsList,
    Live,
    Inspected,
    RecordingStarted { session_id: String, start_time: String },
    RecordingStopped { session_id: Option<String> },
    ChunkError { session_id: String, error: String },
}

#[derive(Debug, Default, Clone)]
pub struct SessionReconciler {
    live: Option<Session>,
    inspected: Option<Session>,
    /// Session the user asked for; `inspected` may still be loading
    selected_id: Option<String>,
    sessions: Vec<SessionInfo>,
}

impl SessionReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live(&self) -> Option<&Session> {
        self.live.as_ref()
    }

    pub fn inspected(&self) -> Option<&Session> {
        self.inspected.as_ref()
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    pub fn sessions(&self) -> &[SessionInfo] {
        &self.sessions
    }

    /// Select a session for inspection
    ///
    /// Clears `inspected` if it holds a different session; the details
    /// arrive later via `session_details`.
    pub fn select(&mut self, session_id: &str) -> Vec<SessionChange> {
        self.selected_id = Some(session_id.to_string());
        if self
            .inspected
            .as_ref()
            .is_some_and(|s| s.id != session_id)
        {
            self.inspected = None;
            return vec![SessionChange::Inspected];
        }
        Vec::new()
    }

    pub fn clear_selection(&mut self) -> Vec<SessionChange> {
        self.selected_id = None;
        match self.inspected.take() {
            Some(_) => vec![SessionChange::Inspected],
            None => Vec::new(),
        }
    }

    /// Attach a finished summary to the inspected session
    pub fn set_summary(&mut self, session_id: &str, summary: &str) -> Vec<SessionChange> {
        match self.inspected.as_mut().filter(|s| s.id == session_id) {
            Some(inspected) => {
                inspected.summary = Some(summary.to_string());
                vec![SessionChange::Inspected]
            }
            None => Vec::new(),
        }
    }

    fn accepts_inspected(&self, session_id: &str) -> bool {
        self.inspected.as_ref().is_some_and(|s| s.id == session_id)
            || self.selected_id.as_deref() == Some(session_id)
    }

    fn replace_inspected(&mut self, session: &Session) -> Vec<SessionChange> {
        if !self.accepts_inspected(&session.id) {
            tracing::debug!("Ignoring details for session {}", session.id);
            return Vec::new();
        }
        let mut session = session.clone();
        normalize_chunks(&mut session.chunks);
        self.selected_id = Some(session.id.clone());
        self.inspected = Some(session);
        vec![SessionChange::Inspected]
    }

    fn upsert_list_entry(&mut self, session: &Session) {
        let info = SessionInfo::from_session(session);
        match self.sessions.iter_mut().find(|s| s.id == info.id) {
            Some(existing) => *existing = info,
            None => self.sessions.insert(0, info),
        }
    }

    /// Apply one event; returns the cells it touched
    pub fn apply(&mut self, event: &ServerEvent) -> Vec<SessionChange> {
        match event {
            ServerEvent::SessionsList { sessions } => {
                self.sessions = sessions.clone();
                vec![SessionChange::SessionsList]
            }

            ServerEvent::SessionStarted { session } => {
                let mut session = session.clone();
                session.status = SessionStatus::Recording;
                normalize_chunks(&mut session.chunks);
                self.upsert_list_entry(&session);
                let started = SessionChange::RecordingStarted {
                    session_id: session.id.clone(),
                    start_time: session.start_time.clone(),
                };
                self.live = Some(session);
                vec![SessionChange::Live, SessionChange::SessionsList, started]
            }

            ServerEvent::SessionStopped { session } => {
                let stopped_id = self.live.take().map(|s| s.id);
                let mut changes = vec![
                    SessionChange::Live,
                    SessionChange::RecordingStopped {
                        session_id: stopped_id,
                    },
                ];
                if let Some(session) = session {
                    let mut session = session.clone();
                    normalize_chunks(&mut session.chunks);
                    self.upsert_list_entry(&session);
                    self.selected_id = Some(session.id.clone());
                    self.inspected = Some(session);
                    changes.push(SessionChange::SessionsList);
                    changes.push(SessionChange::Inspected);
                }
                changes
            }

            ServerEvent::SessionDeleted { session_id } => {
                let mut changes = Vec::new();
                let before = self.sessions.len();
                self.sessions.retain(|s| &s.id != session_id);
                if self.sessions.len() != before {
                    changes.push(SessionChange::SessionsList);
                }
                if self.inspected.as_ref().is_some_and(|s| &s.id == session_id) {
                    self.inspected = None;
                    changes.push(SessionChange::Inspected);
                }
                if self.selected_id.as_ref() == Some(session_id) {
                    self.selected_id = None;
                }
                changes
            }

            ServerEvent::SessionRenamed { session_id, data } => {
                let mut changes = Vec::new();
                if let Some(info) = self.sessions.iter_mut().find(|s| &s.id == session_id) {
                    info.title = Some(data.clone());
                    changes.push(SessionChange::SessionsList);
                }
                if let Some(inspected) = self.inspected.as_mut().filter(|s| &s.id == session_id) {
                    inspected.title = Some(data.clone());
                    changes.push(SessionChange::Inspected);
                }
                changes
            }

            ServerEvent::ChunkCreated { session_id, chunk } => {
                let target = owner_id(session_id, chunk);
                match self.live.as_mut().filter(|s| s.id == target) {
                    Some(live) => {
                        upsert_chunk(&mut live.chunks, chunk.clone());
                        vec![SessionChange::Live]
                    }
                    None => {
                        tracing::debug!("Dropping chunk_created for session {}", target);
                        Vec::new()
                    }
                }
            }

            ServerEvent::ChunkTranscribed {
                session_id,
                chunk,
                error,
            } => {
                let Some(chunk) = chunk else {
                    return match error {
                        Some(error) => vec![SessionChange::ChunkError {
                            session_id: session_id.clone(),
                            error: error.clone(),
                        }],
                        None => Vec::new(),
                    };
                };

                let target = owner_id(session_id, chunk);
                let mut changes = Vec::new();

                if let Some(live) = self.live.as_mut().filter(|s| s.id == target) {
                    upsert_chunk(&mut live.chunks, chunk.clone());
                    changes.push(SessionChange::Live);
                }
                if let Some(inspected) = self.inspected.as_mut().filter(|s| s.id == target) {
                    upsert_chunk(&mut inspected.chunks, chunk.clone());
                    changes.push(SessionChange::Inspected);
                }
                if let Some(error) = error.as_ref().or(chunk.error.as_ref()) {
                    changes.push(SessionChange::ChunkError {
                        session_id: target.to_string(),
                        error: error.clone(),
                    });
                }
                changes
            }

            ServerEvent::SessionDetails { session } => self.replace_inspected(session),

            ServerEvent::FullTranscriptionCompleted { session, .. }
            | ServerEvent::ImproveCompleted { session, .. }
            | ServerEvent::DiarizeCompleted { session, .. } => match session {
                Some(session) => self.replace_inspected(session),
                None => Vec::new(),
            },

            _ => Vec::new(),
        }
    }
}

/// Session a chunk event belongs to
fn owner_id<'a>(session_id: &'a str, chunk: &'a Chunk) -> &'a str {
    if session_id.is_empty() {
        &chunk.session_id
    } else {
        session_id
    }
}

/// Insert or replace a chunk, keeping the list sorted by index
///
/// An existing chunk with the same id is replaced in place. A different id
/// at an already occupied index also replaces, so `(session, index)` stays
/// unique.
pub fn upsert_chunk(chunks: &mut Vec<Chunk>, chunk: Chunk) {
    if let Some(existing) = chunks.iter_mut().find(|c| c.id == chunk.id) {
        *existing = chunk;
        return;
    }
    if let Some(existing) = chunks.iter_mut().find(|c| c.index == chunk.index) {
        *existing = chunk;
        return;
    }
    let pos = chunks.partition_point(|c| c.index < chunk.index);
    chunks.insert(pos, chunk);
}

/// Sort and dedupe chunks from a wholesale payload
fn normalize_chunks(chunks: &mut Vec<Chunk>) {
    let incoming = std::mem::take(chunks);
    for chunk in incoming {
        upsert_chunk(chunks, chunk);
    }
}
