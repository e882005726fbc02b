//! Session timeline helpers
//!
//! Segment timestamps are session-absolute on the wire: the backend adds
//! each chunk's `startMs` before emitting dialogue. Nothing here re-offsets
//! them.

use aiwisper_types::{DialogueSegment, Session};

/// Merge every chunk's dialogue into one sequence ordered by `start`, then `end`
///
/// Chunk order is irrelevant: mic and system speech interleave across chunk
/// boundaries.
pub fn assemble_dialogue(session: &Session) -> Vec<DialogueSegment> {
    let mut segments: Vec<DialogueSegment> = session
        .chunks
        .iter()
        .flat_map(|chunk| chunk.dialogue.iter().cloned())
        .collect();

    // Full key so equal starts sort the same regardless of input order
    segments.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(a.end.cmp(&b.end))
            .then_with(|| a.speaker.cmp(&b.speaker))
            .then_with(|| a.text.cmp(&b.text))
    });
    segments
}

/// Absolute start of a chunk, seconds
///
/// Uses the reported `startMs` when present, otherwise the summed durations
/// of every lower-index chunk in the session.
pub fn chunk_start_seconds(session: &Session, index: u32) -> Option<f64> {
    let chunk = session.chunk_by_index(index)?;
    if let Some(ms) = chunk.explicit_start_ms() {
        return Some(ms as f64 / 1000.0);
    }

    Some(
        session
            .chunks
            .iter()
            .filter(|c| c.index < index)
            .map(|c| c.duration_seconds())
            .sum(),
    )
}
