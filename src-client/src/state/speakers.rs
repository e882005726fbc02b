//! Per-session speaker roster

use aiwisper_types::SessionSpeaker;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeakerRoster {
    speakers: Vec<SessionSpeaker>,
}

impl SpeakerRoster {
    pub fn from_speakers(mut speakers: Vec<SessionSpeaker>) -> Self {
        // Last entry wins for a repeated localId
        let mut unique: Vec<SessionSpeaker> = Vec::with_capacity(speakers.len());
        for speaker in speakers.drain(..) {
            match unique.iter_mut().find(|s| s.local_id == speaker.local_id) {
                Some(existing) => *existing = speaker,
                None => unique.push(speaker),
            }
        }
        Self { speakers: unique }
    }

    pub fn speakers(&self) -> &[SessionSpeaker] {
        &self.speakers
    }

    pub fn get(&self, local_id: i32) -> Option<&SessionSpeaker> {
        self.speakers.iter().find(|s| s.local_id == local_id)
    }

    /// Upsert the display name for `local_id`
    ///
    /// Returns true when something changed.
    pub fn rename(&mut self, local_id: i32, name: &str, voiceprint_id: Option<&str>) -> bool {
        match self.speakers.iter_mut().find(|s| s.local_id == local_id) {
            Some(speaker) => {
                let mut changed = false;
                if speaker.display_name != name {
                    speaker.display_name = name.to_string();
                    changed = true;
                }
                if let Some(id) = voiceprint_id {
                    if speaker.global_id.as_deref() != Some(id) {
                        speaker.global_id = Some(id.to_string());
                        speaker.is_recognized = true;
                        changed = true;
                    }
                }
                changed
            }
            None => {
                self.speakers.push(SessionSpeaker {
                    local_id,
                    global_id: voiceprint_id.map(str::to_string),
                    display_name: name.to_string(),
                    is_recognized: voiceprint_id.is_some(),
                    // localId 0 is the microphone channel
                    is_mic: local_id == 0,
                    ..Default::default()
                });
                true
            }
        }
    }
}
