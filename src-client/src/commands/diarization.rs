//! Diarization and speaker commands

use aiwisper_types::ClientCommand;

use crate::client::Client;
use crate::transport::TransportError;

impl Client {
    /// Enable diarization
    ///
    /// Model paths are optional; the backend falls back to its bundled models.
    pub fn enable_diarization(
        &self,
        provider: &str,
        backend: &str,
        segmentation_model_path: Option<String>,
        embedding_model_path: Option<String>,
    ) -> Result<(), TransportError> {
        tracing::info!(
            "Enabling diarization: provider={}, backend={}",
            provider,
            backend
        );
        self.send_command(&ClientCommand::EnableDiarization {
            segmentation_model_path,
            embedding_model_path,
            diarization_provider: provider.to_string(),
            diarization_backend: backend.to_string(),
        })
    }

    pub fn disable_diarization(&self) -> Result<(), TransportError> {
        tracing::info!("Disabling diarization");
        self.send_command(&ClientCommand::DisableDiarization)
    }

    pub fn get_diarization_status(&self) -> Result<(), TransportError> {
        self.send_command(&ClientCommand::GetDiarizationStatus)
    }

    pub fn get_session_speakers(&self, session_id: &str) -> Result<(), TransportError> {
        self.send_command(&ClientCommand::GetSessionSpeakers {
            session_id: session_id.to_string(),
        })
    }

    /// Rename a speaker, optionally saving them as a voiceprint
    pub fn rename_session_speaker(
        &self,
        session_id: &str,
        local_speaker_id: i32,
        speaker_name: &str,
        save_as_voiceprint: bool,
    ) -> Result<(), TransportError> {
        tracing::info!(
            "Renaming speaker {} in {} to {:?}",
            local_speaker_id,
            session_id,
            speaker_name
        );
        self.send_command(&ClientCommand::RenameSessionSpeaker {
            session_id: session_id.to_string(),
            local_speaker_id,
            speaker_name: speaker_name.to_string(),
            save_as_voiceprint,
        })
    }
}
