//! Retranscription and model commands

use aiwisper_types::ClientCommand;

use crate::client::Client;
use crate::transport::TransportError;

impl Client {
    /// Retranscribe a single chunk
    pub fn retranscribe_chunk(
        &self,
        session_id: &str,
        chunk_id: &str,
        model: &str,
        language: &str,
    ) -> Result<(), TransportError> {
        tracing::info!(
            "Retranscribe chunk: session={}, chunk={}, model={}, lang={}",
            session_id,
            chunk_id,
            model,
            language
        );
        self.send_command(&ClientCommand::RetranscribeChunk {
            session_id: session_id.to_string(),
            chunk_id: chunk_id.to_string(),
            model: model.to_string(),
            language: language.to_string(),
        })
    }

    /// Retranscribe entire session (all chunks)
    pub fn retranscribe_full(
        &self,
        session_id: &str,
        model: &str,
        language: &str,
        diarization_enabled: bool,
    ) -> Result<(), TransportError> {
        tracing::info!(
            "Retranscribe full session: {}, model={}, lang={}, diarization={}",
            session_id,
            model,
            language,
            diarization_enabled
        );
        self.send_command(&ClientCommand::RetranscribeFull {
            session_id: session_id.to_string(),
            model: model.to_string(),
            language: language.to_string(),
            diarization_enabled,
        })
    }

    pub fn cancel_full_transcription(&self, session_id: &str) -> Result<(), TransportError> {
        tracing::info!("Cancel full transcription requested for {}", session_id);
        self.send_command(&ClientCommand::CancelFullTranscription {
            session_id: session_id.to_string(),
        })
    }

    pub fn get_models(&self) -> Result<(), TransportError> {
        self.send_command(&ClientCommand::GetModels)
    }

    pub fn set_active_model(&self, model_id: &str) -> Result<(), TransportError> {
        tracing::info!("Setting active model: {}", model_id);
        self.send_command(&ClientCommand::SetActiveModel {
            model_id: model_id.to_string(),
        })
    }

    pub fn get_devices(&self) -> Result<(), TransportError> {
        self.send_command(&ClientCommand::GetDevices)
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::test_support::{connected_client, frames};

    #[tokio::test]
    async fn test_retranscribe_chunk_puts_chunk_id_in_data() {
        let (client, sent) = connected_client().await;

        client
            .retranscribe_chunk("s1", "c7", "ggml-base", "ru")
            .unwrap();
        let frames = frames(&sent, 1).await;
        assert_eq!(frames[0]["type"], "retranscribe_chunk");
        assert_eq!(frames[0]["sessionId"], "s1");
        assert_eq!(frames[0]["data"], "c7");
        assert_eq!(frames[0]["language"], "ru");
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_retranscription_commands() {
        let (client, sent) = connected_client().await;

        client
            .retranscribe_full("s1", "ggml-large-v3-turbo", "auto", true)
            .unwrap();
        client.cancel_full_transcription("s1").unwrap();
        client.set_active_model("ggml-base").unwrap();

        let frames = frames(&sent, 3).await;
        assert_eq!(frames[0]["type"], "retranscribe_full");
        assert_eq!(frames[0]["diarizationEnabled"], true);
        assert_eq!(frames[1]["type"], "cancel_full_transcription");
        assert_eq!(frames[2]["type"], "set_active_model");
        assert_eq!(frames[2]["modelId"], "ggml-base");
        client.shutdown().await;
    }
}
