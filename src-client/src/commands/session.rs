//! Session commands

use aiwisper_types::{ClientCommand, StartSessionArgs};

use crate::client::Client;
use crate::state::LlmTask;
use crate::transport::TransportError;

impl Client {
    /// Refresh the session list
    pub fn get_sessions(&self) -> Result<(), TransportError> {
        tracing::debug!("Requesting session list");
        self.send_command(&ClientCommand::GetSessions)
    }

    /// Start recording
    pub fn start_session(&self, args: StartSessionArgs) -> Result<(), TransportError> {
        tracing::info!(
            "Starting session: model={}, lang={}, system_audio={}",
            args.model,
            args.language,
            args.capture_system
        );
        self.send_command(&ClientCommand::StartSession(args))
    }

    /// Start recording with the configured model and language
    pub fn start_default_session(&self) -> Result<(), TransportError> {
        let config = self.config();
        self.start_session(StartSessionArgs {
            language: config.language.clone(),
            model: config.model_id.clone(),
            ..Default::default()
        })
    }

    pub fn stop_session(&self) -> Result<(), TransportError> {
        tracing::info!("Stopping session");
        self.send_command(&ClientCommand::StopSession)
    }

    /// Request full details; the answer lands as `session_details`
    pub fn get_session(&self, session_id: &str) -> Result<(), TransportError> {
        self.send_command(&ClientCommand::GetSession {
            session_id: session_id.to_string(),
        })
    }

    pub fn delete_session(&self, session_id: &str) -> Result<(), TransportError> {
        tracing::info!("Deleting session: {}", session_id);
        self.send_command(&ClientCommand::DeleteSession {
            session_id: session_id.to_string(),
        })
    }

    /// Rename a session; the backend answers with `session_renamed` and a fresh list
    pub fn rename_session(&self, session_id: &str, title: &str) -> Result<(), TransportError> {
        tracing::info!("Renaming session {} to {:?}", session_id, title);
        self.send_command(&ClientCommand::RenameSession {
            session_id: session_id.to_string(),
            title: title.to_string(),
        })
    }

    /// Ask for a summary with the configured Ollama model
    pub fn generate_summary(&self, session_id: &str) -> Result<(), TransportError> {
        let config = self.config();
        tracing::info!(
            "Generating summary for {} with {}",
            session_id,
            config.ollama_model
        );
        self.send_command(&ClientCommand::GenerateSummary {
            session_id: session_id.to_string(),
            ollama_model: config.ollama_model.clone(),
            ollama_url: config.ollama_url.clone(),
        })?;
        self.state().mark_summary_requested(session_id);
        Ok(())
    }

    /// Clean up the session's dialogue with the configured Ollama model
    pub fn improve_transcription(&self, session_id: &str) -> Result<(), TransportError> {
        let config = self.config();
        tracing::info!(
            "Improving transcription of {} with {}",
            session_id,
            config.ollama_model
        );
        self.send_command(&ClientCommand::ImproveTranscription {
            session_id: session_id.to_string(),
            ollama_model: config.ollama_model.clone(),
            ollama_url: config.ollama_url.clone(),
        })?;
        self.state()
            .mark_llm_task_requested(session_id, LlmTask::Improve);
        Ok(())
    }

    /// Split the session's dialogue by speaker with the configured Ollama model
    pub fn diarize_with_llm(&self, session_id: &str) -> Result<(), TransportError> {
        let config = self.config();
        tracing::info!(
            "LLM diarization of {} with {}",
            session_id,
            config.ollama_model
        );
        self.send_command(&ClientCommand::DiarizeWithLlm {
            session_id: session_id.to_string(),
            ollama_model: config.ollama_model.clone(),
            ollama_url: config.ollama_url.clone(),
        })?;
        self.state()
            .mark_llm_task_requested(session_id, LlmTask::Diarize);
        Ok(())
    }
}
