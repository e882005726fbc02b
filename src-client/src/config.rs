//! Client configuration
//!
//! Read from the `client` section of `config.json` in the shared AIWisper
//! data directory, so the backend's own settings in the same file are left
//! alone. Environment variables override the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides `backendAddress`
pub const ENV_BACKEND_ADDR: &str = "AIWISPER_BACKEND_ADDR";
/// Overrides `httpBaseUrl`
pub const ENV_HTTP_URL: &str = "AIWISPER_HTTP_URL";

/// Get the base data directory for aiwisper
pub fn get_data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|p| p.join("aiwisper"))
}

/// Get path to the shared config file
pub fn get_config_path() -> Option<PathBuf> {
    get_data_dir().map(|p| p.join("config.json"))
}

/// Which duplex mechanism to use, chosen once from the address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    /// `ws://` or `wss://` URL
    WebSocket { url: String },
    /// Local socket path (Unix domain socket or named pipe)
    Local { path: String },
}

impl TransportConfig {
    /// Parse a backend address
    ///
    /// Accepts `ws://`, `wss://`, `unix:<path>`, `unix://<path>`,
    /// `npipe:<path>` and `local:<path>`.
    pub fn from_address(address: &str) -> Result<Self> {
        let address = address.trim();
        if address.starts_with("ws://") || address.starts_with("wss://") {
            return Ok(TransportConfig::WebSocket {
                url: address.to_string(),
            });
        }

        for scheme in ["unix:", "npipe:", "local:"] {
            if let Some(rest) = address.strip_prefix(scheme) {
                // unix:///tmp/x.sock keeps the leading slash
                let path = rest.strip_prefix("//").unwrap_or(rest);
                if path.is_empty() {
                    anyhow::bail!("Empty local socket path in {:?}", address);
                }
                return Ok(TransportConfig::Local {
                    path: path.to_string(),
                });
            }
        }

        anyhow::bail!("Unsupported backend address: {:?}", address)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TransportConfig::WebSocket { .. } => "websocket",
            TransportConfig::Local { .. } => "local",
        }
    }
}

/// Client settings (camelCase, like the rest of config.json)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Push/command channel address
    pub backend_address: String,
    /// Base URL for media and waveform cache endpoints
    pub http_base_url: String,
    /// Fixed delay before a reconnect attempt
    pub reconnect_delay_ms: u64,
    /// Waveform slice length, seconds
    pub waveform_sample_duration: f64,
    /// Meter polling period
    pub meter_frame_ms: u64,
    /// Default recognition settings for `start_session`
    pub language: String,
    pub model_id: String,
    /// Summary generation
    pub ollama_model: String,
    pub ollama_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_address: "ws://localhost:8080/ws".to_string(),
            http_base_url: "http://localhost:8080".to_string(),
            reconnect_delay_ms: 3000,
            waveform_sample_duration: aiwisper_audio::DEFAULT_SAMPLE_DURATION,
            meter_frame_ms: 16,
            language: "auto".to_string(),
            model_id: "ggml-large-v3-turbo".to_string(),
            ollama_model: "llama3.2".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
        }
    }
}

/// Config file structure; other sections belong to the backend
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    client: Option<ClientConfig>,
}

impl ClientConfig {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> Self {
        let mut config = match get_config_path() {
            Some(path) => Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load client config: {:#}", e);
                Self::default()
            }),
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load from a specific file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("config.json not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        let file: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;

        tracing::info!("Loaded client config from {:?}", path);
        Ok(file.client.unwrap_or_default())
    }

    /// Save into the `client` section, preserving every other field
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut config_value: serde_json::Value = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content).unwrap_or_else(|_| serde_json::json!({}))
        } else {
            serde_json::json!({})
        };

        let obj = config_value
            .as_object_mut()
            .context("config.json root is not an object")?;
        obj.insert("client".to_string(), serde_json::to_value(self)?);

        std::fs::write(path, serde_json::to_string_pretty(&config_value)?)?;
        tracing::debug!("Saved client config to {:?}", path);
        Ok(())
    }

    fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(addr) = lookup(ENV_BACKEND_ADDR).filter(|v| !v.trim().is_empty()) {
            self.backend_address = addr;
        }
        if let Some(url) = lookup(ENV_HTTP_URL).filter(|v| !v.trim().is_empty()) {
            self.http_base_url = url;
        }
    }

    pub fn transport(&self) -> Result<TransportConfig> {
        TransportConfig::from_address(&self.backend_address)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn meter_frame(&self) -> Duration {
        Duration::from_millis(self.meter_frame_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_from_address() {
        assert_eq!(
            TransportConfig::from_address("ws://localhost:8080/ws").unwrap(),
            TransportConfig::WebSocket {
                url: "ws://localhost:8080/ws".into()
            }
        );
        assert_eq!(
            TransportConfig::from_address("unix:/tmp/aiwisper-grpc.sock").unwrap(),
            TransportConfig::Local {
                path: "/tmp/aiwisper-grpc.sock".into()
            }
        );
        assert_eq!(
            TransportConfig::from_address("unix:///tmp/aiwisper-grpc.sock").unwrap(),
            TransportConfig::Local {
                path: "/tmp/aiwisper-grpc.sock".into()
            }
        );
        assert_eq!(
            TransportConfig::from_address(r"npipe:\\.\pipe\aiwisper-grpc").unwrap(),
            TransportConfig::Local {
                path: r"\\.\pipe\aiwisper-grpc".into()
            }
        );
        assert!(TransportConfig::from_address("http://localhost").is_err());
        assert!(TransportConfig::from_address("unix:").is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.reconnect_delay(), Duration::from_secs(3));
    }

    #[test]
    fn test_save_preserves_backend_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"settings":{"language":"ru","modelId":"ggml-base"}}"#).unwrap();

        let config = ClientConfig {
            reconnect_delay_ms: 500,
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["settings"]["language"], "ru");
        assert_eq!(raw["client"]["reconnectDelayMs"], 500);

        let loaded = ClientConfig::load_from(&path).unwrap();
        assert_eq!(loaded.reconnect_delay_ms, 500);
        assert_eq!(loaded.http_base_url, "http://localhost:8080");
    }

    #[test]
    fn test_partial_section_and_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"client":{"backendAddress":"unix:/tmp/a.sock"}}"#).unwrap();

        let mut config = ClientConfig::load_from(&path).unwrap();
        assert_eq!(config.backend_address, "unix:/tmp/a.sock");
        assert_eq!(config.meter_frame_ms, 16);

        config.apply_env(|key| match key {
            ENV_HTTP_URL => Some("http://127.0.0.1:9000".to_string()),
            ENV_BACKEND_ADDR => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.http_base_url, "http://127.0.0.1:9000");
        assert_eq!(config.backend_address, "unix:/tmp/a.sock");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(ClientConfig::load_from(&path).is_err());
    }
}
