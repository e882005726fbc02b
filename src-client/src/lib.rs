//! AIWisper client library
//!
//! Client runtime for the AIWisper transcription backend: keeps a live view
//! of recording and transcription sessions, plays session audio with
//! offset-aware seeking, and meters live and decoded audio.

pub mod client;
pub mod commands;
pub mod config;
pub mod media;
pub mod playback;
pub mod router;
pub mod state;
pub mod transport;
pub mod waveform;

use aiwisper_audio::WaveformAnalyzer;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use client::Client;
use config::ClientConfig;
use media::HttpMediaClient;
use waveform::{follow_selection, WaveformService};

/// Install stdout and daily-rolling file logging
///
/// The returned guard flushes the file writer on drop; keep it alive.
pub fn init_logging() -> WorkerGuard {
    let log_dir = config::get_data_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| std::path::PathBuf::from("."));
    let file_appender = tracing_appender::rolling::daily(log_dir, "aiwisper-client.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,aiwisper_client=debug,aiwisper_audio=debug".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(true),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .init();

    guard
}

/// Run the client until Ctrl-C
pub fn run() -> anyhow::Result<()> {
    let _guard = init_logging();
    let config = ClientConfig::load();

    tracing::info!("Starting AIWisper client");
    tracing::info!("Backend: {}", config.backend_address);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("aiwisper-client")
        .build()?;

    runtime.block_on(async move {
        let client = Client::start(config.clone())?;

        let media = Arc::new(HttpMediaClient::new(&config.http_base_url));
        let waveforms = Arc::new(WaveformService::new(
            WaveformAnalyzer::new(config.waveform_sample_duration),
            media.clone(),
            media.clone(),
        ));

        let watcher = follow_selection(client.state().clone(), waveforms);

        tokio::signal::ctrl_c().await?;
        tracing::info!("Interrupted");

        watcher.abort();
        client.shutdown().await;
        Ok(())
    })
}
