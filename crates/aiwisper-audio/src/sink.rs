//! Playback sink
//!
//! [`PlaybackSink`] is the single playable output the playback engine owns.
//! [`CpalSink`] drives the default output device; the cpal stream lives on a
//! dedicated thread because `cpal::Stream` is not `Send`.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use crate::analysis::AnalysisGraph;
use crate::decode::DecodedAudio;
use crate::resampling::resample_audio;

/// Playback errors
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("no audio loaded")]
    NoAsset,

    #[error("seek to {target:.3}s outside 0..{duration:.3}s")]
    SeekOutOfRange { target: f64, duration: f64 },

    #[error("output device error: {0}")]
    Device(String),

    #[error("playback rejected: {0}")]
    Rejected(String),

    #[error("failed to load audio: {0}")]
    Load(String),
}

/// A single audio output with a one-time analysis graph
pub trait PlaybackSink: Send + Sync {
    /// Replace the loaded asset, resetting position to 0 and pausing
    fn load(&self, audio: DecodedAudio) -> Result<(), PlaybackError>;

    fn play(&self) -> Result<(), PlaybackError>;

    fn pause(&self);

    /// Seek within the loaded asset, seconds
    fn seek(&self, seconds: f64) -> Result<(), PlaybackError>;

    /// Position within the loaded asset, seconds
    fn current_time(&self) -> f64;

    /// Duration of the loaded asset, once known
    fn duration(&self) -> Option<f64>;

    /// False once paused or the asset ran out
    fn is_playing(&self) -> bool;

    /// The analysis graph; the same instance for the sink's whole lifetime
    fn analysis_graph(&self) -> Arc<AnalysisGraph>;
}

/// Interleaved samples at the device rate and layout
struct PlaybackBuffer {
    samples: Vec<f32>,
    frames: usize,
}

struct SinkShared {
    buffer: Mutex<Option<PlaybackBuffer>>,
    position: AtomicUsize,
    playing: AtomicBool,
    graph: Arc<AnalysisGraph>,
    device_rate: u32,
    device_channels: usize,
}

impl SinkShared {
    /// Fill one output callback buffer
    fn render(&self, data: &mut [f32]) {
        let channels = self.device_channels;

        if !self.playing.load(Ordering::Acquire) {
            data.fill(0.0);
            return;
        }

        // Never block the audio thread
        let Some(guard) = self.buffer.try_lock() else {
            data.fill(0.0);
            return;
        };
        let Some(buffer) = guard.as_ref() else {
            data.fill(0.0);
            return;
        };

        let position = self.position.load(Ordering::Acquire);
        let wanted = data.len() / channels;
        let available = buffer.frames.saturating_sub(position).min(wanted);

        let start = position * channels;
        let end = start + available * channels;
        data[..available * channels].copy_from_slice(&buffer.samples[start..end]);
        data[available * channels..].fill(0.0);

        let new_position = position + available;
        self.position.store(new_position, Ordering::Release);
        if new_position >= buffer.frames {
            self.playing.store(false, Ordering::Release);
        }
        drop(guard);

        self.graph.process(data, channels);
    }
}

/// Output sink on the default cpal device
pub struct CpalSink {
    shared: Arc<SinkShared>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl CpalSink {
    /// Open the default output device and start its stream thread
    pub fn new() -> Result<Self, PlaybackError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PlaybackError::Device("no default output device".to_string()))?;
        let config: cpal::StreamConfig = device
            .default_output_config()
            .map_err(|e| PlaybackError::Device(e.to_string()))?
            .into();

        tracing::info!(
            "Audio output: {} @ {}Hz, {} channels",
            device.name().unwrap_or_default(),
            config.sample_rate.0,
            config.channels
        );

        let shared = Arc::new(SinkShared {
            buffer: Mutex::new(None),
            position: AtomicUsize::new(0),
            playing: AtomicBool::new(false),
            graph: Arc::new(AnalysisGraph::new()),
            device_rate: config.sample_rate.0,
            device_channels: config.channels.max(1) as usize,
        });

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), PlaybackError>>();
        let thread_shared = shared.clone();

        let join_handle = std::thread::Builder::new()
            .name("aiwisper-playback".to_string())
            .spawn(move || {
                let callback_shared = thread_shared.clone();
                let stream = device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        callback_shared.render(data);
                    },
                    |err| {
                        tracing::error!("Audio output error: {}", err);
                    },
                    None,
                );

                let stream = match stream.map_err(|e| PlaybackError::Device(e.to_string())) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(PlaybackError::Device(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Keep the stream alive until shutdown or the sink is dropped
                let _ = shutdown_rx.recv();
                drop(stream);
                tracing::debug!("Playback thread stopped");
            })
            .map_err(|e| PlaybackError::Device(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = join_handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = join_handle.join();
                return Err(PlaybackError::Device("playback thread exited".to_string()));
            }
        }

        Ok(Self {
            shared,
            shutdown_tx: Some(shutdown_tx),
            join_handle: Some(join_handle),
        })
    }

    /// Convert decoded audio to the device layout
    fn prepare(&self, audio: &DecodedAudio) -> Result<PlaybackBuffer, PlaybackError> {
        let audio = resample_audio(audio, self.shared.device_rate)
            .map_err(|e| PlaybackError::Rejected(e.to_string()))?;

        let channels = self.shared.device_channels;
        let frames = audio.frames();
        let mut samples = Vec::with_capacity(frames * channels);

        for frame in 0..frames {
            for ch in 0..channels {
                let sample = match audio.channels.len() {
                    0 => 0.0,
                    // Mono goes to every output channel
                    1 => audio.channels[0][frame],
                    n if ch < n => audio.channels[ch][frame],
                    _ => 0.0,
                };
                samples.push(sample);
            }
        }

        Ok(PlaybackBuffer { samples, frames })
    }
}

impl PlaybackSink for CpalSink {
    fn load(&self, audio: DecodedAudio) -> Result<(), PlaybackError> {
        let buffer = self.prepare(&audio)?;
        self.shared.playing.store(false, Ordering::Release);
        *self.shared.buffer.lock() = Some(buffer);
        self.shared.position.store(0, Ordering::Release);
        self.shared.graph.reset();
        Ok(())
    }

    fn play(&self) -> Result<(), PlaybackError> {
        let buffer = self.shared.buffer.lock();
        let buffer = buffer.as_ref().ok_or(PlaybackError::NoAsset)?;
        if self.shared.position.load(Ordering::Acquire) >= buffer.frames {
            self.shared.position.store(0, Ordering::Release);
        }
        self.shared.playing.store(true, Ordering::Release);
        Ok(())
    }

    fn pause(&self) {
        self.shared.playing.store(false, Ordering::Release);
    }

    fn seek(&self, seconds: f64) -> Result<(), PlaybackError> {
        let duration = self.duration().ok_or(PlaybackError::NoAsset)?;
        if !(0.0..=duration).contains(&seconds) {
            return Err(PlaybackError::SeekOutOfRange {
                target: seconds,
                duration,
            });
        }
        let frame = (seconds * self.shared.device_rate as f64) as usize;
        self.shared.position.store(frame, Ordering::Release);
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.shared.position.load(Ordering::Acquire) as f64 / self.shared.device_rate as f64
    }

    fn duration(&self) -> Option<f64> {
        self.shared
            .buffer
            .lock()
            .as_ref()
            .map(|b| b.frames as f64 / self.shared.device_rate as f64)
    }

    fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Acquire)
    }

    fn analysis_graph(&self) -> Arc<AnalysisGraph> {
        self.shared.graph.clone()
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.shared.playing.store(false, Ordering::Release);
        // Closing the channel wakes the thread
        self.shutdown_tx.take();
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_with(frames: usize, channels: usize) -> SinkShared {
        SinkShared {
            buffer: Mutex::new(Some(PlaybackBuffer {
                samples: (0..frames * channels).map(|i| i as f32).collect(),
                frames,
            })),
            position: AtomicUsize::new(0),
            playing: AtomicBool::new(true),
            graph: Arc::new(AnalysisGraph::new()),
            device_rate: 1000,
            device_channels: channels,
        }
    }

    #[test]
    fn test_render_advances_and_stops_at_end() {
        let shared = shared_with(6, 2);
        let mut data = [0.0f32; 8];

        shared.render(&mut data);
        assert_eq!(data, [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(shared.position.load(Ordering::Acquire), 4);
        assert!(shared.playing.load(Ordering::Acquire));

        shared.render(&mut data);
        assert_eq!(data, [8.0, 9.0, 10.0, 11.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(!shared.playing.load(Ordering::Acquire));
    }

    #[test]
    fn test_render_silence_when_paused() {
        let shared = shared_with(4, 1);
        shared.playing.store(false, Ordering::Release);
        let mut data = [1.0f32; 4];
        shared.render(&mut data);
        assert_eq!(data, [0.0; 4]);
        assert_eq!(shared.position.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_render_feeds_taps() {
        let shared = shared_with(4, 2);
        let mut data = [0.0f32; 8];
        shared.render(&mut data);
        assert_eq!(shared.graph.tap(0).unwrap().snapshot(), vec![0.0, 2.0, 4.0, 6.0]);
        assert_eq!(shared.graph.tap(1).unwrap().snapshot(), vec![1.0, 3.0, 5.0, 7.0]);
    }
}
