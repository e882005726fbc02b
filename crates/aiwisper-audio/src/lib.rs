//! Audio processing crate for AIWisper
//!
//! Provides decoding, resampling, waveform analysis, loudness metering and
//! the playback sink used by the client.
//!
//! # Features
//! - **Decoding** of recorded sessions (MP3, WAV) via symphonia
//! - **Waveform analysis** with fixed-resolution peak/RMS slices
//! - **Meters** mapping RMS onto a perceptual 0-100 scale
//! - **Playback** through cpal with a per-channel analysis graph

pub mod analysis;
pub mod decode;
pub mod meter;
pub mod resampling;
pub mod sink;
pub mod waveform;

pub use analysis::{AnalysisGraph, AnalysisTap, ANALYSIS_WINDOW};
pub use decode::{decode_bytes, DecodedAudio};
pub use meter::{level, pushed_level, rms, MeterLevels, PUSHED_LEVEL_GAIN};
pub use resampling::resample_audio;
pub use sink::{CpalSink, PlaybackError, PlaybackSink};
pub use waveform::{WaveformAnalyzer, DEFAULT_SAMPLE_DURATION};
