//! Audio decoding using symphonia
//!
//! Media assets arrive as whole byte buffers (HTTP responses), so decoding
//! runs over an in-memory cursor and yields de-interleaved channels at the
//! source sample rate.

use anyhow::{Context, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded PCM audio
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedAudio {
    /// Per-channel samples
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Frames per channel
    pub fn frames(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Decode a complete audio file held in memory
///
/// `extension` is a probe hint (`"mp3"`, `"wav"`); the container is still sniffed.
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow::anyhow!("No audio track found"))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channel_count = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut channels: Vec<Vec<f32>> = vec![Vec::new(); channel_count];

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(e) => return Err(e).context("Failed to read audio packet"),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // Corrupt frame, skip it
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(e).context("Failed to decode audio packet"),
        };

        let spec = *decoded.spec();
        if sample_rate == 0 {
            sample_rate = spec.rate;
        }
        if channels.is_empty() {
            channel_count = spec.channels.count();
            channels = vec![Vec::new(); channel_count];
        }

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        // De-interleave samples into channels
        for (i, sample) in sample_buf.samples().iter().enumerate() {
            channels[i % channel_count].push(*sample);
        }
    }

    if channels.is_empty() || channels[0].is_empty() {
        return Err(anyhow::anyhow!("No audio samples found"));
    }

    tracing::debug!(
        "Decoded audio: {} channels, {} frames @ {} Hz",
        channel_count,
        channels[0].len(),
        sample_rate
    );

    Ok(DecodedAudio {
        channels,
        sample_rate,
    })
}
