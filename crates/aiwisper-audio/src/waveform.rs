//! Waveform analysis for scrubbing and seek mapping

use aiwisper_types::WaveformData;
use anyhow::Result;

use crate::decode::{decode_bytes, DecodedAudio};

/// Default slice length, seconds (50ms bins)
pub const DEFAULT_SAMPLE_DURATION: f64 = 0.05;

/// Channels in every waveform: mic, system
const OUTPUT_CHANNELS: usize = 2;

/// Stateless analyzer with a fixed slice resolution
#[derive(Debug, Clone, Copy)]
pub struct WaveformAnalyzer {
    sample_duration: f64,
}

impl Default for WaveformAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_DURATION)
    }
}

impl WaveformAnalyzer {
    pub fn new(sample_duration: f64) -> Self {
        let sample_duration = if sample_duration.is_finite() && sample_duration > 0.0 {
            sample_duration
        } else {
            DEFAULT_SAMPLE_DURATION
        };
        Self { sample_duration }
    }

    pub fn sample_duration(&self) -> f64 {
        self.sample_duration
    }

    /// Decode an encoded recording and analyze it
    pub fn analyze(&self, bytes: Vec<u8>) -> Result<WaveformData> {
        let audio = decode_bytes(bytes, None)?;
        Ok(self.analyze_decoded(&audio))
    }

    /// Analyze already decoded audio
    ///
    /// Mono sources are duplicated into both channels; anything past the
    /// second channel is ignored.
    pub fn analyze_decoded(&self, audio: &DecodedAudio) -> WaveformData {
        let total_frames = audio.frames();
        let duration = audio.duration();

        let sources: [&[f32]; OUTPUT_CHANNELS] = match audio.channels.as_slice() {
            [mono] => [mono.as_slice(), mono.as_slice()],
            [first, second, ..] => [first.as_slice(), second.as_slice()],
            [] => [&[], &[]],
        };

        if total_frames == 0 || audio.sample_rate == 0 {
            return WaveformData {
                peaks: vec![Vec::new(); OUTPUT_CHANNELS],
                rms: vec![Vec::new(); OUTPUT_CHANNELS],
                rms_absolute: vec![Vec::new(); OUTPUT_CHANNELS],
                sample_duration: self.sample_duration,
                duration: 0.0,
                sample_count: 0,
                channel_count: OUTPUT_CHANNELS as u32,
            };
        }

        // Small epsilon keeps exact multiples from gaining an empty slice
        let sample_count = ((duration / self.sample_duration) - 1e-9).ceil().max(1.0) as usize;
        let frames_per_slice = self.sample_duration * audio.sample_rate as f64;

        let mut peaks = vec![vec![0.0f32; sample_count]; OUTPUT_CHANNELS];
        let mut rms_absolute = vec![vec![0.0f32; sample_count]; OUTPUT_CHANNELS];

        let mut max_peak: f32 = 0.0;
        let mut max_rms: f32 = 0.0;

        for (ch, samples) in sources.iter().enumerate() {
            for slice in 0..sample_count {
                let start = (slice as f64 * frames_per_slice).round() as usize;
                let end = (((slice + 1) as f64 * frames_per_slice).round() as usize).min(samples.len());
                if start >= end {
                    continue;
                }

                let window = &samples[start..end];
                let peak = window.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
                let rms_value = crate::meter::rms(window);

                peaks[ch][slice] = peak;
                rms_absolute[ch][slice] = rms_value;

                max_peak = max_peak.max(peak);
                max_rms = max_rms.max(rms_value);
            }
        }

        // Normalize peaks and rms for display
        let peak_norm = if max_peak > 0.0 { max_peak } else { 1.0 };
        let rms_norm = if max_rms > 0.0 { max_rms } else { 1.0 };

        let peaks = peaks
            .into_iter()
            .map(|ch| ch.into_iter().map(|v| v / peak_norm).collect())
            .collect();
        let rms = rms_absolute
            .iter()
            .map(|ch| ch.iter().map(|v| v / rms_norm).collect())
            .collect();

        WaveformData {
            peaks,
            rms,
            rms_absolute,
            sample_duration: self.sample_duration,
            duration,
            sample_count: sample_count as u64,
            channel_count: OUTPUT_CHANNELS as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::wav_bytes;

    #[test]
    fn test_slice_count_rounds_up() {
        let analyzer = WaveformAnalyzer::new(0.5);
        // 1.2s at 1kHz
        let audio = DecodedAudio {
            channels: vec![vec![0.1; 1200], vec![0.2; 1200]],
            sample_rate: 1000,
        };
        let waveform = analyzer.analyze_decoded(&audio);
        assert_eq!(waveform.sample_count, 3);
        assert_eq!(waveform.peaks[0].len(), 3);
        assert_eq!(waveform.rms_absolute[1].len(), 3);
        assert!((waveform.duration - 1.2).abs() < 1e-9);

        // exact multiple does not grow an extra slice
        let audio = DecodedAudio {
            channels: vec![vec![0.1; 1000]],
            sample_rate: 1000,
        };
        assert_eq!(analyzer.analyze_decoded(&audio).sample_count, 2);
    }

    #[test]
    fn test_mono_is_duplicated() {
        let analyzer = WaveformAnalyzer::new(0.1);
        let audio = DecodedAudio {
            channels: vec![(0..1000).map(|i| if i < 500 { 0.5 } else { 0.1 }).collect()],
            sample_rate: 1000,
        };
        let waveform = analyzer.analyze_decoded(&audio);
        assert_eq!(waveform.channel_count, 2);
        assert_eq!(waveform.peaks[0], waveform.peaks[1]);
        assert_eq!(waveform.rms_absolute[0], waveform.rms_absolute[1]);
    }

    #[test]
    fn test_normalized_and_absolute() {
        let analyzer = WaveformAnalyzer::new(0.5);
        let audio = DecodedAudio {
            channels: vec![
                [vec![0.4; 500], vec![0.2; 500]].concat(),
                vec![0.0; 1000],
            ],
            sample_rate: 1000,
        };
        let waveform = analyzer.analyze_decoded(&audio);

        assert!((waveform.peaks[0][0] - 1.0).abs() < 1e-6);
        assert!((waveform.peaks[0][1] - 0.5).abs() < 1e-6);
        assert!((waveform.rms[0][1] - 0.5).abs() < 1e-6);
        assert!((waveform.rms_absolute[0][0] - 0.4).abs() < 1e-6);
        assert!((waveform.rms_absolute[0][1] - 0.2).abs() < 1e-6);
        assert_eq!(waveform.rms_absolute[1], vec![0.0, 0.0]);
    }

    #[test]
    fn test_analyze_wav_bytes_deterministic() {
        let interleaved: Vec<f32> = (0..4000)
            .flat_map(|i| {
                let t = i as f32 / 4000.0;
                [0.5 * (t * 440.0).sin(), 0.25 * (t * 220.0).sin()]
            })
            .collect();
        let bytes = wav_bytes(2, 4000, &interleaved);

        let analyzer = WaveformAnalyzer::default();
        let first = analyzer.analyze(bytes.clone()).unwrap();
        let second = analyzer.analyze(bytes).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.sample_count, 20);
        assert!((first.sample_duration - DEFAULT_SAMPLE_DURATION).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_sample_duration_falls_back() {
        assert_eq!(
            WaveformAnalyzer::new(0.0).sample_duration(),
            DEFAULT_SAMPLE_DURATION
        );
        assert_eq!(
            WaveformAnalyzer::new(f64::NAN).sample_duration(),
            DEFAULT_SAMPLE_DURATION
        );
    }
}
