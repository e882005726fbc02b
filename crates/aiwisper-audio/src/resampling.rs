//! Audio resampling using rubato

use anyhow::Result;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::decode::DecodedAudio;

fn sinc_params() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    }
}

/// Resample every channel of a decoded asset in one pass
pub fn resample_audio(audio: &DecodedAudio, target_rate: u32) -> Result<DecodedAudio> {
    if audio.sample_rate == target_rate || audio.frames() == 0 {
        return Ok(audio.clone());
    }

    let mut resampler = SincFixedIn::<f32>::new(
        target_rate as f64 / audio.sample_rate as f64,
        2.0,
        sinc_params(),
        audio.frames(),
        audio.channel_count(),
    )?;

    let channels = resampler.process(&audio.channels, None)?;

    tracing::debug!(
        "Resampled {} channels {} Hz -> {} Hz",
        audio.channel_count(),
        audio.sample_rate,
        target_rate
    );

    Ok(DecodedAudio {
        channels,
        sample_rate: target_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_identity() {
        let audio = DecodedAudio {
            channels: vec![vec![0.1, 0.2, 0.3]],
            sample_rate: 16000,
        };
        assert_eq!(resample_audio(&audio, 16000).unwrap(), audio);
    }

    #[test]
    fn test_resample_audio_changes_length() {
        let audio = DecodedAudio {
            channels: vec![vec![0.0; 24000], vec![0.0; 24000]],
            sample_rate: 24000,
        };
        let out = resample_audio(&audio, 48000).unwrap();
        assert_eq!(out.sample_rate, 48000);
        assert_eq!(out.channel_count(), 2);
        // sinc delay trims a little off the tail
        assert!(out.frames() > 40000 && out.frames() <= 48100);
    }
}
