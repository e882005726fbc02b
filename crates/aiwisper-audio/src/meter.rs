//! Loudness meters
//!
//! Local audio (decoded assets, analysis taps) goes through the dB mapping in
//! [`level`]. Levels pushed by the backend during recording are raw energy
//! values and only get a linear gain, see [`pushed_level`].

/// Floor of the meter scale, dBFS
pub const METER_FLOOR_DB: f32 = -50.0;

/// Gain applied to backend-pushed levels before clamping
pub const PUSHED_LEVEL_GAIN: f64 = 300.0;

/// Root mean square of a sample buffer
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Map RMS onto 0-100 over the -50..0 dBFS range
pub fn level(rms: f32) -> f32 {
    if rms.is_nan() || rms <= 0.0 {
        return 0.0;
    }
    let db = 20.0 * rms.log10();
    let percent = (db - METER_FLOOR_DB) / (0.0 - METER_FLOOR_DB) * 100.0;
    percent.clamp(0.0, 100.0)
}

/// Map a backend-pushed energy value onto 0-100
pub fn pushed_level(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    (raw * PUSHED_LEVEL_GAIN).clamp(0.0, 100.0)
}

/// Current meter readings, percent
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeterLevels {
    pub mic: f32,
    pub system: f32,
}

impl MeterLevels {
    /// Levels from raw per-channel windows
    pub fn from_windows(mic: &[f32], system: &[f32]) -> Self {
        Self {
            mic: level(rms(mic)),
            system: level(rms(system)),
        }
    }

    /// Levels from an `audio_level` push
    pub fn from_pushed(mic: f64, system: f64) -> Self {
        Self {
            mic: pushed_level(mic) as f32,
            system: pushed_level(system) as f32,
        }
    }
}
