//! Live analysis graph
//!
//! The output stream is split into two taps (channel 0, channel 1), each
//! keeping the most recent fixed-size sample window, then merged back for
//! playback. Windows are raw: no smoothing between reads.

use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::meter::MeterLevels;

/// Samples retained per tap (~2.7ms at 48kHz)
pub const ANALYSIS_WINDOW: usize = 128;

/// One channel's most recent samples
#[derive(Debug)]
pub struct AnalysisTap {
    window: Mutex<VecDeque<f32>>,
}

impl Default for AnalysisTap {
    fn default() -> Self {
        Self {
            window: Mutex::new(VecDeque::with_capacity(ANALYSIS_WINDOW)),
        }
    }
}

impl AnalysisTap {
    /// Append samples, keeping only the last [`ANALYSIS_WINDOW`]
    ///
    /// Called from the audio callback; skips the update instead of blocking
    /// when a reader holds the lock.
    pub fn feed<I: IntoIterator<Item = f32>>(&self, samples: I) {
        let Some(mut window) = self.window.try_lock() else {
            return;
        };
        for sample in samples {
            if window.len() == ANALYSIS_WINDOW {
                window.pop_front();
            }
            window.push_back(sample);
        }
    }

    /// Copy of the current window
    pub fn snapshot(&self) -> Vec<f32> {
        self.window.lock().iter().copied().collect()
    }

    pub fn clear(&self) {
        self.window.lock().clear();
    }
}

/// Two-channel split/merge graph around the output stream
#[derive(Debug, Default)]
pub struct AnalysisGraph {
    taps: [AnalysisTap; 2],
}

impl AnalysisGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tap(&self, channel: usize) -> Option<&AnalysisTap> {
        self.taps.get(channel)
    }

    /// Split interleaved output frames into the taps
    ///
    /// The buffer is left untouched, so what reaches the device is the merged
    /// signal. Mono output feeds both taps.
    pub fn process(&self, interleaved: &[f32], channels: usize) {
        if channels == 0 {
            return;
        }
        let second = if channels > 1 { 1 } else { 0 };
        self.taps[0].feed(interleaved.iter().step_by(channels).copied());
        self.taps[1].feed(interleaved.iter().skip(second).step_by(channels).copied());
    }

    /// Meter levels from the current windows
    pub fn levels(&self) -> MeterLevels {
        MeterLevels::from_windows(&self.taps[0].snapshot(), &self.taps[1].snapshot())
    }

    pub fn reset(&self) {
        for tap in &self.taps {
            tap.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_keeps_last_window() {
        let tap = AnalysisTap::default();
        tap.feed((0..300).map(|i| i as f32));
        let window = tap.snapshot();
        assert_eq!(window.len(), ANALYSIS_WINDOW);
        assert_eq!(window[0], (300 - ANALYSIS_WINDOW) as f32);
        assert_eq!(*window.last().unwrap(), 299.0);
    }

    #[test]
    fn test_graph_splits_channels() {
        let graph = AnalysisGraph::new();
        let interleaved: Vec<f32> = (0..64).flat_map(|_| [1.0, 0.0]).collect();
        graph.process(&interleaved, 2);

        assert!(graph.tap(0).unwrap().snapshot().iter().all(|&s| s == 1.0));
        assert!(graph.tap(1).unwrap().snapshot().iter().all(|&s| s == 0.0));

        let levels = graph.levels();
        assert_eq!(levels.mic, 100.0);
        assert_eq!(levels.system, 0.0);

        graph.reset();
        assert_eq!(graph.levels(), MeterLevels::default());
    }

    #[test]
    fn test_mono_feeds_both_taps() {
        let graph = AnalysisGraph::new();
        graph.process(&[0.5; 32], 1);
        assert_eq!(graph.tap(0).unwrap().snapshot().len(), 32);
        assert_eq!(
            graph.tap(0).unwrap().snapshot(),
            graph.tap(1).unwrap().snapshot()
        );
    }
}
