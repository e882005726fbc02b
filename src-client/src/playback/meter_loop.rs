//! Per-frame meter polling
//!
//! While the sink plays, the loop reads both analysis taps once per frame and
//! publishes the levels on a watch channel. It ends itself when playback
//! stops and leaves zeroed levels behind.

use aiwisper_audio::{AnalysisGraph, MeterLevels, PlaybackSink};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct MeterLoop {
    frame: Duration,
    levels_tx: watch::Sender<MeterLevels>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl MeterLoop {
    pub fn new(frame: Duration) -> Self {
        let (levels_tx, _) = watch::channel(MeterLevels::default());
        Self {
            frame: frame.max(Duration::from_millis(1)),
            levels_tx,
            task: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<MeterLevels> {
        self.levels_tx.subscribe()
    }

    pub fn levels(&self) -> MeterLevels {
        *self.levels_tx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|(_, handle)| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Start polling; a no-op while a loop is already running
    pub fn start(&self, graph: Arc<AnalysisGraph>, sink: Arc<dyn PlaybackSink>) {
        let mut task = self.task.lock();
        if let Some((_, handle)) = task.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No runtime, meter loop not started");
            return;
        };

        let token = CancellationToken::new();
        let cancel = token.clone();
        let levels_tx = self.levels_tx.clone();
        let frame = self.frame;

        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(frame);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if !sink.is_playing() {
                            break;
                        }
                        levels_tx.send_replace(graph.levels());
                    }
                }
            }
            levels_tx.send_replace(MeterLevels::default());
            tracing::trace!("Meter loop finished");
        });

        *task = Some((token, handle));
    }

    /// Stop polling and zero the levels; safe to call repeatedly
    pub fn stop(&self) {
        if let Some((token, _)) = self.task.lock().take() {
            token.cancel();
        }
        self.levels_tx.send_replace(MeterLevels::default());
    }
}

impl Drop for MeterLoop {
    fn drop(&mut self) {
        if let Some((token, _)) = self.task.get_mut().take() {
            token.cancel();
        }
    }
}
