//! Recording duration clock
//!
//! Anchored on the session's `startTime` so a reconnect mid-recording keeps
//! counting from the real start. Ticks once a second on the tokio runtime
//! until stopped.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::StateChange;

const TICK: Duration = Duration::from_secs(1);

#[derive(Default)]
pub struct RecordingClock {
    inner: Mutex<ClockInner>,
}

#[derive(Default)]
struct ClockInner {
    started_at: Option<DateTime<Utc>>,
    cancel: Option<CancellationToken>,
}

/// Parse the backend's RFC 3339 start time, falling back to now
pub fn parse_start_time(start_time: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(start_time)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl RecordingClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the clock and its tick task
    pub fn start(&self, started_at: DateTime<Utc>, changes: broadcast::Sender<StateChange>) {
        let token = CancellationToken::new();
        {
            let mut inner = self.inner.lock();
            if let Some(previous) = inner.cancel.replace(token.clone()) {
                previous.cancel();
            }
            inner.started_at = Some(started_at);
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No runtime, recording clock will not tick");
            return;
        };

        runtime.spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let _ = changes.send(StateChange::RecordingTick {
                            elapsed: elapsed_since(started_at),
                        });
                    }
                }
            }
        });
    }

    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if let Some(token) = inner.cancel.take() {
            token.cancel();
        }
        inner.started_at = None;
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().started_at.is_some()
    }

    /// Time since the recording started; zero when stopped
    pub fn elapsed(&self) -> Duration {
        self.inner
            .lock()
            .started_at
            .map(elapsed_since)
            .unwrap_or_default()
    }
}

impl Drop for RecordingClock {
    fn drop(&mut self) {
        if let Some(token) = self.inner.get_mut().cancel.take() {
            token.cancel();
        }
    }
}

fn elapsed_since(started_at: DateTime<Utc>) -> Duration {
    (Utc::now() - started_at).to_std().unwrap_or_default()
}
