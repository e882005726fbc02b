//! Message routing
//!
//! Frames are `{"type": ..., ...payload}` JSON envelopes. Anything that does
//! not parse, or has no string `type`, is dropped without surfacing an error.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Subscriber callback; receives the whole decoded envelope
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Identifies one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct MessageRouter {
    handlers: RwLock<HashMap<String, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one message type
    pub fn subscribe<F>(&self, message_type: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .entry(message_type.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove exactly one registration; false if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        for list in handlers.values_mut() {
            if let Some(pos) = list.iter().position(|(sid, _)| *sid == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn subscriber_count(&self, message_type: &str) -> usize {
        self.handlers
            .read()
            .get(message_type)
            .map(|l| l.len())
            .unwrap_or(0)
    }

    /// Decode one frame and hand it to every subscriber of its type
    ///
    /// Returns how many handlers ran.
    pub fn dispatch(&self, frame: &str) -> usize {
        let value: Value = match serde_json::from_str(frame) {
            Ok(v) => v,
            Err(e) => {
                tracing::trace!("Dropping malformed frame: {}", e);
                return 0;
            }
        };

        let Some(message_type) = value.get("type").and_then(Value::as_str) else {
            tracing::trace!("Dropping frame without type");
            return 0;
        };

        // Handlers may subscribe or unsubscribe, so call them outside the lock
        let targets: Vec<Handler> = match self.handlers.read().get(message_type) {
            Some(list) => list.iter().map(|(_, h)| h.clone()).collect(),
            None => {
                tracing::trace!("No subscribers for {}", message_type);
                return 0;
            }
        };

        for handler in &targets {
            handler(&value);
        }
        targets.len()
    }
}
