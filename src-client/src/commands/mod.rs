//! Backend commands
//!
//! Typed wrappers over [`ClientCommand`](aiwisper_types::ClientCommand), grouped
//! by concern. Each one fails fast with `TransportError::NotConnected` while the
//! connection is down; nothing is queued or retried.

mod diarization;
mod session;
mod transcription;

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use futures::StreamExt;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::client::Client;
    use crate::config::ClientConfig;
    use crate::transport::{Connector, FrameSink, FrameStream, TransportError};

    /// Connector whose outgoing frames are captured and whose stream never yields
    pub struct CaptureConnector {
        pub sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Connector for CaptureConnector {
        async fn connect(&self) -> Result<(FrameSink, FrameStream), TransportError> {
            let sink = futures::sink::unfold(self.sent.clone(), |sent, frame: String| async move {
                sent.lock().push(frame);
                Ok::<_, TransportError>(sent)
            });
            let stream = futures::stream::pending().boxed();
            Ok((Box::pin(sink), stream))
        }

        fn describe(&self) -> String {
            "capture".into()
        }
    }

    /// A connected client plus the frames it sent after bootstrap
    pub async fn connected_client() -> (Client, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let client = Client::with_connector(
            ClientConfig::default(),
            Arc::new(CaptureConnector { sent: sent.clone() }),
        );
        for _ in 0..200 {
            if sent.lock().len() >= 4 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        sent.lock().clear();
        (client, sent)
    }

    /// Wait until `count` frames were written, then decode them
    pub async fn frames(sent: &Mutex<Vec<String>>, count: usize) -> Vec<serde_json::Value> {
        for _ in 0..200 {
            if sent.lock().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        sent.lock()
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }
}
