//! WebSocket adapter

use async_trait::async_trait;
use futures::{future, SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{Connector, FrameSink, FrameStream, TransportError};

/// Text-frame WebSocket channel (`ws://` / `wss://`)
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<(FrameSink, FrameStream), TransportError> {
        let (ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (write, read) = ws.split();

        let sink = write
            .sink_map_err(|e| TransportError::Io(e.to_string()))
            .with(|frame: String| future::ready(Ok::<_, TransportError>(Message::Text(frame.into()))));

        // Control frames are answered by tungstenite itself
        let stream = read.filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => String::from_utf8(bytes.to_vec()).ok().map(Ok),
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::Io(e.to_string()))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
