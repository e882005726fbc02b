//! Duplex transport to the backend
//!
//! One [`ConnectionHandle`] wraps exactly one underlying channel, picked from
//! [`TransportConfig`] when the connector is built. Lifecycle callbacks are
//! delivered as [`TransportEvent`]s, in order, on the receiver returned by
//! [`connect`]. Reconnecting is the owner's job, see `client`.

pub mod local;
pub mod websocket;

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::TransportConfig;

pub use local::LocalSocketConnector;
pub use websocket::WebSocketConnector;

/// Outgoing half of a channel: text frames in
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;
/// Incoming half of a channel: text frames out, ends on clean close
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Transport errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("transport i/o error: {0}")]
    Io(String),

    #[error("failed to encode frame: {0}")]
    Encode(String),
}

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// onopen / onmessage / onerror / onclose
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Open,
    Message(String),
    Error(String),
    Close(Option<String>),
}

/// Opens one concrete duplex channel
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<(FrameSink, FrameStream), TransportError>;

    /// Address for logs
    fn describe(&self) -> String;
}

/// Build the connector for a transport configuration
pub fn connector_for(config: &TransportConfig) -> Arc<dyn Connector> {
    match config {
        TransportConfig::WebSocket { url } => Arc::new(WebSocketConnector::new(url.clone())),
        TransportConfig::Local { path } => Arc::new(LocalSocketConnector::new(path.clone())),
    }
}

/// Handle to one connection attempt
#[derive(Clone)]
pub struct ConnectionHandle {
    state: Arc<AtomicU8>,
    outgoing: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Queue a frame; fails unless the connection is open
    pub fn send(&self, frame: String) -> Result<(), TransportError> {
        if self.ready_state() != ReadyState::Open {
            return Err(TransportError::NotConnected);
        }
        self.outgoing
            .send(frame)
            .map_err(|_| TransportError::NotConnected)
    }

    /// Close the connection; a `Close` event follows
    pub fn close(&self) {
        let _ = self.state.compare_exchange(
            ReadyState::Open as u8,
            ReadyState::Closing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.cancel.cancel();
    }
}

/// Start connecting and return the handle plus its event stream
///
/// Must be called inside a tokio runtime.
pub fn connect(
    connector: Arc<dyn Connector>,
) -> (ConnectionHandle, mpsc::UnboundedReceiver<TransportEvent>) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

    let handle = ConnectionHandle {
        state: Arc::new(AtomicU8::new(ReadyState::Connecting as u8)),
        outgoing: outgoing_tx,
        cancel: CancellationToken::new(),
    };

    tokio::spawn(run_connection(
        connector,
        handle.state.clone(),
        handle.cancel.clone(),
        outgoing_rx,
        event_tx,
    ));

    (handle, event_rx)
}

async fn run_connection(
    connector: Arc<dyn Connector>,
    state: Arc<AtomicU8>,
    cancel: CancellationToken,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let set_state = |s: ReadyState| state.store(s as u8, Ordering::Release);
    let emit = |event: TransportEvent| {
        let _ = events.send(event);
    };

    tracing::debug!("Connecting to {}", connector.describe());

    let connected = tokio::select! {
        _ = cancel.cancelled() => {
            set_state(ReadyState::Closed);
            emit(TransportEvent::Close(None));
            return;
        }
        result = connector.connect() => result,
    };

    let (mut sink, mut stream) = match connected {
        Ok(halves) => halves,
        Err(e) => {
            tracing::warn!("Connection to {} failed: {}", connector.describe(), e);
            set_state(ReadyState::Closed);
            emit(TransportEvent::Error(e.to_string()));
            emit(TransportEvent::Close(Some(e.to_string())));
            return;
        }
    };

    set_state(ReadyState::Open);
    tracing::info!("Connected to {}", connector.describe());
    emit(TransportEvent::Open);

    let reason = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                set_state(ReadyState::Closing);
                let _ = sink.close().await;
                break None;
            }
            Some(frame) = outgoing.recv() => {
                if let Err(e) = sink.send(frame).await {
                    emit(TransportEvent::Error(e.to_string()));
                    break Some(e.to_string());
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(frame)) => emit(TransportEvent::Message(frame)),
                Some(Err(e)) => {
                    emit(TransportEvent::Error(e.to_string()));
                    break Some(e.to_string());
                }
                None => break None,
            },
        }
    };

    set_state(ReadyState::Closed);
    tracing::info!(
        "Connection to {} closed{}",
        connector.describe(),
        reason
            .as_ref()
            .map(|r| format!(": {}", r))
            .unwrap_or_default()
    );
    emit(TransportEvent::Close(reason));
}
