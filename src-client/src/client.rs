//! Backend client
//!
//! Owns the connection to the backend and keeps it alive: every close is
//! followed by exactly one reconnect after the configured delay, and every
//! open re-sends the bootstrap queries. Incoming frames go through the
//! [`MessageRouter`]; the client registers itself for every server event type
//! and folds decoded events into [`ClientState`].

use aiwisper_types::{ClientCommand, ServerEvent, BOOTSTRAP_COMMANDS, SERVER_EVENT_TYPES};
use anyhow::Result;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::router::MessageRouter;
use crate::state::ClientState;
use crate::transport::{
    self, connector_for, ConnectionHandle, Connector, ReadyState, TransportError, TransportEvent,
};

#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    router: Arc<MessageRouter>,
    state: ClientState,
    handle: RwLock<Option<ConnectionHandle>>,
    shutdown: CancellationToken,
    connections: AtomicU64,
    supervisor: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Connect using the configured transport
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(config: ClientConfig) -> Result<Self> {
        let transport = config.transport()?;
        tracing::info!(
            "Using {} transport for {}",
            transport.kind(),
            config.backend_address
        );
        let connector = connector_for(&transport);
        Ok(Self::with_connector(config, connector))
    }

    /// Connect through an explicit connector
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let client = Self {
            inner: Arc::new(ClientInner {
                config,
                connector,
                router: Arc::new(MessageRouter::new()),
                state: ClientState::new(),
                handle: RwLock::new(None),
                shutdown: CancellationToken::new(),
                connections: AtomicU64::new(0),
                supervisor: parking_lot::Mutex::new(None),
            }),
        };

        client.register_state_handlers();

        let supervisor = tokio::spawn(supervise(client.inner.clone()));
        *client.inner.supervisor.lock() = Some(supervisor);
        client
    }

    fn register_state_handlers(&self) {
        for kind in SERVER_EVENT_TYPES {
            let state = self.inner.state.clone();
            self.inner.router.subscribe(kind, move |value| {
                match ServerEvent::from_value(value.clone()) {
                    Ok(event) => state.apply(&event),
                    Err(e) => tracing::trace!("Dropping malformed event: {}", e),
                }
            });
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn state(&self) -> &ClientState {
        &self.inner.state
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.inner.router
    }

    pub fn ready_state(&self) -> ReadyState {
        self.inner
            .handle
            .read()
            .as_ref()
            .map(|h| h.ready_state())
            .unwrap_or(ReadyState::Closed)
    }

    pub fn is_connected(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    /// Reconnects performed so far
    pub fn reconnect_count(&self) -> u64 {
        self.inner.connections.load(Ordering::Acquire).saturating_sub(1)
    }

    /// Send one command; fails when the connection is not open
    pub fn send_command(&self, command: &ClientCommand) -> Result<(), TransportError> {
        let frame = command
            .to_frame()
            .map_err(|e| TransportError::Encode(e.to_string()))?;
        let handle = self.inner.handle.read().clone();
        let handle = handle.ok_or(TransportError::NotConnected)?;
        handle.send(frame)
    }

    /// Open a session: record the selection, then ask for details and speakers
    pub fn select_session(&self, session_id: &str) -> Result<(), TransportError> {
        self.inner.state.select_session(session_id);
        self.send_command(&ClientCommand::GetSession {
            session_id: session_id.to_string(),
        })?;
        self.send_command(&ClientCommand::GetSessionSpeakers {
            session_id: session_id.to_string(),
        })
    }

    pub fn clear_selection(&self) {
        self.inner.state.clear_selection();
    }

    /// Close the connection and stop reconnecting
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down backend client");
        self.inner.shutdown.cancel();
        if let Some(handle) = self.inner.handle.read().as_ref() {
            handle.close();
        }
        let supervisor = self.inner.supervisor.lock().take();
        if let Some(supervisor) = supervisor {
            let _ = supervisor.await;
        }
    }
}

// ============================================================================
// Supervisor
// ============================================================================

async fn supervise(inner: Arc<ClientInner>) {
    let delay = inner.config.reconnect_delay();

    loop {
        let (handle, mut events) = transport::connect(inner.connector.clone());
        *inner.handle.write() = Some(handle.clone());
        inner.connections.fetch_add(1, Ordering::AcqRel);

        let reason = loop {
            tokio::select! {
                _ = inner.shutdown.cancelled() => {
                    handle.close();
                    *inner.handle.write() = None;
                    return;
                }
                event = events.recv() => match event {
                    Some(TransportEvent::Open) => bootstrap(&handle),
                    Some(TransportEvent::Message(frame)) => {
                        inner.router.dispatch(&frame);
                    }
                    Some(TransportEvent::Error(e)) => {
                        tracing::warn!("Transport error: {}", e);
                    }
                    Some(TransportEvent::Close(reason)) => break reason,
                    None => break None,
                },
            }
        };

        match reason {
            Some(reason) => tracing::info!(
                "Connection closed ({}), reconnecting in {:?}",
                reason,
                delay
            ),
            None => tracing::info!("Connection closed, reconnecting in {:?}", delay),
        }

        tokio::select! {
            _ = inner.shutdown.cancelled() => {
                *inner.handle.write() = None;
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

fn bootstrap(handle: &ConnectionHandle) {
    for command in BOOTSTRAP_COMMANDS.iter() {
        let frame = match command.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("Failed to encode {:?}: {}", command, e);
                continue;
            }
        };
        if let Err(e) = handle.send(frame) {
            tracing::warn!("Bootstrap send failed: {}", e);
            return;
        }
    }
    tracing::debug!("Sent bootstrap queries");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateChange;
    use crate::transport::{FrameSink, FrameStream};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Records outgoing frames and lets the test push incoming ones
    struct ScriptedConnector {
        sent: Arc<Mutex<Vec<String>>>,
        incoming: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self) -> Result<(FrameSink, FrameStream), TransportError> {
            let rx = self
                .incoming
                .lock()
                .take()
                .ok_or_else(|| TransportError::Connect("already used".into()))?;
            let sent = self.sent.clone();
            let sink = futures::sink::unfold(sent, |sent, frame: String| async move {
                sent.lock().push(frame);
                Ok::<_, TransportError>(sent)
            });
            let stream = frame_stream(rx);
            Ok((Box::pin(sink), stream))
        }

        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    fn frame_stream(rx: mpsc::UnboundedReceiver<String>) -> FrameStream {
        Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|frame| (Ok(frame), rx))
        }))
    }

    fn scripted() -> (Arc<ScriptedConnector>, mpsc::UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(ScriptedConnector {
            sent: Arc::new(Mutex::new(Vec::new())),
            incoming: Mutex::new(Some(rx)),
        });
        (connector, tx)
    }

    async fn wait_for<F: Fn() -> bool>(check: F) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_bootstrap_on_open() {
        let (connector, _tx) = scripted();
        let client = Client::with_connector(ClientConfig::default(), connector.clone());

        wait_for(|| connector.sent.lock().len() == 4).await;
        let sent = connector.sent.lock().clone();
        let types: Vec<String> = sent
            .iter()
            .map(|f| serde_json::from_str::<serde_json::Value>(f).unwrap()["type"].to_string())
            .collect();
        assert_eq!(
            types,
            vec![
                "\"get_devices\"",
                "\"get_sessions\"",
                "\"get_models\"",
                "\"get_diarization_status\""
            ]
        );
        assert!(client.is_connected());
        client.shutdown().await;
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_events_reach_state() {
        let (connector, tx) = scripted();
        let client = Client::with_connector(ClientConfig::default(), connector.clone());
        let mut changes = client.state().subscribe();

        tx.send(r#"{"type":"audio_level","micLevel":0.1,"systemLevel":0.5}"#.into())
            .unwrap();
        tx.send("not json".into()).unwrap();

        let change = tokio::time::timeout(Duration::from_secs(2), changes.recv())
            .await
            .unwrap()
            .unwrap();
        let StateChange::AudioLevels(levels) = change else {
            panic!("unexpected change {:?}", change);
        };
        assert!((levels.mic - 30.0).abs() < 1e-3);
        assert_eq!(levels.system, 100.0);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_select_session_requests_details() {
        let (connector, _tx) = scripted();
        let client = Client::with_connector(ClientConfig::default(), connector.clone());
        wait_for(|| client.is_connected()).await;

        client.select_session("s1").unwrap();
        wait_for(|| connector.sent.lock().len() == 6).await;

        let sent = connector.sent.lock().clone();
        assert_eq!(sent[4], r#"{"type":"get_session","sessionId":"s1"}"#);
        assert_eq!(sent[5], r#"{"type":"get_session_speakers","sessionId":"s1"}"#);
        assert_eq!(client.state().selected_session_id().as_deref(), Some("s1"));
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_send_before_open_fails() {
        struct Never;

        #[async_trait]
        impl Connector for Never {
            async fn connect(&self) -> Result<(FrameSink, FrameStream), TransportError> {
                futures::future::pending().await
            }

            fn describe(&self) -> String {
                "never".into()
            }
        }

        let client = Client::with_connector(ClientConfig::default(), Arc::new(Never));
        let err = client.send_command(&ClientCommand::GetSessions).unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
        client.shutdown().await;
    }
}
