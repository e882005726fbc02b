//! Reconnect and bootstrap against a real WebSocket server

use aiwisper_client::client::Client;
use aiwisper_client::config::ClientConfig;
use aiwisper_client::state::{SessionChange, StateChange};
use futures::{SinkExt, StreamExt};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

const BOOTSTRAP: [&str; 4] = [
    "get_devices",
    "get_sessions",
    "get_models",
    "get_diarization_status",
];

/// Frame types the server saw, tagged with the connection number and arrival
/// time; the first connection's close is reported as `"close"`
type Seen = mpsc::UnboundedReceiver<(usize, String, Instant)>;

/// Accepts two connections: drops the first after bootstrap, keeps the second
/// open and pushes a session list on it
async fn spawn_server() -> (String, Seen) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for connection in 0..2 {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let mut received = 0;
            while received < BOOTSTRAP.len() {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                        let kind = value["type"].as_str().unwrap_or_default().to_string();
                        let _ = seen_tx.send((connection, kind, Instant::now()));
                        received += 1;
                    }
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }

            if connection == 0 {
                let _ = seen_tx.send((connection, "close".to_string(), Instant::now()));
                let _ = ws.close(None).await;
                continue;
            }

            let push = r#"{"type":"sessions_list","sessions":[
                {"id":"s1","startTime":"2025-01-01T10:00:00Z","status":"completed","totalDuration":6500000,"chunksCount":2}
            ]}"#;
            ws.send(Message::Text(push.to_string().into())).await.unwrap();

            // hold the second connection open
            while let Some(Ok(_)) = ws.next().await {}
        }
    });

    (url, seen_rx)
}

async fn next_seen(seen: &mut Seen) -> (usize, String, Instant) {
    tokio::time::timeout(Duration::from_secs(5), seen.recv())
        .await
        .expect("server saw nothing")
        .expect("server stopped")
}

#[tokio::test]
async fn test_reconnects_once_and_bootstraps_again() {
    let (url, mut seen) = spawn_server().await;
    let config = ClientConfig {
        backend_address: url,
        reconnect_delay_ms: 50,
        ..Default::default()
    };

    let client = Client::start(config).unwrap();
    let mut changes = client.state().subscribe();

    for expected in BOOTSTRAP {
        let (conn, kind, _) = next_seen(&mut seen).await;
        assert_eq!(conn, 0);
        assert_eq!(kind, expected);
    }
    let (conn, kind, closed_at) = next_seen(&mut seen).await;
    assert_eq!((conn, kind.as_str()), (0, "close"));

    for (i, expected) in BOOTSTRAP.iter().enumerate() {
        let (conn, kind, at) = next_seen(&mut seen).await;
        assert_eq!(conn, 1);
        assert_eq!(kind, *expected);
        if i == 0 {
            // the reconnect waits out the delay after the close
            assert!(
                at.duration_since(closed_at) >= Duration::from_millis(50),
                "reconnected after {:?}",
                at.duration_since(closed_at)
            );
        }
    }

    // the push on the second connection reaches the state
    let change = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match changes.recv().await {
                Ok(StateChange::Session(SessionChange::SessionsList)) => break,
                Ok(_) => continue,
                Err(e) => panic!("state channel failed: {}", e),
            }
        }
    })
    .await;
    assert!(change.is_ok());
    let sessions = client.state().sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].duration_seconds(), 6500.0);

    // one close, one reconnect; the open second connection is left alone
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(client.reconnect_count(), 1);
    assert!(client.is_connected());

    client.shutdown().await;
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_commands_fail_while_disconnected() {
    // nothing listens on this port once the listener is dropped
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    drop(listener);

    let config = ClientConfig {
        backend_address: url,
        reconnect_delay_ms: 20,
        ..Default::default()
    };
    let client = Client::start(config).unwrap();

    assert!(client.get_sessions().is_err());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(client.reconnect_count() >= 1);
    assert!(!client.is_connected());

    client.shutdown().await;
}
