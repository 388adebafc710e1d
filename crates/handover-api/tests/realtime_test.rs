#![allow(clippy::unwrap_used)]
// Realtime connection loop against a loopback WebSocket server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Instant, timeout};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_util::sync::CancellationToken;
use url::Url;

use handover_api::{
    ChangeType, Credentials, RealtimeConfig, RealtimeHandle, RealtimeMessage, ReconnectConfig,
};

const TOPIC: &str = "realtime:announcements_changes";

// ── Helpers ─────────────────────────────────────────────────────────

async fn bind() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
    (listener, url)
}

fn config(initial_ms: u64, max_retries: Option<u32>) -> RealtimeConfig {
    let mut config = RealtimeConfig::new("announcements_changes", "announcements");
    config.heartbeat_interval = Duration::from_secs(60);
    config.reconnect = ReconnectConfig {
        initial_delay: Duration::from_millis(initial_ms),
        max_delay: Duration::from_secs(1),
        max_retries,
    };
    config
}

fn connect(url: &Url, config: RealtimeConfig) -> RealtimeHandle {
    RealtimeHandle::connect(
        url,
        Credentials::new(SecretString::from("anon")),
        config,
        CancellationToken::new(),
    )
    .unwrap()
}

async fn next_json(ws: &mut WebSocketStream<TcpStream>) -> Option<Value> {
    while let Some(Ok(msg)) = ws.next().await {
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).ok();
        }
    }
    None
}

fn join_ok(join: &Value) -> Message {
    Message::text(
        json!({
            "topic": TOPIC,
            "event": "phx_reply",
            "payload": { "status": "ok", "response": {} },
            "ref": join["ref"],
        })
        .to_string(),
    )
}

async fn recv(rx: &mut broadcast::Receiver<RealtimeMessage>) -> RealtimeMessage {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no realtime message within 5s")
        .unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sockets_closed_before_join_back_off_until_the_limit() {
    let (listener, url) = bind().await;
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await {
                let _ = ws.close(None).await;
            }
        }
    });

    let started = Instant::now();
    let handle = connect(&url, config(100, Some(2)));
    let mut rx = handle.subscribe();

    // The loop gives up after the third connection and drops its sender.
    let end = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
    assert!(
        matches!(end, Err(broadcast::error::RecvError::Closed)),
        "got: {end:?}"
    );
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_drop_after_join_resubscribes_and_shutdown_leaves() {
    let (listener, url) = bind().await;
    let (uri_tx, uri_rx) = oneshot::channel::<String>();
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<Value>();

    tokio::spawn(async move {
        // First connection: ack the join, push one change, hang up.
        let (tcp, _) = listener.accept().await.unwrap();
        let capture = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let _ = uri_tx.send(req.uri().to_string());
            Ok(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(tcp, capture)
            .await
            .unwrap();
        let join = next_json(&mut ws).await.unwrap();
        ws.send(join_ok(&join)).await.unwrap();
        let _ = frames_tx.send(join);
        ws.send(Message::text(
            json!({
                "topic": TOPIC,
                "event": "postgres_changes",
                "payload": { "data": {
                    "type": "INSERT",
                    "table": "announcements",
                    "schema": "public",
                    "record": { "id": "a1", "title": "Oak chair" },
                }},
                "ref": null,
            })
            .to_string(),
        ))
        .await
        .unwrap();
        let _ = ws.close(None).await;

        // Second connection: ack the join, then report what the client sends.
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let join = next_json(&mut ws).await.unwrap();
        ws.send(join_ok(&join)).await.unwrap();
        let _ = frames_tx.send(join);
        while let Some(frame) = next_json(&mut ws).await {
            let _ = frames_tx.send(frame);
        }
    });

    let handle = connect(&url, config(50, None));
    let mut rx = handle.subscribe();

    assert_eq!(recv(&mut rx).await, RealtimeMessage::Subscribed);
    match recv(&mut rx).await {
        RealtimeMessage::Change(change) => {
            assert_eq!(change.event_type, ChangeType::Insert);
            assert_eq!(change.table, "announcements");
            assert_eq!(change.record.as_ref().unwrap()["id"], "a1");
        }
        other => panic!("expected a change, got {other:?}"),
    }
    assert_eq!(recv(&mut rx).await, RealtimeMessage::Disconnected);
    assert_eq!(recv(&mut rx).await, RealtimeMessage::Subscribed);

    let uri = uri_rx.await.unwrap();
    assert_eq!(uri, "/realtime/v1/websocket?apikey=anon&vsn=1.0.0");

    let first = frames_rx.recv().await.unwrap();
    assert_eq!(first["event"], "phx_join");
    assert_eq!(first["topic"], TOPIC);
    assert_eq!(first["payload"]["access_token"], "anon");
    assert_eq!(
        first["payload"]["config"]["postgres_changes"][0]["table"],
        "announcements"
    );
    let second = frames_rx.recv().await.unwrap();
    assert_eq!(second["event"], "phx_join");

    handle.shutdown();
    let leave = timeout(Duration::from_secs(5), frames_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(leave["event"], "phx_leave");
    assert_eq!(leave["topic"], TOPIC);
}
