//! Realtime change feed with auto-reconnect.
//!
//! Speaks the Phoenix channel protocol used by the backend's
//! `realtime/v1/websocket` endpoint: joins one channel carrying a
//! `postgres_changes` subscription for a single table, keeps it alive with
//! heartbeats, and streams decoded row changes through a
//! [`tokio::sync::broadcast`] channel. Reconnection uses exponential
//! backoff + jitter; every successful (re)join is announced as
//! [`RealtimeMessage::Subscribed`] so consumers know to resynchronise.
//!
//! # Example
//!
//! ```rust,ignore
//! use handover_api::{Credentials, RealtimeConfig, RealtimeHandle, RealtimeMessage};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = RealtimeConfig::new("announcements_changes", "announcements");
//! let handle = RealtimeHandle::connect(&base_url, credentials, config, CancellationToken::new())?;
//! let mut rx = handle.subscribe();
//!
//! while let Ok(msg) = rx.recv().await {
//!     if let RealtimeMessage::Change(change) = msg {
//!         println!("{:?} on {}", change.event_type, change.table);
//!     }
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth::Credentials;
use crate::error::Error;
use crate::transport::service_url;

// ── Broadcast channel capacity ───────────────────────────────────────

const MESSAGE_CHANNEL_CAPACITY: usize = 1024;

const PROTOCOL_VERSION: &str = "1.0.0";
const PHOENIX_TOPIC: &str = "phoenix";

// ── Change records ───────────────────────────────────────────────────

/// Row-level change kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

/// One row change as delivered by the `postgres_changes` feed.
///
/// `record` is the new row (INSERT/UPDATE); `old_record` the prior row
/// (UPDATE/DELETE), which carries at least the primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    #[serde(rename = "type")]
    pub event_type: ChangeType,
    pub table: String,
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub record: Option<serde_json::Value>,
    #[serde(default)]
    pub old_record: Option<serde_json::Value>,
    #[serde(default)]
    pub commit_timestamp: Option<String>,
}

/// What the realtime task publishes, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeMessage {
    /// The channel join was acknowledged (first connect or any reconnect).
    Subscribed,
    /// A row changed.
    Change(Arc<ChangeRecord>),
    /// An established subscription dropped; reconnection is under way.
    Disconnected,
}

// ── Configuration ────────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

/// Which channel to join and which table's changes to receive.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub channel: String,
    pub schema: String,
    pub table: String,
    pub heartbeat_interval: Duration,
    pub reconnect: ReconnectConfig,
}

impl RealtimeConfig {
    pub fn new(channel: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            schema: "public".into(),
            table: table.into(),
            heartbeat_interval: Duration::from_secs(25),
            reconnect: ReconnectConfig::default(),
        }
    }

    fn topic(&self) -> String {
        format!("realtime:{}", self.channel)
    }
}

/// `wss://host/realtime/v1/websocket?apikey=..&vsn=1.0.0` from an
/// `http(s)://` project URL.
pub fn websocket_url(base_url: &Url, credentials: &Credentials) -> Result<Url, Error> {
    let mut url = service_url(base_url, "realtime/v1/websocket")?;
    let scheme = if url.scheme() == "http" { "ws" } else { "wss" };
    url.set_scheme(scheme)
        .map_err(|()| Error::InvalidRequest(format!("cannot use {base_url} for websockets")))?;
    url.query_pairs_mut()
        .append_pair("apikey", credentials.anon_key().expose_secret())
        .append_pair("vsn", PROTOCOL_VERSION);
    Ok(url)
}

// ── RealtimeHandle ───────────────────────────────────────────────────

/// Handle to a running realtime subscription.
///
/// Call [`shutdown`](Self::shutdown) to leave the channel and tear down
/// the background task.
pub struct RealtimeHandle {
    message_rx: broadcast::Receiver<RealtimeMessage>,
    cancel: CancellationToken,
}

impl RealtimeHandle {
    /// Spawn the connection loop and return immediately.
    ///
    /// The first connection attempt happens asynchronously; subscribe and
    /// wait for [`RealtimeMessage::Subscribed`].
    pub fn connect(
        base_url: &Url,
        credentials: Arc<Credentials>,
        config: RealtimeConfig,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        let ws_url = websocket_url(base_url, &credentials)?;
        let (message_tx, message_rx) = broadcast::channel(MESSAGE_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            ws_loop(ws_url, credentials, config, message_tx, task_cancel).await;
        });

        Ok(Self { message_rx, cancel })
    }

    /// Get a new receiver for the message stream.
    ///
    /// A consumer that falls behind receives
    /// [`broadcast::error::RecvError::Lagged`] and should resynchronise.
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeMessage> {
        self.message_rx.resubscribe()
    }

    /// Leave the channel and stop reconnecting.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// How a single connection ended without error.
#[derive(Debug, PartialEq, Eq)]
enum ConnectionEnd {
    /// Shutdown requested; the channel was left.
    Cancelled,
    /// Server closed the socket or the stream ended.
    Closed,
}

/// Main loop: connect → join → read → on drop, backoff → reconnect.
async fn ws_loop(
    ws_url: Url,
    credentials: Arc<Credentials>,
    config: RealtimeConfig,
    message_tx: broadcast::Sender<RealtimeMessage>,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    while !cancel.is_cancelled() {
        let mut subscribed = false;
        let result = connect_and_read(
            &ws_url,
            &credentials,
            &config,
            &message_tx,
            &cancel,
            &mut subscribed,
        )
        .await;

        if subscribed {
            let _ = message_tx.send(RealtimeMessage::Disconnected);
            attempt = 0;
        }

        match result {
            Ok(ConnectionEnd::Cancelled) => break,
            Ok(ConnectionEnd::Closed) => {
                tracing::info!(attempt, subscribed, "Realtime socket closed");
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "Realtime connection error");
            }
        }

        // A socket that closes before the join is acknowledged counts as
        // a failed attempt, the same as a refused connection.
        if let Some(max) = config.reconnect.max_retries {
            if attempt >= max {
                tracing::error!(
                    max_retries = max,
                    "Realtime reconnection limit reached, giving up"
                );
                break;
            }
        }

        let delay = calculate_backoff(attempt, &config.reconnect);
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "Waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        attempt = attempt.saturating_add(1);
    }

    tracing::debug!("Realtime loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one connection, join the channel, and pump frames until the
/// socket drops or shutdown is requested.
async fn connect_and_read(
    url: &Url,
    credentials: &Credentials,
    config: &RealtimeConfig,
    message_tx: &broadcast::Sender<RealtimeMessage>,
    cancel: &CancellationToken,
    subscribed: &mut bool,
) -> Result<ConnectionEnd, Error> {
    tracing::info!(channel = %config.channel, table = %config.table, "Connecting to realtime");

    let connect = tokio_tungstenite::connect_async(url.as_str());
    let (ws_stream, _response) = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(ConnectionEnd::Cancelled),
        res = connect => res.map_err(|e| Error::RealtimeConnect(e.to_string()))?,
    };

    let (mut write, mut read) = ws_stream.split();
    let topic = config.topic();
    let mut refs = RefCounter::default();

    let join_ref = refs.next();
    send_frame(&mut write, &join_frame(config, &credentials.bearer(), &join_ref)).await?;

    let period = config.heartbeat_interval;
    let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let leave = PhxFrame::new(&topic, "phx_leave", json!({}), refs.next());
                if let Err(e) = send_frame(&mut write, &leave).await {
                    tracing::debug!(error = %e, "Failed to send phx_leave");
                }
                let _ = write.close().await;
                return Ok(ConnectionEnd::Cancelled);
            }
            _ = heartbeat.tick() => {
                let beat = PhxFrame::new(PHOENIX_TOPIC, "heartbeat", json!({}), refs.next());
                send_frame(&mut write, &beat).await?;
                tracing::trace!("Realtime heartbeat");
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(msg) = decode_frame(&text, &topic, &join_ref)? {
                            if msg == RealtimeMessage::Subscribed {
                                tracing::info!(channel = %config.channel, "Realtime subscribed");
                                *subscribed = true;
                            }
                            // No receivers is fine; nobody is listening yet.
                            let _ = message_tx.send(msg);
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(code = %cf.code, reason = %cf.reason, "Realtime close frame received");
                        } else {
                            tracing::info!("Realtime close frame received (no payload)");
                        }
                        return Ok(ConnectionEnd::Closed);
                    }
                    Some(Err(e)) => return Err(Error::RealtimeConnect(e.to_string())),
                    None => {
                        tracing::info!("Realtime stream ended");
                        return Ok(ConnectionEnd::Closed);
                    }
                    // Ping/Pong handled by tungstenite; Binary/Frame unused.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

async fn send_frame<S>(sink: &mut S, frame: &PhxFrame) -> Result<(), Error>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(frame).map_err(|e| Error::InvalidRequest(e.to_string()))?;
    sink.send(Message::text(text))
        .await
        .map_err(|e| Error::RealtimeConnect(e.to_string()))
}

// ── Phoenix frames ───────────────────────────────────────────────────

#[derive(Default)]
struct RefCounter(u64);

impl RefCounter {
    fn next(&mut self) -> String {
        self.0 += 1;
        self.0.to_string()
    }
}

/// Wire envelope: `{"topic","event","payload","ref"}`.
#[derive(Debug, Serialize, Deserialize)]
struct PhxFrame {
    topic: String,
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
}

impl PhxFrame {
    fn new(topic: &str, event: &str, payload: serde_json::Value, reference: String) -> Self {
        Self {
            topic: topic.to_owned(),
            event: event.to_owned(),
            payload,
            reference: Some(reference),
        }
    }
}

fn join_frame(config: &RealtimeConfig, access_token: &str, reference: &str) -> PhxFrame {
    let payload = json!({
        "config": {
            "broadcast": { "self": false },
            "presence": { "key": "" },
            "postgres_changes": [{
                "event": "*",
                "schema": config.schema,
                "table": config.table,
            }],
        },
        "access_token": access_token,
    });
    PhxFrame::new(&config.topic(), "phx_join", payload, reference.to_owned())
}

#[derive(Deserialize)]
struct ChangePayload {
    data: ChangeRecord,
}

/// Decode one text frame.
///
/// `Ok(None)` for frames that carry nothing for consumers (heartbeat
/// replies, system notices, other topics, malformed JSON). Errors mean
/// the channel is unusable and the connection should be recycled.
fn decode_frame(
    text: &str,
    topic: &str,
    join_ref: &str,
) -> Result<Option<RealtimeMessage>, Error> {
    let frame: PhxFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to parse realtime frame");
            return Ok(None);
        }
    };

    if frame.topic != topic {
        return Ok(None);
    }

    match frame.event.as_str() {
        "phx_reply" if frame.reference.as_deref() == Some(join_ref) => {
            let status = frame.payload["status"].as_str().unwrap_or("");
            if status == "ok" {
                Ok(Some(RealtimeMessage::Subscribed))
            } else {
                let reason = frame.payload["response"]["reason"]
                    .as_str()
                    .map_or_else(|| frame.payload.to_string(), str::to_owned);
                Err(Error::SubscriptionRejected(reason))
            }
        }
        "postgres_changes" => match serde_json::from_value::<ChangePayload>(frame.payload) {
            Ok(p) => Ok(Some(RealtimeMessage::Change(Arc::new(p.data)))),
            Err(e) => {
                tracing::debug!(error = %e, "Could not decode change payload, skipping");
                Ok(None)
            }
        },
        "phx_error" => Err(Error::RealtimeClosed {
            code: 1011,
            reason: "channel error".into(),
        }),
        "phx_close" => Err(Error::RealtimeClosed {
            code: 1000,
            reason: "channel closed by server".into(),
        }),
        other => {
            tracing::trace!(event = other, "Ignoring realtime frame");
            Ok(None)
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic spread seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    const TOPIC: &str = "realtime:announcements_changes";

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_then_caps() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);
        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");

        let d40 = calculate_backoff(40, &config);
        assert!(d40 <= Duration::from_millis(12_500), "{d40:?} not capped");
    }

    #[test]
    fn websocket_url_switches_scheme_and_adds_key() {
        let creds = Credentials::new(SecretString::from("anon-key"));

        let url = websocket_url(&Url::parse("https://abc.example.co").unwrap(), &creds).unwrap();
        assert_eq!(
            url.as_str(),
            "wss://abc.example.co/realtime/v1/websocket?apikey=anon-key&vsn=1.0.0"
        );

        let url = websocket_url(&Url::parse("http://localhost:54321/").unwrap(), &creds).unwrap();
        assert_eq!(url.scheme(), "ws");
    }

    #[test]
    fn join_frame_subscribes_to_table_changes() {
        let config = RealtimeConfig::new("announcements_changes", "announcements");
        let frame = join_frame(&config, "jwt", "1");
        let value = serde_json::to_value(&frame).unwrap();

        assert_eq!(value["topic"], TOPIC);
        assert_eq!(value["event"], "phx_join");
        assert_eq!(value["ref"], "1");
        assert_eq!(value["payload"]["access_token"], "jwt");
        assert_eq!(
            value["payload"]["config"]["postgres_changes"][0],
            json!({ "event": "*", "schema": "public", "table": "announcements" })
        );
    }

    #[test]
    fn join_reply_ok_is_subscribed() {
        let raw = json!({
            "topic": TOPIC, "event": "phx_reply", "ref": "1",
            "payload": { "status": "ok", "response": { "postgres_changes": [] } }
        });
        let msg = decode_frame(&raw.to_string(), TOPIC, "1").unwrap();
        assert_eq!(msg, Some(RealtimeMessage::Subscribed));
    }

    #[test]
    fn join_reply_error_is_rejection() {
        let raw = json!({
            "topic": TOPIC, "event": "phx_reply", "ref": "1",
            "payload": { "status": "error", "response": { "reason": "unauthorized" } }
        });
        let err = decode_frame(&raw.to_string(), TOPIC, "1").unwrap_err();
        assert!(matches!(err, Error::SubscriptionRejected(ref r) if r == "unauthorized"));
    }

    #[test]
    fn heartbeat_reply_is_ignored() {
        let raw = json!({
            "topic": "phoenix", "event": "phx_reply", "ref": "2",
            "payload": { "status": "ok", "response": {} }
        });
        assert_eq!(decode_frame(&raw.to_string(), TOPIC, "1").unwrap(), None);
    }

    #[test]
    fn change_frame_decodes_delete() {
        let raw = json!({
            "topic": TOPIC, "event": "postgres_changes", "ref": null,
            "payload": {
                "ids": [1],
                "data": {
                    "type": "DELETE",
                    "table": "announcements",
                    "schema": "public",
                    "commit_timestamp": "2026-03-01T10:00:00Z",
                    "old_record": { "id": "a1" },
                    "record": null
                }
            }
        });
        let Some(RealtimeMessage::Change(change)) =
            decode_frame(&raw.to_string(), TOPIC, "1").unwrap()
        else {
            panic!("expected a change");
        };
        assert_eq!(change.event_type, ChangeType::Delete);
        assert_eq!(change.old_record.as_ref().unwrap()["id"], "a1");
        assert!(change.record.is_none());
    }

    #[test]
    fn malformed_frames_are_skipped() {
        assert_eq!(decode_frame("not json", TOPIC, "1").unwrap(), None);

        let raw = json!({
            "topic": TOPIC, "event": "postgres_changes",
            "payload": { "data": { "type": "TRUNCATE" } }
        });
        assert_eq!(decode_frame(&raw.to_string(), TOPIC, "1").unwrap(), None);
    }

    #[test]
    fn channel_error_recycles_connection() {
        let raw = json!({ "topic": TOPIC, "event": "phx_error", "payload": {}, "ref": "1" });
        assert!(decode_frame(&raw.to_string(), TOPIC, "1").is_err());
    }
}
