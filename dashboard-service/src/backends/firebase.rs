//! Firebase Realtime Database over its REST API.
//!
//! Subscriptions use the streaming endpoint (`Accept: text/event-stream`).
//! The server sends `put`/`patch` events relative to the subscribed location;
//! they are applied to a local copy and the full value is yielded after each.

use std::io;

use futures::{stream, StreamExt};
use meter_client::store::{
    child_path, segments, tree, Envelope, LiveStore, PushIdGenerator, Snapshot, SnapshotStream,
    StoreError,
};
use reqwest::{header::ACCEPT, Client};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

pub struct FirebaseRestStore {
    client: Client,
    base: String,
    auth_token: Option<String>,
    ids: PushIdGenerator,
}

impl FirebaseRestStore {
    pub fn new(client: Client, database_url: &str, auth_token: Option<String>) -> Self {
        Self {
            client,
            base: database_url.trim_end_matches('/').to_string(),
            auth_token,
            ids: PushIdGenerator::new(),
        }
    }

    fn url(&self, path: &str) -> Result<String, StoreError> {
        let segs = segments(path)?;
        Ok(format!("{}/{}.json", self.base, segs.join("/")))
    }

    fn auth_query(&self) -> Vec<(&'static str, &str)> {
        self.auth_token
            .as_deref()
            .map(|t| vec![("auth", t)])
            .unwrap_or_default()
    }
}

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Line-oriented SSE decoder. Feed it lines without their terminator.
#[derive(Debug, Default)]
pub struct SseFeed {
    event: Option<String>,
    data: Vec<String>,
}

impl SseFeed {
    pub fn push_line(&mut self, line: &str) -> Option<SseFrame> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            if self.event.is_none() && self.data.is_empty() {
                return None;
            }
            return Some(SseFrame {
                event: self.event.take().unwrap_or_else(|| "message".to_string()),
                data: std::mem::take(&mut self.data).join("\n"),
            });
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }
}

#[derive(Deserialize)]
struct EventPayload {
    path: String,
    data: Value,
}

/// Apply one event to the local copy of the subscribed location.
///
/// Returns whether the value changed and should be re-delivered. `cancel`
/// and `auth_revoked` end the subscription.
pub fn apply_event(local: &mut Value, frame: &SseFrame) -> Result<bool, StoreError> {
    match frame.event.as_str() {
        "put" | "patch" => {
            let payload: EventPayload = serde_json::from_str(&frame.data)
                .map_err(|e| StoreError::Decode(format!("bad {} event: {e}", frame.event)))?;
            let segs = segments(&payload.path)?;
            if frame.event == "put" {
                tree::set_at(local, &segs, Some(payload.data));
            } else {
                let Value::Object(patch) = payload.data else {
                    return Err(StoreError::Decode("patch data is not an object".to_string()));
                };
                tree::merge_at(local, &segs, &patch);
            }
            Ok(true)
        }
        "keep-alive" => Ok(false),
        "cancel" => Err(StoreError::Subscription(format!(
            "subscription cancelled by server: {}",
            frame.data
        ))),
        "auth_revoked" => Err(StoreError::Subscription("auth credential revoked".to_string())),
        other => {
            tracing::debug!(event = other, "ignoring unknown event");
            Ok(false)
        }
    }
}

#[async_trait::async_trait]
impl LiveStore for FirebaseRestStore {
    async fn subscribe(&self, path: &str) -> SnapshotStream {
        let url = match self.url(path) {
            Ok(u) => u,
            Err(e) => return Box::pin(stream::once(async move { Err::<Snapshot, _>(e) })),
        };
        let request = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .query(&self.auth_query());
        let path = path.to_string();

        let s = async_stream::stream! {
            let response = match request.send().await.and_then(|r| r.error_for_status()) {
                Ok(r) => r,
                Err(e) => {
                    yield Err(StoreError::Subscription(format!("failed to open event stream: {e}")));
                    return;
                }
            };
            tracing::debug!(%path, "event stream opened");

            let body = Box::pin(response.bytes_stream().map(|r| r.map_err(io::Error::other)));
            let mut lines = StreamReader::new(body).lines();
            let mut feed = SseFeed::default();
            let mut local = Value::Null;

            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        yield Err(StoreError::Subscription("event stream closed by server".to_string()));
                        return;
                    }
                    Err(e) => {
                        yield Err(StoreError::Subscription(format!("event stream read failed: {e}")));
                        return;
                    }
                };
                let Some(frame) = feed.push_line(&line) else {
                    continue;
                };
                match apply_event(&mut local, &frame) {
                    Ok(true) => yield Ok(Envelope::now(tree::get_at(&local, &[]).cloned())),
                    Ok(false) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        };

        Box::pin(s)
    }

    async fn write_full(&self, path: &str, value: Option<Value>) -> Result<(), StoreError> {
        let url = self.url(path)?;
        let request = match &value {
            Some(v) => self.client.put(url).json(v),
            None => self.client.delete(url),
        };

        request
            .query(&[("print", "silent")])
            .query(&self.auth_query())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    fn append(&self, path: &str) -> Result<String, StoreError> {
        segments(path)?;
        Ok(child_path(path, &self.ids.next_id()))
    }
}
