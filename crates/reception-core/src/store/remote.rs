//! Firebase Realtime Database backend over the REST API.
//!
//! Each collection is a sub-tree of the database root. Visitor records and
//! log entries are children keyed by push ids generated here, which lets a
//! whole submission go out as one multi-path `PATCH` on the root: the
//! database applies such an update atomically.
//!
//! `watch` subscribes to the root with the REST streaming protocol
//! (server-sent `put`/`patch` events) and keeps a local copy of the tree
//! so every change yields a full `Snapshot`.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::push_id::PushIdGenerator;
use super::{check_batch, RecordStore, RemoteError, Snapshot, StoreError};
use crate::models::{
    AlumniVisit, Category, CustomMessages, GroupVisit, LogEntry, MemberStatus, ParentVisit,
    StudentVisitor, VisitorLists, VisitorRecord,
};

// ============================================================================
// Constants
// ============================================================================

const MEMBER_STATUS_PATH: &str = "member_status";
const MEMBER_LOG_PATH: &str = "member_log";
const MESSAGES_PATH: &str = "custom_messages";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 500;

pub struct RemoteStore {
    client: Client,
    /// No overall timeout: the change stream stays open indefinitely.
    stream_client: Client,
    base_url: String,
    token: Option<String>,
    push_ids: PushIdGenerator,
}

impl RemoteStore {
    pub fn new(database_url: &str, token: Option<String>) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(RemoteError::from)?;
        let stream_client = Client::builder()
            .connect_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(RemoteError::from)?;

        Ok(Self {
            client,
            stream_client,
            base_url: database_url.trim().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            push_ids: PushIdGenerator::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.is_empty() {
            format!("{}/.json", self.base_url)
        } else {
            format!("{}/{}.json", self.base_url, path)
        }
    }

    /// Send one request, backing off on 429 and mapping failures by status.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, StoreError> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self.client.request(method.clone(), &url);
            if let Some(ref token) = self.token {
                request = request.query(&[("auth", token.as_str())]);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await.map_err(RemoteError::from)?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if status.as_u16() == 429 {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(RemoteError::RateLimited.into());
                }
                warn!(path, retry = retries, backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::from_status(status, &body).into());
        }
    }

    async fn get_value(&self, path: &str) -> Result<Value, StoreError> {
        let response = self.send(Method::GET, path, None).await?;
        let text = response.text().await.map_err(RemoteError::from)?;
        serde_json::from_str(&text).map_err(|e| {
            RemoteError::InvalidResponse(format!("{}: {}", path, e)).into()
        })
    }

    async fn get_keyed<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, StoreError> {
        Ok(parse_keyed(path, self.get_value(path).await?))
    }

    async fn get_or_default<T: DeserializeOwned + Default>(&self, path: &str) -> Result<T, StoreError> {
        Ok(parse_or_default(path, self.get_value(path).await?))
    }

    async fn patch_root(&self, updates: Map<String, Value>) -> Result<(), StoreError> {
        debug!(paths = updates.len(), "Multi-path update");
        self.send(Method::PATCH, "", Some(&Value::Object(updates)))
            .await?;
        Ok(())
    }

    async fn load_visitors(&self) -> Result<VisitorLists, StoreError> {
        let (students, external, parents, alumni, teachers) = futures::try_join!(
            self.get_keyed::<StudentVisitor>(Category::Student.remote_path()),
            self.get_keyed::<GroupVisit>(Category::External.remote_path()),
            self.get_keyed::<ParentVisit>(Category::Parent.remote_path()),
            self.get_keyed::<AlumniVisit>(Category::Alumni.remote_path()),
            self.get_keyed::<GroupVisit>(Category::Teacher.remote_path()),
        )?;
        Ok(VisitorLists {
            students,
            external,
            parents,
            alumni,
            teachers,
        })
    }
}

/// Children of a push-keyed collection in key (= creation) order.
/// Children that do not parse are skipped with a warning.
fn parse_keyed<T: DeserializeOwned>(path: &str, value: Value) -> Vec<T> {
    keyed_children(value)
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(path, key = %key, error = %e, "Skipping unreadable child");
                None
            }
        })
        .collect()
}

fn parse_or_default<T: DeserializeOwned + Default>(path: &str, value: Value) -> T {
    match value {
        Value::Null => T::default(),
        value => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(path, error = %e, "Failed to parse sub-tree, using empty default");
            T::default()
        }),
    }
}

/// Build a snapshot from a copy of the whole database tree.
fn snapshot_from_tree(tree: &Value) -> Snapshot {
    let child = |path: &str| tree.get(path).cloned().unwrap_or(Value::Null);
    let keyed = |category: Category| {
        let path = category.remote_path();
        (path, child(path))
    };

    let (path, value) = keyed(Category::Student);
    let students = parse_keyed(path, value);
    let (path, value) = keyed(Category::External);
    let external = parse_keyed(path, value);
    let (path, value) = keyed(Category::Parent);
    let parents = parse_keyed(path, value);
    let (path, value) = keyed(Category::Alumni);
    let alumni = parse_keyed(path, value);
    let (path, value) = keyed(Category::Teacher);
    let teachers = parse_keyed(path, value);

    Snapshot {
        visitors: VisitorLists {
            students,
            external,
            parents,
            alumni,
            teachers,
        },
        member_status: parse_or_default(MEMBER_STATUS_PATH, child(MEMBER_STATUS_PATH)),
        member_log: parse_keyed(MEMBER_LOG_PATH, child(MEMBER_LOG_PATH)),
        messages: parse_or_default(MESSAGES_PATH, child(MESSAGES_PATH)),
    }
}

/// Key of the first stored child that reads back as `record`.
fn matching_key(children: Value, record: &VisitorRecord) -> Option<String> {
    let category = record.category();
    keyed_children(children)
        .into_iter()
        .find(|(_, value)| {
            VisitorRecord::from_json(category, value.clone())
                .map(|stored| stored == *record)
                .unwrap_or(false)
        })
        .map(|(key, _)| key)
}

/// Flatten a push-keyed sub-tree into `(key, child)` pairs sorted by key.
fn keyed_children(value: Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map.into_iter().collect();
            sorted.into_iter().collect()
        }
        // Arrays appear when keys happen to be small integers.
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    }
}

// ============================================================================
// Change stream
// ============================================================================

/// One server-sent event: its name and its (joined) data lines.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StreamMessage {
    event: String,
    data: String,
}

/// Splits a `text/event-stream` body into messages. Chunks may end
/// anywhere, including inside a multi-byte character.
#[derive(Debug, Default)]
struct EventStreamParser {
    buffer: Vec<u8>,
}

impl EventStreamParser {
    fn feed(&mut self, chunk: &[u8]) -> Vec<StreamMessage> {
        self.buffer.extend(chunk.iter().filter(|b| **b != b'\r'));

        let mut messages = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let text = String::from_utf8_lossy(&block);

            let mut event = String::new();
            let mut data = Vec::new();
            for line in text.lines() {
                if let Some(value) = line.strip_prefix("event:") {
                    event = value.trim().to_string();
                } else if let Some(value) = line.strip_prefix("data:") {
                    data.push(value.trim_start());
                }
            }
            if !event.is_empty() || !data.is_empty() {
                messages.push(StreamMessage {
                    event,
                    data: data.join("\n"),
                });
            }
        }
        messages
    }
}

#[derive(Debug, Deserialize)]
struct PathData {
    path: String,
    data: Value,
}

#[derive(Debug, Clone, PartialEq)]
enum ServerEvent {
    Put { path: String, data: Value },
    Patch { path: String, data: Value },
    KeepAlive,
    Closed(String),
}

impl ServerEvent {
    /// `None` for event types this client does not act on.
    fn parse(message: &StreamMessage) -> Result<Option<Self>, StoreError> {
        let body = || -> Result<PathData, StoreError> {
            serde_json::from_str(&message.data).map_err(|e| {
                RemoteError::InvalidResponse(format!("{} event: {}", message.event, e)).into()
            })
        };

        let event = match message.event.as_str() {
            "put" => {
                let PathData { path, data } = body()?;
                ServerEvent::Put { path, data }
            }
            "patch" => {
                let PathData { path, data } = body()?;
                ServerEvent::Patch { path, data }
            }
            "keep-alive" => ServerEvent::KeepAlive,
            "cancel" => ServerEvent::Closed("cancelled by the database".to_string()),
            "auth_revoked" => ServerEvent::Closed("database token revoked".to_string()),
            other => {
                warn!(event = other, "Ignoring unknown stream event");
                return Ok(None);
            }
        };
        Ok(Some(event))
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Replace the value at `path` below `node`. Null deletes.
fn put_at(node: &mut Value, path: &[&str], data: Value) {
    let Some((first, rest)) = path.split_first() else {
        *node = data;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(keyed_children(node.take()).into_iter().collect());
    }
    if let Value::Object(map) = node {
        if rest.is_empty() && data.is_null() {
            map.remove(*first);
        } else {
            let child = map.entry(first.to_string()).or_insert(Value::Null);
            put_at(child, rest, data);
        }
    }
}

/// Apply one stream event to the local tree. Returns whether it changed data.
fn apply_event(tree: &mut Value, event: ServerEvent) -> bool {
    match event {
        ServerEvent::Put { path, data } => {
            put_at(tree, &segments(&path), data);
            true
        }
        ServerEvent::Patch { path, data } => {
            let Value::Object(children) = data else {
                warn!(path = %path, "Ignoring patch without children");
                return false;
            };
            let base = segments(&path);
            for (key, value) in children {
                let mut full = base.clone();
                full.extend(segments(&key));
                put_at(tree, &full, value);
            }
            true
        }
        ServerEvent::KeepAlive | ServerEvent::Closed(_) => false,
    }
}

impl RecordStore for RemoteStore {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn load(&self) -> BoxFuture<'_, Result<Snapshot, StoreError>> {
        Box::pin(async move {
            let (visitors, member_status, member_log, messages) = futures::try_join!(
                self.load_visitors(),
                self.get_or_default::<MemberStatus>(MEMBER_STATUS_PATH),
                self.get_keyed::<LogEntry>(MEMBER_LOG_PATH),
                self.get_or_default::<CustomMessages>(MESSAGES_PATH),
            )?;
            Ok(Snapshot {
                visitors,
                member_status,
                member_log,
                messages,
            })
        })
    }

    fn append_many(&self, records: Vec<VisitorRecord>) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            check_batch(&records)?;
            let mut updates = Map::new();
            for record in &records {
                let path = format!("{}/{}", record.category().remote_path(), self.push_ids.next_id());
                updates.insert(path, record.to_json()?);
            }
            self.patch_root(updates).await
        })
    }

    fn remove(&self, record: VisitorRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let path = record.category().remote_path();
            let key = matching_key(self.get_value(path).await?, &record).ok_or(StoreError::NotFound)?;

            self.send(Method::DELETE, &format!("{}/{}", path, key), None)
                .await?;
            debug!(path, key = %key, "Removed record");
            Ok(())
        })
    }

    fn reset_all(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let mut updates = Map::new();
            for category in Category::ALL {
                updates.insert(category.remote_path().to_string(), Value::Null);
            }
            updates.insert(MEMBER_STATUS_PATH.to_string(), Value::Null);
            updates.insert(MEMBER_LOG_PATH.to_string(), Value::Null);
            self.patch_root(updates).await
        })
    }

    fn toggle_member(&self, name: String, at: String) -> BoxFuture<'_, Result<LogEntry, StoreError>> {
        Box::pin(async move {
            let mut status: MemberStatus = self.get_or_default(MEMBER_STATUS_PATH).await?;
            let entry = status.toggle(&name, &at);

            let mut updates = Map::new();
            updates.insert(
                format!("{}/{}", MEMBER_STATUS_PATH, name),
                serde_json::to_value(status.get(&name))?,
            );
            updates.insert(
                format!("{}/{}", MEMBER_LOG_PATH, self.push_ids.next_id()),
                serde_json::to_value(&entry)?,
            );
            self.patch_root(updates).await?;
            Ok(entry)
        })
    }

    fn save_messages(&self, messages: CustomMessages) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let body = serde_json::to_value(&messages)?;
            self.send(Method::PUT, MESSAGES_PATH, Some(&body)).await?;
            Ok(())
        })
    }

    fn supports_watch(&self) -> bool {
        true
    }

    fn watch(&self, updates: mpsc::Sender<Snapshot>) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let mut request = self
                .stream_client
                .get(self.url(""))
                .header(ACCEPT, "text/event-stream");
            if let Some(ref token) = self.token {
                request = request.query(&[("auth", token.as_str())]);
            }

            let response = request.send().await.map_err(RemoteError::from)?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(RemoteError::from_status(status, &body).into());
            }
            info!("Subscribed to database changes");

            let mut parser = EventStreamParser::default();
            let mut tree = Value::Null;
            let mut body = std::pin::pin!(response.bytes_stream());
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(RemoteError::from)?;
                for message in parser.feed(&chunk) {
                    let event = match ServerEvent::parse(&message)? {
                        Some(ServerEvent::Closed(reason)) => {
                            return Err(RemoteError::StreamClosed(reason).into());
                        }
                        Some(event) => event,
                        None => continue,
                    };
                    if apply_event(&mut tree, event)
                        && updates.send(snapshot_from_tree(&tree)).await.is_err()
                    {
                        debug!("Change receiver dropped, closing stream");
                        return Ok(());
                    }
                }
            }
            Err(RemoteError::StreamClosed("connection ended".to_string()).into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_building() {
        let store = RemoteStore::new("https://example.firebaseio.com/ ", None).expect("store");
        assert_eq!(store.url(""), "https://example.firebaseio.com/.json");
        assert_eq!(
            store.url("students/-Nabc"),
            "https://example.firebaseio.com/students/-Nabc.json"
        );
    }

    #[test]
    fn test_empty_token_is_ignored() {
        let store = RemoteStore::new("https://example.firebaseio.com", Some(String::new()))
            .expect("store");
        assert!(store.token.is_none());
    }

    #[test]
    fn test_keyed_children_sorted_by_key() {
        let value = json!({
            "-Nb": {"count": 2},
            "-Na": {"count": 1},
        });
        let keys: Vec<String> = keyed_children(value).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["-Na", "-Nb"]);
    }

    #[test]
    fn test_keyed_children_null_and_array() {
        assert!(keyed_children(Value::Null).is_empty());
        let children = keyed_children(json!([null, {"count": 1}]));
        assert_eq!(children.len(), 1);
    }

    #[test]
    fn test_matching_key_ignores_extra_fields() {
        let record = VisitorRecord::External(GroupVisit {
            count: 3,
            shogi_strength: "特にない".to_string(),
            timestamp: "2024-11-02T01:00:00.000Z".to_string(),
        });
        let children = json!({
            "-Na": {"count": 2, "shogiStrength": "特にない", "timestamp": "2024-11-02T01:00:00.000Z"},
            "-Nb": {"count": 3, "shogiStrength": "特にない", "timestamp": "2024-11-02T01:00:00.000Z", "status": "seated"},
            "-Nc": {"count": 3, "shogiStrength": "特にない", "timestamp": "2024-11-02T01:00:00.000Z"},
        });
        assert_eq!(matching_key(children, &record).as_deref(), Some("-Nb"));
        assert_eq!(matching_key(Value::Null, &record), None);
    }

    #[test]
    fn test_event_stream_parser_handles_split_chunks() {
        let body = "event: put\r\ndata: {\"path\":\"/\",\"data\":{\"custom_messages\":{\"alumni\":\"おかえり\"}}}\r\n\r\nevent: keep-alive\ndata: null\n\n";
        let bytes = body.as_bytes();
        // Split inside the multi-byte "お".
        let split = body.find("お").expect("kana") + 1;

        let mut parser = EventStreamParser::default();
        assert!(parser.feed(&bytes[..split]).is_empty());
        let messages = parser.feed(&bytes[split..]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].event, "put");
        assert_eq!(messages[1].event, "keep-alive");

        let event = ServerEvent::parse(&messages[0]).expect("parse").expect("known");
        let mut tree = Value::Null;
        assert!(apply_event(&mut tree, event));
        let snapshot = snapshot_from_tree(&tree);
        assert_eq!(snapshot.messages.message_for(Category::Alumni), "おかえり");

        let keep_alive = ServerEvent::parse(&messages[1]).expect("parse");
        assert_eq!(keep_alive, Some(ServerEvent::KeepAlive));
    }

    #[test]
    fn test_put_and_patch_events_update_snapshot() {
        let mut tree = Value::Null;
        apply_event(
            &mut tree,
            ServerEvent::Put {
                path: "/".to_string(),
                data: json!({
                    "external_visitors": {
                        "-Na": {"count": 2, "shogiStrength": "3級", "timestamp": "t1"}
                    }
                }),
            },
        );
        apply_event(
            &mut tree,
            ServerEvent::Patch {
                path: "/".to_string(),
                data: json!({
                    "students/-Nb": {"grade": "中1", "class": "A", "studentId": "7", "shogiStrength": "特にない", "timestamp": "t2"},
                    "member_status/熱田 望": {"checkedIn": true, "lastChanged": "t3"},
                    "member_log/-Nc": {"name": "熱田 望", "type": "in", "timestamp": "t3"}
                }),
            },
        );
        apply_event(
            &mut tree,
            ServerEvent::Put {
                path: "/external_visitors/-Nd".to_string(),
                data: json!({"count": 5, "shogiStrength": "初段", "timestamp": "t4"}),
            },
        );

        let snapshot = snapshot_from_tree(&tree);
        assert_eq!(snapshot.visitors.headcount(Category::External), 7);
        assert_eq!(snapshot.visitors.students[0].student_id, "7");
        assert!(snapshot.member_status.is_checked_in("熱田 望"));
        assert_eq!(snapshot.member_log.len(), 1);

        apply_event(
            &mut tree,
            ServerEvent::Put {
                path: "/external_visitors/-Na".to_string(),
                data: Value::Null,
            },
        );
        let snapshot = snapshot_from_tree(&tree);
        assert_eq!(snapshot.visitors.headcount(Category::External), 5);

        apply_event(
            &mut tree,
            ServerEvent::Patch {
                path: "/".to_string(),
                data: json!({"students": null, "member_status": null, "member_log": null, "external_visitors": null}),
            },
        );
        assert!(snapshot_from_tree(&tree).visitors.is_empty());
        assert!(snapshot_from_tree(&tree).member_log.is_empty());
    }

    #[test]
    fn test_cancel_and_revoked_close_the_stream() {
        for name in ["cancel", "auth_revoked"] {
            let message = StreamMessage {
                event: name.to_string(),
                data: "null".to_string(),
            };
            assert!(matches!(
                ServerEvent::parse(&message),
                Ok(Some(ServerEvent::Closed(_)))
            ));
        }
        let unknown = StreamMessage {
            event: "rules_debug".to_string(),
            data: String::new(),
        };
        assert!(matches!(ServerEvent::parse(&unknown), Ok(None)));

        let broken = StreamMessage {
            event: "put".to_string(),
            data: "{not json".to_string(),
        };
        assert!(ServerEvent::parse(&broken).is_err());
    }

    #[test]
    fn test_stored_child_matches_record_json() {
        let record = VisitorRecord::External(GroupVisit {
            count: 3,
            shogi_strength: "特にない".to_string(),
            timestamp: "2024-11-02T01:00:00.000Z".to_string(),
        });
        let stored = json!({
            "count": 3,
            "shogiStrength": "特にない",
            "timestamp": "2024-11-02T01:00:00.000Z"
        });
        assert_eq!(record.to_json().expect("json"), stored);
    }
}
