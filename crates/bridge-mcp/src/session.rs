//! Streaming Session Manager
//!
//! Tracks the live push connections. Each connection is **Open** from
//! [`SessionManager::open`] until [`SessionManager::close`] removes it, after
//! which it never receives another write. There is no resume: a reconnecting
//! client gets a fresh id and no replay.
//!
//! Writes go through [`EventSink`] and never block; a failed write (peer gone,
//! buffer full) is logged and skipped so one bad connection cannot stall the
//! others. The connection's own close path cleans it up.

use crate::outcome::StreamEvent;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Unique per-connection identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ConnectionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    #[error("connection closed")]
    Closed,
    #[error("connection buffer full")]
    Full,
}

/// Write half of a push connection
pub trait EventSink: Send + Sync {
    /// Queue one serialized event without waiting
    fn send(&self, event: &str) -> Result<(), SinkError>;
}

impl EventSink for mpsc::Sender<String> {
    fn send(&self, event: &str) -> Result<(), SinkError> {
        self.try_send(event.to_string()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

impl EventSink for mpsc::UnboundedSender<String> {
    fn send(&self, event: &str) -> Result<(), SinkError> {
        mpsc::UnboundedSender::send(self, event.to_string()).map_err(|_| SinkError::Closed)
    }
}

struct Connection {
    sink: Box<dyn EventSink>,
    opened_at: DateTime<Utc>,
}

/// Snapshot of an open connection
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub opened_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct SessionManager {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and write its `server_ready` event
    pub fn open(&self, sink: impl EventSink + 'static) -> ConnectionId {
        let id = ConnectionId::new();

        // Written before the connection is visible to broadcast, so it is always first.
        match StreamEvent::ready(id).to_json() {
            Ok(ready) => {
                if let Err(e) = sink.send(&ready) {
                    debug!(connection = %id, error = %e, "Ready event not delivered");
                }
            }
            Err(e) => error!(connection = %id, error = %e, "Failed to encode ready event"),
        }

        let mut connections = self.connections.write();
        connections.insert(
            id,
            Connection {
                sink: Box::new(sink),
                opened_at: Utc::now(),
            },
        );
        info!(connection = %id, open = connections.len(), "Streaming connection opened");
        id
    }

    /// Remove a connection. Returns false if it was already gone.
    pub fn close(&self, id: ConnectionId) -> bool {
        let mut connections = self.connections.write();
        match connections.remove(&id) {
            Some(conn) => {
                let secs = (Utc::now() - conn.opened_at).num_seconds();
                info!(connection = %id, open = connections.len(), duration_secs = secs, "Streaming connection closed");
                true
            }
            None => {
                debug!(connection = %id, "Close for unknown connection ignored");
                false
            }
        }
    }

    /// Write `event` to every open connection, returning how many accepted it
    pub fn broadcast(&self, event: &StreamEvent) -> usize {
        let Some(data) = encode(event) else {
            return 0;
        };

        let connections = self.connections.read();
        let mut delivered = 0;
        for (id, conn) in connections.iter() {
            match conn.sink.send(&data) {
                Ok(()) => delivered += 1,
                Err(e) => debug!(connection = %id, error = %e, "Broadcast write skipped"),
            }
        }
        delivered
    }

    /// Write `event` to a single connection
    pub fn send_to(&self, id: ConnectionId, event: &StreamEvent) -> bool {
        let Some(data) = encode(event) else {
            return false;
        };

        let connections = self.connections.read();
        let Some(conn) = connections.get(&id) else {
            return false;
        };
        match conn.sink.send(&data) {
            Ok(()) => true,
            Err(e) => {
                debug!(connection = %id, error = %e, "Write skipped");
                false
            }
        }
    }

    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.connections.read().contains_key(&id)
    }

    pub fn count(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.connections
            .read()
            .iter()
            .map(|(id, conn)| ConnectionInfo {
                id: *id,
                opened_at: conn.opened_at,
            })
            .collect()
    }

    /// Close every connection; dropping the sinks ends their streams
    pub fn shutdown(&self) -> usize {
        let drained: Vec<ConnectionId> = {
            let mut connections = self.connections.write();
            connections.drain().map(|(id, _)| id).collect()
        };
        if !drained.is_empty() {
            info!(closed = drained.len(), "Closed all streaming connections");
        }
        drained.len()
    }
}

fn encode(event: &StreamEvent) -> Option<String> {
    match event.to_json() {
        Ok(data) => Some(data),
        Err(e) => {
            error!(error = %e, "Failed to encode stream event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::InvocationOutcome;
    use bridge_tools::DispatchOutcome;
    use serde_json::{json, Value};
    use std::sync::Arc;

    /// Sink that records writes, or fails every one
    #[derive(Clone, Default)]
    struct RecordingSink {
        events: Arc<parking_lot::Mutex<Vec<String>>>,
        broken: bool,
    }

    impl RecordingSink {
        fn broken() -> Self {
            Self {
                broken: true,
                ..Default::default()
            }
        }

        fn values(&self) -> Vec<Value> {
            self.events
                .lock()
                .iter()
                .map(|e| serde_json::from_str(e).unwrap())
                .collect()
        }
    }

    impl EventSink for RecordingSink {
        fn send(&self, event: &str) -> Result<(), SinkError> {
            if self.broken {
                return Err(SinkError::Closed);
            }
            self.events.lock().push(event.to_string());
            Ok(())
        }
    }

    fn outcome(id: &str) -> StreamEvent {
        InvocationOutcome::from_dispatch(id, "notion_get_page", DispatchOutcome::Success(json!({}))).into()
    }

    #[test]
    fn test_open_writes_ready_first() {
        let sessions = SessionManager::new();
        let sink = RecordingSink::default();
        let id = sessions.open(sink.clone());

        assert!(sessions.is_open(id));
        assert_eq!(
            sink.values(),
            vec![json!({"type": "server_ready", "connection": id.to_string()})]
        );
    }

    #[test]
    fn test_ids_are_unique() {
        let sessions = SessionManager::new();
        let a = sessions.open(RecordingSink::default());
        let b = sessions.open(RecordingSink::default());
        assert_ne!(a, b);
        assert_eq!(sessions.count(), 2);
    }

    #[test]
    fn test_broadcast_reaches_every_connection() {
        let sessions = SessionManager::new();
        let (a, b) = (RecordingSink::default(), RecordingSink::default());
        sessions.open(a.clone());
        sessions.open(b.clone());

        assert_eq!(sessions.broadcast(&outcome("req-1")), 2);
        assert_eq!(a.values()[1]["id"], "req-1");
        assert_eq!(b.values()[1]["id"], "req-1");
    }

    #[test]
    fn test_closed_connection_gets_nothing() {
        let sessions = SessionManager::new();
        let (a, b) = (RecordingSink::default(), RecordingSink::default());
        let a_id = sessions.open(a.clone());
        sessions.open(b.clone());

        assert!(sessions.close(a_id));
        assert_eq!(sessions.broadcast(&outcome("req-1")), 1);
        assert_eq!(a.values().len(), 1);
        assert_eq!(b.values().len(), 2);
    }

    #[test]
    fn test_close_is_idempotent() {
        let sessions = SessionManager::new();
        let id = sessions.open(RecordingSink::default());

        assert!(sessions.close(id));
        assert!(!sessions.close(id));
        assert!(!sessions.close(ConnectionId::new()));
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_failed_write_does_not_stop_broadcast() {
        let sessions = SessionManager::new();
        let good = RecordingSink::default();
        sessions.open(RecordingSink::broken());
        sessions.open(good.clone());
        sessions.open(RecordingSink::broken());

        assert_eq!(sessions.broadcast(&outcome("req-1")), 1);
        assert_eq!(good.values().len(), 2);
        // Failed writers stay registered until their own close path runs.
        assert_eq!(sessions.count(), 3);
    }

    #[test]
    fn test_broadcast_with_no_connections() {
        let sessions = SessionManager::new();
        assert_eq!(sessions.broadcast(&outcome("req-1")), 0);
    }

    #[test]
    fn test_send_to_targets_one_connection() {
        let sessions = SessionManager::new();
        let (a, b) = (RecordingSink::default(), RecordingSink::default());
        let a_id = sessions.open(a.clone());
        sessions.open(b.clone());

        assert!(sessions.send_to(a_id, &outcome("req-1")));
        assert_eq!(a.values().len(), 2);
        assert_eq!(b.values().len(), 1);
        assert!(!sessions.send_to(ConnectionId::new(), &outcome("req-2")));
    }

    #[tokio::test]
    async fn test_channel_sink_reports_full_and_closed() {
        let (tx, mut rx) = mpsc::channel::<String>(1);
        let sessions = SessionManager::new();
        let id = sessions.open(tx);

        // Buffer holds the ready event, so the next write overflows.
        assert_eq!(sessions.broadcast(&outcome("req-1")), 0);
        assert!(rx.recv().await.unwrap().contains("server_ready"));

        drop(rx);
        assert!(!sessions.send_to(id, &outcome("req-2")));
    }

    #[tokio::test]
    async fn test_shutdown_ends_streams() {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let sessions = SessionManager::new();
        sessions.open(tx);

        assert_eq!(sessions.shutdown(), 1);
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }
}
