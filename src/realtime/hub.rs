//! Registry of open desktop connections and the change fan-out.

use crate::errors::AppResult;
use crate::notify::{ChangeEvent, ChangeListener};
use crate::realtime::messages::{DB_CHANGED_TOPIC, ServerMessage};
use crate::utils::time::format_timestamp;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info};

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Frame queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Ping,
    Close { code: u16, reason: String },
}

struct Entry {
    tx: mpsc::Sender<Outbound>,
    user_id: Option<i64>,
    topics: Vec<String>,
}

impl Entry {
    fn wants(&self, topic: &str) -> bool {
        self.topics.is_empty() || self.topics.iter().any(|t| t == topic || t == "*")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HubCounts {
    pub connections: usize,
    pub identified: usize,
}

pub struct RealtimeHub {
    conns: Mutex<HashMap<String, Entry>>,
    capacity: usize,
    skipped: AtomicU64,
}

impl RealtimeHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            conns: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            skipped: AtomicU64::new(0),
        }
    }

    /// Register a connection; the receiver feeds its writer task.
    pub fn register(&self) -> (String, mpsc::Receiver<Outbound>) {
        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(self.capacity);
        if let Ok(mut conns) = self.conns.lock() {
            conns.insert(
                id.clone(),
                Entry {
                    tx,
                    user_id: None,
                    topics: Vec::new(),
                },
            );
        }
        debug!(connection = %id, "realtime connection registered");
        (id, rx)
    }

    pub fn unregister(&self, id: &str) -> bool {
        self.conns
            .lock()
            .map(|mut c| c.remove(id).is_some())
            .unwrap_or(false)
    }

    pub fn set_identity(&self, id: &str, user_id: i64) -> bool {
        self.with_entry(id, |e| e.user_id = Some(user_id))
    }

    pub fn set_topics(&self, id: &str, topics: Vec<String>) -> bool {
        self.with_entry(id, |e| e.topics = topics)
    }

    pub fn identity(&self, id: &str) -> Option<i64> {
        self.conns.lock().ok()?.get(id)?.user_id
    }

    fn with_entry(&self, id: &str, f: impl FnOnce(&mut Entry)) -> bool {
        match self.conns.lock() {
            Ok(mut conns) => conns.get_mut(id).map(f).is_some(),
            Err(_) => false,
        }
    }

    /// Queue a frame for one connection. False when the queue is full or gone.
    pub fn send_to(&self, id: &str, frame: Outbound) -> bool {
        let tx = match self.conns.lock() {
            Ok(conns) => conns.get(id).map(|e| e.tx.clone()),
            Err(_) => None,
        };
        tx.is_some_and(|tx| tx.try_send(frame).is_ok())
    }

    /// Serialize once, queue on every interested connection. Full or closed
    /// queues are skipped. Returns how many connections got the frame.
    pub fn broadcast(&self, topic: &str, msg: &ServerMessage) -> usize {
        let text = msg.to_json();
        let targets: Vec<mpsc::Sender<Outbound>> = match self.conns.lock() {
            Ok(conns) => conns
                .values()
                .filter(|e| e.wants(topic))
                .map(|e| e.tx.clone())
                .collect(),
            Err(_) => return 0,
        };

        let mut delivered = 0;
        for tx in targets {
            if tx.try_send(Outbound::Text(text.clone())).is_ok() {
                delivered += 1;
            } else {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
        }
        delivered
    }

    /// Ask every connection to close (server shutdown).
    pub fn close_all(&self, code: u16, reason: &str) -> usize {
        let drained: Vec<Entry> = match self.conns.lock() {
            Ok(mut conns) => conns.drain().map(|(_, e)| e).collect(),
            Err(_) => return 0,
        };
        let n = drained.len();
        for e in drained {
            let _ = e.tx.try_send(Outbound::Close {
                code,
                reason: reason.to_string(),
            });
        }
        if n > 0 {
            info!(connections = n, "closing realtime connections");
        }
        n
    }

    pub fn counts(&self) -> HubCounts {
        match self.conns.lock() {
            Ok(conns) => HubCounts {
                connections: conns.len(),
                identified: conns.values().filter(|e| e.user_id.is_some()).count(),
            },
            Err(_) => HubCounts::default(),
        }
    }

    /// Frames dropped because a queue was full or closed.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl ChangeListener for RealtimeHub {
    fn name(&self) -> &str {
        "realtime-hub"
    }

    fn on_change(&self, event: &ChangeEvent) -> AppResult<()> {
        let msg = ServerMessage::DbChanged {
            reason: event.reason.clone(),
            at: format_timestamp(&event.at),
            seq: event.seq,
        };
        let delivered = self.broadcast(DB_CHANGED_TOPIC, &msg);
        debug!(seq = event.seq, delivered, "db-changed broadcast");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(seq: u64) -> ChangeEvent {
        ChangeEvent {
            seq,
            reason: "insert items".into(),
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn change_reaches_every_connection() {
        let hub = RealtimeHub::new(4);
        let (_a, mut rx_a) = hub.register();
        let (b, mut rx_b) = hub.register();
        hub.set_identity(&b, 9);

        hub.on_change(&event(1)).unwrap();

        for rx in [&mut rx_a, &mut rx_b] {
            match rx.recv().await.unwrap() {
                Outbound::Text(t) => assert!(t.contains(r#""type":"db-changed""#)),
                other => panic!("unexpected frame {other:?}"),
            }
        }
        assert_eq!(
            hub.counts(),
            HubCounts {
                connections: 2,
                identified: 1
            }
        );
    }

    #[tokio::test]
    async fn full_or_closed_queues_are_skipped() {
        let hub = RealtimeHub::new(1);
        let (_slow, _rx_slow) = hub.register();
        let (_gone, rx_gone) = hub.register();
        drop(rx_gone);

        assert_eq!(hub.broadcast(DB_CHANGED_TOPIC, &ServerMessage::Pong), 1);
        // The slow queue is now full, the other one closed.
        assert_eq!(hub.broadcast(DB_CHANGED_TOPIC, &ServerMessage::Pong), 0);
        assert_eq!(hub.skipped(), 3);
    }

    #[tokio::test]
    async fn topic_filter_applies_once_subscribed() {
        let hub = RealtimeHub::new(4);
        let (id, mut rx) = hub.register();
        hub.set_topics(&id, vec!["other".into()]);
        assert_eq!(hub.broadcast(DB_CHANGED_TOPIC, &ServerMessage::Pong), 0);

        hub.set_topics(&id, vec![DB_CHANGED_TOPIC.into()]);
        assert_eq!(hub.broadcast(DB_CHANGED_TOPIC, &ServerMessage::Pong), 1);
        assert!(matches!(rx.recv().await, Some(Outbound::Text(_))));
    }

    #[tokio::test]
    async fn close_all_empties_the_registry() {
        let hub = RealtimeHub::default();
        let (_id, mut rx) = hub.register();
        assert_eq!(hub.close_all(1001, "server shutdown"), 1);
        assert_eq!(hub.counts().connections, 0);
        assert_eq!(
            rx.recv().await,
            Some(Outbound::Close {
                code: 1001,
                reason: "server shutdown".into()
            })
        );
    }
}
