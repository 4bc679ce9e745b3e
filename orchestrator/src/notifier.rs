//! Notifier (C9): subscription registry and best-effort push delivery
//! across the `session`, `prices`, and `alerts` channels.
//!
//! Delivery is per-subscriber; one slow listener must not block others.
//! Each subscriber has a bounded backlog and is dropped once it overflows,
//! rather than letting the whole fan-out apply backpressure to the sender.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::warn;

const DEFAULT_BACKLOG: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    SessionUpdate {
        session_id: String,
        status: String,
        progress: u8,
    },
    SessionSnapshot {
        session_id: String,
        snapshot: crate::types::SessionSnapshot,
    },
    PriceUpdate {
        pair: String,
        price: f64,
    },
    Alert {
        session_id: Option<String>,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Session,
    Prices,
    Alerts,
}

struct Subscriber {
    sender: mpsc::Sender<PushMessage>,
    channels: HashMap<Channel, Vec<String>>,
}

/// Listener identity, opaque to the notifier beyond being a map key.
pub type ListenerId = String;

pub struct Notifier {
    subscribers: RwLock<HashMap<ListenerId, Subscriber>>,
    backlog: usize,
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            backlog: DEFAULT_BACKLOG,
        }
    }

    pub fn with_backlog(backlog: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            backlog,
        }
    }

    /// Register a new listener and return the receiving half of its push
    /// channel. The transport layer forwards each message to the socket.
    pub fn connect(&self, listener: ListenerId) -> mpsc::Receiver<PushMessage> {
        let (tx, rx) = mpsc::channel(self.backlog);
        self.subscribers.write().expect("poisoned lock").insert(
            listener,
            Subscriber {
                sender: tx,
                channels: HashMap::new(),
            },
        );
        rx
    }

    pub fn subscribe(&self, listener: &ListenerId, channel: Channel, key: &str) {
        if let Some(sub) = self.subscribers.write().expect("poisoned lock").get_mut(listener) {
            let keys = sub.channels.entry(channel).or_default();
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        }
    }

    pub fn unsubscribe(&self, listener: &ListenerId, channel: Channel, key: &str) {
        if let Some(sub) = self.subscribers.write().expect("poisoned lock").get_mut(listener) {
            if let Some(keys) = sub.channels.get_mut(&channel) {
                keys.retain(|k| k != key);
            }
        }
    }

    pub fn disconnect(&self, listener: &ListenerId) {
        self.subscribers.write().expect("poisoned lock").remove(listener);
    }

    /// Deliver `message` to every subscriber watching `channel` under
    /// `key`. A full backlog drops that subscriber entirely rather than
    /// blocking; `alerts` ignores `key` and reaches every subscriber on the
    /// channel (broadcast semantics).
    pub fn publish(&self, channel: Channel, key: &str, message: PushMessage) {
        let mut dropped = Vec::new();
        {
            let subscribers = self.subscribers.read().expect("poisoned lock");
            for (listener, sub) in subscribers.iter() {
                let matches = match channel {
                    Channel::Alerts => sub.channels.contains_key(&Channel::Alerts),
                    _ => sub
                        .channels
                        .get(&channel)
                        .is_some_and(|keys| keys.iter().any(|k| k == key)),
                };
                if !matches {
                    continue;
                }
                if sub.sender.try_send(message.clone()).is_err() {
                    warn!(listener, "subscriber backlog full, dropping listener");
                    dropped.push(listener.clone());
                }
            }
        }
        if !dropped.is_empty() {
            let mut subscribers = self.subscribers.write().expect("poisoned lock");
            for listener in dropped {
                subscribers.remove(&listener);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().expect("poisoned lock").len()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_and_deliver() {
        let notifier = Notifier::new();
        let mut rx = notifier.connect("listener-1".to_string());
        notifier.subscribe(&"listener-1".to_string(), Channel::Session, "session-a");

        notifier.publish(
            Channel::Session,
            "session-a",
            PushMessage::SessionUpdate {
                session_id: "session-a".to_string(),
                status: "source_locked".to_string(),
                progress: 40,
            },
        );

        let received = rx.recv().await.unwrap();
        match received {
            PushMessage::SessionUpdate { session_id, .. } => assert_eq!(session_id, "session-a"),
            _ => panic!("unexpected message variant"),
        }
    }

    #[tokio::test]
    async fn test_unmatched_key_not_delivered() {
        let notifier = Notifier::new();
        let mut rx = notifier.connect("listener-1".to_string());
        notifier.subscribe(&"listener-1".to_string(), Channel::Session, "session-a");

        notifier.publish(
            Channel::Session,
            "session-b",
            PushMessage::SessionUpdate {
                session_id: "session-b".to_string(),
                status: "source_locked".to_string(),
                progress: 40,
            },
        );

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_slow_subscriber_dropped_after_backlog_overflow() {
        let notifier = Notifier::with_backlog(2);
        let _rx = notifier.connect("slow".to_string());
        notifier.subscribe(&"slow".to_string(), Channel::Alerts, "");

        for _ in 0..5 {
            notifier.publish(
                Channel::Alerts,
                "",
                PushMessage::Alert {
                    session_id: None,
                    message: "tick".to_string(),
                },
            );
        }

        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn test_disconnect_removes_subscriber() {
        let notifier = Notifier::new();
        let _rx = notifier.connect("listener-1".to_string());
        assert_eq!(notifier.subscriber_count(), 1);
        notifier.disconnect(&"listener-1".to_string());
        assert_eq!(notifier.subscriber_count(), 0);
    }
}
