//! Subscriber Fan-Out
//!
//! Each subscriber owns a bounded channel. Publishing never waits: a full
//! queue gets its subscriber flagged as lagged and removed, which closes the
//! channel once the subscriber has drained what it already received.

use alert_model::Alert;
use alert_provider::{AlertIterator, Subscription, Unsubscribe};
use metrics::{counter, gauge};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

struct Subscriber {
    tx: mpsc::Sender<Alert>,
    lagged: Arc<AtomicBool>,
}

/// Registry of live subscribers
pub(crate) struct Broadcaster {
    subscribers: RwLock<HashMap<u64, Subscriber>>,
    next_id: AtomicU64,
}

impl Broadcaster {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Join the fan-out. Only alerts published from now on are delivered.
    pub(crate) fn subscribe(self: &Arc<Self>, capacity: usize) -> AlertIterator {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let lagged = Arc::new(AtomicBool::new(false));

        let count = {
            let mut subscribers = self.subscribers.write();
            subscribers.insert(
                id,
                Subscriber {
                    tx,
                    lagged: lagged.clone(),
                },
            );
            subscribers.len()
        };
        gauge!("alertcore_subscribers").set(count as f64);
        debug!(subscriber = id, capacity, "alert subscriber joined");

        let registry: Weak<dyn Unsubscribe> = Arc::downgrade(self) as Weak<dyn Unsubscribe>;
        AlertIterator::live(rx, Subscription::new(id, lagged, registry))
    }

    /// Deliver to every subscriber without blocking; returns the number of
    /// subscribers that received the alert
    pub(crate) fn publish(&self, alert: &Alert) -> usize {
        let mut delivered = 0;
        let mut gone = Vec::new();

        {
            let subscribers = self.subscribers.read();
            for (id, subscriber) in subscribers.iter() {
                match subscriber.tx.try_send(alert.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        subscriber.lagged.store(true, Ordering::Release);
                        warn!(subscriber = *id, "subscriber queue full, dropping subscriber");
                        counter!("alertcore_subscribers_dropped_total").increment(1);
                        gone.push(*id);
                    }
                    Err(TrySendError::Closed(_)) => gone.push(*id),
                }
            }
        }

        if !gone.is_empty() {
            let count = {
                let mut subscribers = self.subscribers.write();
                for id in gone {
                    subscribers.remove(&id);
                }
                subscribers.len()
            };
            gauge!("alertcore_subscribers").set(count as f64);
        }

        counter!("alertcore_alerts_published_total").increment(1);
        delivered
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Unsubscribe for Broadcaster {
    fn unsubscribe(&self, id: u64) {
        let count = {
            let mut subscribers = self.subscribers.write();
            subscribers.remove(&id);
            subscribers.len()
        };
        gauge!("alertcore_subscribers").set(count as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alert_model::LabelSet;
    use alert_provider::ProviderError;
    use chrono::Utc;

    fn alert(name: &str) -> Alert {
        Alert::new(LabelSet::new().with("alertname", name), Utc::now())
    }

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let broadcaster = Broadcaster::new();
        let mut first = broadcaster.subscribe(4);
        let mut second = broadcaster.subscribe(4);

        assert_eq!(broadcaster.publish(&alert("a")), 2);
        assert_eq!(first.next().await.unwrap().labels.get("alertname"), Some("a"));
        assert_eq!(second.next().await.unwrap().labels.get("alertname"), Some("a"));
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_only_future_alerts() {
        let broadcaster = Broadcaster::new();
        broadcaster.publish(&alert("before"));

        let mut late = broadcaster.subscribe(4);
        broadcaster.publish(&alert("after"));

        assert_eq!(late.next().await.unwrap().labels.get("alertname"), Some("after"));
        assert!(late.try_next().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_full_queue_drops_only_the_slow_subscriber() {
        let broadcaster = Broadcaster::new();
        let mut slow = broadcaster.subscribe(1);
        let mut fast = broadcaster.subscribe(8);

        broadcaster.publish(&alert("1"));
        assert_eq!(fast.next().await.unwrap().labels.get("alertname"), Some("1"));
        broadcaster.publish(&alert("2"));

        assert_eq!(broadcaster.len(), 1);
        assert_eq!(fast.next().await.unwrap().labels.get("alertname"), Some("2"));

        assert_eq!(slow.next().await.unwrap().labels.get("alertname"), Some("1"));
        assert!(slow.next().await.is_none());
        assert!(matches!(slow.err(), Some(ProviderError::Lagged)));
        assert!(fast.err().is_none());
    }

    #[tokio::test]
    async fn test_closed_iterator_leaves_fan_out() {
        let broadcaster = Broadcaster::new();
        let mut iter = broadcaster.subscribe(4);
        let other = broadcaster.subscribe(4);
        assert_eq!(broadcaster.len(), 2);

        iter.close();
        assert_eq!(broadcaster.len(), 1);
        drop(other);
        assert_eq!(broadcaster.len(), 0);
        assert_eq!(broadcaster.publish(&alert("nobody")), 0);
    }
}
