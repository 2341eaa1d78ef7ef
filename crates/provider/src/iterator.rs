//! Alert Iterators
//!
//! An [`AlertIterator`] is either a live subscription fed by a bounded
//! channel, or a finite snapshot. Closing or dropping a live iterator
//! releases its fan-out slot through the [`Unsubscribe`] handle.

use crate::ProviderError;
use alert_model::Alert;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::debug;

/// Registry a live subscription can leave
pub trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, id: u64);
}

/// Fan-out slot owned by a live iterator
pub struct Subscription {
    id: u64,
    lagged: Arc<AtomicBool>,
    registry: Weak<dyn Unsubscribe>,
}

impl Subscription {
    /// `lagged` is raised by the publisher when it drops this subscriber
    pub fn new(id: u64, lagged: Arc<AtomicBool>, registry: Weak<dyn Unsubscribe>) -> Self {
        Self {
            id,
            lagged,
            registry,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    fn lagged(&self) -> bool {
        self.lagged.load(Ordering::Acquire)
    }

    fn release(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.id);
        }
    }
}

enum Source {
    Live {
        rx: mpsc::Receiver<Alert>,
        subscription: Subscription,
    },
    Snapshot(VecDeque<Alert>),
    Closed { lagged: bool },
}

/// Sequence of alerts handed out by an alert store
pub struct AlertIterator {
    source: Source,
}

impl AlertIterator {
    /// Live iterator over a subscriber channel
    pub fn live(rx: mpsc::Receiver<Alert>, subscription: Subscription) -> Self {
        Self {
            source: Source::Live { rx, subscription },
        }
    }

    /// Finite iterator over a point-in-time snapshot
    pub fn snapshot(alerts: Vec<Alert>) -> Self {
        Self {
            source: Source::Snapshot(alerts.into()),
        }
    }

    /// Wait for the next alert.
    ///
    /// Returns `None` once the iterator is exhausted or closed; check
    /// [`AlertIterator::err`] to tell a lagged subscription from a clean end.
    pub async fn next(&mut self) -> Option<Alert> {
        match &mut self.source {
            Source::Live { rx, .. } => rx.recv().await,
            Source::Snapshot(alerts) => alerts.pop_front(),
            Source::Closed { .. } => None,
        }
    }

    /// Take the next alert if one is ready, without waiting
    pub fn try_next(&mut self) -> Result<Option<Alert>, ProviderError> {
        match &mut self.source {
            Source::Live { rx, subscription } => match rx.try_recv() {
                Ok(alert) => Ok(Some(alert)),
                Err(mpsc::error::TryRecvError::Empty) => Ok(None),
                Err(mpsc::error::TryRecvError::Disconnected) if subscription.lagged() => {
                    Err(ProviderError::Lagged)
                }
                Err(mpsc::error::TryRecvError::Disconnected) => Ok(None),
            },
            Source::Snapshot(alerts) => Ok(alerts.pop_front()),
            Source::Closed { .. } => Err(ProviderError::IteratorClosed),
        }
    }

    /// Error that terminated the iterator, if any. Closing is not an error.
    pub fn err(&self) -> Option<ProviderError> {
        match &self.source {
            Source::Live { subscription, .. } if subscription.lagged() => Some(ProviderError::Lagged),
            Source::Closed { lagged: true } => Some(ProviderError::Lagged),
            _ => None,
        }
    }

    /// Stop the iterator and release its subscription
    pub fn close(&mut self) {
        let lagged = matches!(self.err(), Some(ProviderError::Lagged));
        let previous = std::mem::replace(&mut self.source, Source::Closed { lagged });
        if let Source::Live { mut rx, subscription } = previous {
            rx.close();
            subscription.release();
            debug!(subscriber = subscription.id(), "alert subscription closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.source, Source::Closed { .. })
    }
}

impl Drop for AlertIterator {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alert_model::LabelSet;
    use chrono::Utc;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Registry {
        released: Mutex<Vec<u64>>,
    }

    impl Unsubscribe for Registry {
        fn unsubscribe(&self, id: u64) {
            self.released.lock().push(id);
        }
    }

    fn alert(name: &str) -> Alert {
        Alert::new(LabelSet::new().with("alertname", name), Utc::now())
    }

    #[tokio::test]
    async fn test_snapshot_is_finite() {
        let mut iter = AlertIterator::snapshot(vec![alert("a"), alert("b")]);
        assert!(iter.next().await.is_some());
        assert!(iter.next().await.is_some());
        assert!(iter.next().await.is_none());
        assert!(iter.err().is_none());
    }

    #[tokio::test]
    async fn test_close_releases_subscription() {
        let registry = Arc::new(Registry::default());
        let weak: Weak<dyn Unsubscribe> = Arc::downgrade(&registry) as Weak<dyn Unsubscribe>;
        let (tx, rx) = mpsc::channel(4);
        let mut iter = AlertIterator::live(rx, Subscription::new(7, Arc::default(), weak));

        tx.send(alert("a")).await.unwrap();
        assert_eq!(iter.next().await.unwrap().labels.get("alertname"), Some("a"));

        iter.close();
        assert!(iter.is_closed());
        assert!(iter.err().is_none());
        assert!(matches!(iter.try_next(), Err(ProviderError::IteratorClosed)));
        assert_eq!(*registry.released.lock(), vec![7]);
        assert!(tx.is_closed());

        // Dropping after close does not release twice
        drop(iter);
        assert_eq!(registry.released.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_drop_releases_subscription() {
        let registry = Arc::new(Registry::default());
        let weak: Weak<dyn Unsubscribe> = Arc::downgrade(&registry) as Weak<dyn Unsubscribe>;
        let (_tx, rx) = mpsc::channel(1);
        drop(AlertIterator::live(rx, Subscription::new(3, Arc::default(), weak)));
        assert_eq!(*registry.released.lock(), vec![3]);
    }

    #[tokio::test]
    async fn test_lagged_reported_after_drain() {
        let registry = Arc::new(Registry::default());
        let weak: Weak<dyn Unsubscribe> = Arc::downgrade(&registry) as Weak<dyn Unsubscribe>;
        let lagged = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel(1);
        let mut iter = AlertIterator::live(rx, Subscription::new(1, lagged.clone(), weak));

        tx.try_send(alert("kept")).unwrap();
        lagged.store(true, Ordering::Release);
        drop(tx);

        assert!(iter.try_next().unwrap().is_some());
        assert!(matches!(iter.try_next(), Err(ProviderError::Lagged)));
        assert!(matches!(iter.err(), Some(ProviderError::Lagged)));

        iter.close();
        assert!(matches!(iter.err(), Some(ProviderError::Lagged)));
    }
}
