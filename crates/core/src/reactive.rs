//! Replay-latest and hot multicast cells
//!
//! Every subscriber owns an unbounded mpsc receiver, so each one observes
//! every publication in publication order: nothing is coalesced and a slow
//! subscriber never causes another to miss a value.

use futures::Stream;
use parking_lot::Mutex;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// A live subscription to a `ReplayLatest` or `Subject`
///
/// Ends when the source is closed. Dropping it unsubscribes.
pub struct Subscription<T> {
    inner: UnboundedReceiverStream<T>,
}

impl<T> Subscription<T> {
    fn new(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(rx),
        }
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

struct Fanout<T> {
    senders: Vec<mpsc::UnboundedSender<T>>,
    closed: bool,
}

impl<T: Clone> Fanout<T> {
    fn new() -> Self {
        Self {
            senders: Vec::new(),
            closed: false,
        }
    }

    fn emit(&mut self, value: &T) {
        self.senders.retain(|tx| tx.send(value.clone()).is_ok());
    }

    fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.senders.clear();
        true
    }

    fn live_count(&self) -> usize {
        self.senders.iter().filter(|tx| !tx.is_closed()).count()
    }
}

struct LatestInner<T> {
    value: T,
    fanout: Fanout<T>,
}

/// Cell holding a current value that is replayed to every new subscriber
///
/// Publications are totally ordered: all mutation happens under one lock,
/// including delivery to subscriber queues.
pub struct ReplayLatest<T> {
    inner: Arc<Mutex<LatestInner<T>>>,
}

impl<T> Clone for ReplayLatest<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> ReplayLatest<T> {
    /// Create a cell holding `initial`
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LatestInner {
                value: initial,
                fanout: Fanout::new(),
            })),
        }
    }

    /// Subscribe; the current value is always the first item
    pub fn subscribe(&self) -> Subscription<T> {
        let mut inner = self.inner.lock();
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(inner.value.clone());
        if !inner.fanout.closed {
            inner.fanout.senders.push(tx);
        }
        Subscription::new(rx)
    }

    /// Current value
    pub fn get(&self) -> T {
        self.inner.lock().value.clone()
    }

    /// Replace the current value and deliver it to all subscribers
    ///
    /// Returns `false` (and changes nothing) once the cell is closed.
    pub fn publish(&self, value: T) -> bool {
        self.update(|_| Some(value))
    }

    /// Atomically compute the next value from the current one
    ///
    /// `f` runs under the cell's lock and must not touch this cell. Returning
    /// `None` leaves the value untouched and publishes nothing.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> Option<T>,
    {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.fanout.closed {
            return false;
        }
        match f(&inner.value) {
            Some(next) => {
                inner.value = next;
                inner.fanout.emit(&inner.value);
                true
            }
            None => false,
        }
    }

    /// Stop emitting; live subscriptions end, the value stays readable
    ///
    /// Returns `true` on the first call only.
    pub fn close(&self) -> bool {
        self.inner.lock().fanout.close()
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.inner.lock().fanout.closed
    }

    /// Number of subscriptions still alive
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().fanout.live_count()
    }

    /// Handle that does not keep the cell alive
    pub fn downgrade(&self) -> WeakReplayLatest<T> {
        WeakReplayLatest {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Non-owning handle to a `ReplayLatest`
///
/// Lets values stored in a cell refer back to it without a reference cycle.
pub struct WeakReplayLatest<T> {
    inner: Weak<Mutex<LatestInner<T>>>,
}

impl<T> Clone for WeakReplayLatest<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> WeakReplayLatest<T> {
    /// The cell, if it is still alive
    pub fn upgrade(&self) -> Option<ReplayLatest<T>> {
        self.inner.upgrade().map(|inner| ReplayLatest { inner })
    }
}

/// Hot multicast: subscribers only see values published after they subscribe
pub struct Subject<T> {
    inner: Arc<Mutex<Fanout<T>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Subject<T> {
    /// Create an open subject with no subscribers
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Fanout::new())),
        }
    }

    /// Subscribe to future values; ends immediately if already completed
    pub fn subscribe(&self) -> Subscription<T> {
        let mut inner = self.inner.lock();
        let (tx, rx) = mpsc::unbounded_channel();
        if !inner.closed {
            inner.senders.push(tx);
        }
        Subscription::new(rx)
    }

    /// Deliver a value to every current subscriber
    pub fn next(&self, value: T) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }
        inner.emit(&value);
        true
    }

    /// End every subscription; returns `true` on the first call only
    pub fn complete(&self) -> bool {
        self.inner.lock().close()
    }

    /// Whether `complete` has been called
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Whether anyone is still subscribed
    pub fn is_observed(&self) -> bool {
        self.inner.lock().live_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{FutureExt, StreamExt};
    use tokio_test::{assert_pending, assert_ready_eq};

    #[tokio::test]
    async fn test_replay_latest_initial_value() {
        let cell = ReplayLatest::new(1u32);
        let mut sub = cell.subscribe();
        assert_eq!(sub.next().await, Some(1));
    }

    #[tokio::test]
    async fn test_replay_latest_late_subscriber_sees_latest_only() {
        let cell = ReplayLatest::new(0u32);
        cell.publish(1);
        cell.publish(2);
        cell.publish(3);

        let mut sub = cell.subscribe();
        assert_eq!(sub.next().await, Some(3));
        assert!(sub.next().now_or_never().is_none());
    }

    #[tokio::test]
    async fn test_replay_latest_preserves_every_publication_in_order() {
        let cell = ReplayLatest::new(0u32);
        let sub = cell.subscribe();
        for i in 1..=5 {
            cell.publish(i);
        }
        cell.close();

        let seen: Vec<u32> = sub.collect().await;
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_replay_latest_close_rejects_publications() {
        let cell = ReplayLatest::new("a".to_string());
        assert!(cell.close());
        assert!(!cell.close());
        assert!(!cell.publish("b".to_string()));
        assert_eq!(cell.get(), "a");

        // Late subscriber gets the retained value, then the end of stream
        let seen: Vec<String> = cell.subscribe().collect().await;
        assert_eq!(seen, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_replay_latest_update_can_skip() {
        let cell = ReplayLatest::new(vec![1u32]);
        let mut sub = cell.subscribe();
        assert_eq!(sub.next().await, Some(vec![1]));

        assert!(!cell.update(|_| None));
        assert!(sub.next().now_or_never().is_none());

        assert!(cell.update(|current| {
            let mut next = current.clone();
            next.push(2);
            Some(next)
        }));
        assert_eq!(sub.next().await, Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_replay_latest_subscriber_count() {
        let cell = ReplayLatest::new(0u8);
        let a = cell.subscribe();
        let _b = cell.subscribe();
        assert_eq!(cell.subscriber_count(), 2);

        drop(a);
        assert_eq!(cell.subscriber_count(), 1);

        cell.close();
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn test_weak_handle_does_not_keep_cell_alive() {
        let cell = ReplayLatest::new(7u8);
        let weak = cell.downgrade();
        assert_eq!(weak.upgrade().map(|c| c.get()), Some(7));

        drop(cell);
        assert!(weak.upgrade().is_none());
    }

    #[tokio::test]
    async fn test_subject_is_hot() {
        let subject = Subject::new();
        subject.next(1u32);

        let mut task = tokio_test::task::spawn(subject.subscribe());
        assert_pending!(task.poll_next());

        subject.next(2);
        assert_ready_eq!(task.poll_next(), Some(2));

        subject.complete();
        assert_ready_eq!(task.poll_next(), None);
    }

    #[tokio::test]
    async fn test_subject_observed() {
        let subject: Subject<u32> = Subject::new();
        assert!(!subject.is_observed());

        let sub = subject.subscribe();
        assert!(subject.is_observed());

        drop(sub);
        assert!(!subject.is_observed());
    }
}
