//! Bounded in-memory notification queue.
//!
//! Used for both the primary (ingestion) queue and the retry queue of the
//! dispatcher. The queue is shared by one or more producers and a pool of
//! consumers:
//!
//! - `push` waits while the queue is full, which is how backpressure reaches the
//!   HTTP handlers
//! - `pop` waits for an item; after `close` it keeps handing out buffered items
//!   and returns `None` once the queue is empty
//! - `close` seals the queue against new items and wakes every waiter
//!
//! Nothing is persisted; buffered items are lost when the process exits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::Notify;

use crate::notification::Notification;

/// Returned by `push` on a closed queue. Carries the rejected notification
/// back to the caller.
#[derive(Debug, Error)]
#[error("queue '{queue}' is closed")]
pub struct QueueClosed {
    pub queue: &'static str,
    pub notification: Notification,
}

/// A bounded multi-producer, multi-consumer FIFO of notifications.
#[derive(Debug)]
pub struct NotificationQueue {
    name: &'static str,
    items: Mutex<VecDeque<Notification>>,
    capacity: usize,
    closed: AtomicBool,
    /// Signalled when an item is pushed
    item_ready: Notify,
    /// Signalled when an item is popped
    space_ready: Notify,
}

impl NotificationQueue {
    /// Create a queue holding at most `capacity` items. A capacity of zero is
    /// treated as one.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            closed: AtomicBool::new(false),
            item_ready: Notify::new(),
            space_ready: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of buffered items
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Append a notification, waiting for space while the queue is full.
    pub async fn push(&self, notification: Notification) -> Result<(), QueueClosed> {
        loop {
            // Register interest before checking so a concurrent pop or close
            // between the check and the await is not missed.
            let space = self.space_ready.notified();
            tokio::pin!(space);
            space.as_mut().enable();

            if self.is_closed() {
                return Err(QueueClosed {
                    queue: self.name,
                    notification,
                });
            }

            {
                let mut items = self.lock();
                if items.len() < self.capacity {
                    items.push_back(notification);
                    drop(items);
                    self.item_ready.notify_one();
                    return Ok(());
                }
            }

            space.await;
        }
    }

    /// Remove the oldest notification, waiting until one is available.
    ///
    /// Returns `None` only when the queue is closed and drained.
    pub async fn pop(&self) -> Option<Notification> {
        loop {
            let ready = self.item_ready.notified();
            tokio::pin!(ready);
            ready.as_mut().enable();

            if let Some(notification) = self.try_pop() {
                return Some(notification);
            }

            if self.is_closed() {
                return None;
            }

            ready.await;
        }
    }

    /// Remove the oldest notification without waiting
    pub fn try_pop(&self) -> Option<Notification> {
        let notification = self.lock().pop_front()?;
        self.space_ready.notify_one();
        Some(notification)
    }

    /// Seal the queue. Buffered items stay available to `pop`.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.item_ready.notify_waiters();
        self.space_ready.notify_waiters();

        tracing::debug!(
            queue = self.name,
            remaining = self.len(),
            "Queue closed"
        );
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Notification>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::Map;
    use tokio_test::{assert_pending, assert_ready, task};

    fn notification(id: &str) -> Notification {
        Notification::new(id, "test.event", Map::new())
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = NotificationQueue::new("primary", 10);

        for i in 0..3 {
            queue.push(notification(&format!("n{i}"))).await.unwrap();
        }
        assert_eq!(queue.len(), 3);

        for i in 0..3 {
            let n = queue.pop().await.unwrap();
            assert_eq!(n.id, format!("n{i}"));
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_zero_capacity_holds_one() {
        let queue = NotificationQueue::new("primary", 0);
        assert_eq!(queue.capacity(), 1);
        queue.push(notification("n1")).await.unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_push_waits_while_full() {
        let queue = NotificationQueue::new("primary", 1);
        queue.push(notification("n1")).await.unwrap();

        let mut blocked = task::spawn(queue.push(notification("n2")));
        assert_pending!(blocked.poll());

        assert_eq!(queue.try_pop().unwrap().id, "n1");
        assert!(blocked.is_woken());
        assert_ready!(blocked.poll()).unwrap();

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.try_pop().unwrap().id, "n2");
    }

    #[tokio::test]
    async fn test_pop_wakes_on_push() {
        let queue = Arc::new(NotificationQueue::new("retry", 4));

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(notification("late")).await.unwrap();

        let popped = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(popped.unwrap().id, "late");
    }

    #[tokio::test]
    async fn test_closed_queue_rejects_push() {
        let queue = NotificationQueue::new("primary", 4);
        queue.close();

        let err = queue.push(notification("n1")).await.unwrap_err();
        assert_eq!(err.queue, "primary");
        assert_eq!(err.notification.id, "n1");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_closed_queue_drains_buffered_items() {
        let queue = NotificationQueue::new("primary", 4);
        queue.push(notification("n1")).await.unwrap();
        queue.close();

        assert_eq!(queue.pop().await.unwrap().id, "n1");
        assert!(queue.pop().await.is_none());
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_consumer() {
        let queue = Arc::new(NotificationQueue::new("primary", 4));

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        let popped = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert!(popped.is_none());
    }

    #[tokio::test]
    async fn test_close_wakes_blocked_producer() {
        let queue = NotificationQueue::new("primary", 1);
        queue.push(notification("n1")).await.unwrap();

        let mut blocked = task::spawn(queue.push(notification("n2")));
        assert_pending!(blocked.poll());

        queue.close();
        assert!(blocked.is_woken());
        let err = assert_ready!(blocked.poll()).unwrap_err();
        assert_eq!(err.notification.id, "n2");
    }
}
