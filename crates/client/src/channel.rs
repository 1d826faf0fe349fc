//! Bounded delivery channels between the session and application code
//!
//! The session's routing task produces items (samples, queries,
//! replies); application code consumes them one at a time. Two
//! overflow policies are available:
//!
//! - [`ChannelPolicy::Fifo`]: a full channel drops the *newest* item,
//!   so consumers observe the oldest N items produced
//! - [`ChannelPolicy::Ring`]: a full channel evicts the *oldest* item,
//!   so consumers observe the most recent N items produced
//!
//! Once the producer closes the channel, buffered items remain
//! receivable until drained; after that every receive reports
//! end-of-stream. One logical producer and one logical consumer per
//! channel; both sides may live on different tasks.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

/// Overflow policy for a delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPolicy {
    /// Keep the oldest items; drop new items while full
    Fifo,
    /// Keep the newest items; evict the oldest to make room
    Ring,
}

/// Snapshot of a channel's observable state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Open, nothing buffered
    Empty,
    /// Open, at least one item buffered
    Data,
    /// Closed by the producer; reported even while items remain buffered
    Close,
}

/// Outcome of a non-suspending receive attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecv<T> {
    /// An item was dequeued
    Value(T),
    /// Nothing buffered right now; the channel is still open
    Empty,
    /// The channel is closed and fully drained
    Closed,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    notify: Notify,
}

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Producer half of a delivery channel
pub struct ChannelSender<T> {
    shared: Arc<Shared<T>>,
    capacity: usize,
    policy: ChannelPolicy,
}

/// Consumer half of a delivery channel
pub struct ChannelReceiver<T> {
    shared: Arc<Shared<T>>,
}

/// Creates a delivery channel with the given policy and capacity
///
/// A zero capacity is bumped to one; a channel that can never hold an
/// item would make every send a silent drop.
pub fn channel<T>(policy: ChannelPolicy, capacity: usize) -> (ChannelSender<T>, ChannelReceiver<T>) {
    let shared = Arc::new(Shared {
        inner: Mutex::new(Inner {
            items: VecDeque::with_capacity(capacity.max(1)),
            closed: false,
        }),
        notify: Notify::new(),
    });
    (
        ChannelSender {
            shared: shared.clone(),
            capacity: capacity.max(1),
            policy,
        },
        ChannelReceiver { shared },
    )
}

impl<T> ChannelSender<T> {
    /// Enqueues an item, applying the overflow policy when full
    ///
    /// Returns `false` if the item was dropped (channel closed, or
    /// full under the Fifo policy).
    pub fn send(&self, item: T) -> bool {
        {
            let mut inner = self.shared.inner.lock().unwrap();
            if inner.closed {
                return false;
            }
            if inner.items.len() >= self.capacity {
                match self.policy {
                    ChannelPolicy::Fifo => return false,
                    ChannelPolicy::Ring => {
                        inner.items.pop_front();
                    }
                }
            }
            inner.items.push_back(item);
        }
        self.shared.notify.notify_one();
        true
    }

    /// Marks that no more items will arrive
    ///
    /// Buffered items stay receivable; once drained, receives report
    /// end-of-stream. Idempotent.
    pub fn close(&self) {
        {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.closed = true;
        }
        self.shared.notify.notify_one();
    }
}

impl<T> Drop for ChannelSender<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> ChannelReceiver<T> {
    /// Receives the next item, suspending until one is available
    ///
    /// Returns `None` once the channel is closed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut inner = self.shared.inner.lock().unwrap();
                if let Some(item) = inner.items.pop_front() {
                    return Some(item);
                }
                if inner.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Receives the next item without suspending
    pub fn try_recv(&mut self) -> TryRecv<T> {
        let mut inner = self.shared.inner.lock().unwrap();
        if let Some(item) = inner.items.pop_front() {
            TryRecv::Value(item)
        } else if inner.closed {
            TryRecv::Closed
        } else {
            TryRecv::Empty
        }
    }

    /// Reports the channel's current state
    pub fn state(&self) -> ChannelState {
        let inner = self.shared.inner.lock().unwrap();
        if inner.closed {
            ChannelState::Close
        } else if inner.items.is_empty() {
            ChannelState::Empty
        } else {
            ChannelState::Data
        }
    }
}

impl<T> std::fmt::Debug for ChannelSender<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSender")
            .field("capacity", &self.capacity)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<T> std::fmt::Debug for ChannelReceiver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelReceiver").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_keeps_oldest_on_overflow() {
        let (tx, mut rx) = channel(ChannelPolicy::Fifo, 3);
        for i in 1..=4 {
            tx.send(i);
        }
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.try_recv(), TryRecv::Value(3));
        assert_eq!(rx.try_recv(), TryRecv::Empty);
    }

    #[tokio::test]
    async fn test_ring_keeps_newest_on_overflow() {
        let (tx, mut rx) = channel(ChannelPolicy::Ring, 3);
        for i in 1..=4 {
            tx.send(i);
        }
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(3));
        assert_eq!(rx.try_recv(), TryRecv::Value(4));
        assert_eq!(rx.try_recv(), TryRecv::Empty);
    }

    #[tokio::test]
    async fn test_send_reports_drops() {
        let (tx, _rx) = channel(ChannelPolicy::Fifo, 1);
        assert!(tx.send(1));
        assert!(!tx.send(2));

        let (tx, _rx) = channel(ChannelPolicy::Ring, 1);
        assert!(tx.send(1));
        assert!(tx.send(2));
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let (tx, mut rx) = channel(ChannelPolicy::Fifo, 8);
        tx.send("a");
        tx.send("b");
        tx.close();

        assert_eq!(rx.state(), ChannelState::Close);
        assert_eq!(rx.recv().await, Some("a"));
        assert_eq!(rx.recv().await, Some("b"));
        assert_eq!(rx.recv().await, None);
        assert_eq!(rx.try_recv(), TryRecv::Closed);
        assert_eq!(rx.state(), ChannelState::Close);
    }

    #[tokio::test]
    async fn test_send_after_close_is_dropped() {
        let (tx, mut rx) = channel(ChannelPolicy::Ring, 8);
        tx.close();
        assert!(!tx.send(1));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let (tx, mut rx) = channel(ChannelPolicy::Fifo, 2);
        assert_eq!(rx.state(), ChannelState::Empty);
        tx.send(1);
        assert_eq!(rx.state(), ChannelState::Data);
        rx.try_recv();
        assert_eq!(rx.state(), ChannelState::Empty);
        tx.close();
        assert_eq!(rx.state(), ChannelState::Close);
    }

    #[tokio::test]
    async fn test_recv_wakes_on_send() {
        let (tx, mut rx) = channel(ChannelPolicy::Fifo, 4);
        let consumer = tokio::spawn(async move { rx.recv().await });
        tokio::task::yield_now().await;
        tx.send(42);
        let received = tokio::time::timeout(std::time::Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, Some(42));
    }

    #[tokio::test]
    async fn test_recv_wakes_on_close() {
        let (tx, mut rx) = channel::<u32>(ChannelPolicy::Fifo, 4);
        let consumer = tokio::spawn(async move { rx.recv().await });
        tokio::task::yield_now().await;
        tx.close();
        let received = tokio::time::timeout(std::time::Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, None);
    }

    #[tokio::test]
    async fn test_dropping_sender_closes() {
        let (tx, mut rx) = channel(ChannelPolicy::Fifo, 4);
        tx.send(7);
        drop(tx);
        assert_eq!(rx.recv().await, Some(7));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_iteration_order_preserved() {
        let (tx, mut rx) = channel(ChannelPolicy::Fifo, 64);
        for i in 0..32 {
            tx.send(i);
        }
        tx.close();
        let mut received = Vec::new();
        while let Some(i) = rx.recv().await {
            received.push(i);
        }
        assert_eq!(received, (0..32).collect::<Vec<_>>());
    }
}
